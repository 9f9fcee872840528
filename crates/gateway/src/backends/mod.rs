//! Administrative collaborators: where logs come from and where completed
//! wizard submissions go.
//!
//! The core depends only on the two traits here. The bundled
//! implementations are configuration driven and know nothing about any
//! particular router or DNS appliance.

pub mod command;
pub mod webhook;

use std::collections::BTreeMap;

use ho_domain::error::Result;

pub use command::CommandLogSource;
pub use webhook::{DryRunSubmitter, WebhookSubmitter};

/// Parameters for one log fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchParams {
    pub lines: usize,
    pub verbose: bool,
}

/// Display metadata for a configured log source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub tag: String,
    pub label: String,
    /// Role line that opens the analysis prompt, when the source has one.
    pub analysis_prompt: Option<String>,
}

#[async_trait::async_trait]
pub trait LogSource: Send + Sync {
    async fn fetch_text(&self, source_tag: &str, params: &FetchParams) -> Result<String>;

    /// Sources offered in menus, in display order.
    fn sources(&self) -> Vec<SourceInfo> {
        Vec::new()
    }

    fn describe(&self, source_tag: &str) -> Option<SourceInfo> {
        self.sources().into_iter().find(|s| s.tag == source_tag)
    }
}

#[async_trait::async_trait]
pub trait Submitter: Send + Sync {
    /// Apply a completed wizard. Returns a confirmation shown to the user.
    async fn submit(&self, kind: &str, fields: &BTreeMap<String, String>) -> Result<String>;
}
