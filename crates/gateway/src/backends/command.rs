//! Shell-command log source.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use ho_domain::config::SourceConfig;
use ho_domain::error::{Error, Result};
use ho_domain::trace::TraceEvent;

use super::{FetchParams, LogSource, SourceInfo};

/// Runs a configured command per source tag and returns its stdout.
pub struct CommandLogSource {
    sources: BTreeMap<String, SourceConfig>,
}

impl CommandLogSource {
    pub fn new(sources: BTreeMap<String, SourceConfig>) -> Self {
        Self { sources }
    }

    fn render_command(template: &str, params: &FetchParams) -> String {
        template
            .replace("{lines}", &params.lines.to_string())
            .replace("{verbose}", if params.verbose { "1" } else { "0" })
    }

    async fn run(&self, tag: &str, cfg: &SourceConfig, params: &FetchParams) -> Result<String> {
        let command = Self::render_command(&cfg.command, params);
        tracing::debug!(source = %tag, command = %command, "fetching logs");

        let child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let timeout = Duration::from_secs(cfg.timeout_secs.max(1));
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Fetch {
                source_tag: tag.to_owned(),
                message: format!("timed out after {}s", timeout.as_secs()),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Fetch {
                source_tag: tag.to_owned(),
                message: format!("{}: {}", output.status, stderr.trim()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl LogSource for CommandLogSource {
    async fn fetch_text(&self, source_tag: &str, params: &FetchParams) -> Result<String> {
        let Some(cfg) = self.sources.get(source_tag) else {
            return Err(Error::Fetch {
                source_tag: source_tag.to_owned(),
                message: "unknown log source".into(),
            });
        };

        let result = self.run(source_tag, cfg, params).await;
        TraceEvent::LogFetched {
            source: source_tag.to_owned(),
            chars: result.as_ref().map(|t| t.chars().count()).unwrap_or(0),
            ok: result.is_ok(),
        }
        .emit();
        if let Err(e) = &result {
            tracing::warn!(source = %source_tag, error = %e, "log fetch failed");
        }
        result
    }

    fn sources(&self) -> Vec<SourceInfo> {
        self.sources
            .iter()
            .map(|(tag, cfg)| SourceInfo {
                tag: tag.clone(),
                label: cfg.label.clone().unwrap_or_else(|| tag.clone()),
                analysis_prompt: cfg.analysis_prompt.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(command: &str) -> SourceConfig {
        SourceConfig {
            label: Some("Router".into()),
            command: command.into(),
            timeout_secs: 5,
            analysis_prompt: None,
        }
    }

    fn logs(entries: &[(&str, SourceConfig)]) -> CommandLogSource {
        CommandLogSource::new(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn placeholders_are_substituted() {
        let params = FetchParams {
            lines: 42,
            verbose: true,
        };
        assert_eq!(
            CommandLogSource::render_command("tail -n {lines} log --v={verbose}", &params),
            "tail -n 42 log --v=1"
        );
    }

    #[tokio::test]
    async fn stdout_is_returned() {
        let src = logs(&[("wrt", source("echo line-{lines}"))]);
        let params = FetchParams {
            lines: 7,
            verbose: false,
        };
        let text = src.fetch_text("wrt", &params).await.unwrap();
        assert_eq!(text.trim(), "line-7");
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_fetch_error() {
        let src = logs(&[("wrt", source("echo boom >&2; exit 3"))]);
        let params = FetchParams {
            lines: 1,
            verbose: false,
        };
        let err = src.fetch_text("wrt", &params).await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn unknown_tag_is_a_fetch_error() {
        let src = logs(&[]);
        let params = FetchParams {
            lines: 1,
            verbose: false,
        };
        assert!(src.fetch_text("nope", &params).await.is_err());
    }

    #[test]
    fn sources_fall_back_to_tag_as_label() {
        let mut unlabeled = source("true");
        unlabeled.label = None;
        let src = logs(&[("clash", unlabeled), ("wrt", source("true"))]);
        let infos = src.sources();
        assert_eq!(infos[0].label, "clash");
        assert_eq!(infos[1].label, "Router");
        assert_eq!(src.describe("wrt").unwrap().tag, "wrt");
    }
}
