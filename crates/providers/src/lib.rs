pub mod auth;
pub mod client;
pub mod google;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use auth::{KeyEntry, KeyPool};
pub use client::GenerationClient;
pub use google::GeminiBackend;
pub use traits::{GenerationBackend, ProviderSession, TextGenerator};
