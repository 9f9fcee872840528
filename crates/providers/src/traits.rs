use ho_domain::error::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider adapter traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A generation provider that hands out per-credential sessions.
///
/// Credential and model identifiers are opaque strings. Adapters translate
/// them into the provider's wire format.
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Build a session bound to one credential. Fails when the credential
    /// is unusable before any request is made.
    async fn open_session(&self, credential: &str) -> Result<Box<dyn ProviderSession>>;

    /// A short identifier for logs and error messages.
    fn provider_id(&self) -> &str;
}

/// A credential-bound handle able to run one generation call.
#[async_trait::async_trait]
pub trait ProviderSession: Send + Sync {
    /// Generate a text response. When `image` is present the call is the
    /// image-augmented variant.
    async fn generate(&self, model: &str, prompt: &str, image: Option<&[u8]>) -> Result<String>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Caller-facing trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Anything that turns a prompt (and optional image) into text.
///
/// [`GenerationClient`](crate::GenerationClient) is the production
/// implementation; callers depend on this trait so they can be driven by a
/// scripted generator in tests.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, image: Option<&[u8]>) -> Result<String>;
}
