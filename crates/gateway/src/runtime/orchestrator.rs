//! Inbound event routing.
//!
//! Text goes to the active wizard first, then to batch collection, then to
//! the AI conversation. Anything else is ignored. Button presses are parsed
//! into [`Action`]s and handled here. Every feature checks the
//! [`AccessPolicy`] grant table first; grant management is admin-only.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use ho_domain::error::Result;
use ho_providers::TextGenerator;
use ho_sessions::{AiMode, Batch, History, PendingContext, SessionStore, UserId};

use crate::backends::{FetchParams, LogSource};
use crate::runtime::access::{self, AccessPolicy, FEATURE_AI, FEATURE_FORMS};
use crate::runtime::analysis::DiagnosticRunner;
use crate::runtime::delivery::MessageDelivery;
use crate::runtime::menus::{self, Action};
use crate::runtime::wizard::WizardEngine;
use crate::transport::{AttachmentRef, ChatTransport, Format, Menu, MessageHandle};

const THINKING: &str = "🤔 Thinking…";
const DEFAULT_IMAGE_PROMPT: &str = "Describe this image";

#[derive(Debug, Clone)]
pub enum InboundEvent {
    Text(String),
    Photo {
        attachment: AttachmentRef,
        caption: Option<String>,
    },
    Action {
        data: String,
        /// The message the pressed button was attached to.
        message: Option<MessageHandle>,
    },
}

pub struct Orchestrator {
    sessions: Arc<SessionStore>,
    generator: Arc<dyn TextGenerator>,
    logs: Arc<dyn LogSource>,
    delivery: Arc<MessageDelivery>,
    wizards: WizardEngine,
    analysis: DiagnosticRunner,
    access: AccessPolicy,
    reply_deadline: Duration,
    log_fetch_lines: usize,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        generator: Arc<dyn TextGenerator>,
        logs: Arc<dyn LogSource>,
        delivery: Arc<MessageDelivery>,
        wizards: WizardEngine,
        analysis: DiagnosticRunner,
    ) -> Self {
        Self {
            sessions,
            generator,
            logs,
            delivery,
            wizards,
            analysis,
            access: AccessPolicy::default(),
            reply_deadline: Duration::from_secs(180),
            log_fetch_lines: 100,
        }
    }

    pub fn with_access(mut self, access: AccessPolicy) -> Self {
        self.access = access;
        self
    }

    pub fn with_reply_deadline(mut self, deadline: Duration) -> Self {
        self.reply_deadline = deadline;
        self
    }

    pub fn with_log_fetch_lines(mut self, lines: usize) -> Self {
        self.log_fetch_lines = lines.max(1);
        self
    }

    pub fn analysis(&self) -> &DiagnosticRunner {
        &self.analysis
    }

    fn transport(&self) -> &Arc<dyn ChatTransport> {
        self.delivery.transport()
    }

    /// Handle one event on its own task.
    pub fn dispatch(self: &Arc<Self>, user: UserId, event: InboundEvent) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = this.handle(&user, event).await {
                tracing::error!(user = %user, error = %e, "event handling failed");
            }
        })
    }

    pub async fn handle(&self, user: &UserId, event: InboundEvent) -> Result<()> {
        if !self.access.is_allowed(user) {
            tracing::warn!(user = %user, "dropping event from unauthorised user");
            return Ok(());
        }
        match event {
            InboundEvent::Text(text) => self.on_text(user, &text).await,
            InboundEvent::Photo {
                attachment,
                caption,
            } => self.on_photo(user, &attachment, caption.as_deref()).await,
            InboundEvent::Action { data, message } => match data.parse::<Action>() {
                Ok(action) => self.on_action(user, action, message.as_ref()).await,
                Err(e) => {
                    tracing::debug!(user = %user, error = %e, "ignoring action");
                    Ok(())
                }
            },
        }
    }

    // ── text ────────────────────────────────────────────────────────

    async fn on_text(&self, user: &UserId, text: &str) -> Result<()> {
        if self.wizards.handle_input(user, text).await? {
            return Ok(());
        }

        let collected = self.sessions.update::<Batch, _>(user, |slot| {
            slot.as_mut().map(|list| {
                list.push(text.to_owned());
                list.len()
            })
        });
        if let Some(count) = collected {
            tracing::debug!(user = %user, count, "batch message collected");
            return Ok(());
        }

        if self.sessions.get::<AiMode>(user).unwrap_or(false) {
            if !self.access.has_permission(user, FEATURE_AI) {
                return self.refuse_feature(user, FEATURE_AI).await;
            }
            return self.converse(user, text).await;
        }

        tracing::debug!(user = %user, "ignoring text outside any mode");
        Ok(())
    }

    /// One AI turn: optional log refresh, generation, history update.
    async fn converse(&self, user: &UserId, text: &str) -> Result<()> {
        let placeholder = self
            .transport()
            .send_message(user, THINKING, Format::Plain, None)
            .await?;

        let reply = tokio::time::timeout(
            self.reply_deadline,
            self.compose_reply(user, text, &placeholder),
        )
        .await;

        match reply {
            Ok(Ok(answer)) => {
                if self.sessions.get::<AiMode>(user).unwrap_or(false) {
                    self.sessions.append_exchange(user, text, &answer);
                }
                self.delivery
                    .deliver(user, Some(&placeholder), &answer, Some(&menus::ai_exit()))
                    .await
            }
            Ok(Err(e)) => {
                tracing::warn!(user = %user, error = %e, "generation failed");
                self.delivery
                    .deliver(
                        user,
                        Some(&placeholder),
                        &format!("❌ Error: {e}"),
                        Some(&menus::ai_followup()),
                    )
                    .await
            }
            Err(_) => {
                tracing::warn!(user = %user, deadline_secs = self.reply_deadline.as_secs(), "reply timed out");
                self.delivery
                    .deliver(
                        user,
                        Some(&placeholder),
                        "⏱ The assistant took too long to answer. Please try again.",
                        Some(&menus::ai_followup()),
                    )
                    .await
            }
        }
    }

    async fn compose_reply(
        &self,
        user: &UserId,
        text: &str,
        placeholder: &MessageHandle,
    ) -> Result<String> {
        let mut fresh = String::new();

        if let Some(tag) = self.sessions.get::<PendingContext>(user) {
            let label = self
                .logs
                .describe(&tag)
                .map(|i| i.label)
                .unwrap_or_else(|| tag.clone());
            self.status(placeholder, &format!("🔄 Refreshing the latest {label} logs…"))
                .await;

            let params = FetchParams {
                lines: self.log_fetch_lines,
                verbose: false,
            };
            match self.logs.fetch_text(&tag, &params).await {
                Ok(logs) => fresh = logs,
                Err(e) => {
                    tracing::warn!(user = %user, source = %tag, error = %e, "log refresh failed, continuing with history");
                    let notice = format!(
                        "⚠️ Could not fetch the latest logs: {e}\nAnswering from history only."
                    );
                    if let Err(e) = self
                        .transport()
                        .send_message(user, &notice, Format::Plain, None)
                        .await
                    {
                        tracing::debug!(error = %e, "fetch-failure notice not delivered");
                    }
                }
            }
            self.status(placeholder, THINKING).await;
        }

        let prompt = conversation_prompt(&self.sessions.history_text(user), text, &fresh);
        self.generator.generate(&prompt, None).await
    }

    // ── photo ───────────────────────────────────────────────────────

    async fn on_photo(
        &self,
        user: &UserId,
        attachment: &AttachmentRef,
        caption: Option<&str>,
    ) -> Result<()> {
        if !self.sessions.get::<AiMode>(user).unwrap_or(false) {
            tracing::debug!(user = %user, "ignoring photo outside AI mode");
            return Ok(());
        }
        if !self.access.has_permission(user, FEATURE_AI) {
            return self.refuse_feature(user, FEATURE_AI).await;
        }

        let placeholder = self
            .transport()
            .send_message(user, "🤔 Receiving image…", Format::Plain, None)
            .await?;

        let bytes = match self.transport().download_attachment(attachment).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "attachment download failed");
                return self
                    .delivery
                    .deliver(
                        user,
                        Some(&placeholder),
                        "❌ Could not download the image.",
                        Some(&menus::ai_followup()),
                    )
                    .await;
            }
        };
        self.status(&placeholder, "🤔 Analysing image…").await;

        let prompt = caption
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_IMAGE_PROMPT);

        let reply = tokio::time::timeout(
            self.reply_deadline,
            self.generator.generate(prompt, Some(&bytes)),
        )
        .await;
        let (text, menu) = match reply {
            Ok(Ok(answer)) => (answer, menus::ai_exit()),
            Ok(Err(e)) => {
                tracing::warn!(user = %user, error = %e, "image generation failed");
                (format!("❌ Error: {e}"), menus::ai_followup())
            }
            Err(_) => (
                "⏱ The assistant took too long to answer. Please try again.".to_owned(),
                menus::ai_followup(),
            ),
        };
        self.delivery
            .deliver(user, Some(&placeholder), &text, Some(&menu))
            .await
    }

    // ── actions ─────────────────────────────────────────────────────

    async fn on_action(
        &self,
        user: &UserId,
        action: Action,
        message: Option<&MessageHandle>,
    ) -> Result<()> {
        tracing::debug!(user = %user, ?action, "action");
        match action {
            Action::StartMain => {
                let text = "🤖 *HomeOps connected*\n\nChoose a feature:";
                self.delivery
                    .deliver(user, None, text, Some(&self.main_menu()))
                    .await
            }
            Action::AiToggle => self.toggle_ai(user, message).await,
            Action::BatchStart => {
                if !self.access.has_permission(user, FEATURE_AI) {
                    return self.refuse_feature(user, FEATURE_AI).await;
                }
                self.sessions.set::<Batch>(user, Vec::new());
                self.delivery
                    .deliver(
                        user,
                        None,
                        "📥 *Batch input*\nSend your messages one by one, then press Done.",
                        Some(&menus::batch_collecting()),
                    )
                    .await
            }
            Action::BatchEnd => self.finish_batch(user).await,
            Action::StartWizard(kind) => {
                if !self.access.has_permission(user, FEATURE_FORMS) {
                    return self.refuse_feature(user, FEATURE_FORMS).await;
                }
                if !self.wizards.start(user, &kind).await? {
                    self.delivery
                        .deliver(
                            user,
                            None,
                            &format!("❓ Unknown form: {kind}"),
                            Some(&menus::back_to_main()),
                        )
                        .await?;
                }
                Ok(())
            }
            Action::Choice(value) => {
                if !self.wizards.handle_input(user, &value).await? {
                    tracing::debug!(user = %user, "choice pressed with no active wizard");
                }
                Ok(())
            }
            Action::CancelWizard => {
                self.wizards.cancel(user);
                self.delivery
                    .deliver(user, None, "✖ Cancelled.", Some(&menus::back_to_main()))
                    .await
            }
            Action::Analyze(source) => self.start_analysis(user, source, message).await,
            Action::Grant { user: target, feature } => {
                self.manage_grant(user, &target, &feature, true).await
            }
            Action::Revoke { user: target, feature } => {
                self.manage_grant(user, &target, &feature, false).await
            }
            Action::ListUsers => {
                if !self.access.is_admin(user) {
                    return self.refuse_non_admin(user, "list users").await;
                }
                let listing = access::render_grants(&self.access.grants());
                self.delivery
                    .deliver(user, None, &listing, Some(&menus::back_to_main()))
                    .await
            }
        }
    }

    // ── access ──────────────────────────────────────────────────────

    async fn refuse_feature(&self, user: &UserId, feature: &str) -> Result<()> {
        tracing::warn!(user = %user, feature, "feature not granted");
        self.delivery
            .deliver(
                user,
                None,
                &format!("⛔ You have not been granted the `{feature}` feature."),
                Some(&menus::back_to_main()),
            )
            .await
    }

    async fn refuse_non_admin(&self, user: &UserId, what: &str) -> Result<()> {
        tracing::warn!(user = %user, what, "refused for non-admin");
        self.delivery
            .deliver(user, None, "⛔ Admins only.", Some(&menus::back_to_main()))
            .await
    }

    async fn manage_grant(
        &self,
        user: &UserId,
        target: &str,
        feature: &str,
        grant: bool,
    ) -> Result<()> {
        if !self.access.is_admin(user) {
            return self
                .refuse_non_admin(user, if grant { "grant" } else { "revoke" })
                .await;
        }

        let outcome = if grant {
            self.access.grant(target, feature)
        } else {
            self.access.revoke(target, feature)
        };
        let text = match (grant, outcome) {
            (true, Ok(true)) => format!("✅ Granted `{feature}` to user `{target}`."),
            (true, Ok(false)) => format!("⚠️ User `{target}` already has `{feature}`."),
            (false, Ok(true)) => format!("🚫 Revoked `{feature}` from user `{target}`."),
            (false, Ok(false)) => format!("⚠️ User `{target}` does not have `{feature}`."),
            (_, Err(e)) => {
                tracing::error!(error = %e, "grant table not saved");
                format!("⚠️ The change applies until restart but could not be saved: {e}")
            }
        };
        self.delivery
            .deliver(user, None, &text, Some(&menus::back_to_main()))
            .await
    }

    fn main_menu(&self) -> Menu {
        menus::main_menu(self.wizards.registry(), &self.logs.sources())
    }

    async fn toggle_ai(&self, user: &UserId, message: Option<&MessageHandle>) -> Result<()> {
        let was_on = self.sessions.get::<AiMode>(user).unwrap_or(false);

        if !was_on {
            if !self.access.has_permission(user, FEATURE_AI) {
                return self.refuse_feature(user, FEATURE_AI).await;
            }
            self.sessions.set::<AiMode>(user, true);
            tracing::info!(user = %user, "AI mode on");
            return self
                .delivery
                .deliver(
                    user,
                    message,
                    "🧠 *AI mode on*\nSend text or an image to chat.",
                    Some(&menus::ai_exit()),
                )
                .await;
        }

        self.sessions.delete::<AiMode>(user);
        self.sessions.delete::<History>(user);
        self.sessions.delete::<PendingContext>(user);
        tracing::info!(user = %user, "AI mode off");

        let text = format!(
            "🚪 *AI mode off*\n🤖 *HomeOps connected*\n\n{}\n\nChoose a feature:",
            menus::greeting_now()
        );
        self.delivery
            .deliver(user, message, &text, Some(&self.main_menu()))
            .await
    }

    async fn finish_batch(&self, user: &UserId) -> Result<()> {
        let collected = self.sessions.take::<Batch>(user).unwrap_or_default();
        if collected.is_empty() {
            return self
                .delivery
                .deliver(
                    user,
                    None,
                    "📭 Nothing collected.",
                    Some(&menus::back_to_main()),
                )
                .await;
        }

        tracing::info!(user = %user, count = collected.len(), "batch finished");
        let joined = collected.join("\n\n");
        self.transport()
            .send_message(
                user,
                &format!("📦 Collected {} messages.", collected.len()),
                Format::Plain,
                None,
            )
            .await?;
        self.converse(user, &joined).await
    }

    async fn start_analysis(
        &self,
        user: &UserId,
        source: String,
        message: Option<&MessageHandle>,
    ) -> Result<()> {
        if !self.access.is_admin(user) {
            return self.refuse_non_admin(user, "analysis").await;
        }

        let Some(permit) = self.analysis.try_acquire() else {
            return self
                .delivery
                .deliver(
                    user,
                    None,
                    "⏳ An analysis is already running, please wait.",
                    Some(&menus::back_to_main()),
                )
                .await;
        };

        let label = self
            .logs
            .describe(&source)
            .map(|i| i.label)
            .unwrap_or_else(|| source.clone());
        let ack = format!("🔍 Collecting {label} logs…");

        // Reuse the pressed message when it can be edited.
        let edited = match message {
            Some(handle) => self
                .transport()
                .edit_message(handle, &ack, Format::Plain, None)
                .await
                .map(|()| handle.clone())
                .ok(),
            None => None,
        };
        let placeholder = match edited {
            Some(handle) => handle,
            None => {
                self.transport()
                    .send_message(user, &ack, Format::Plain, None)
                    .await?
            }
        };

        // Detached: the report arrives as a later edit of the placeholder.
        let _run = self.analysis.spawn(permit, user.clone(), source, placeholder);
        Ok(())
    }

    async fn status(&self, placeholder: &MessageHandle, text: &str) {
        if let Err(e) = self
            .transport()
            .edit_message(placeholder, text, Format::Plain, None)
            .await
        {
            tracing::debug!(error = %e, "status edit failed");
        }
    }
}

/// History, then the new user line, then any fresh log excerpt.
pub fn conversation_prompt(history: &str, text: &str, fresh_logs: &str) -> String {
    let mut prompt = format!("{history}User: {text}");
    if !fresh_logs.trim().is_empty() {
        prompt.push_str("\n\n--- [Latest logs] ---\n");
        prompt.push_str(fresh_logs.trim_end());
        prompt.push_str("\n--- [End of logs] ---");
    }
    prompt
}
