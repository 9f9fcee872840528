//! Diagnostic log analysis.
//!
//! At most one analysis runs at a time across the whole process. A request
//! arriving while one is in flight is rejected, not queued. Each run is a
//! detached task bounded by a deadline and the runner's shutdown token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ho_domain::error::{Error, Result};
use ho_domain::trace::TraceEvent;
use ho_providers::TextGenerator;
use ho_sessions::{AiMode, History, PendingContext, SessionStore, UserId};

use crate::backends::{FetchParams, LogSource, SourceInfo};
use crate::runtime::delivery::MessageDelivery;
use crate::runtime::menus;
use crate::transport::{Format, MessageHandle};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Busy guard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-wide single-flight flag for heavyweight work.
#[derive(Debug, Clone)]
pub struct BusyGuard {
    sem: Arc<Semaphore>,
}

/// Held for the lifetime of one run. Dropping it clears the guard.
#[derive(Debug)]
pub struct BusyPermit {
    _permit: OwnedSemaphorePermit,
}

impl Default for BusyGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl BusyGuard {
    pub fn new() -> Self {
        Self {
            sem: Arc::new(Semaphore::new(1)),
        }
    }

    /// `None` when a run is already in flight.
    pub fn try_acquire(&self) -> Option<BusyPermit> {
        self.sem
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|p| BusyPermit { _permit: p })
    }

    pub fn is_busy(&self) -> bool {
        self.sem.available_permits() == 0
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Completed,
    Failed(String),
    TimedOut,
    Cancelled,
}

impl AnalysisOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            AnalysisOutcome::Completed => "completed",
            AnalysisOutcome::Failed(_) => "failed",
            AnalysisOutcome::TimedOut => "timed_out",
            AnalysisOutcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone)]
pub struct DiagnosticRunner {
    guard: BusyGuard,
    generator: Arc<dyn TextGenerator>,
    logs: Arc<dyn LogSource>,
    delivery: Arc<MessageDelivery>,
    sessions: Arc<SessionStore>,
    shutdown: CancellationToken,
    deadline: Duration,
    log_lines: usize,
}

impl DiagnosticRunner {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        logs: Arc<dyn LogSource>,
        delivery: Arc<MessageDelivery>,
        sessions: Arc<SessionStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            guard: BusyGuard::new(),
            generator,
            logs,
            delivery,
            sessions,
            shutdown,
            deadline: Duration::from_secs(120),
            log_lines: 100,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_log_lines(mut self, lines: usize) -> Self {
        self.log_lines = lines.max(1);
        self
    }

    pub fn guard(&self) -> &BusyGuard {
        &self.guard
    }

    pub fn try_acquire(&self) -> Option<BusyPermit> {
        self.guard.try_acquire()
    }

    /// Run one analysis in the background, reporting into `placeholder`.
    /// The permit is released when the task ends, however it ends.
    pub fn spawn(
        &self,
        permit: BusyPermit,
        user: UserId,
        source: String,
        placeholder: MessageHandle,
    ) -> JoinHandle<AnalysisOutcome> {
        let this = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            this.run(&user, &source, &placeholder).await
        })
    }

    async fn run(&self, user: &UserId, source: &str, placeholder: &MessageHandle) -> AnalysisOutcome {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let info = self.source_info(source);
        let token = self.shutdown.child_token();

        tracing::info!(run_id = %run_id, user = %user, source = %source, "analysis started");

        let outcome = tokio::select! {
            _ = token.cancelled() => AnalysisOutcome::Cancelled,
            res = tokio::time::timeout(self.deadline, self.analyse(user, &info, placeholder)) => {
                match res {
                    Ok(Ok(())) => AnalysisOutcome::Completed,
                    Ok(Err(e)) => AnalysisOutcome::Failed(e.to_string()),
                    Err(_) => AnalysisOutcome::TimedOut,
                }
            }
        };

        let failure_text = match &outcome {
            AnalysisOutcome::Completed => None,
            AnalysisOutcome::Failed(msg) => Some(format!("❌ {msg}")),
            AnalysisOutcome::TimedOut => Some("⏱ Analysis timed out, please try again later.".into()),
            AnalysisOutcome::Cancelled => Some("🛑 Analysis cancelled.".into()),
        };
        if let Some(text) = failure_text {
            if let Err(e) = self
                .delivery
                .deliver(user, Some(placeholder), &text, Some(&menus::back_to_main()))
                .await
            {
                tracing::warn!(run_id = %run_id, error = %e, "could not report analysis failure");
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(run_id = %run_id, outcome = outcome.as_str(), duration_ms, "analysis finished");
        TraceEvent::AnalysisFinished {
            run_id,
            source: source.to_owned(),
            outcome: outcome.as_str().into(),
            duration_ms,
        }
        .emit();
        outcome
    }

    async fn analyse(&self, user: &UserId, info: &SourceInfo, placeholder: &MessageHandle) -> Result<()> {
        let params = FetchParams {
            lines: self.log_lines,
            verbose: true,
        };
        let logs = self
            .logs
            .fetch_text(&info.tag, &params)
            .await
            .map_err(|e| Error::Other(format!("Log collection failed: {e}")))?;
        if logs.trim().is_empty() {
            return Err(Error::Other(format!("{} returned no log output.", info.label)));
        }

        self.status(
            placeholder,
            &format!("🤖 Analysing {} logs with the model…", info.label),
        )
        .await;

        let prompt = build_prompt(info, &logs);
        let report = self
            .generator
            .generate(&prompt, None)
            .await
            .map_err(|e| Error::Other(format!("Analysis failed: {e}")))?;

        let text = format!(
            "📋 *{} diagnostic report*\n-------------------\n{}\n\n💡 Send a message to keep asking about this.",
            info.label, report
        );
        self.delivery
            .deliver(user, Some(placeholder), &text, Some(&menus::ai_followup()))
            .await?;

        // Only a delivered report opens the follow-up conversation. No await
        // below, so the deadline cannot cut the seeding short.
        self.sessions.set::<AiMode>(user, true);
        self.sessions.delete::<History>(user);
        self.sessions.append_exchange(user, &prompt, &report);
        self.sessions.set::<PendingContext>(user, info.tag.clone());
        Ok(())
    }

    async fn status(&self, placeholder: &MessageHandle, text: &str) {
        if let Err(e) = self
            .delivery
            .transport()
            .edit_message(placeholder, text, Format::Plain, None)
            .await
        {
            tracing::debug!(error = %e, "status edit failed");
        }
    }

    fn source_info(&self, source: &str) -> SourceInfo {
        self.logs.describe(source).unwrap_or_else(|| SourceInfo {
            tag: source.to_owned(),
            label: source.to_owned(),
            analysis_prompt: None,
        })
    }
}

/// Expert prompt: role line, then the raw logs.
pub fn build_prompt(info: &SourceInfo, logs: &str) -> String {
    let role = info.analysis_prompt.clone().unwrap_or_else(|| {
        format!(
            "You are an expert operator of {}. Analyse the following logs, point out \
             potential problems such as network errors, system anomalies or attack \
             attempts, and give concrete recommendations:",
            info.label
        )
    });
    format!("{role}\n\n{logs}")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{AttachmentRef, ChatTransport, Menu};
    use parking_lot::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Sink {
        texts: Mutex<Vec<String>>,
        /// Writes containing this never complete.
        stall_on: Option<&'static str>,
    }

    impl Sink {
        async fn record(&self, text: &str) {
            if self.stall_on.is_some_and(|needle| text.contains(needle)) {
                std::future::pending::<()>().await;
            }
            self.texts.lock().push(text.to_owned());
        }
    }

    #[async_trait::async_trait]
    impl ChatTransport for Sink {
        async fn send_message(
            &self,
            recipient: &UserId,
            text: &str,
            _format: Format,
            _menu: Option<&Menu>,
        ) -> Result<MessageHandle> {
            self.record(text).await;
            Ok(MessageHandle {
                recipient: recipient.clone(),
                id: "n".into(),
            })
        }

        async fn edit_message(
            &self,
            _handle: &MessageHandle,
            text: &str,
            _format: Format,
            _menu: Option<&Menu>,
        ) -> Result<()> {
            self.record(text).await;
            Ok(())
        }

        async fn download_attachment(&self, _a: &AttachmentRef) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    /// Blocks until released, then returns `text`.
    struct GatedLogs {
        gate: Arc<Notify>,
        text: String,
    }

    #[async_trait::async_trait]
    impl LogSource for GatedLogs {
        async fn fetch_text(&self, _tag: &str, _params: &FetchParams) -> Result<String> {
            self.gate.notified().await;
            Ok(self.text.clone())
        }
    }

    struct Echo;

    #[async_trait::async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, _prompt: &str, _image: Option<&[u8]>) -> Result<String> {
            Ok("all good".into())
        }
    }

    struct Hang;

    #[async_trait::async_trait]
    impl TextGenerator for Hang {
        async fn generate(&self, _prompt: &str, _image: Option<&[u8]>) -> Result<String> {
            std::future::pending().await
        }
    }

    fn runner(
        generator: Arc<dyn TextGenerator>,
        logs: Arc<dyn LogSource>,
        sink: Arc<Sink>,
        sessions: Arc<SessionStore>,
    ) -> DiagnosticRunner {
        let delivery = Arc::new(MessageDelivery::new(sink, 3_800));
        DiagnosticRunner::new(generator, logs, delivery, sessions, CancellationToken::new())
    }

    fn placeholder() -> MessageHandle {
        MessageHandle {
            recipient: UserId::from(7_i64),
            id: "p".into(),
        }
    }

    #[test]
    fn guard_is_single_flight() {
        let guard = BusyGuard::new();
        let first = guard.try_acquire().unwrap();
        assert!(guard.is_busy());
        assert!(guard.try_acquire().is_none());
        drop(first);
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_some());
    }

    #[tokio::test]
    async fn second_run_is_rejected_until_first_completes() {
        let gate = Arc::new(Notify::new());
        let sink = Arc::new(Sink::default());
        let sessions = Arc::new(SessionStore::new(10_000));
        let logs = Arc::new(GatedLogs {
            gate: gate.clone(),
            text: "kernel: eth0 link down".into(),
        });
        let r = runner(Arc::new(Echo), logs, sink.clone(), sessions.clone());
        let user = UserId::from(7_i64);

        let permit = r.try_acquire().unwrap();
        let handle = r.spawn(permit, user.clone(), "router".into(), placeholder());

        assert!(r.try_acquire().is_none());

        gate.notify_one();
        assert_eq!(handle.await.unwrap(), AnalysisOutcome::Completed);
        assert!(!r.guard().is_busy());
        assert!(r.try_acquire().is_some());

        assert_eq!(sessions.get::<AiMode>(&user), Some(true));
        assert_eq!(sessions.get::<PendingContext>(&user).as_deref(), Some("router"));
        assert!(sessions.history_text(&user).contains("Model: all good"));
        assert!(sink
            .texts
            .lock()
            .iter()
            .any(|t| t.contains("router diagnostic report")));
    }

    #[tokio::test]
    async fn timeout_reports_distinct_message_and_releases_guard() {
        let gate = Arc::new(Notify::new());
        gate.notify_one();
        let sink = Arc::new(Sink::default());
        let sessions = Arc::new(SessionStore::new(10_000));
        let logs = Arc::new(GatedLogs {
            gate,
            text: "x".into(),
        });
        let r = runner(Arc::new(Hang), logs, sink.clone(), sessions.clone())
            .with_deadline(Duration::from_millis(50));

        let permit = r.try_acquire().unwrap();
        let outcome = r
            .spawn(permit, UserId::from(7_i64), "router".into(), placeholder())
            .await
            .unwrap();

        assert_eq!(outcome, AnalysisOutcome::TimedOut);
        assert!(!r.guard().is_busy());
        assert!(sink.texts.lock().iter().any(|t| t.contains("timed out")));
        assert_eq!(sessions.get::<AiMode>(&UserId::from(7_i64)), None);
    }

    #[tokio::test]
    async fn undelivered_report_leaves_session_untouched() {
        let gate = Arc::new(Notify::new());
        gate.notify_one();
        let sink = Arc::new(Sink {
            stall_on: Some("diagnostic report"),
            ..Sink::default()
        });
        let sessions = Arc::new(SessionStore::new(10_000));
        let user = UserId::from(7_i64);
        sessions.append_exchange(&user, "earlier", "chat");
        let logs = Arc::new(GatedLogs {
            gate,
            text: "kernel: eth0 link down".into(),
        });
        let r = runner(Arc::new(Echo), logs, sink.clone(), sessions.clone())
            .with_deadline(Duration::from_millis(50));

        let permit = r.try_acquire().unwrap();
        let outcome = r
            .spawn(permit, user.clone(), "router".into(), placeholder())
            .await
            .unwrap();

        assert_eq!(outcome, AnalysisOutcome::TimedOut);
        assert!(sink.texts.lock().iter().any(|t| t.contains("timed out")));
        assert_eq!(sessions.get::<AiMode>(&user), None);
        assert_eq!(sessions.get::<PendingContext>(&user), None);
        assert_eq!(sessions.history_text(&user), "User: earlier\nModel: chat\n");
    }

    #[tokio::test]
    async fn empty_logs_fail_and_release_guard() {
        let gate = Arc::new(Notify::new());
        gate.notify_one();
        let sink = Arc::new(Sink::default());
        let logs = Arc::new(GatedLogs {
            gate,
            text: "  \n".into(),
        });
        let r = runner(
            Arc::new(Echo),
            logs,
            sink.clone(),
            Arc::new(SessionStore::new(100)),
        );

        let permit = r.try_acquire().unwrap();
        let outcome = r
            .spawn(permit, UserId::from(7_i64), "router".into(), placeholder())
            .await
            .unwrap();

        assert!(matches!(outcome, AnalysisOutcome::Failed(ref m) if m.contains("no log output")));
        assert!(r.try_acquire().is_some());
    }

    #[tokio::test]
    async fn shutdown_cancels_in_flight_run() {
        let sink = Arc::new(Sink::default());
        let logs = Arc::new(GatedLogs {
            gate: Arc::new(Notify::new()),
            text: "x".into(),
        });
        let shutdown = CancellationToken::new();
        let delivery = Arc::new(MessageDelivery::new(sink.clone(), 3_800));
        let r = DiagnosticRunner::new(
            Arc::new(Echo),
            logs,
            delivery,
            Arc::new(SessionStore::new(100)),
            shutdown.clone(),
        );

        let permit = r.try_acquire().unwrap();
        let handle = r.spawn(permit, UserId::from(7_i64), "router".into(), placeholder());
        shutdown.cancel();

        assert_eq!(handle.await.unwrap(), AnalysisOutcome::Cancelled);
        assert!(!r.guard().is_busy());
        assert!(sink.texts.lock().iter().any(|t| t.contains("cancelled")));
    }

    #[test]
    fn prompt_uses_source_role_when_configured() {
        let info = SourceInfo {
            tag: "wrt".into(),
            label: "OpenWrt".into(),
            analysis_prompt: Some("You are an OpenWrt expert.".into()),
        };
        assert_eq!(build_prompt(&info, "L1"), "You are an OpenWrt expert.\n\nL1");

        let info = SourceInfo {
            analysis_prompt: None,
            ..info
        };
        assert!(build_prompt(&info, "L1").starts_with("You are an expert operator of OpenWrt."));
    }
}
