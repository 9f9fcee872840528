use serde::Serialize;

/// Structured trace events emitted across all HomeOps crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    GenerationAttempt {
        model: String,
        key_index: usize,
        with_image: bool,
    },
    GenerationSucceeded {
        model: String,
        key_index: usize,
        duration_ms: u64,
        response_chars: usize,
    },
    KeyRotated {
        from_index: usize,
        to_index: usize,
        reason: String,
    },
    ModelAbandoned {
        model: String,
        last_error: String,
    },
    WizardStarted {
        user: String,
        kind: String,
    },
    WizardAdvanced {
        user: String,
        kind: String,
        step: String,
        accepted: bool,
    },
    WizardSubmitted {
        user: String,
        kind: String,
        ok: bool,
    },
    DeliveryFallback {
        chunk_index: usize,
        stage: String,
        error: String,
    },
    AnalysisFinished {
        run_id: String,
        source: String,
        outcome: String,
        duration_ms: u64,
    },
    LogFetched {
        source: String,
        chars: usize,
        ok: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ho_event");
    }
}
