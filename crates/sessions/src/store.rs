//! Process-lifetime session store.
//!
//! One typed [`Session`] record per user behind a single `RwLock`. Fields
//! are addressed with zero-sized marker types implementing [`Field`], so a
//! read returns the field's concrete type and "unset" is simply `None`.
//! Entries are created on first write and live until the process exits.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::history::History as Transcript;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// User identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Chat-platform user identifier. Numeric IDs are stored in decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wizard descriptor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An in-flight multi-step input flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    pub kind: String,
    /// Name of the step waiting for input.
    pub step: String,
    /// Values accepted so far, keyed by field name.
    pub fields: BTreeMap<String, String>,
    pub started_at: DateTime<Utc>,
}

impl WizardState {
    pub fn new(kind: impl Into<String>, first_step: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            step: first_step.into(),
            fields: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub ai_mode: Option<bool>,
    pub history: Option<Transcript>,
    pub pending_context: Option<String>,
    pub wizard: Option<WizardState>,
    pub batch: Option<Vec<String>>,
}

/// A typed slot on [`Session`].
pub trait Field {
    type Value: Clone;

    fn slot(session: &Session) -> &Option<Self::Value>;
    fn slot_mut(session: &mut Session) -> &mut Option<Self::Value>;
}

macro_rules! session_field {
    ($(#[$doc:meta])* $marker:ident => $field:ident : $ty:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $marker;

        impl Field for $marker {
            type Value = $ty;

            fn slot(session: &Session) -> &Option<$ty> {
                &session.$field
            }

            fn slot_mut(session: &mut Session) -> &mut Option<$ty> {
                &mut session.$field
            }
        }
    };
}

session_field!(
    /// Free-text messages go to the model.
    AiMode => ai_mode: bool
);
session_field!(
    /// Bounded conversation transcript.
    History => history: Transcript
);
session_field!(
    /// Log source to refresh before the next AI turn.
    PendingContext => pending_context: String
);
session_field!(Wizard => wizard: WizardState);
session_field!(
    /// Present while batch collection is active.
    Batch => batch: Vec<String>
);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionStore {
    history_max_chars: usize,
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl SessionStore {
    /// `history_max_chars` caps every transcript created through
    /// [`append_exchange`](Self::append_exchange).
    pub fn new(history_max_chars: usize) -> Self {
        tracing::debug!(history_max_chars, "session store created");
        Self {
            history_max_chars,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn get<F: Field>(&self, user: &UserId) -> Option<F::Value> {
        self.sessions
            .read()
            .get(user)
            .and_then(|s| F::slot(s).clone())
    }

    pub fn set<F: Field>(&self, user: &UserId, value: F::Value) {
        let mut sessions = self.sessions.write();
        *F::slot_mut(sessions.entry(user.clone()).or_default()) = Some(value);
    }

    pub fn delete<F: Field>(&self, user: &UserId) {
        if let Some(session) = self.sessions.write().get_mut(user) {
            *F::slot_mut(session) = None;
        }
    }

    /// Read-modify-write a field under one write lock.
    pub fn update<F: Field, R>(
        &self,
        user: &UserId,
        f: impl FnOnce(&mut Option<F::Value>) -> R,
    ) -> R {
        let mut sessions = self.sessions.write();
        f(F::slot_mut(sessions.entry(user.clone()).or_default()))
    }

    /// Remove a field and return its previous value.
    pub fn take<F: Field>(&self, user: &UserId) -> Option<F::Value> {
        self.sessions
            .write()
            .get_mut(user)
            .and_then(|s| F::slot_mut(s).take())
    }

    /// True when the field is set. Cheaper than `get` for large values.
    pub fn is_set<F: Field>(&self, user: &UserId) -> bool {
        self.sessions
            .read()
            .get(user)
            .is_some_and(|s| F::slot(s).is_some())
    }

    /// Append a user/model exchange, creating the transcript on demand.
    pub fn append_exchange(&self, user: &UserId, prompt: &str, reply: &str) {
        let cap = self.history_max_chars;
        self.update::<History, _>(user, |slot| {
            slot.get_or_insert_with(|| Transcript::new(cap))
                .push_exchange(prompt, reply);
        });
    }

    /// Rendered transcript, empty when none exists.
    pub fn history_text(&self, user: &UserId) -> String {
        self.sessions
            .read()
            .get(user)
            .and_then(|s| s.history.as_ref().map(Transcript::render))
            .unwrap_or_default()
    }

    /// Copy of the whole record, for diagnostics.
    pub fn snapshot(&self, user: &UserId) -> Option<Session> {
        self.sessions.read().get(user).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("history_max_chars", &self.history_max_chars)
            .field("sessions", &self.len())
            .finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
