//! Multi-step input wizards.
//!
//! A wizard is a declared list of steps, each with a field name, a prompt
//! and a validator. [`advance`] is the pure transition function;
//! [`WizardEngine`] wraps it with session storage, prompting and
//! submission.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use ho_domain::error::Result;
use ho_domain::trace::TraceEvent;
use ho_sessions::{SessionStore, UserId, Wizard, WizardState};

use crate::backends::Submitter;
use crate::runtime::delivery::MessageDelivery;
use crate::runtime::menus;
use crate::transport::{Button, Format, Menu};

pub const CANCEL_ACTION: &str = "wizard_cancel";
pub const CHOICE_PREFIX: &str = "choice:";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier regex"));
static HOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._:\-]*$").expect("host regex"));

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Declarations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub enum Validator {
    /// Any non-empty text.
    FreeForm,
    /// A non-negative integer.
    Numeric,
    /// 1..=65535.
    Port,
    /// A port, or `any`/`all`/`*` which is stored as empty.
    PortOrAny,
    /// Letters, digits and underscores.
    Identifier,
    Ipv4,
    /// Hostname or IP literal.
    Host,
    /// `http://` or `https://` URL.
    Url,
    /// One of a fixed set, matched case-insensitively and stored canonical.
    OneOf(Vec<String>),
    /// One or more entries separated by whitespace or commas, stored one per
    /// line.
    List,
}

impl Validator {
    pub fn one_of<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf(choices.into_iter().map(Into::into).collect())
    }

    /// Validate trimmed input. `Err` carries a hint for the re-prompt.
    pub fn check(&self, raw: &str) -> std::result::Result<String, String> {
        let input = raw.trim();
        if input.is_empty() && !matches!(self, Validator::PortOrAny) {
            return Err("A value is required.".into());
        }
        match self {
            Validator::FreeForm => Ok(input.to_owned()),
            Validator::Numeric => input
                .parse::<u64>()
                .map(|n| n.to_string())
                .map_err(|_| "Please enter a number.".into()),
            Validator::Port => parse_port(input),
            Validator::PortOrAny => {
                if input.is_empty() || matches!(input.to_ascii_lowercase().as_str(), "any" | "all" | "*") {
                    Ok(String::new())
                } else {
                    parse_port(input)
                }
            }
            Validator::Identifier => {
                if IDENTIFIER_RE.is_match(input) {
                    Ok(input.to_owned())
                } else {
                    Err("Only letters, digits and underscores are allowed.".into())
                }
            }
            Validator::Ipv4 => input
                .parse::<Ipv4Addr>()
                .map(|ip| ip.to_string())
                .map_err(|_| "Please enter an IPv4 address such as 192.168.1.10.".into()),
            Validator::Host => {
                if input.len() <= 253 && HOST_RE.is_match(input) {
                    Ok(input.to_owned())
                } else {
                    Err("Illegal characters detected. Enter a hostname or IP address.".into())
                }
            }
            Validator::Url => {
                let lower = input.to_ascii_lowercase();
                let rest = lower
                    .strip_prefix("https://")
                    .or_else(|| lower.strip_prefix("http://"));
                match rest {
                    Some(r) if !r.is_empty() && !input.chars().any(char::is_whitespace) => {
                        Ok(input.to_owned())
                    }
                    _ => Err("Please enter an http:// or https:// URL.".into()),
                }
            }
            Validator::OneOf(choices) => choices
                .iter()
                .find(|c| c.eq_ignore_ascii_case(input))
                .cloned()
                .ok_or_else(|| format!("Choose one of: {}.", choices.join(", "))),
            Validator::List => {
                let entries: Vec<&str> = input
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|s| !s.is_empty())
                    .collect();
                if entries.is_empty() {
                    Err("Enter at least one entry.".into())
                } else {
                    Ok(entries.join("\n"))
                }
            }
        }
    }

    pub fn choices(&self) -> &[String] {
        match self {
            Validator::OneOf(c) => c,
            _ => &[],
        }
    }
}

fn parse_port(input: &str) -> std::result::Result<String, String> {
    match input.parse::<u16>() {
        Ok(p) if p > 0 => Ok(p.to_string()),
        _ => Err("Ports must be numbers between 1 and 65535.".into()),
    }
}

#[derive(Debug, Clone)]
pub struct StepSpec {
    pub name: String,
    pub field: String,
    pub prompt: String,
    pub validator: Validator,
}

impl StepSpec {
    /// A step whose name doubles as its field name.
    pub fn new(field: impl Into<String>, prompt: impl Into<String>, validator: Validator) -> Self {
        let field = field.into();
        Self {
            name: field.clone(),
            field,
            prompt: prompt.into(),
            validator,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WizardSpec {
    pub kind: String,
    pub title: String,
    pub steps: Vec<StepSpec>,
}

impl WizardSpec {
    pub fn new(kind: impl Into<String>, title: impl Into<String>, steps: Vec<StepSpec>) -> Self {
        Self {
            kind: kind.into(),
            title: title.into(),
            steps,
        }
    }

    pub fn step_index(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    /// Fresh state positioned at the first step.
    pub fn initial_state(&self) -> Option<WizardState> {
        self.steps
            .first()
            .map(|s| WizardState::new(self.kind.clone(), s.name.clone()))
    }
}

/// Wizard kinds in registration order.
#[derive(Debug, Default)]
pub struct WizardRegistry {
    specs: Vec<WizardSpec>,
    index: HashMap<String, usize>,
}

impl WizardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a kind. Specs without steps are ignored.
    pub fn register(&mut self, spec: WizardSpec) {
        if spec.steps.is_empty() {
            tracing::warn!(kind = %spec.kind, "ignoring wizard without steps");
            return;
        }
        match self.index.get(&spec.kind) {
            Some(&i) => self.specs[i] = spec,
            None => {
                self.index.insert(spec.kind.clone(), self.specs.len());
                self.specs.push(spec);
            }
        }
    }

    pub fn get(&self, kind: &str) -> Option<&WizardSpec> {
        self.index.get(kind).map(|&i| &self.specs[i])
    }

    pub fn specs(&self) -> &[WizardSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Input failed validation. State is unchanged.
    Rejected { step_index: usize, hint: String },
    /// Input accepted; `state` now waits on `step_index`.
    Next { state: WizardState, step_index: usize },
    /// Last step accepted.
    Complete { fields: BTreeMap<String, String> },
    /// The stored step does not belong to this wizard.
    Stale,
}

/// Apply one reply to a wizard state.
pub fn advance(spec: &WizardSpec, state: &WizardState, raw: &str) -> Advance {
    let Some(idx) = spec.step_index(&state.step) else {
        return Advance::Stale;
    };
    let step = &spec.steps[idx];

    let value = match step.validator.check(raw) {
        Ok(v) => v,
        Err(hint) => {
            return Advance::Rejected {
                step_index: idx,
                hint,
            }
        }
    };

    let mut next = state.clone();
    next.fields.insert(step.field.clone(), value);

    match spec.steps.get(idx + 1) {
        Some(following) => {
            next.step = following.name.clone();
            Advance::Next {
                state: next,
                step_index: idx + 1,
            }
        }
        None => Advance::Complete {
            fields: next.fields,
        },
    }
}

/// Store `next` in the user's wizard slot if it still holds `seen`.
/// Returns false, leaving the slot alone, when it was cancelled or
/// replaced in the meantime.
pub fn replace_if_unchanged(
    sessions: &SessionStore,
    user: &UserId,
    seen: &WizardState,
    next: Option<WizardState>,
) -> bool {
    sessions.update::<Wizard, _>(user, |slot| {
        if slot.as_ref() != Some(seen) {
            return false;
        }
        *slot = next;
        true
    })
}

/// Prompt text and menu for one step.
pub fn render_prompt(spec: &WizardSpec, step_index: usize, hint: Option<&str>) -> (String, Menu) {
    let step = &spec.steps[step_index];
    let mut text = String::new();
    if let Some(hint) = hint {
        text.push_str(&format!("❌ {hint}\n\n"));
    }
    text.push_str(&format!(
        "🧙 *{}* · Step {}/{}\n{}",
        spec.title,
        step_index + 1,
        spec.steps.len(),
        step.prompt
    ));

    let mut menu = Menu::new();
    for row in step.validator.choices().chunks(3) {
        menu = menu.row(
            row.iter()
                .map(|c| Button::new(c.clone(), format!("{CHOICE_PREFIX}{c}")))
                .collect(),
        );
    }
    menu = menu.row(vec![Button::new("✖ Cancel", CANCEL_ACTION)]);
    (text, menu)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct WizardEngine {
    sessions: Arc<SessionStore>,
    registry: Arc<WizardRegistry>,
    submitter: Arc<dyn Submitter>,
    delivery: Arc<MessageDelivery>,
}

impl WizardEngine {
    pub fn new(
        sessions: Arc<SessionStore>,
        registry: Arc<WizardRegistry>,
        submitter: Arc<dyn Submitter>,
        delivery: Arc<MessageDelivery>,
    ) -> Self {
        Self {
            sessions,
            registry,
            submitter,
            delivery,
        }
    }

    pub fn registry(&self) -> &WizardRegistry {
        &self.registry
    }

    pub fn is_active(&self, user: &UserId) -> bool {
        self.sessions.is_set::<Wizard>(user)
    }

    /// Begin `kind`, replacing any wizard already in flight. Returns
    /// `false` for an unknown kind.
    pub async fn start(&self, user: &UserId, kind: &str) -> Result<bool> {
        let Some(spec) = self.registry.get(kind) else {
            return Ok(false);
        };
        let Some(state) = spec.initial_state() else {
            return Ok(false);
        };
        if let Some(previous) = self.sessions.get::<Wizard>(user) {
            tracing::debug!(user = %user, previous = %previous.kind, kind = %kind, "replacing in-flight wizard");
        }
        self.sessions.set::<Wizard>(user, state);
        TraceEvent::WizardStarted {
            user: user.to_string(),
            kind: kind.to_owned(),
        }
        .emit();

        let (text, menu) = render_prompt(spec, 0, None);
        self.delivery.deliver(user, None, &text, Some(&menu)).await?;
        Ok(true)
    }

    /// Drop any in-flight wizard.
    pub fn cancel(&self, user: &UserId) -> bool {
        self.sessions.take::<Wizard>(user).is_some()
    }

    /// Feed one reply to the active wizard. Returns `false` when the user
    /// has no wizard in flight.
    ///
    /// The transition is computed on a snapshot and committed only if the
    /// stored wizard is still that snapshot. Input racing a cancel or a
    /// restart is dropped.
    pub async fn handle_input(&self, user: &UserId, raw: &str) -> Result<bool> {
        let Some(state) = self.sessions.get::<Wizard>(user) else {
            return Ok(false);
        };
        let Some(spec) = self.registry.get(&state.kind) else {
            tracing::warn!(user = %user, kind = %state.kind, "dropping wizard of unknown kind");
            replace_if_unchanged(&self.sessions, user, &state, None);
            return Ok(true);
        };

        let outcome = advance(spec, &state, raw);
        let replacement = match &outcome {
            Advance::Rejected { .. } => Some(state.clone()),
            Advance::Next { state: next, .. } => Some(next.clone()),
            Advance::Complete { .. } | Advance::Stale => None,
        };
        if !replace_if_unchanged(&self.sessions, user, &state, replacement) {
            tracing::debug!(user = %user, kind = %state.kind, step = %state.step, "wizard changed while handling input, dropping it");
            return Ok(true);
        }

        match outcome {
            Advance::Rejected { step_index, hint } => {
                self.trace_step(user, spec, &state.step, false);
                let (text, menu) = render_prompt(spec, step_index, Some(&hint));
                self.delivery.deliver(user, None, &text, Some(&menu)).await?;
            }
            Advance::Next { step_index, .. } => {
                self.trace_step(user, spec, &state.step, true);
                let (text, menu) = render_prompt(spec, step_index, None);
                self.delivery.deliver(user, None, &text, Some(&menu)).await?;
            }
            Advance::Complete { fields } => {
                self.trace_step(user, spec, &state.step, true);
                self.submit(user, spec, fields).await?;
            }
            Advance::Stale => {
                tracing::warn!(user = %user, kind = %state.kind, step = %state.step, "stale wizard step");
                self.delivery
                    .deliver(
                        user,
                        None,
                        "⚠️ This form expired. Please start again.",
                        Some(&menus::back_to_main()),
                    )
                    .await?;
            }
        }
        Ok(true)
    }

    async fn submit(
        &self,
        user: &UserId,
        spec: &WizardSpec,
        fields: BTreeMap<String, String>,
    ) -> Result<()> {
        let placeholder = match self
            .delivery
            .transport()
            .send_message(user, "⏳ Applying…", Format::Plain, None)
            .await
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "could not post submission placeholder");
                None
            }
        };

        let result = self.submitter.submit(&spec.kind, &fields).await;
        TraceEvent::WizardSubmitted {
            user: user.to_string(),
            kind: spec.kind.clone(),
            ok: result.is_ok(),
        }
        .emit();

        let text = match &result {
            Ok(confirmation) => {
                tracing::info!(user = %user, kind = %spec.kind, "wizard submitted");
                format!("✅ *{}* applied.\n\n{}", spec.title, confirmation)
            }
            Err(e) => {
                tracing::warn!(user = %user, kind = %spec.kind, error = %e, "wizard submission failed");
                format!("❌ *{}* failed: {}", spec.title, e)
            }
        };
        self.delivery
            .deliver(user, placeholder.as_ref(), &text, Some(&menus::back_to_main()))
            .await
    }

    fn trace_step(&self, user: &UserId, spec: &WizardSpec, step: &str, accepted: bool) {
        tracing::debug!(user = %user, kind = %spec.kind, step = %step, accepted, "wizard step");
        TraceEvent::WizardAdvanced {
            user: user.to_string(),
            kind: spec.kind.clone(),
            step: step.to_owned(),
            accepted,
        }
        .emit();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
