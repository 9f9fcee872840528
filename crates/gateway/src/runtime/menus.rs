//! Button menus and the action strings they carry.

use std::str::FromStr;

use chrono::Timelike;

use crate::backends::SourceInfo;
use crate::runtime::wizard::{WizardRegistry, CANCEL_ACTION, CHOICE_PREFIX};
use crate::transport::{Button, Menu};

pub const START_MAIN: &str = "start_main";
pub const AI_TOGGLE: &str = "ai_toggle";
pub const BATCH_START: &str = "batch_start";
pub const BATCH_END: &str = "batch_end";
pub const WIZARD_PREFIX: &str = "wizard:";
pub const ANALYZE_PREFIX: &str = "analyze:";
/// `grant:<user>:<feature>`, admin only.
pub const GRANT_PREFIX: &str = "grant:";
/// `revoke:<user>:<feature>`, admin only.
pub const REVOKE_PREFIX: &str = "revoke:";
pub const LIST_USERS: &str = "users";

/// A parsed button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    StartMain,
    AiToggle,
    BatchStart,
    BatchEnd,
    StartWizard(String),
    Choice(String),
    CancelWizard,
    Analyze(String),
    Grant { user: String, feature: String },
    Revoke { user: String, feature: String },
    ListUsers,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let action = match data {
            START_MAIN => Action::StartMain,
            AI_TOGGLE => Action::AiToggle,
            BATCH_START => Action::BatchStart,
            BATCH_END => Action::BatchEnd,
            CANCEL_ACTION => Action::CancelWizard,
            LIST_USERS => Action::ListUsers,
            _ => {
                if let Some(kind) = data.strip_prefix(WIZARD_PREFIX) {
                    Action::StartWizard(kind.to_owned())
                } else if let Some(value) = data.strip_prefix(CHOICE_PREFIX) {
                    Action::Choice(value.to_owned())
                } else if let Some(source) = data.strip_prefix(ANALYZE_PREFIX) {
                    Action::Analyze(source.to_owned())
                } else if let Some(rest) = data.strip_prefix(GRANT_PREFIX) {
                    let (user, feature) = user_and_feature(rest)?;
                    Action::Grant { user, feature }
                } else if let Some(rest) = data.strip_prefix(REVOKE_PREFIX) {
                    let (user, feature) = user_and_feature(rest)?;
                    Action::Revoke { user, feature }
                } else {
                    return Err(format!("unknown action: {data}"));
                }
            }
        };
        Ok(action)
    }
}

fn user_and_feature(rest: &str) -> Result<(String, String), String> {
    match rest.split_once(':') {
        Some((user, feature)) if !user.trim().is_empty() && !feature.trim().is_empty() => {
            Ok((user.trim().to_owned(), feature.trim().to_lowercase()))
        }
        _ => Err(format!("expected <user>:<feature>, got {rest:?}")),
    }
}

pub fn main_menu(wizards: &WizardRegistry, sources: &[SourceInfo]) -> Menu {
    let mut menu = Menu::new().row(vec![
        Button::new("🤖 AI assistant", AI_TOGGLE),
        Button::new("📥 Batch input", BATCH_START),
    ]);
    for pair in wizards.specs().chunks(2) {
        menu = menu.row(
            pair.iter()
                .map(|s| Button::new(s.title.clone(), format!("{WIZARD_PREFIX}{}", s.kind)))
                .collect(),
        );
    }
    for pair in sources.chunks(2) {
        menu = menu.row(
            pair.iter()
                .map(|s| {
                    Button::new(
                        format!("🩺 Analyse {}", s.label),
                        format!("{ANALYZE_PREFIX}{}", s.tag),
                    )
                })
                .collect(),
        );
    }
    menu
}

pub fn back_to_main() -> Menu {
    Menu::single("🔙 Main menu", START_MAIN)
}

/// Attached to every AI reply.
pub fn ai_exit() -> Menu {
    Menu::single("🚪 Exit AI mode", AI_TOGGLE)
}

/// Exit AI mode or go back to the main menu.
pub fn ai_followup() -> Menu {
    Menu::new().row(vec![
        Button::new("🚪 Exit AI mode", AI_TOGGLE),
        Button::new("🔙 Main menu", START_MAIN),
    ])
}

pub fn batch_collecting() -> Menu {
    Menu::single("✅ Done", BATCH_END)
}

/// Greeting for the local time of day.
pub fn greeting_for_hour(hour: u32) -> &'static str {
    match hour {
        0..=4 => "It's late, get some rest 🌙",
        5..=8 => "Good morning, have a great day ☀️",
        9..=11 => "Good morning ☕",
        12..=13 => "Good afternoon, don't skip lunch 🍱",
        14..=17 => "Good afternoon, time for some tea 🍵",
        18..=22 => "Good evening, long day? 🌃",
        _ => "Hello 👋",
    }
}

pub fn greeting_now() -> &'static str {
    greeting_for_hour(chrono::Local::now().hour())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::wizards;

    #[test]
    fn actions_parse() {
        assert_eq!("start_main".parse::<Action>().unwrap(), Action::StartMain);
        assert_eq!(
            "wizard:net-ping".parse::<Action>().unwrap(),
            Action::StartWizard("net-ping".into())
        );
        assert_eq!(
            "choice:tcp udp".parse::<Action>().unwrap(),
            Action::Choice("tcp udp".into())
        );
        assert_eq!(
            "analyze:router".parse::<Action>().unwrap(),
            Action::Analyze("router".into())
        );
        assert_eq!(
            "wizard_cancel".parse::<Action>().unwrap(),
            Action::CancelWizard
        );
        assert_eq!("users".parse::<Action>().unwrap(), Action::ListUsers);
        assert_eq!(
            "grant:12345:AI".parse::<Action>().unwrap(),
            Action::Grant {
                user: "12345".into(),
                feature: "ai".into()
            }
        );
        assert_eq!(
            "revoke:12345:forms".parse::<Action>().unwrap(),
            Action::Revoke {
                user: "12345".into(),
                feature: "forms".into()
            }
        );
        assert!("grant:12345".parse::<Action>().is_err());
        assert!("revoke::ai".parse::<Action>().is_err());
        assert!("reboot".parse::<Action>().is_err());
    }

    #[test]
    fn main_menu_lists_wizards_and_sources() {
        let sources = vec![SourceInfo {
            tag: "router".into(),
            label: "OpenWrt".into(),
            analysis_prompt: None,
        }];
        let menu = main_menu(&wizards::builtin(), &sources);
        let actions: Vec<&str> = menu.actions().collect();
        assert_eq!(actions[0], AI_TOGGLE);
        assert!(actions.contains(&"wizard:port-forward"));
        assert!(actions.contains(&"wizard:net-curl"));
        assert_eq!(actions.last(), Some(&"analyze:router"));
    }

    #[test]
    fn greeting_buckets() {
        assert!(greeting_for_hour(3).contains("rest"));
        assert!(greeting_for_hour(7).contains("great day"));
        assert!(greeting_for_hour(12).contains("lunch"));
        assert!(greeting_for_hour(20).contains("evening"));
        assert_eq!(greeting_for_hour(23), "Hello 👋");
    }
}
