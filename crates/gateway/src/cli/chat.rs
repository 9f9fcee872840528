//! `homeops chat`: interactive console.
//!
//! Each line becomes an inbound event for one user. Plain lines are text,
//! `!<action>` presses a button on the most recent menu, and slash commands
//! cover photos and REPL conveniences.

use std::sync::Arc;

use ho_domain::config::Config;
use ho_sessions::UserId;

use crate::bootstrap;
use crate::cli::console::ConsoleTransport;
use crate::runtime::menus::{GRANT_PREFIX, LIST_USERS, REVOKE_PREFIX, START_MAIN};
use crate::runtime::InboundEvent;
use crate::state::AppState;
use crate::transport::AttachmentRef;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public entry point
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn chat(config: Arc<Config>, user: Option<String>) -> anyhow::Result<()> {
    // 1. Boot the runtime against the console transport.
    let console = Arc::new(ConsoleTransport::stdout());
    let state = bootstrap::build_app_state(config.clone(), console.clone())?;

    let user = UserId::from(
        user.or_else(|| config.access.admin_id.clone())
            .unwrap_or_else(|| "console".into()),
    );

    // 2. Readline with persistent history.
    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".homeops")
        .join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("HomeOps console");
    eprintln!("User: {user}  |  Type /help for commands, Ctrl+D to exit");

    run_event(
        &state,
        &user,
        InboundEvent::Action {
            data: START_MAIN.into(),
            message: None,
        },
    )
    .await;

    // 3. REPL loop.
    loop {
        match rl.readline("you> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                let event = match parse_line(&line) {
                    ReplInput::Quit => break,
                    ReplInput::Help => {
                        print_help();
                        continue;
                    }
                    ReplInput::State => {
                        eprintln!("{:#?}", state.sessions.snapshot(&user));
                        continue;
                    }
                    ReplInput::Unknown(cmd) => {
                        eprintln!("Unknown command: {cmd}  (type /help for a list)");
                        continue;
                    }
                    ReplInput::Text(text) => InboundEvent::Text(text),
                    ReplInput::Action(data) => InboundEvent::Action {
                        data,
                        message: console.last_menu_message(&user),
                    },
                    ReplInput::Photo { path, caption } => InboundEvent::Photo {
                        attachment: AttachmentRef(path),
                        caption,
                    },
                };
                run_event(&state, &user, event).await;
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    // 4. Stop detached analyses and save history.
    state.shutdown.cancel();
    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

/// Dispatch one event and wait for its handler. Detached analyses keep
/// running and print when they finish.
async fn run_event(state: &AppState, user: &UserId, event: InboundEvent) {
    if let Err(e) = state.orchestrator.dispatch(user.clone(), event).await {
        eprintln!("\x1B[31merror: {e}\x1B[0m");
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Line parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, PartialEq, Eq)]
enum ReplInput {
    Quit,
    Help,
    State,
    Text(String),
    Action(String),
    Photo {
        path: String,
        caption: Option<String>,
    },
    Unknown(String),
}

fn parse_line(line: &str) -> ReplInput {
    let trimmed = line.trim();

    if let Some(action) = trimmed.strip_prefix('!') {
        return ReplInput::Action(action.trim().to_owned());
    }
    if !trimmed.starts_with('/') {
        return ReplInput::Text(trimmed.to_owned());
    }

    let mut parts = trimmed.splitn(2, ' ');
    let cmd = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());

    match cmd {
        "/exit" | "/quit" => ReplInput::Quit,
        "/help" => ReplInput::Help,
        "/state" => ReplInput::State,
        "/menu" => ReplInput::Action(START_MAIN.into()),
        "/users" => ReplInput::Action(LIST_USERS.into()),
        "/grant" | "/revoke" => {
            let prefix = if cmd == "/grant" { GRANT_PREFIX } else { REVOKE_PREFIX };
            let bits: Vec<&str> = arg.unwrap_or_default().split_whitespace().collect();
            match bits.as_slice() {
                [user, feature] => ReplInput::Action(format!("{prefix}{user}:{feature}")),
                _ => ReplInput::Unknown(format!("{cmd} needs <user_id> <feature>")),
            }
        }
        "/photo" => match arg {
            Some(rest) => {
                let mut bits = rest.splitn(2, ' ');
                let path = bits.next().unwrap_or_default().to_owned();
                let caption = bits.next().map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned);
                ReplInput::Photo { path, caption }
            }
            None => ReplInput::Unknown("/photo needs a path".into()),
        },
        other => ReplInput::Unknown(other.to_owned()),
    }
}

fn print_help() {
    eprintln!("Commands:");
    eprintln!("  <text>                  Send a message");
    eprintln!("  !<action>               Press a button (e.g. !ai_toggle, !wizard:net-ping)");
    eprintln!("  /photo <path> [caption] Send an image file");
    eprintln!("  /menu                   Show the main menu");
    eprintln!("  /state                  Print your session record");
    eprintln!("  /grant <user> <feature> Grant a feature (ai, forms, all), admin only");
    eprintln!("  /revoke <user> <feature> Revoke a feature, admin only");
    eprintln!("  /users                  List granted users, admin only");
    eprintln!("  /exit, /quit            Exit the console");
    eprintln!("  /help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines() {
        assert_eq!(parse_line("hello there"), ReplInput::Text("hello there".into()));
        assert_eq!(parse_line("!ai_toggle"), ReplInput::Action("ai_toggle".into()));
        assert_eq!(parse_line("/menu"), ReplInput::Action(START_MAIN.into()));
        assert_eq!(parse_line("/quit"), ReplInput::Quit);
        assert_eq!(
            parse_line("/photo /tmp/a.jpg what is this?"),
            ReplInput::Photo {
                path: "/tmp/a.jpg".into(),
                caption: Some("what is this?".into()),
            }
        );
        assert_eq!(
            parse_line("/photo /tmp/a.jpg"),
            ReplInput::Photo {
                path: "/tmp/a.jpg".into(),
                caption: None,
            }
        );
        assert!(matches!(parse_line("/photo"), ReplInput::Unknown(_)));
        assert_eq!(parse_line("/nope"), ReplInput::Unknown("/nope".into()));
        assert_eq!(parse_line("/users"), ReplInput::Action("users".into()));
        assert_eq!(
            parse_line("/grant 12345 ai"),
            ReplInput::Action("grant:12345:ai".into())
        );
        assert_eq!(
            parse_line("/revoke 12345 all"),
            ReplInput::Action("revoke:12345:all".into())
        );
        assert!(matches!(parse_line("/grant 12345"), ReplInput::Unknown(_)));
    }
}
