//! Terminal chat transport.
//!
//! Messages and menus are printed to a writer (stdout by default). Rich
//! text goes through the same marker check a Telegram legacy-Markdown
//! parser applies, so unbalanced markup is rejected and the caller's plain
//! fallback runs.

use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use ho_domain::error::{Error, Result};
use ho_sessions::UserId;

use crate::transport::{AttachmentRef, ChatTransport, Format, MessageHandle, Menu};

pub struct ConsoleTransport {
    out: Mutex<Box<dyn Write + Send>>,
    next_id: AtomicU64,
    /// Most recent message per user that carried a menu.
    last_menu: Mutex<HashMap<UserId, MessageHandle>>,
}

impl ConsoleTransport {
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            next_id: AtomicU64::new(1),
            last_menu: Mutex::new(HashMap::new()),
        }
    }

    /// The message a `!action` typed by `user` should be attributed to.
    pub fn last_menu_message(&self, user: &UserId) -> Option<MessageHandle> {
        self.last_menu.lock().get(user).cloned()
    }

    fn print(&self, header: &str, text: &str, menu: Option<&Menu>) -> Result<()> {
        let mut block = format!("\n── {header} ──\n{text}\n");
        if let Some(menu) = menu {
            for row in &menu.rows {
                let cells: Vec<String> = row
                    .iter()
                    .map(|b| format!("[{}] !{}", b.label, b.action))
                    .collect();
                block.push_str(&format!("  {}\n", cells.join("   ")));
            }
        }
        let mut out = self.out.lock();
        out.write_all(block.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    fn remember_menu(&self, handle: &MessageHandle, menu: Option<&Menu>) {
        if menu.is_some_and(|m| !m.is_empty()) {
            self.last_menu
                .lock()
                .insert(handle.recipient.clone(), handle.clone());
        }
    }
}

#[async_trait::async_trait]
impl ChatTransport for ConsoleTransport {
    async fn send_message(
        &self,
        recipient: &UserId,
        text: &str,
        format: Format,
        menu: Option<&Menu>,
    ) -> Result<MessageHandle> {
        if format == Format::Rich {
            check_legacy_markdown(text)?;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.print(&format!("#{id}"), text, menu)?;
        let handle = MessageHandle {
            recipient: recipient.clone(),
            id: id.to_string(),
        };
        self.remember_menu(&handle, menu);
        Ok(handle)
    }

    async fn edit_message(
        &self,
        handle: &MessageHandle,
        text: &str,
        format: Format,
        menu: Option<&Menu>,
    ) -> Result<()> {
        if format == Format::Rich {
            check_legacy_markdown(text)?;
        }
        self.print(&format!("#{} (edited)", handle.id), text, menu)?;
        self.remember_menu(handle, menu);
        Ok(())
    }

    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>> {
        tokio::fs::read(&attachment.0)
            .await
            .map_err(|e| Error::Transport(format!("reading {}: {e}", attachment.0)))
    }
}

/// Reject text whose `*`, `_` or `` ` `` markers are unbalanced. Markers
/// inside code spans do not count.
pub fn check_legacy_markdown(text: &str) -> Result<()> {
    let mut open: Option<char> = None;
    for c in text.chars() {
        match (open, c) {
            (Some('`'), '`') => open = None,
            (Some('`'), _) => {}
            (None, '*' | '_' | '`') => open = Some(c),
            (Some(o), c) if o == c => open = None,
            _ => {}
        }
    }
    match open {
        None => Ok(()),
        Some(marker) => Err(Error::Transport(format!(
            "can't parse entities: unclosed '{marker}'"
        ))),
    }
}
