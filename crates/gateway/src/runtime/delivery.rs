//! Long-message delivery.
//!
//! Splits results that exceed the transport's size ceiling into line-packed
//! chunks and sends each one with a rich-then-plain fallback. Only the
//! first chunk may replace an existing message and only the last chunk
//! carries the menu.

use std::sync::Arc;

use ho_domain::error::Result;
use ho_domain::trace::TraceEvent;
use ho_sessions::UserId;

use crate::transport::{ChatTransport, Format, MessageHandle, Menu};

const EMPTY_PLACEHOLDER: &str = "(empty response)";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chunking
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Split `text` into chunks of at most `limit` characters.
///
/// Whole lines are packed greedily; a line longer than `limit` is cut at
/// character boundaries. Whitespace-only chunks are dropped.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    let mut flush = |current: &mut String, current_len: &mut usize| {
        if !current.trim().is_empty() {
            chunks.push(std::mem::take(current));
        } else {
            current.clear();
        }
        *current_len = 0;
    };

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let sep = usize::from(current_len > 0);

        if current_len + sep + line_len <= limit {
            if sep == 1 {
                current.push('\n');
            }
            current.push_str(line);
            current_len += sep + line_len;
            continue;
        }

        flush(&mut current, &mut current_len);

        if line_len <= limit {
            current.push_str(line);
            current_len = line_len;
            continue;
        }

        // Over-long line: emit full pieces, keep the remainder for packing.
        let chars: Vec<char> = line.chars().collect();
        let mut pieces = chars.chunks(limit).peekable();
        while let Some(piece) = pieces.next() {
            let piece: String = piece.iter().collect();
            if pieces.peek().is_some() {
                current = piece;
                flush(&mut current, &mut current_len);
            } else {
                current_len = piece.chars().count();
                current = piece;
            }
        }
    }
    flush(&mut current, &mut current_len);
    chunks
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delivery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MessageDelivery {
    transport: Arc<dyn ChatTransport>,
    chunk_chars: usize,
}

impl MessageDelivery {
    pub fn new(transport: Arc<dyn ChatTransport>, chunk_chars: usize) -> Self {
        Self {
            transport,
            chunk_chars: chunk_chars.max(1),
        }
    }

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    /// Deliver `text` to `recipient`, replacing `existing` with the first
    /// chunk when given.
    ///
    /// Fails only when a brand-new message cannot be sent even as plain
    /// text.
    pub async fn deliver(
        &self,
        recipient: &UserId,
        existing: Option<&MessageHandle>,
        text: &str,
        menu: Option<&Menu>,
    ) -> Result<()> {
        let chunks = self.chunks_for(text);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_menu = if i == last { menu } else { None };
            let target = if i == 0 { existing } else { None };

            match self.send_or_edit(recipient, target, chunk, chunk_menu, i).await {
                Ok(()) => {}
                Err(e) if target.is_some() => {
                    tracing::warn!(
                        recipient = %recipient,
                        chunk_index = i,
                        error = %e,
                        "in-place edit failed, sending a new message"
                    );
                    TraceEvent::DeliveryFallback {
                        chunk_index: i,
                        stage: "edit_to_send".into(),
                        error: e.to_string(),
                    }
                    .emit();
                    self.send_or_edit(recipient, None, chunk, chunk_menu, i)
                        .await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn chunks_for(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![EMPTY_PLACEHOLDER.to_string()];
        }
        if text.chars().count() <= self.chunk_chars {
            return vec![text.to_string()];
        }
        split_text(text, self.chunk_chars)
    }

    /// Rich first, then plain.
    async fn send_or_edit(
        &self,
        recipient: &UserId,
        target: Option<&MessageHandle>,
        text: &str,
        menu: Option<&Menu>,
        chunk_index: usize,
    ) -> Result<()> {
        match self.put(recipient, target, text, Format::Rich, menu).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::debug!(chunk_index, error = %e, "rich delivery rejected, retrying as plain text");
                TraceEvent::DeliveryFallback {
                    chunk_index,
                    stage: "rich_to_plain".into(),
                    error: e.to_string(),
                }
                .emit();
                self.put(recipient, target, text, Format::Plain, menu).await
            }
        }
    }

    async fn put(
        &self,
        recipient: &UserId,
        target: Option<&MessageHandle>,
        text: &str,
        format: Format,
        menu: Option<&Menu>,
    ) -> Result<()> {
        match target {
            Some(handle) => self.transport.edit_message(handle, text, format, menu).await,
            None => self
                .transport
                .send_message(recipient, text, format, menu)
                .await
                .map(|_| ()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::AttachmentRef;
    use ho_domain::error::Error;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Send { text: String, format: Format, menu: bool },
        Edit { text: String, format: Format, menu: bool },
    }

    #[derive(Default)]
    struct FakeTransport {
        calls: Mutex<Vec<Call>>,
        reject_rich: bool,
        reject_edit: bool,
        reject_send: bool,
    }

    #[async_trait::async_trait]
    impl ChatTransport for FakeTransport {
        async fn send_message(
            &self,
            recipient: &UserId,
            text: &str,
            format: Format,
            menu: Option<&Menu>,
        ) -> Result<MessageHandle> {
            self.calls.lock().push(Call::Send {
                text: text.into(),
                format,
                menu: menu.is_some(),
            });
            if self.reject_send || (self.reject_rich && format == Format::Rich) {
                return Err(Error::Transport("rejected".into()));
            }
            Ok(MessageHandle {
                recipient: recipient.clone(),
                id: "m".into(),
            })
        }

        async fn edit_message(
            &self,
            _handle: &MessageHandle,
            text: &str,
            format: Format,
            menu: Option<&Menu>,
        ) -> Result<()> {
            self.calls.lock().push(Call::Edit {
                text: text.into(),
                format,
                menu: menu.is_some(),
            });
            if self.reject_edit || (self.reject_rich && format == Format::Rich) {
                return Err(Error::Transport("rejected".into()));
            }
            Ok(())
        }

        async fn download_attachment(&self, _attachment: &AttachmentRef) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn user() -> UserId {
        UserId::from(1_i64)
    }

    fn handle() -> MessageHandle {
        MessageHandle {
            recipient: user(),
            id: "placeholder".into(),
        }
    }

    // ── split_text ─────────────────────────────────────────────────

    #[test]
    fn text_at_ceiling_is_one_chunk() {
        let text = "a".repeat(10);
        assert_eq!(split_text(&text, 10), vec![text.clone()]);
    }

    #[test]
    fn text_over_ceiling_splits() {
        let text = "a".repeat(11);
        let chunks = split_text(&text, 10);
        assert_eq!(chunks, vec!["a".repeat(10), "a".to_string()]);
    }

    #[test]
    fn packs_whole_lines_greedily() {
        let text = "aaaa\nbbbb\ncccc\ndddd";
        let chunks = split_text(text, 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc\ndddd"]);
    }

    #[test]
    fn long_line_is_cut_at_char_level_and_remainder_packs() {
        let text = format!("{}\nx", "é".repeat(7));
        let chunks = split_text(&text, 3);
        assert_eq!(chunks, vec!["ééé", "ééé", "é\nx"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 3));
    }

    #[test]
    fn whitespace_only_chunks_are_dropped() {
        let text = format!("{}\n   \n\n{}", "a".repeat(5), "b".repeat(5));
        let chunks = split_text(&text, 5);
        assert_eq!(chunks, vec!["a".repeat(5), "b".repeat(5)]);
    }

    #[test]
    fn chunks_preserve_content() {
        let text: String = (0..200).map(|i| format!("line {i}\n")).collect();
        let chunks = split_text(&text, 50);
        assert!(chunks.iter().all(|c| c.chars().count() <= 50));
        assert_eq!(chunks.join("\n").trim_end(), text.trim_end());
    }

    // ── deliver ────────────────────────────────────────────────────

    #[tokio::test]
    async fn ceiling_plus_one_puts_menu_only_on_last_chunk() {
        let transport = Arc::new(FakeTransport::default());
        let delivery = MessageDelivery::new(transport.clone(), 10);
        let menu = Menu::single("Back", "start_main");

        delivery
            .deliver(&user(), None, &"z".repeat(11), Some(&menu))
            .await
            .unwrap();

        let calls = transport.calls.lock().clone();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[0], Call::Send { menu: false, .. }));
        assert!(matches!(&calls[1], Call::Send { menu: true, .. }));
    }

    #[tokio::test]
    async fn only_first_chunk_edits_existing_message() {
        let transport = Arc::new(FakeTransport::default());
        let delivery = MessageDelivery::new(transport.clone(), 4);

        delivery
            .deliver(&user(), Some(&handle()), "aaaa\nbbbb\ncccc", None)
            .await
            .unwrap();

        let calls = transport.calls.lock().clone();
        assert!(matches!(&calls[0], Call::Edit { text, .. } if text == "aaaa"));
        assert!(matches!(&calls[1], Call::Send { text, .. } if text == "bbbb"));
        assert!(matches!(&calls[2], Call::Send { text, .. } if text == "cccc"));
    }

    #[tokio::test]
    async fn rich_rejection_falls_back_to_plain() {
        let transport = Arc::new(FakeTransport {
            reject_rich: true,
            ..FakeTransport::default()
        });
        let delivery = MessageDelivery::new(transport.clone(), 100);

        delivery.deliver(&user(), None, "*broken", None).await.unwrap();

        let calls = transport.calls.lock().clone();
        assert_eq!(
            calls,
            vec![
                Call::Send {
                    text: "*broken".into(),
                    format: Format::Rich,
                    menu: false
                },
                Call::Send {
                    text: "*broken".into(),
                    format: Format::Plain,
                    menu: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn failed_edit_falls_back_to_new_message() {
        let transport = Arc::new(FakeTransport {
            reject_edit: true,
            ..FakeTransport::default()
        });
        let delivery = MessageDelivery::new(transport.clone(), 100);
        let menu = Menu::single("Exit", "ai_toggle");

        delivery
            .deliver(&user(), Some(&handle()), "hello", Some(&menu))
            .await
            .unwrap();

        let calls = transport.calls.lock().clone();
        // Edit rich, edit plain, then a fresh send carrying the menu.
        assert_eq!(calls.len(), 3);
        assert!(matches!(&calls[2], Call::Send { format: Format::Rich, menu: true, .. }));
    }

    #[tokio::test]
    async fn send_failure_surfaces_after_plain_retry() {
        let transport = Arc::new(FakeTransport {
            reject_send: true,
            ..FakeTransport::default()
        });
        let delivery = MessageDelivery::new(transport.clone(), 100);

        assert!(delivery.deliver(&user(), None, "hi", None).await.is_err());
        assert_eq!(transport.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn empty_text_sends_placeholder() {
        let transport = Arc::new(FakeTransport::default());
        let delivery = MessageDelivery::new(transport.clone(), 100);

        delivery.deliver(&user(), None, "  \n", None).await.unwrap();

        let calls = transport.calls.lock().clone();
        assert!(matches!(&calls[0], Call::Send { text, .. } if text == EMPTY_PLACEHOLDER));
    }
}
