//! Bounded AI conversation transcript.
//!
//! Turns render as `"User: …\n"` / `"Model: …\n"`. When the rendered
//! transcript grows past the cap, the oldest characters are dropped from
//! the front so that `render()` is always the exact tail of everything ever
//! appended.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Model,
}

impl Speaker {
    pub fn tag(self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Model => "Model",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Turn {
    speaker: Speaker,
    text: String,
}

impl Turn {
    fn render(&self) -> String {
        format!("{}: {}\n", self.speaker, self.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    max_chars: usize,
    /// Tail of the most recently evicted turn, already rendered.
    fragment: String,
    turns: VecDeque<Turn>,
    /// Rendered length in chars (fragment included).
    len_chars: usize,
}

impl History {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            fragment: String::new(),
            turns: VecDeque::new(),
            len_chars: 0,
        }
    }

    pub fn len_chars(&self) -> usize {
        self.len_chars
    }

    pub fn is_empty(&self) -> bool {
        self.len_chars == 0
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        let turn = Turn {
            speaker,
            text: text.into(),
        };
        self.len_chars += turn.render().chars().count();
        self.turns.push_back(turn);
        self.enforce_cap();
    }

    /// Append one user/model exchange.
    pub fn push_exchange(&mut self, user: impl Into<String>, model: impl Into<String>) {
        self.push(Speaker::User, user);
        self.push(Speaker::Model, model);
    }

    /// The transcript as sent to the model.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.len_chars * 2);
        out.push_str(&self.fragment);
        for turn in &self.turns {
            out.push_str(&turn.render());
        }
        out
    }

    fn enforce_cap(&mut self) {
        while self.len_chars > self.max_chars {
            let excess = self.len_chars - self.max_chars;

            if self.fragment.is_empty() {
                match self.turns.pop_front() {
                    Some(oldest) => self.fragment = oldest.render(),
                    None => break,
                }
                continue;
            }

            let frag_len = self.fragment.chars().count();
            if frag_len <= excess {
                self.fragment.clear();
                self.len_chars -= frag_len;
            } else {
                self.fragment = self.fragment.chars().skip(excess).collect();
                self.len_chars -= excess;
            }
        }
    }
}

impl fmt::Display for History {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
