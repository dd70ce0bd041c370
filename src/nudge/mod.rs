//! Keystroke delivery to multiplexer panes.
//!
//! Two input models share one executor. A raw-mode TUI consumes each
//! keypress individually, so the key string is split into tokens and sent
//! one by one. A cooked shell gets the text pasted literally, then a settle
//! delay, an Escape in case the pane holds a modal editor in insert mode,
//! and a retried Enter.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::verdict::Action;

/// Send primitive, abstracted so tests substitute a recorder and production
/// dispatches to the multiplexer adapter. `literal` selects the adapter's
/// literal mode (the actual character codes, not key-name lookup).
pub trait KeySender: Send + Sync {
    fn send_keys(&self, target: &str, literal: bool, keys: &str) -> Result<()>;
}

/// Closed set of recognized multiplexer key-names.
pub const NAMED_KEYS: &[&str] = &[
    "Enter", "Escape", "Up", "Down", "Left", "Right", "Tab", "BTab", "Space", "BSpace", "DC",
];

/// A token the multiplexer resolves by name: one of [`NAMED_KEYS`] or the
/// three-character `C-x` / `M-x` forms.
pub fn is_key_name(token: &str) -> bool {
    if NAMED_KEYS.contains(&token) {
        return true;
    }
    let mut chars = token.chars();
    matches!(
        (chars.next(), chars.next(), chars.next(), chars.next()),
        (Some('C') | Some('M'), Some('-'), Some(_), None)
    )
}

/// True when every whitespace-separated token is a named key; such a
/// sequence targets a TUI even when the action's raw flag is unset.
fn is_control_sequence(keys: &str) -> bool {
    let mut tokens = keys.split_whitespace().peekable();
    tokens.peek().is_some() && tokens.all(is_key_name)
}

/// Delays used between send steps. Tests zero these out.
#[derive(Debug, Clone, Copy)]
pub struct NudgeTiming {
    /// After pasting cooked text, before anything else.
    pub paste_settle: Duration,
    /// After the pre-Enter Escape.
    pub escape_settle: Duration,
    /// Between raw-mode tokens.
    pub inter_key: Duration,
    /// Between Enter retry attempts.
    pub retry_gap: Duration,
}

impl Default for NudgeTiming {
    fn default() -> Self {
        Self {
            paste_settle: Duration::from_millis(500),
            escape_settle: Duration::from_millis(100),
            inter_key: Duration::from_millis(100),
            retry_gap: Duration::from_millis(200),
        }
    }
}

impl NudgeTiming {
    pub const ZERO: Self = Self {
        paste_settle: Duration::ZERO,
        escape_settle: Duration::ZERO,
        inter_key: Duration::ZERO,
        retry_gap: Duration::ZERO,
    };
}

const ENTER_ATTEMPTS: usize = 3;

pub struct Nudger {
    sender: Arc<dyn KeySender>,
    timing: NudgeTiming,
}

impl Nudger {
    pub fn new(sender: Arc<dyn KeySender>) -> Self {
        Self {
            sender,
            timing: NudgeTiming::default(),
        }
    }

    pub fn with_timing(sender: Arc<dyn KeySender>, timing: NudgeTiming) -> Self {
        Self { sender, timing }
    }

    /// Dispatches an action with its input model taken into account.
    pub async fn send_action(&self, target: &str, action: &Action) -> Result<()> {
        debug!(target, keys = %action.keys, raw = action.raw, "dispatching nudge");
        if action.raw || is_control_sequence(&action.keys) {
            self.send_raw(target, &action.keys).await
        } else {
            self.send_cooked(target, &action.keys).await
        }
    }

    /// Raw-mode path: tokens sent individually, named keys by name,
    /// everything else literally.
    pub async fn send_raw(&self, target: &str, keys: &str) -> Result<()> {
        for (i, token) in keys.split_whitespace().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.timing.inter_key).await;
            }
            let literal = !is_key_name(token);
            self.sender
                .send_keys(target, literal, token)
                .with_context(|| format!("send key {:?} to {}", token, target))?;
        }
        Ok(())
    }

    /// Cooked-shell path: literal text, settle, Escape for modal editors,
    /// then Enter with retries.
    pub async fn send_cooked(&self, target: &str, text: &str) -> Result<()> {
        self.sender
            .send_keys(target, true, text)
            .with_context(|| format!("send literal text to {}", target))?;
        tokio::time::sleep(self.timing.paste_settle).await;

        self.sender
            .send_keys(target, false, "Escape")
            .with_context(|| format!("send escape to {}", target))?;
        tokio::time::sleep(self.timing.escape_settle).await;

        let mut last_err = None;
        for attempt in 1..=ENTER_ATTEMPTS {
            match self.sender.send_keys(target, false, "Enter") {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(target, attempt, "enter send failed: {}", e);
                    last_err = Some(e);
                    if attempt < ENTER_ATTEMPTS {
                        tokio::time::sleep(self.timing.retry_gap).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("enter send failed")))
            .with_context(|| format!("send enter to {} after {} attempts", target, ENTER_ATTEMPTS))
    }
}
