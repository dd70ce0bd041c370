use anyhow::{Context, Result};
use regex::Regex;
use std::process::Command;

use super::pane::Pane;
use super::process::descendant_commands;
use crate::nudge::KeySender;

const LIST_FORMAT: &str =
    "#{session_name}\t#{window_index}\t#{pane_index}\t#{window_name}\t#{pane_current_command}\t#{pane_pid}";

/// Adapter contract the scanner and executor depend on. Production uses
/// [`TmuxClient`]; tests substitute fakes.
pub trait Multiplexer: KeySender {
    /// Adapter name, for labeling in logs and status output.
    fn name(&self) -> &str;

    /// Enumerates panes, optionally filtered by a session-name regex.
    /// Failure here is fatal for the scan.
    fn list_panes(&self, filter: Option<&Regex>) -> Result<Vec<Pane>>;

    /// Captures the visible content (plus scrollback) of one pane.
    /// Failure is per-target and becomes an error verdict.
    fn capture_pane(&self, target: &str) -> Result<String>;

    /// The target of the pane this process runs in, when inside tmux.
    fn current_target(&self) -> Option<String>;
}

/// Subprocess-backed tmux client.
pub struct TmuxClient {
    capture_lines: u32,
}

impl TmuxClient {
    pub fn new() -> Self {
        Self { capture_lines: 100 }
    }

    pub fn with_capture_lines(capture_lines: u32) -> Self {
        Self { capture_lines }
    }

    /// Check if a tmux server is reachable.
    pub fn is_available(&self) -> bool {
        Command::new("tmux")
            .arg("list-sessions")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("tmux")
            .args(args)
            .output()
            .with_context(|| format!("failed to execute tmux {}", args.first().unwrap_or(&"")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "tmux {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl KeySender for TmuxClient {
    fn send_keys(&self, target: &str, literal: bool, keys: &str) -> Result<()> {
        let mut args = vec!["send-keys", "-t", target];
        if literal {
            args.push("-l");
        }
        args.push(keys);
        self.run(&args)
            .with_context(|| format!("send-keys to {}", target))?;
        Ok(())
    }
}

impl Multiplexer for TmuxClient {
    fn name(&self) -> &str {
        "tmux"
    }

    fn list_panes(&self, filter: Option<&Regex>) -> Result<Vec<Pane>> {
        let stdout = self
            .run(&["list-panes", "-a", "-F", LIST_FORMAT])
            .context("list-panes")?;

        let panes = stdout
            .lines()
            .filter_map(Pane::parse)
            .filter(|p| filter.map(|re| re.is_match(&p.session)).unwrap_or(true))
            .map(|mut p| {
                p.child_commands = descendant_commands(p.pid);
                p
            })
            .collect();

        Ok(panes)
    }

    fn capture_pane(&self, target: &str) -> Result<String> {
        let start_line = format!("-{}", self.capture_lines);
        self.run(&["capture-pane", "-p", "-t", target, "-S", &start_line])
            .with_context(|| format!("capture-pane {}", target))
    }

    fn current_target(&self) -> Option<String> {
        if std::env::var("TMUX").is_err() {
            return None;
        }

        let format = "#{session_name}:#{window_index}.#{pane_index}";
        let result = match std::env::var("TMUX_PANE") {
            Ok(pane_id) => self.run(&["display-message", "-t", &pane_id, "-p", format]),
            Err(_) => self.run(&["display-message", "-p", format]),
        };

        result
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}
