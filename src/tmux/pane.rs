//! Pane identity as reported by `tmux list-panes`.

use serde::{Deserialize, Serialize};

/// One addressable pane within a tmux server. Discovered fresh on every scan;
/// never retained across scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pane {
    pub session: String,
    pub window: u32,
    pub window_name: String,
    pub pane: u32,
    /// Head-of-process command for the pane (`pane_current_command`).
    pub command: String,
    /// Shell PID of the pane (`pane_pid`).
    pub pid: u32,
    /// Ordered command lines of descendant processes.
    pub child_commands: Vec<String>,
}

impl Pane {
    /// Parses one tab-separated line of
    /// `list-panes -a -F "#{session_name}\t#{window_index}\t#{pane_index}\t#{window_name}\t#{pane_current_command}\t#{pane_pid}"`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split('\t');
        let session = fields.next()?.to_string();
        let window = fields.next()?.parse().ok()?;
        let pane = fields.next()?.parse().ok()?;
        let window_name = fields.next().unwrap_or("").to_string();
        let command = fields.next().unwrap_or("").to_string();
        let pid = fields.next().and_then(|s| s.parse().ok()).unwrap_or(0);

        if session.is_empty() {
            return None;
        }

        Some(Self {
            session,
            window,
            window_name,
            pane,
            command,
            pid,
            child_commands: Vec::new(),
        })
    }

    /// Fully-qualified target: `session:window.pane`.
    pub fn target(&self) -> String {
        format!("{}:{}.{}", self.session, self.window, self.pane)
    }

    /// Head command plus descendant command lines, in the order parsers
    /// inspect them.
    pub fn process_tree(&self) -> Vec<String> {
        let mut tree = Vec::with_capacity(1 + self.child_commands.len());
        tree.push(self.command.clone());
        tree.extend(self.child_commands.iter().cloned());
        tree
    }

    /// Prepends the `[Process Info]` / `[Terminal Content]` header consumed
    /// by the cache and the LLM fallback.
    pub fn with_header(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len() + 256);
        out.push_str("[Process Info]\n");
        out.push_str(&format!("command: {}\n", self.command));
        out.push_str(&format!("pid: {}\n", self.pid));
        for child in &self.child_commands {
            out.push_str(&format!("child: {}\n", child));
        }
        out.push_str("[Terminal Content]\n");
        out.push_str(content);
        out
    }
}

/// Parses a fully-qualified target `session:window.pane` with numeric window
/// and pane indices. Session names may themselves contain `:` or `.`, so the
/// indices are taken from the right.
pub fn parse_target(target: &str) -> Option<(String, u32, u32)> {
    let (rest, pane) = target.rsplit_once('.')?;
    let (session, window) = rest.rsplit_once(':')?;
    if session.is_empty() {
        return None;
    }
    let window: u32 = window.parse().ok()?;
    let pane: u32 = pane.parse().ok()?;
    Some((session.to_string(), window, pane))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pane_line() {
        let pane = Pane::parse("dev\t2\t1\tcode\tnode\t4242").unwrap();
        assert_eq!(pane.session, "dev");
        assert_eq!(pane.window, 2);
        assert_eq!(pane.pane, 1);
        assert_eq!(pane.window_name, "code");
        assert_eq!(pane.command, "node");
        assert_eq!(pane.pid, 4242);
        assert_eq!(pane.target(), "dev:2.1");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Pane::parse("").is_none());
        assert!(Pane::parse("dev").is_none());
        assert!(Pane::parse("dev\tx\t1\tw\tzsh\t1").is_none());
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(
            parse_target("dev:0.1"),
            Some(("dev".to_string(), 0, 1))
        );
        // Session names with separators resolve from the right.
        assert_eq!(
            parse_target("my:odd.name:3.2"),
            Some(("my:odd.name".to_string(), 3, 2))
        );
        assert!(parse_target("dev:0").is_none());
        assert!(parse_target("dev:a.b").is_none());
        assert!(parse_target(":0.1").is_none());
        assert!(parse_target("").is_none());
    }

    #[test]
    fn test_header() {
        let mut pane = Pane::parse("dev\t0\t0\tmain\tzsh\t100").unwrap();
        pane.child_commands.push("claude --continue".to_string());
        let headered = pane.with_header("hello");
        assert!(headered.starts_with("[Process Info]\n"));
        assert!(headered.contains("child: claude --continue\n"));
        assert!(headered.ends_with("[Terminal Content]\nhello"));
    }

    #[test]
    fn test_process_tree_order() {
        let mut pane = Pane::parse("dev\t0\t0\tmain\tzsh\t100").unwrap();
        pane.child_commands = vec!["claude".to_string(), "rg foo".to_string()];
        assert_eq!(pane.process_tree(), vec!["zsh", "claude", "rg foo"]);
    }
}
