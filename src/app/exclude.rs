//! Compiled session-exclusion set.
//!
//! `exclude_sessions` entries come in three shapes: `/…/` compiles as a
//! regex, anything containing `*` or `?` compiles as a glob, and the rest
//! match exactly. All entries compile once at startup into one set so the
//! scanner's per-pane check is a single call; compile failures are
//! aggregated so the user sees every bad entry in one validation error.

use std::collections::HashSet;

use anyhow::Result;
use glob::Pattern as GlobPattern;
use regex::Regex;

#[derive(Debug, Default)]
pub struct ExcludeSet {
    exact: HashSet<String>,
    globs: Vec<GlobPattern>,
    regexes: Vec<Regex>,
}

impl ExcludeSet {
    /// Compiles every `exclude_sessions` entry. Invalid entries do not stop
    /// compilation early; the error names each one.
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let mut set = Self::default();
        let mut bad: Vec<String> = Vec::new();

        for raw in patterns {
            if let Err(e) = set.add(raw) {
                bad.push(format!("{raw:?} ({e})"));
            }
        }

        if !bad.is_empty() {
            anyhow::bail!("invalid exclude_sessions entries: {}", bad.join(", "));
        }
        Ok(set)
    }

    fn add(&mut self, raw: &str) -> Result<()> {
        // `/…/` with a non-empty body is a regex.
        if let Some(inner) = raw
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
            .filter(|inner| !inner.is_empty())
        {
            self.regexes.push(Regex::new(inner)?);
            return Ok(());
        }

        if raw.contains(['*', '?']) {
            self.globs.push(GlobPattern::new(raw)?);
        } else {
            self.exact.insert(raw.to_string());
        }
        Ok(())
    }

    /// True when any compiled entry matches the session name. Exact names
    /// are checked first since they are the common case and the cheapest.
    pub fn excludes(&self, session: &str) -> bool {
        self.exact.contains(session)
            || self.globs.iter().any(|g| g.matches(session))
            || self.regexes.iter().any(|r| r.is_match(session))
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.globs.is_empty() && self.regexes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.globs.len() + self.regexes.len()
    }
}
