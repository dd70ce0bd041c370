//! Screen-text utilities shared by the per-agent parsers.
//!
//! Captured pane content includes scrollback, so stale indicators of every
//! kind survive above the live region. The helpers here implement the shared
//! discipline: weight the bottom non-empty lines, strip border and cursor
//! glyphs before extracting dialog text, and treat option rows / footers /
//! spinners uniformly across agents.

use regex::Regex;
use std::sync::OnceLock;

/// How many bottom non-empty lines carry decision weight.
pub const BOTTOM_WINDOW: usize = 8;

/// Returns up to the last `n` non-empty lines of `content`, in screen order.
pub fn bottom_non_empty(content: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}

/// Strips leading whitespace plus border and cursor glyphs from a dialog
/// line, so extracted text is the dialog's own words.
pub fn strip_decor(line: &str) -> &str {
    let mut rest = line;
    loop {
        let trimmed = rest.trim_start();
        let stripped = trimmed
            .strip_prefix('│')
            .or_else(|| trimmed.strip_prefix('┃'))
            .or_else(|| trimmed.strip_prefix('║'))
            .or_else(|| trimmed.strip_prefix('❯'))
            .or_else(|| trimmed.strip_prefix('›'))
            .or_else(|| trimmed.strip_prefix('▸'))
            .or_else(|| trimmed.strip_prefix('●'));
        match stripped {
            Some(s) => rest = s,
            None => return trimmed.trim_end_matches(['│', '┃', '║', ' ']),
        }
    }
}

/// Cuts a line at the first run of 10+ spaces. TUIs with a right-hand panel
/// pad the gap with spaces; everything after the gap belongs to the panel.
pub fn trim_right_panel(line: &str) -> &str {
    match line.find("          ") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Splits a tab-header row on runs of 3+ spaces into its segments.
pub fn split_tabs(line: &str) -> Vec<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\s{3,}").unwrap());
    re.split(line.trim())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// A single `N. text` option row (with optional cursor glyph).
pub fn numbered_option(line: &str) -> Option<(u32, String)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^\s*(?:[❯›▸●]\s*)?(\d+)[.)]\s+(\S.*)$").unwrap());
    let caps = re.captures(line)?;
    let num = caps[1].parse().ok()?;
    Some((num, caps[2].trim().to_string()))
}

/// All `N. text` options on one line, where a selector renders its options
/// inline separated by 2+ spaces (`1. Yes  2. Yes, and don't ask again  3. No`).
pub fn inline_numbered_options(line: &str) -> Vec<(u32, String)> {
    static SPLIT: OnceLock<Regex> = OnceLock::new();
    let split = SPLIT.get_or_init(|| Regex::new(r"\s{2,}").unwrap());
    let stripped = strip_decor(line);
    let options: Vec<(u32, String)> = split
        .split(stripped)
        .filter_map(numbered_option)
        .collect();
    if options.len() >= 2 {
        options
    } else {
        Vec::new()
    }
}

/// A multi-select checkbox row: `N. [ ] text` or `N. [✓] text`.
/// Returns (number, checked, label).
pub fn checkbox_option(line: &str) -> Option<(u32, bool, String)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[❯›▸]\s*)?(\d+)[.)]\s*\[([ x✓✔])\]\s*(\S.*)$").unwrap()
    });
    let caps = re.captures(line)?;
    let num = caps[1].parse().ok()?;
    let checked = &caps[2] != " ";
    Some((num, checked, caps[3].trim().to_string()))
}

/// Persistent shortcut footers common to agent TUIs. These lines never carry
/// dialog text and must not be mistaken for idle prompts or options.
pub fn is_footer_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    const HINTS: &[&str] = &[
        "? for shortcuts",
        "ctrl+",
        "shift+tab",
        "esc to",
        "esc interrupt",
        "⇆ tab",
        "↑↓",
        "⏎ send",
        "enter to select",
        "enter to confirm",
        "tab agents",
        "alt+",
    ];
    HINTS.iter().any(|h| lower.contains(h))
}

/// Rotating braille spinner cell, U+2800..=U+28FF.
pub fn has_braille(line: &str) -> bool {
    line.chars().any(|c| ('\u{2800}'..='\u{28FF}').contains(&c))
}

/// `…` or `...` anywhere on the line.
pub fn has_ellipsis(line: &str) -> bool {
    line.contains('…') || line.contains("...")
}

/// Tool-progress verbs that mark in-flight work when they start a line and
/// trail an ellipsis. Past-tense forms (`Fetched`, `Read 42 lines`) are
/// completion markers and do not match.
const PROGRESS_VERBS: &[&str] = &[
    "Fetching",
    "Reading",
    "Writing",
    "Searching",
    "Running",
    "Executing",
];

/// In-flight tool-progress line: verb at line start (after any spinner
/// glyph) with a trailing ellipsis.
pub fn is_tool_progress_line(line: &str) -> bool {
    let text = strip_leading_glyphs(line);
    PROGRESS_VERBS.iter().any(|v| text.starts_with(v)) && has_ellipsis(line)
}

/// Thinking-indicator glyphs that unambiguously belong to a spinner row.
const THINKING_GLYPHS: &[char] = &['✻', '✢', '✳', '✶', '✽'];

/// Glyphs that also appear as bullets in agent prose. Only counted as a
/// thinking indicator when followed by a word and a trailing ellipsis.
const AMBIGUOUS_GLYPHS: &[char] = &['·', '*'];

/// Spinner row of the form `✻ Cogitating… (esc to interrupt)`. The glyph
/// alone is not enough: bullet-like text after the glyph does not qualify,
/// the line needs a following word and an ellipsis.
pub fn is_thinking_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    let Some(first) = trimmed.chars().next() else {
        return false;
    };
    if !THINKING_GLYPHS.contains(&first) && !AMBIGUOUS_GLYPHS.contains(&first) {
        return false;
    }
    let rest = trimmed[first.len_utf8()..].trim_start();
    let word_len = rest.chars().take_while(|c| c.is_alphabetic()).count();
    word_len > 0 && has_ellipsis(line)
}

fn strip_leading_glyphs(line: &str) -> &str {
    let mut rest = line.trim_start();
    loop {
        let Some(first) = rest.chars().next() else {
            return rest;
        };
        let is_glyph = ('\u{2800}'..='\u{28FF}').contains(&first)
            || THINKING_GLYPHS.contains(&first)
            || first == '⏺'
            || first == '●';
        if is_glyph {
            rest = rest[first.len_utf8()..].trim_start();
        } else {
            return rest;
        }
    }
}

/// Auto-resolving countdown (`Retrying in 5s`, `Continuing in 3s…`). The
/// agent clears these itself; the pane is not blocked.
pub fn is_countdown_line(line: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:continuing|retrying|resuming|reconnecting) in \d+\s*s").unwrap()
    });
    re.is_match(line)
}

/// True when any command line in the process tree contains `needle`.
pub fn process_tree_matches(tree: &[String], needle: &str) -> bool {
    tree.iter()
        .any(|cmd| cmd.to_lowercase().contains(needle))
}
