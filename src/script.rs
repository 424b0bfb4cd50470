use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Marker character opening a comment/annotation entry.
pub const COMMENT_MARKER: char = '#';

/// One entry of the input script, classified at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEntry {
    /// Annotation text, marker and leading whitespace already stripped.
    Comment(String),
    /// A literal command line, to be executed verbatim.
    Command(String),
}

impl ScriptEntry {
    fn classify(line: &str) -> Self {
        match line.strip_prefix(COMMENT_MARKER) {
            Some(rest) => Self::Comment(rest.trim_start_matches([COMMENT_MARKER, ' ']).trim().to_owned()),
            None => Self::Command(line.to_owned()),
        }
    }
}

/// Reads a script file: one entry per line, blank lines dropped entirely.
pub fn load_script(path: &Path) -> Result<Vec<ScriptEntry>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read script file {}", path.display()))?;
    Ok(parse_script(&contents))
}

pub fn parse_script(contents: &str) -> Vec<ScriptEntry> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ScriptEntry::classify)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_comments_and_commands() {
        let entries = parse_script("# hello world\necho hi\n\n   \nls -la\n");
        assert_eq!(
            entries,
            vec![
                ScriptEntry::Comment("hello world".to_owned()),
                ScriptEntry::Command("echo hi".to_owned()),
                ScriptEntry::Command("ls -la".to_owned()),
            ]
        );
    }

    #[test]
    fn strips_marker_runs_and_surrounding_whitespace() {
        let entries = parse_script("##  spaced out  \n#\n");
        assert_eq!(
            entries,
            vec![
                ScriptEntry::Comment("spaced out".to_owned()),
                ScriptEntry::Comment(String::new()),
            ]
        );
    }

    #[test]
    fn surrounding_whitespace_on_commands_is_trimmed() {
        let entries = parse_script("  echo hi  \n");
        assert_eq!(entries, vec![ScriptEntry::Command("echo hi".to_owned())]);
    }
}
