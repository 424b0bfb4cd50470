use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::OnceLock;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;

const TAB_STOP: usize = 8;

/// Runs one script command and returns its combined stdout+stderr text.
/// A non-zero exit status is not an error; whatever the command printed
/// (including error text) is returned for display.
pub trait CommandExecutor {
    fn run(&mut self, command: &str) -> Result<String>;
}

/// A single `sh` child fed through stdin for the whole run, so shell state
/// (`cd`, variables) persists across script entries. Each command is
/// wrapped in `eval ... 2>&1` and followed by a unique done-marker line.
pub struct ShellExecutor {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    serial: u64,
}

impl ShellExecutor {
    pub fn spawn() -> Result<Self> {
        let mut child = Command::new("sh")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to spawn shell (is `sh` on PATH?)")?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("failed to capture shell stdin"))?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| anyhow!("failed to capture shell stdout"))?;
        Ok(Self {
            child,
            stdin,
            stdout,
            serial: 0,
        })
    }
}

impl CommandExecutor for ShellExecutor {
    fn run(&mut self, command: &str) -> Result<String> {
        self.serial += 1;
        let marker = format!("__termcast_done_{}__", self.serial);

        // eval keeps a syntax error inside the command from killing the
        // non-interactive shell.
        writeln!(
            self.stdin,
            "eval {} 2>&1\nprintf '%s\\n' {marker}",
            shell_quote(command)
        )
        .context("failed to write command to shell")?;
        self.stdin.flush().context("failed to flush shell stdin")?;

        let mut lines: Vec<String> = Vec::new();
        loop {
            let mut line = String::new();
            let read = self
                .stdout
                .read_line(&mut line)
                .context("failed to read shell output")?;
            if read == 0 {
                bail!("shell exited before completing command '{command}'");
            }
            let line = line.trim_end_matches(['\n', '\r']);
            if line == marker {
                break;
            }
            // A command that ends without a newline glues the marker onto
            // its last output line.
            if let Some(rest) = line.strip_suffix(marker.as_str()) {
                if !rest.is_empty() {
                    lines.push(rest.to_owned());
                }
                break;
            }
            lines.push(line.to_owned());
        }
        Ok(lines.join("\n"))
    }
}

impl Drop for ShellExecutor {
    fn drop(&mut self) {
        let _ = self.stdin.write_all(b"exit\n");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}

fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "'\\''"))
}

fn ansi_escape_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("ansi pattern compiles")
    })
}

/// Strips ANSI escape sequences and control characters (newline and tab
/// survive) from captured command output.
pub fn sanitize_output(text: &str) -> String {
    let stripped = ansi_escape_pattern().replace_all(text, "");
    stripped
        .chars()
        .filter(|&ch| !ch.is_control() || ch == '\n' || ch == '\t')
        .collect()
}

/// Expands tabs to the next 8-column stop within a single line.
pub fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = TAB_STOP - (column % TAB_STOP);
            out.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            out.push(ch);
            column += 1;
        }
    }
    out
}
