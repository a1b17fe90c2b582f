//! Line-oriented log sinks that narrated build output is written to.

use crossterm::{
    cursor::MoveTo,
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io::{self, IsTerminal, Write};

/// Append-only text sink. Implementations must tolerate writes from any thread.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str) -> io::Result<()>;

    /// Discard previously written content.
    fn clear(&self) -> io::Result<()>;
}

/// Writes to stdout, in blue when attached to a terminal.
pub struct ConsoleSink {
    color: Option<Color>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        let color = io::stdout().is_terminal().then_some(Color::Blue);
        Self { color }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for ConsoleSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        match self.color {
            Some(color) => execute!(
                out,
                SetForegroundColor(color),
                Print(line),
                ResetColor,
                Print("\n")
            ),
            None => writeln!(out, "{line}"),
        }
    }

    fn clear(&self) -> io::Result<()> {
        // Piped output has nothing to clear.
        if self.color.is_none() {
            return Ok(());
        }
        let mut out = io::stdout().lock();
        execute!(out, Clear(ClearType::All), MoveTo(0, 0))
    }
}

/// Keeps lines in memory for assertions.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    state: std::sync::Mutex<MemoryState>,
}

#[cfg(test)]
#[derive(Debug, Default)]
struct MemoryState {
    lines: Vec<String>,
    clears: usize,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.lines.clone())
            .unwrap_or_default()
    }

    /// Number of times `clear` has been called.
    pub fn clears(&self) -> usize {
        self.state.lock().map(|s| s.clears).unwrap_or_default()
    }
}

#[cfg(test)]
impl LogSink for MemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("memory sink poisoned"))?;
        state.lines.push(line.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::other("memory sink poisoned"))?;
        state.lines.clear();
        state.clears += 1;
        Ok(())
    }
}
