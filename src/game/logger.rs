//! Bump-allocating game logger
//!
//! Entries are owned Strings so the buffer has no lifetime parameters.
//! Categorised stdout lines are formatted in a bump arena that is reset
//! after every line.

use bumpalo::collections::String as BumpString;
use bumpalo::Bump;
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::fmt::Write as FmtWrite;
use std::ops::Deref;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// No output
    Silent = 0,
    /// Game outcome and errors only
    Minimal = 1,
    /// Turns, stack activity and key actions
    #[default]
    Normal = 2,
    /// Every event and state change
    Verbose = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputMode {
    #[default]
    Stdout,
    /// Capture to the in-memory buffer only
    Memory,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: VerbosityLevel,
    pub message: String,
    /// e.g. "stack", "sba", "layers", "zone"
    pub category: Option<String>,
}

/// Read-only view of captured entries
pub struct LogGuard<'a> {
    guard: Ref<'a, Vec<LogEntry>>,
}

impl<'a> LogGuard<'a> {
    pub fn iter(&self) -> std::slice::Iter<'_, LogEntry> {
        self.guard.iter()
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }
}

impl<'a> Deref for LogGuard<'a> {
    type Target = [LogEntry];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

pub struct GameLogger {
    verbosity: VerbosityLevel,
    output_mode: OutputMode,
    format_bump: RefCell<Bump>,
    log_buffer: RefCell<Vec<LogEntry>>,
}

impl GameLogger {
    pub fn new() -> Self {
        Self::with_verbosity(VerbosityLevel::default())
    }

    pub fn with_verbosity(verbosity: VerbosityLevel) -> Self {
        GameLogger {
            verbosity,
            output_mode: OutputMode::default(),
            format_bump: RefCell::new(Bump::new()),
            log_buffer: RefCell::new(Vec::new()),
        }
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) {
        self.output_mode = mode;
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// Capture to memory and suppress stdout
    pub fn enable_capture(&mut self) {
        self.output_mode = OutputMode::Memory;
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.output_mode, OutputMode::Memory | OutputMode::Both)
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, verbosity: VerbosityLevel) {
        self.verbosity = verbosity;
    }

    pub fn logs(&self) -> LogGuard<'_> {
        LogGuard {
            guard: self.log_buffer.borrow(),
        }
    }

    /// Whether any captured entry of `category` contains `needle`
    pub fn contains(&self, category: &str, needle: &str) -> bool {
        self.log_buffer
            .borrow()
            .iter()
            .any(|e| e.category.as_deref() == Some(category) && e.message.contains(needle))
    }

    pub fn clear_logs(&mut self) {
        self.log_buffer.borrow_mut().clear();
        self.format_bump.borrow_mut().reset();
    }

    /// Print captured entries allowed by the verbosity, then clear them
    pub fn flush_buffer(&mut self) {
        for entry in self.log_buffer.borrow().iter() {
            if entry.level <= self.verbosity {
                self.print_line(entry.level, entry.category.as_deref(), &entry.message);
            }
        }
        self.clear_logs();
    }

    fn print_line(&self, level: VerbosityLevel, category: Option<&str>, message: &str) {
        let mut bump = self.format_bump.borrow_mut();
        {
            let mut line = BumpString::new_in(&bump);
            if level > VerbosityLevel::Minimal {
                line.push_str("  ");
            }
            if let Some(category) = category {
                let _ = write!(line, "[{category}] ");
            }
            line.push_str(message);
            println!("{line}");
        }
        bump.reset();
    }

    /// Record a categorised line at `level`
    pub fn log(&self, level: VerbosityLevel, category: &str, message: &str) {
        if level == VerbosityLevel::Silent {
            return;
        }
        let should_capture = self.is_capturing();
        let should_output = matches!(self.output_mode, OutputMode::Stdout | OutputMode::Both);

        if level > self.verbosity && !should_capture {
            return;
        }
        if should_capture {
            self.log_buffer.borrow_mut().push(LogEntry {
                level,
                message: message.to_string(),
                category: Some(category.to_string()),
            });
        }
        if should_output && level <= self.verbosity {
            self.print_line(level, Some(category), message);
        }
    }

    #[inline]
    pub fn minimal(&self, category: &str, message: &str) {
        self.log(VerbosityLevel::Minimal, category, message);
    }

    #[inline]
    pub fn normal(&self, category: &str, message: &str) {
        self.log(VerbosityLevel::Normal, category, message);
    }

    #[inline]
    pub fn verbose(&self, category: &str, message: &str) {
        self.log(VerbosityLevel::Verbose, category, message);
    }
}

impl Default for GameLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GameLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLogger")
            .field("verbosity", &self.verbosity)
            .field("output_mode", &self.output_mode)
            .field("log_count", &self.log_buffer.borrow().len())
            .finish()
    }
}

/// Clones carry the settings but not the captured entries
impl Clone for GameLogger {
    fn clone(&self) -> Self {
        GameLogger {
            verbosity: self.verbosity,
            output_mode: self.output_mode,
            format_bump: RefCell::new(Bump::new()),
            log_buffer: RefCell::new(Vec::new()),
        }
    }
}

impl Serialize for GameLogger {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("GameLogger", 2)?;
        state.serialize_field("verbosity", &self.verbosity)?;
        state.serialize_field("output_mode", &self.output_mode)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for GameLogger {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct GameLoggerData {
            verbosity: VerbosityLevel,
            #[serde(default)]
            output_mode: OutputMode,
        }

        let data = GameLoggerData::deserialize(deserializer)?;
        let mut logger = GameLogger::with_verbosity(data.verbosity);
        logger.output_mode = data.output_mode;
        Ok(logger)
    }
}
