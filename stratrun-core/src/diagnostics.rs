//! Diagnostic sinks: where process output and protocol problems are reported.
//!
//! Sinks are injected into each run rather than reached through a global.
//! A caller that wants one sink per run category keeps a `SinkRegistry`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Which process stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A line forwarded verbatim: untagged stdout, or any stderr line.
    Output { stream: StreamKind, line: String },
    /// A tagged line that produced no event.
    Dropped { line: String, reason: String },
    Warning(String),
    Info(String),
}

pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);

    fn warn(&self, message: String) {
        self.emit(Diagnostic::Warning(message));
    }

    fn info(&self, message: String) {
        self.emit(Diagnostic::Info(message));
    }
}

/// Default sink: every diagnostic becomes a `tracing` event tagged with the
/// sink's category.
#[derive(Debug, Clone)]
pub struct TracingSink {
    category: String,
}

impl TracingSink {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        let category = self.category.as_str();
        match diagnostic {
            Diagnostic::Output {
                stream: StreamKind::Stdout,
                line,
            } => tracing::info!(category, stream = "stdout", "{line}"),
            Diagnostic::Output {
                stream: StreamKind::Stderr,
                line,
            } => tracing::warn!(category, stream = "stderr", "{line}"),
            Diagnostic::Dropped { line, reason } => {
                tracing::warn!(category, %reason, "dropped protocol line: {line}")
            }
            Diagnostic::Warning(message) => tracing::warn!(category, "{message}"),
            Diagnostic::Info(message) => tracing::info!(category, "{message}"),
        }
    }
}

/// Records diagnostics in memory. Used by tests and by hosts that render
/// run output themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Forwarded lines from one stream, in arrival order.
    pub fn output_lines(&self, stream: StreamKind) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|d| match d {
                Diagnostic::Output { stream: s, line } if *s == stream => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|d| match d {
                Diagnostic::Warning(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn dropped_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|d| matches!(d, Diagnostic::Dropped { .. }))
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }
}

type SinkFactory = Box<dyn Fn(&str) -> Arc<dyn DiagnosticSink> + Send + Sync>;

/// One sink per named run category, created on first use.
pub struct SinkRegistry {
    sinks: Mutex<HashMap<String, Arc<dyn DiagnosticSink>>>,
    factory: SinkFactory,
}

impl SinkRegistry {
    /// Registry whose sinks log through `tracing`.
    pub fn new() -> Self {
        Self::with_factory(|category| -> Arc<dyn DiagnosticSink> {
            Arc::new(TracingSink::new(category))
        })
    }

    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn DiagnosticSink> + Send + Sync + 'static,
    {
        Self {
            sinks: Mutex::new(HashMap::new()),
            factory: Box::new(factory),
        }
    }

    pub fn sink(&self, category: &str) -> Arc<dyn DiagnosticSink> {
        let mut sinks = self.sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sinks
            .entry(category.to_string())
            .or_insert_with(|| (self.factory)(category))
            .clone()
    }

    pub fn categories(&self) -> Vec<String> {
        let sinks = self.sinks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = sinks.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("categories", &self.categories())
            .finish()
    }
}
