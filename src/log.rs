use std::sync::Mutex;

use colored::Colorize;

/// Narrow logging capability consumed by the probing core.
///
/// `write` records a success, `notify` a progress note, `error` a failure.
/// Implementations decide storage and formatting; the core depends on
/// neither.
pub trait EventSink: Send + Sync {
    fn write(&self, msg: &str);
    fn notify(&self, msg: &str);
    fn error(&self, msg: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Ok,
    Notice,
    Error,
}

#[derive(Debug, Clone)]
struct Entry {
    id: u64,
    error_id: Option<u64>,
    kind: Kind,
    message: String,
}

impl Entry {
    fn prefixed(&self) -> String {
        match self.kind {
            Kind::Ok => format!("[OK] {}", self.message),
            Kind::Notice => format!("[NOTICE] {}", self.message),
            Kind::Error => format!("[ERROR]: {}", self.message),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryLog {
    next_id: u64,
    next_error_id: u64,
    entries: Vec<Entry>,
}

/// In-memory event log with sequential message ids and an error sub-log.
///
/// Keeping events in memory keeps log lines off the terminal while the
/// dashboard is redrawing in place; the log is replayed after the round
/// (`--print-log`) or rendered to a file (`--output-log`). Errors get a
/// second, error-scoped id and are repeated after the main log, matching
/// the replay layout users of the tool expect.
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<MemoryLog>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, kind: Kind, message: &str) {
        let mut log = self.inner.lock().expect("event log lock poisoned");
        log.next_id += 1;
        let error_id = match kind {
            Kind::Error => {
                log.next_error_id += 1;
                Some(log.next_error_id)
            }
            _ => None,
        };
        let id = log.next_id;
        log.entries.push(Entry {
            id,
            error_id,
            kind,
            message: message.to_string(),
        });
    }

    /// Number of recorded messages.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("event log lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Colored replay of the whole log, errors repeated at the end.
    pub fn replay(&self) -> String {
        let log = self.inner.lock().expect("event log lock poisoned");
        let mut out = String::new();
        for entry in &log.entries {
            let colored = match entry.kind {
                Kind::Ok => entry.prefixed().green(),
                Kind::Notice => entry.prefixed().yellow(),
                Kind::Error => entry.prefixed().red().underline(),
            };
            out.push_str(&format!(
                "{}  {}\n",
                format!("[ message id: {} ]:", entry.id).purple(),
                colored
            ));
        }
        out.push_str(&format!("{}\n", "== [ END OF LOG ] ==".blue()));
        for entry in log.entries.iter().filter(|e| e.kind == Kind::Error) {
            let error_id = entry.error_id.unwrap_or_default();
            out.push_str(&format!(
                "{}\n{}\n",
                format!("[ error id: {}::(log_id: {}) ]:", error_id, entry.id).purple(),
                entry.prefixed().red().underline()
            ));
        }
        out
    }

    /// Plain-text rendering for the log file.
    pub fn render(&self) -> String {
        let log = self.inner.lock().expect("event log lock poisoned");
        let mut out = String::new();
        for entry in &log.entries {
            out.push_str(&format!(
                "[ message id: {} ]:\n{}\n",
                entry.id,
                entry.prefixed()
            ));
        }
        out.push_str("== [ END OF LOG ] ==\n");
        for entry in log.entries.iter().filter(|e| e.kind == Kind::Error) {
            let error_id = entry.error_id.unwrap_or_default();
            out.push_str(&format!(
                "[ error id: {}::(log_id: {}) ]:\n{}\n",
                error_id,
                entry.id,
                entry.prefixed()
            ));
        }
        out
    }
}

impl EventSink for MemorySink {
    fn write(&self, msg: &str) {
        self.push(Kind::Ok, msg);
    }

    fn notify(&self, msg: &str) {
        self.push(Kind::Notice, msg);
    }

    fn error(&self, msg: &str) {
        self.push(Kind::Error, msg);
    }
}

/// Forwards events to `tracing`, for discrete log lines on stderr
/// independent of the dashboard stream.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn write(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn notify(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    fn error(&self, msg: &str) {
        tracing::warn!("{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_across_kinds() {
        let sink = MemorySink::new();
        sink.write("one");
        sink.notify("two");
        sink.error("three");
        assert_eq!(sink.len(), 3);

        let rendered = sink.render();
        assert!(rendered.contains("[ message id: 1 ]:\n[OK] one"));
        assert!(rendered.contains("[ message id: 2 ]:\n[NOTICE] two"));
        assert!(rendered.contains("[ message id: 3 ]:\n[ERROR]: three"));
    }

    #[test]
    fn errors_repeat_in_the_sub_log() {
        let sink = MemorySink::new();
        sink.write("fine");
        sink.error("broke");
        sink.error("broke again");

        let rendered = sink.render();
        assert!(rendered.contains("[ error id: 1::(log_id: 2) ]:"));
        assert!(rendered.contains("[ error id: 2::(log_id: 3) ]:"));
        assert!(rendered.contains("== [ END OF LOG ] =="));
    }

    #[test]
    fn empty_log_still_renders_end_marker() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        assert_eq!(sink.render(), "== [ END OF LOG ] ==\n");
    }
}
