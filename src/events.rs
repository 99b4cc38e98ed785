//! Domain events.
//!
//! Two layers live here. [`TaskCompleted`] and [`TaskReopened`] are the
//! in-process notices the task store hands to a [`CompletionListener`]
//! (normally the progress store). [`Event`] and [`EventSink`] are the
//! external JSONL log written when the CLI runs with `--events`.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

pub const EVENT_SCHEMA_VERSION: &str = "heropath.event.v1";

/// A task moved from active to completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompleted {
    pub task_id: String,
    pub xp_value: u32,
    pub category: Option<String>,
}

/// A completed task was marked active again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReopened {
    pub task_id: String,
    pub xp_value: u32,
    pub category: Option<String>,
}

/// Consumer of task completion notices.
pub trait CompletionListener {
    fn on_task_completed(&mut self, event: &TaskCompleted);

    /// Reopening never takes anything back by default.
    fn on_task_reopened(&mut self, _event: &TaskReopened) {}
}

#[derive(Debug, Clone)]
pub enum EventDestination {
    Stdout,
    File(PathBuf),
}

impl EventDestination {
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw.and_then(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            if trimmed == "-" {
                return Some(EventDestination::Stdout);
            }
            Some(EventDestination::File(PathBuf::from(trimmed)))
        })
    }

    pub fn open(&self) -> Result<EventSink> {
        match self {
            EventDestination::Stdout => Ok(EventSink::stdout()),
            EventDestination::File(path) => EventSink::file(path),
        }
    }
}

/// High-level event kinds emitted by heropath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskCompleted,
    TaskReopened,
    TaskUpdated,
    TaskRemoved,
    CompletedCleared,
    LevelUp,
    StreakReset,
    OutfitUnlocked,
    OutfitChanged,
    DataCleared,
}

/// A structured event with optional payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub schema_version: &'static str,
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Event {
    /// Build an event stamped with `now_ms` (epoch milliseconds).
    pub fn new(event: EventKind, now_ms: i64) -> Self {
        Self {
            schema_version: EVENT_SCHEMA_VERSION,
            event,
            timestamp: DateTime::from_timestamp_millis(now_ms).unwrap_or_default(),
            data: None,
        }
    }

    /// Attach a serializable payload to the event.
    pub fn with_data<T: Serialize>(mut self, data: T) -> Result<Self> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }
}

/// Event sink that writes JSONL output to a destination.
pub struct EventSink {
    writer: Box<dyn Write>,
}

impl EventSink {
    /// Emit events to stdout.
    pub fn stdout() -> Self {
        Self {
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Emit events to a file, creating it if necessary.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Box::new(file),
        })
    }

    /// Emit events into an arbitrary writer.
    pub fn from_writer(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }

    /// Write a single event as JSONL.
    pub fn emit(&mut self, event: &Event) -> Result<()> {
        let serialized = serde_json::to_vec(event)?;
        self.writer.write_all(&serialized)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().map_err(Error::Io)?;
        Ok(())
    }

    pub fn emit_all<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) -> Result<()> {
        for event in events {
            self.emit(event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn destination_parse() {
        assert!(EventDestination::parse(None).is_none());
        assert!(EventDestination::parse(Some("  ")).is_none());
        assert!(matches!(
            EventDestination::parse(Some("-")),
            Some(EventDestination::Stdout)
        ));
        assert!(matches!(
            EventDestination::parse(Some("events.jsonl")),
            Some(EventDestination::File(_))
        ));
    }

    #[test]
    fn events_are_written_as_json_lines() {
        let buf = SharedBuf::default();
        let mut sink = EventSink::from_writer(Box::new(buf.clone()));

        let level_up = Event::new(EventKind::LevelUp, 0)
            .with_data(serde_json::json!({"from": 1, "to": 3}))
            .unwrap();
        let created = Event::new(EventKind::TaskCreated, 1_000);
        sink.emit_all([&level_up, &created]).unwrap();

        let text = String::from_utf8(buf.0.borrow().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["schema_version"], EVENT_SCHEMA_VERSION);
        assert_eq!(first["event"], "level_up");
        assert_eq!(first["data"]["to"], 3);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "task_created");
        assert!(second.get("data").is_none());
    }
}
