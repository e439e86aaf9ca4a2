// src/utils/notifications.rs: Notification events and the sinks they are published to

use std::cell::RefCell;

use log::{error, info, warn};
use serde::Serialize;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
    Info,
}

/// A set of samples sharing one outcome for one analysis run. Created once and
/// never mutated after publishing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub analysis_run: String,
    pub level: Level,
    pub message: String,
    pub samples: Vec<String>,
}

/// Receives published events. Fire-and-forget: nothing is returned and a lost
/// event is not retried.
pub trait NotificationSink {
    fn publish(&self, name: &str, event: &Event);
}

/// Named events published together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notification {
    pub events: Vec<(String, Event)>,
}

impl Notification {
    pub fn new(events: Vec<(String, Event)>) -> Self {
        Notification { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    pub fn publish(&self, sink: &dyn NotificationSink) {
        for (name, event) in &self.events {
            sink.publish(name, event);
        }
    }
}


/// Writes each event as one JSON line to the log at the event's level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[derive(Serialize)]
struct LogLine<'a> {
    event: &'a str,
    #[serde(flatten)]
    body: &'a Event,
}

impl NotificationSink for LogSink {
    fn publish(&self, name: &str, event: &Event) {
        let line = match serde_json::to_string(&LogLine { event: name, body: event }) {
            Ok(line) => line,
            Err(e) => format!("{{\"event\":\"{}\",\"serialization_error\":\"{}\"}}", name, e),
        };
        match event.level {
            Level::Error => error!("{}", line),
            Level::Warning => warn!("{}", line),
            Level::Info => info!("{}", line),
        }
    }
}


/// Keeps published events in memory, in publishing order.
#[derive(Debug, Default)]
pub struct MemorySink {
    published: RefCell<Vec<(String, Event)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, Event)> {
        self.published.borrow().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.published.borrow().iter().map(|(n, _)| n.clone()).collect()
    }
}

impl NotificationSink for MemorySink {
    fn publish(&self, name: &str, event: &Event) {
        self.published.borrow_mut().push((name.to_string(), event.clone()));
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn event(level: Level, samples: &[&str]) -> Event {
        Event {
            analysis_run: "run1".to_string(),
            level,
            message: "ncov QC failed".to_string(),
            samples: samples.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_publish_in_order() {
        let notification = Notification::new(vec![
            ("unknown_ncov".to_string(), event(Level::Error, &["C"])),
            ("failed_ncov".to_string(), event(Level::Warning, &[])),
        ]);
        let sink = MemorySink::new();
        notification.publish(&sink);
        assert_eq!(sink.names(), vec!["unknown_ncov", "failed_ncov"]);
        assert_eq!(notification.get("unknown_ncov").unwrap().samples, vec!["C"]);
    }

    #[test]
    fn test_event_serializes_level_lowercase() {
        let line = serde_json::to_string(&LogLine { event: "failed_ncov", body: &event(Level::Warning, &["B"]) }).unwrap();
        assert!(line.contains("\"event\":\"failed_ncov\""));
        assert!(line.contains("\"level\":\"warning\""));
        assert!(line.contains("\"samples\":[\"B\"]"));
    }
}
