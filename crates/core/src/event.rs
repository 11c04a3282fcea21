use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recorded event: a type name, optional timing, and flat typed fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            start: None,
            duration_ms: None,
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Numeric view of a field. `duration_ms` is addressable as a field too.
    pub fn number(&self, field: &str) -> Option<f64> {
        if field == "duration_ms" {
            if let Some(d) = self.duration_ms {
                return Some(d);
            }
        }
        self.fields.get(field).and_then(FieldValue::as_f64)
    }
}

/// Typed field values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
}

impl FieldValue {
    /// Extract as string, returning None for non-text values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// How much of an event type a recording can offer, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventAvailability {
    /// Never mentioned by the recording.
    Unknown,
    /// Mentioned but switched off.
    Disabled,
    /// Declared for capture, no events recorded.
    Enabled,
    /// At least one event present.
    Available,
}

/// A rule's demand on the recording: `event_type` must be at least `availability`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredEvent {
    pub event_type: String,
    pub availability: EventAvailability,
}

impl RequiredEvent {
    pub fn available(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            availability: EventAvailability::Available,
        }
    }

    pub fn enabled(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            availability: EventAvailability::Enabled,
        }
    }
}

/// The parsed, read-only, queryable form of one recording.
///
/// Built once per report request and shared by every evaluation of that
/// request behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct EventCollection {
    events: Vec<Event>,
    by_type: HashMap<String, Vec<usize>>,
    declared: HashSet<String>,
    disabled: HashSet<String>,
}

impl EventCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from events alone; every present type counts as declared.
    pub fn from_events(events: Vec<Event>) -> Self {
        let mut collection = Self::new();
        for event in events {
            collection.push(event);
        }
        collection
    }

    pub fn push(&mut self, event: Event) {
        let idx = self.events.len();
        self.declared.insert(event.event_type.clone());
        self.by_type
            .entry(event.event_type.clone())
            .or_default()
            .push(idx);
        self.events.push(event);
    }

    /// Mark an event type as configured for capture, whether or not it fired.
    pub fn declare(&mut self, event_type: impl Into<String>) {
        let event_type = event_type.into();
        self.disabled.remove(&event_type);
        self.declared.insert(event_type);
    }

    /// Mark an event type as explicitly switched off in the recording settings.
    pub fn disable(&mut self, event_type: impl Into<String>) {
        let event_type = event_type.into();
        if !self.declared.contains(&event_type) {
            self.disabled.insert(event_type);
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Iterate all events of one type in recording order.
    pub fn of_type<'a>(&'a self, event_type: &str) -> impl Iterator<Item = &'a Event> + 'a {
        self.by_type
            .get(event_type)
            .map(|idx| idx.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.events[i])
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.by_type.get(event_type).map_or(0, Vec::len)
    }

    pub fn availability(&self, event_type: &str) -> EventAvailability {
        if self.count(event_type) > 0 {
            EventAvailability::Available
        } else if self.declared.contains(event_type) {
            EventAvailability::Enabled
        } else if self.disabled.contains(event_type) {
            EventAvailability::Disabled
        } else {
            EventAvailability::Unknown
        }
    }

    /// True when every requirement is met. An empty requirement list always matches.
    pub fn satisfies(&self, required: &[RequiredEvent]) -> bool {
        required
            .iter()
            .all(|r| self.availability(&r.event_type) >= r.availability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EventCollection {
        let mut c = EventCollection::from_events(vec![
            Event::new("jdk.GarbageCollection").with_field("pause", FieldValue::Float(12.5)),
            Event::new("jdk.GarbageCollection").with_field("pause", FieldValue::Integer(3)),
            Event::new("jdk.ThreadPark"),
        ]);
        c.declare("jdk.JavaMonitorWait");
        c.disable("jdk.ObjectAllocationSample");
        c
    }

    #[test]
    fn availability_levels() {
        let c = sample();
        assert_eq!(c.availability("jdk.GarbageCollection"), EventAvailability::Available);
        assert_eq!(c.availability("jdk.JavaMonitorWait"), EventAvailability::Enabled);
        assert_eq!(c.availability("jdk.ObjectAllocationSample"), EventAvailability::Disabled);
        assert_eq!(c.availability("jdk.Nope"), EventAvailability::Unknown);
    }

    #[test]
    fn satisfies_requirements() {
        let c = sample();
        assert!(c.satisfies(&[]));
        assert!(c.satisfies(&[RequiredEvent::available("jdk.GarbageCollection")]));
        assert!(c.satisfies(&[RequiredEvent::enabled("jdk.JavaMonitorWait")]));
        assert!(!c.satisfies(&[RequiredEvent::available("jdk.JavaMonitorWait")]));
        assert!(!c.satisfies(&[
            RequiredEvent::available("jdk.GarbageCollection"),
            RequiredEvent::enabled("jdk.Nope"),
        ]));
    }

    #[test]
    fn of_type_preserves_order_and_numbers() {
        let c = sample();
        let pauses: Vec<f64> = c
            .of_type("jdk.GarbageCollection")
            .filter_map(|e| e.number("pause"))
            .collect();
        assert_eq!(pauses, vec![12.5, 3.0]);
        assert_eq!(c.of_type("missing").count(), 0);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn declare_overrides_disable() {
        let mut c = EventCollection::new();
        c.disable("x");
        c.declare("x");
        assert_eq!(c.availability("x"), EventAvailability::Enabled);
    }
}
