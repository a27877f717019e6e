//! Aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact that happened in the domain. Immutable, named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Event type tag used for storage and filtering.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced aggregate root.
///
/// Aggregates are rebuilt by replaying events, produce events from
/// command methods, and apply events with a pure, infallible `apply`.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// Events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Errors its command methods can return.
    type Error: std::error::Error + Send + Sync;

    /// Aggregate type tag used for stream organization.
    fn aggregate_type() -> &'static str;

    /// The aggregate's ID, or `None` before the first event.
    fn id(&self) -> Option<AggregateId>;

    /// Current stream position.
    fn version(&self) -> Version;

    /// Called by the command handler after replay.
    fn set_version(&mut self, version: Version);

    /// Applies an event. Must be pure and deterministic; events are
    /// facts and applying one cannot fail.
    fn apply(&mut self, event: Self::Event);

    /// Applies events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Aggregates whose state can be snapshotted for faster rehydration.
pub trait SnapshotCapable: Aggregate + Serialize + DeserializeOwned {
    /// Number of events between snapshots.
    fn snapshot_interval() -> usize {
        100
    }

    /// Whether a snapshot is due at the current version.
    fn should_snapshot(&self) -> bool {
        self.version().as_i64() > 0
            && (self.version().as_i64() as usize).is_multiple_of(Self::snapshot_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Opened,
        Bumped { by: i32 },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened => "Opened",
                CounterEvent::Bumped { .. } => "Bumped",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Counter {
        id: Option<AggregateId>,
        value: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("counter error")]
    struct CounterError;

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = CounterError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Opened => {
                    if self.id.is_none() {
                        self.id = Some(AggregateId::new());
                    }
                }
                CounterEvent::Bumped { by } => self.value += by,
            }
        }
    }

    impl SnapshotCapable for Counter {}

    #[test]
    fn apply_events_in_sequence() {
        let mut counter = Counter::default();
        counter.apply_events(vec![
            CounterEvent::Opened,
            CounterEvent::Bumped { by: 3 },
            CounterEvent::Bumped { by: 4 },
        ]);

        assert!(counter.id().is_some());
        assert_eq!(counter.value, 7);
    }

    #[test]
    fn snapshot_due_at_interval() {
        let mut counter = Counter::default();
        assert!(!counter.should_snapshot());

        counter.set_version(Version::new(100));
        assert!(counter.should_snapshot());

        counter.set_version(Version::new(101));
        assert!(!counter.should_snapshot());
    }
}
