use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventQuery, EventRecord, EventStoreError, Result, Snapshot, Version};

/// Options controlling an append.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected stream version for optimistic concurrency control.
    /// With `None` no check is performed (use with caution).
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// No version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect the stream to currently be at `version`.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Expect the stream to not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// A stream of event records.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventRecord>> + Send>>;

/// Append-only event persistence.
///
/// Implementations must be thread-safe; appends to a single aggregate
/// stream are serialized by the expected-version check, which is the
/// locking discipline every read-then-write in the domain relies on.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of records atomically.
    ///
    /// Fails with [`EventStoreError::ConcurrencyConflict`] when the
    /// stream moved past `options.expected_version`. Returns the new
    /// stream version.
    async fn append(&self, records: Vec<EventRecord>, options: AppendOptions) -> Result<Version>;

    /// All records of one aggregate stream, in version order.
    async fn events_for(&self, aggregate_id: AggregateId) -> Result<Vec<EventRecord>>;

    /// Records of one stream starting at `from_version` (inclusive).
    /// Used when replaying on top of a snapshot.
    async fn events_from(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventRecord>>;

    /// Records matching a filter.
    async fn query(&self, query: EventQuery) -> Result<Vec<EventRecord>>;

    /// Records of one event type across all streams, oldest first.
    async fn events_of_type(&self, event_type: &str) -> Result<Vec<EventRecord>>;

    /// Streams every record in the store in insertion order.
    async fn stream_all(&self) -> Result<EventStream>;

    /// Current version of a stream, or `None` if it does not exist.
    async fn aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Saves a snapshot, replacing any previous one for the aggregate.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    /// Latest snapshot for an aggregate, if any.
    async fn load_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>>;
}

/// Convenience methods shared by all stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single record.
    async fn append_one(&self, record: EventRecord, options: AppendOptions) -> Result<Version> {
        self.append(vec![record], options).await
    }

    /// True if the stream has at least one event.
    async fn stream_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.aggregate_version(aggregate_id).await?.is_some())
    }

    /// Loads a stream for rehydration: latest snapshot (if any) plus
    /// the records after it.
    async fn load_for_rehydration(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<(Option<Snapshot>, Vec<EventRecord>)> {
        if let Some(snapshot) = self.load_snapshot(aggregate_id).await? {
            let records = self
                .events_from(aggregate_id, snapshot.version.next())
                .await?;
            Ok((Some(snapshot), records))
        } else {
            let records = self.events_for(aggregate_id).await?;
            Ok((None, records))
        }
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before appending: non-empty, single stream, and
/// strictly sequential versions.
pub fn validate_batch(records: &[EventRecord]) -> Result<()> {
    let Some(first) = records.first() else {
        return Err(EventStoreError::InvalidBatch(
            "cannot append an empty batch".to_string(),
        ));
    };

    for record in records.iter().skip(1) {
        if record.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidBatch(
                "all records in a batch must belong to one aggregate".to_string(),
            ));
        }
        if record.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidBatch(
                "all records in a batch must share the aggregate type".to_string(),
            ));
        }
    }

    let mut expected = first.version;
    for record in records.iter().skip(1) {
        expected = expected.next();
        if record.version != expected {
            return Err(EventStoreError::InvalidBatch(format!(
                "versions must be sequential: expected {expected}, got {}",
                record.version
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(aggregate_id: AggregateId, version: i64) -> EventRecord {
        EventRecord::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Order")
            .event_type("LineAdded")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
    }

    #[test]
    fn empty_batch_rejected() {
        assert!(matches!(
            validate_batch(&[]),
            Err(EventStoreError::InvalidBatch(_))
        ));
    }

    #[test]
    fn mixed_aggregates_rejected() {
        let batch = vec![record(AggregateId::new(), 1), record(AggregateId::new(), 2)];
        assert!(matches!(
            validate_batch(&batch),
            Err(EventStoreError::InvalidBatch(_))
        ));
    }

    #[test]
    fn version_gap_rejected() {
        let id = AggregateId::new();
        let batch = vec![record(id, 1), record(id, 3)];
        assert!(matches!(
            validate_batch(&batch),
            Err(EventStoreError::InvalidBatch(_))
        ));
    }

    #[test]
    fn sequential_batch_accepted() {
        let id = AggregateId::new();
        let batch = vec![record(id, 1), record(id, 2), record(id, 3)];
        assert!(validate_batch(&batch).is_ok());
    }
}
