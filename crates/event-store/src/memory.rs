use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventQuery, EventRecord, EventStoreError, Result, Snapshot, Version,
    store::{AppendOptions, EventStore, EventStream, validate_batch},
};

#[derive(Default)]
struct Inner {
    /// All records in insertion order.
    log: Vec<EventRecord>,
    /// Indexes into `log` per aggregate stream, in version order.
    streams: HashMap<AggregateId, Vec<usize>>,
    snapshots: HashMap<AggregateId, Snapshot>,
}

impl Inner {
    fn stream_version(&self, aggregate_id: AggregateId) -> Version {
        self.streams
            .get(&aggregate_id)
            .and_then(|idx| idx.last())
            .map(|&i| self.log[i].version)
            .unwrap_or(Version::initial())
    }
}

/// In-memory event store used by unit tests and benchmarks.
///
/// Behaves like the PostgreSQL store, including the expected-version
/// conflict semantics.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records stored.
    pub async fn record_count(&self) -> usize {
        self.inner.read().await.log.len()
    }

    /// Drops all records and snapshots.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.log.clear();
        inner.streams.clear();
        inner.snapshots.clear();
    }
}

fn matches_query(record: &EventRecord, query: &EventQuery) -> bool {
    if let Some(id) = query.aggregate_id
        && record.aggregate_id != id
    {
        return false;
    }
    if let Some(ref aggregate_type) = query.aggregate_type
        && &record.aggregate_type != aggregate_type
    {
        return false;
    }
    if let Some(ref types) = query.event_types
        && !types.contains(&record.event_type)
    {
        return false;
    }
    if let Some(from) = query.from_version
        && record.version < from
    {
        return false;
    }
    if let Some(to) = query.to_version
        && record.version > to
    {
        return false;
    }
    true
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, records: Vec<EventRecord>, options: AppendOptions) -> Result<Version> {
        validate_batch(&records)?;

        let aggregate_id = records[0].aggregate_id;
        let mut inner = self.inner.write().await;

        let current = inner.stream_version(aggregate_id);

        if let Some(expected) = options.expected_version
            && current != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current,
            });
        }

        // Mirror the unique (aggregate_id, version) constraint.
        if records[0].version <= current && current != Version::initial() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        let last_version = records
            .last()
            .map(|r| r.version)
            .unwrap_or(Version::initial());

        for record in records {
            let index = inner.log.len();
            inner.log.push(record);
            inner.streams.entry(aggregate_id).or_default().push(index);
        }

        metrics::counter!("event_store_records_appended_total").increment(1);
        Ok(last_version)
    }

    async fn events_for(&self, aggregate_id: AggregateId) -> Result<Vec<EventRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .streams
            .get(&aggregate_id)
            .map(|idx| idx.iter().map(|&i| inner.log[i].clone()).collect())
            .unwrap_or_default())
    }

    async fn events_from(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventRecord>> {
        let records = self.events_for(aggregate_id).await?;
        Ok(records
            .into_iter()
            .filter(|r| r.version >= from_version)
            .collect())
    }

    async fn query(&self, query: EventQuery) -> Result<Vec<EventRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<_> = inner
            .log
            .iter()
            .filter(|r| matches_query(r, &query))
            .cloned()
            .collect();

        records.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.version.cmp(&b.version))
        });

        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn events_of_type(&self, event_type: &str) -> Result<Vec<EventRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<_> = inner
            .log
            .iter()
            .filter(|r| r.event_type == event_type)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(records)
    }

    async fn stream_all(&self) -> Result<EventStream> {
        use futures_util::stream;

        let inner = self.inner.read().await;
        let records = inner.log.clone();
        Ok(Box::pin(stream::iter(records.into_iter().map(Ok))))
    }

    async fn aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let inner = self.inner.read().await;
        let version = inner.stream_version(aggregate_id);
        Ok((version != Version::initial()).then_some(version))
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.snapshots.insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn load_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        let inner = self.inner.read().await;
        Ok(inner.snapshots.get(&aggregate_id).cloned())
    }
}
