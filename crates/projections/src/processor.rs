//! Feeds events from the store into registered projections.

use event_store::{EventRecord, EventStore};
use futures_util::StreamExt;

use crate::Result;
use crate::projection::Projection;

/// Delivers store events to projections.
///
/// Supports catch-up (replay everything a projection has not seen),
/// single-event delivery for live updates, and full rebuild.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams all events from the store and delivers each to every
    /// projection that has not already seen it.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let mut stream = self.store.stream_all().await?;
        let mut event_index: u64 = 0;

        while let Some(result) = stream.next().await {
            let record = result?;
            event_index += 1;

            for projection in &self.projections {
                let pos = projection.position().await;
                if pos.events_processed < event_index {
                    projection.handle(&record).await?;
                    metrics::counter!("projections_events_processed").increment(1);
                }
            }
        }

        tracing::info!(events_processed = event_index, "catch-up complete");
        Ok(())
    }

    /// Delivers one event to all registered projections.
    #[tracing::instrument(skip(self, record), fields(event_type = %record.event_type))]
    pub async fn process_event(&self, record: &EventRecord) -> Result<()> {
        for projection in &self.projections {
            projection.handle(record).await?;
        }
        Ok(())
    }

    /// Resets every projection and replays the whole store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ProjectionPosition;
    use async_trait::async_trait;
    use common::AggregateId;
    use event_store::{AppendOptions, InMemoryEventStore, Version};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    struct CountingProjection {
        count: Arc<RwLock<u64>>,
        position: Arc<RwLock<ProjectionPosition>>,
    }

    impl CountingProjection {
        fn new() -> Self {
            Self {
                count: Arc::new(RwLock::new(0)),
                position: Arc::new(RwLock::new(ProjectionPosition::zero())),
            }
        }
    }

    #[async_trait]
    impl Projection for CountingProjection {
        fn name(&self) -> &'static str {
            "CountingProjection"
        }

        async fn handle(&self, _record: &EventRecord) -> Result<()> {
            *self.count.write().await += 1;
            let mut pos = self.position.write().await;
            *pos = pos.advance();
            Ok(())
        }

        async fn position(&self) -> ProjectionPosition {
            *self.position.read().await
        }

        async fn reset(&self) -> Result<()> {
            *self.count.write().await = 0;
            *self.position.write().await = ProjectionPosition::zero();
            Ok(())
        }
    }

    fn test_record(aggregate_id: AggregateId, version: i64) -> EventRecord {
        EventRecord::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Order")
            .event_type("TestEvent")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"test": true}))
            .build()
    }

    async fn seeded_store(count: i64) -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        let records = (1..=count).map(|v| test_record(id, v)).collect();
        store.append(records, AppendOptions::new()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn catch_up_processes_all_events() {
        let store = seeded_store(3).await;
        let projection = CountingProjection::new();
        let count_ref = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(projection));
        processor.run_catch_up().await.unwrap();

        assert_eq!(*count_ref.read().await, 3);
    }

    #[tokio::test]
    async fn catch_up_skips_already_processed() {
        let store = seeded_store(3).await;
        let projection = CountingProjection::new();
        let count_ref = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(projection));

        processor.run_catch_up().await.unwrap();
        processor.run_catch_up().await.unwrap();
        assert_eq!(*count_ref.read().await, 3);
    }

    #[tokio::test]
    async fn rebuild_resets_and_replays() {
        let store = seeded_store(2).await;
        let projection = CountingProjection::new();
        let count_ref = Arc::clone(&projection.count);
        let pos_ref = Arc::clone(&projection.position);

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(projection));

        processor.run_catch_up().await.unwrap();
        processor.rebuild_all().await.unwrap();

        assert_eq!(*count_ref.read().await, 2);
        assert_eq!(pos_ref.read().await.events_processed, 2);
    }

    #[tokio::test]
    async fn process_single_event() {
        let store = InMemoryEventStore::new();
        let projection = CountingProjection::new();
        let count_ref = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(projection));

        let record = test_record(AggregateId::new(), 1);
        processor.process_event(&record).await.unwrap();
        assert_eq!(*count_ref.read().await, 1);
    }

    #[tokio::test]
    async fn empty_store_catch_up() {
        let store = InMemoryEventStore::new();
        let projection = CountingProjection::new();
        let count_ref = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(projection));

        processor.run_catch_up().await.unwrap();
        assert_eq!(*count_ref.read().await, 0);
    }

    #[tokio::test]
    async fn multiple_projections_all_fed() {
        let store = seeded_store(2).await;
        let first = CountingProjection::new();
        let second = CountingProjection::new();
        let count1 = Arc::clone(&first.count);
        let count2 = Arc::clone(&second.count);

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(first));
        processor.register(Box::new(second));

        processor.run_catch_up().await.unwrap();
        assert_eq!(*count1.read().await, 2);
        assert_eq!(*count2.read().await, 2);
    }
}
