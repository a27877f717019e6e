//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventRecord, EventStore, EventStoreExt, Snapshot, Version};
use serde::Serialize;

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// How many times services re-run a command after losing an
/// optimistic-concurrency race before giving up.
pub const CONFLICT_RETRIES: usize = 3;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events generated and persisted.
    pub events: Vec<A::Event>,

    /// Stream version after the command.
    pub new_version: Version,
}

/// Executes commands against one aggregate type.
///
/// The handler loads the aggregate (snapshot plus tail), runs the
/// command to produce events, and appends them expecting the version
/// it loaded. A concurrent writer on the same stream makes the append
/// fail with a conflict instead of losing either side's update; that
/// is the exclusive-lock discipline for every read-then-write here.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a handler over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// The underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate, returning a default instance for an unknown
    /// stream.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        A::Event: for<'de> serde::Deserialize<'de>,
    {
        let (snapshot, records) = self.store.load_for_rehydration(aggregate_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => serde_json::from_value(snapshot.state)?,
            None => A::default(),
        };

        for record in records {
            let event: A::Event = serde_json::from_value(record.payload)?;
            aggregate.apply(event);
            aggregate.set_version(record.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, or `None` if it has no events.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        A::Event: for<'de> serde::Deserialize<'de>,
    {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Executes a command and persists the resulting events.
    ///
    /// `command_fn` sees the current state and returns the events to
    /// apply, or a rejection.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        A::Event: for<'de> serde::Deserialize<'de> + Serialize,
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        let records = self.build_records(aggregate_id, current_version, &events)?;

        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };

        let new_version = self.store.append(records, options).await?;

        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Executes a command, re-running it on a lost concurrency race.
    ///
    /// Each attempt reloads the aggregate, so the command re-validates
    /// against fresh state. Suitable for commands whose inputs do not
    /// depend on reads outside this stream.
    pub async fn execute_with_retry<F>(
        &self,
        aggregate_id: AggregateId,
        mut command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        A::Event: for<'de> serde::Deserialize<'de> + Serialize,
        F: FnMut(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.execute(aggregate_id, &mut command_fn).await {
                Err(e) if e.is_conflict() && attempt < CONFLICT_RETRIES => {
                    tracing::debug!(%aggregate_id, attempt, "retrying after concurrency conflict");
                    metrics::counter!("command_conflict_retries_total").increment(1);
                }
                other => return other,
            }
        }
    }

    fn build_records(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventRecord>, DomainError>
    where
        A::Event: Serialize,
    {
        let mut records = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let record = EventRecord::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build();
            records.push(record);
        }

        Ok(records)
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    /// Executes a command and saves a snapshot when one is due.
    pub async fn execute_with_snapshot<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        A: for<'de> serde::Deserialize<'de>,
        A::Event: for<'de> serde::Deserialize<'de> + Serialize,
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let result = self.execute(aggregate_id, command_fn).await?;

        if result.aggregate.should_snapshot() {
            let snapshot = Snapshot::from_state(
                aggregate_id,
                A::aggregate_type(),
                result.new_version,
                &result.aggregate,
            )?;
            self.store.save_snapshot(snapshot).await?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::InMemoryEventStore;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum StallEvent {
        Opened { name: String },
        Restocked { crates: i32 },
    }

    impl DomainEvent for StallEvent {
        fn event_type(&self) -> &'static str {
            match self {
                StallEvent::Opened { .. } => "StallOpened",
                StallEvent::Restocked { .. } => "StallRestocked",
            }
        }
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Stall {
        id: Option<AggregateId>,
        name: String,
        crates: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    enum StallError {
        #[error("invalid crate count: {0}")]
        InvalidCrates(i32),
    }

    impl Aggregate for Stall {
        type Event = StallEvent;
        type Error = StallError;

        fn aggregate_type() -> &'static str {
            "Stall"
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
                StallEvent::Opened { name } => {
                    if self.id.is_none() {
                        self.id = Some(AggregateId::new());
                    }
                    self.name = name;
                }
                StallEvent::Restocked { crates } => self.crates += crates,
            }
        }
    }

    impl From<StallError> for DomainError {
        fn from(e: StallError) -> Self {
            DomainError::AggregateNotFound {
                aggregate_type: "Stall",
                aggregate_id: format!("{e:?}"),
            }
        }
    }

    #[tokio::test]
    async fn execute_creates_aggregate() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Stall> = CommandHandler::new(store);
        let id = AggregateId::new();

        let result = handler
            .execute(id, |_| {
                Ok(vec![StallEvent::Opened {
                    name: "Ferme du Nord".to_string(),
                }])
            })
            .await
            .unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.aggregate.name, "Ferme du Nord");
    }

    #[tokio::test]
    async fn execute_advances_version() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Stall> = CommandHandler::new(store);
        let id = AggregateId::new();

        handler
            .execute(id, |_| {
                Ok(vec![StallEvent::Opened {
                    name: "stall".to_string(),
                }])
            })
            .await
            .unwrap();

        let result = handler
            .execute(id, |_| Ok(vec![StallEvent::Restocked { crates: 5 }]))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.crates, 5);
    }

    #[tokio::test]
    async fn rejection_propagates() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Stall> = CommandHandler::new(store);

        let result = handler
            .execute(AggregateId::new(), |_| Err(StallError::InvalidCrates(-1)))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn load_existing_none_for_unknown_stream() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Stall> = CommandHandler::new(store);

        let result = handler.load_existing(AggregateId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn empty_event_list_persists_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Stall> = CommandHandler::new(store.clone());

        let result = handler
            .execute(AggregateId::new(), |_| Ok(vec![]))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.record_count().await, 0);
    }

    // block_in_place needs the multi-thread runtime.
    #[tokio::test(flavor = "multi_thread")]
    async fn retry_rexecutes_after_conflict() {
        // Seed the stream, then make the first attempt observe a stale
        // version by racing a second writer between load and append.
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Stall> = CommandHandler::new(store.clone());
        let id = AggregateId::new();

        handler
            .execute(id, |_| {
                Ok(vec![StallEvent::Opened {
                    name: "stall".to_string(),
                }])
            })
            .await
            .unwrap();

        let mut first_attempt = true;
        let result = handler
            .execute_with_retry(id, |_| {
                if first_attempt {
                    first_attempt = false;
                    // Simulate the race by appending out-of-band.
                    let store = store.clone();
                    let handle = tokio::runtime::Handle::current();
                    let record = EventRecord::builder()
                        .aggregate_id(id)
                        .aggregate_type("Stall")
                        .event_type("StallRestocked")
                        .version(Version::new(2))
                        .payload(&StallEvent::Restocked { crates: 1 })
                        .unwrap()
                        .build();
                    tokio::task::block_in_place(|| {
                        handle.block_on(store.append(vec![record], AppendOptions::new()))
                    })
                    .unwrap();
                }
                Ok(vec![StallEvent::Restocked { crates: 2 }])
            })
            .await;

        let result = result.unwrap();
        // Both the racing append and the retried command are applied.
        assert_eq!(result.aggregate.crates, 3);
        assert_eq!(result.new_version, Version::new(3));
    }
}
