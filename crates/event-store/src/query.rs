use crate::{AggregateId, Version};

/// Filter criteria for reading events across streams.
///
/// Used to slice one aggregate's history (an order's audit trail, a
/// product's ledger) by event type or version range.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Restrict to one aggregate stream.
    pub aggregate_id: Option<AggregateId>,

    /// Restrict to one aggregate type.
    pub aggregate_type: Option<String>,

    /// Restrict to any of these event types.
    pub event_types: Option<Vec<String>>,

    /// Minimum stream position (inclusive).
    pub from_version: Option<Version>,

    /// Maximum stream position (inclusive).
    pub to_version: Option<Version>,

    /// Maximum number of events to return.
    pub limit: Option<usize>,
}

impl EventQuery {
    /// Creates an unrestricted query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Query scoped to a single aggregate stream.
    pub fn for_aggregate(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id: Some(aggregate_id),
            ..Default::default()
        }
    }

    /// Query scoped to a single event type.
    pub fn for_event_type(event_type: impl Into<String>) -> Self {
        Self {
            event_types: Some(vec![event_type.into()]),
            ..Default::default()
        }
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types = Some(vec![event_type.into()]);
        self
    }

    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    pub fn from_version(mut self, version: Version) -> Self {
        self.from_version = Some(version);
        self
    }

    pub fn to_version(mut self, version: Version) -> Self {
        self.to_version = Some(version);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_to_aggregate() {
        let id = AggregateId::new();
        let query = EventQuery::for_aggregate(id);
        assert_eq!(query.aggregate_id, Some(id));
        assert!(query.event_types.is_none());
    }

    #[test]
    fn scoped_to_event_type() {
        let query = EventQuery::for_event_type("ProductListed");
        assert!(query.aggregate_id.is_none());
        assert_eq!(query.event_types, Some(vec!["ProductListed".to_string()]));
    }

    #[test]
    fn chained_filters() {
        let id = AggregateId::new();
        let query = EventQuery::new()
            .aggregate_id(id)
            .event_type("LineAdded")
            .from_version(Version::new(2))
            .to_version(Version::new(8))
            .limit(50);

        assert_eq!(query.aggregate_id, Some(id));
        assert_eq!(query.event_types, Some(vec!["LineAdded".to_string()]));
        assert_eq!(query.from_version, Some(Version::new(2)));
        assert_eq!(query.to_version, Some(Version::new(8)));
        assert_eq!(query.limit, Some(50));
    }
}
