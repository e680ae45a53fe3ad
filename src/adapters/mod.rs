//! Ports to the two external systems.
//!
//! The reconciler only talks to the scheduling system and the calendar
//! through these traits, so tests can swap in fakes or mocks.

use crate::error::SyncResult;
use crate::models::{CreatedEvent, SinkEvent, SinkEventPayload, SourceRecord};
use crate::translator::FieldManifest;
use async_trait::async_trait;

pub mod canvas;
pub mod timeedit;

pub use canvas::CanvasClient;
pub use timeedit::TimeEditClient;

/// Read side: the scheduling system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Records currently booked on any of `source_groups`, carrying the
    /// fields named in `manifest`. An empty group list yields an empty result.
    async fn fetch_records(&self, source_groups: &[String], manifest: &FieldManifest) -> SyncResult<Vec<SourceRecord>>;

    /// Link back to the record in the scheduling system's web view.
    fn record_url(&self, record_id: &str) -> String;
}

/// Write side: the calendar.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SinkAdapter: Send + Sync {
    /// Events of `sink_group` whose title carries the tag marker.
    async fn list_tagged_events(&self, sink_group: &str) -> SyncResult<Vec<SinkEvent>>;

    async fn create_event(&self, sink_group: &str, payload: &SinkEventPayload) -> SyncResult<CreatedEvent>;

    /// Deleting an event that is already gone succeeds.
    async fn delete_event(&self, event_id: &str) -> SyncResult<()>;
}
