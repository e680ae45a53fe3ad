// canvas-sync library
// Reconciles TimeEdit reservations into Canvas calendar events per group mapping

pub mod adapters;
pub mod config;
pub mod database;
pub mod error;
pub mod http_config;
pub mod models;
pub mod sync;
pub mod translator;
pub mod utils;

// Re-export commonly used types
pub use adapters::{SinkAdapter, SourceAdapter};
pub use database::Database;
pub use error::{MappingConflict, SyncError, SyncResult};
pub use models::{
    Category, GroupMapping, GroupOutcome, SinkEvent, SinkEventPayload, SourceRecord, SyncReport, SyncStatus,
    TemplateRule, TypedObject,
};
pub use sync::Reconciler;
