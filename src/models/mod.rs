// Declare modules
pub mod event;
pub mod mapping;
pub mod record;
pub mod sync;
pub mod template;

// Flatten so callers can `use crate::models::GroupMapping`.
pub use event::{CreatedEvent, SinkEvent, SinkEventPayload};
pub use mapping::{DerivedEventLink, GroupMapping, MappingState};
pub use record::{SourceRecord, TypedObject};
pub use sync::{GroupOutcome, SyncReport, SyncStatus};
pub use template::{Category, TemplateCoverage, TemplateRule, DEFAULT_SCOPE, RECORD_KIND};
