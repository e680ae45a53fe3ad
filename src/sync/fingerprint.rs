// file: src/sync/fingerprint.rs
use crate::models::{SinkEvent, SourceRecord};
use crate::translator::CompiledTemplate;

const SOURCE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";
const SINK_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Snapshot of everything that decides what a group's calendar should look
/// like. Two runs with equal fingerprints would produce the same events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFingerprint {
    pub source_groups_hash: String,
    pub source_record_ids_hash: String,
    pub source_max_modified: String,
    pub sink_event_ids_hash: String,
    pub sink_max_modified: String,
    pub template_signature: String,
}

impl GroupFingerprint {
    pub fn compute(
        source_groups: &[String],
        records: &[SourceRecord],
        sink_events: &[SinkEvent],
        template: &CompiledTemplate,
    ) -> Self {
        let source_max_modified = records
            .iter()
            .map(|r| r.modified)
            .max()
            .map(|m| m.format(SOURCE_TIME_FORMAT).to_string())
            .unwrap_or_default();

        let mut fingerprint = Self {
            source_groups_hash: join_sorted(source_groups.iter().map(String::as_str)),
            source_record_ids_hash: join_sorted(records.iter().map(|r| r.id.as_str())),
            source_max_modified,
            template_signature: template.signature(),
            ..Self::default()
        };
        fingerprint.set_sink_side(sink_events);
        fingerprint
    }

    /// Replaces only the sink-derived fields, keeping the source side and
    /// template signature as they were.
    pub fn with_sink_events(mut self, sink_events: &[SinkEvent]) -> Self {
        self.set_sink_side(sink_events);
        self
    }

    fn set_sink_side(&mut self, sink_events: &[SinkEvent]) {
        self.sink_event_ids_hash = join_sorted(sink_events.iter().map(|e| e.id.as_str()));
        self.sink_max_modified = sink_events
            .iter()
            .map(|e| e.updated_at)
            .max()
            .map(|m| m.format(SINK_TIME_FORMAT).to_string())
            .unwrap_or_default();
    }
}

fn join_sorted<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let mut ids: Vec<&str> = ids.collect();
    ids.sort_unstable();
    ids.join(":")
}
