#![allow(dead_code)]

use async_trait::async_trait;
use canvas_sync::database::Database;
use canvas_sync::error::{SyncError, SyncResult};
use canvas_sync::models::{Category, CreatedEvent, SinkEvent, SinkEventPayload, SourceRecord, TypedObject};
use canvas_sync::translator::{is_tagged, FieldManifest};
use canvas_sync::{SinkAdapter, SourceAdapter};
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;

pub async fn create_test_database() -> Database {
    let temp_file = NamedTempFile::new().unwrap();
    let (_, path) = temp_file.keep().unwrap();
    let db_url = format!("sqlite:{}", path.to_str().unwrap());

    Database::connect(&db_url).await.unwrap()
}

/// person/room/date template as the fallback for every group.
pub async fn add_default_template(db: &Database) {
    db.add_template_rule(Category::Title, "person", "firstname", None).await.unwrap();
    db.add_template_rule(Category::Location, "room", "name", None).await.unwrap();
    db.add_template_rule(Category::Description, "date", "weekday", None).await.unwrap();
}

pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2022, 3, day).unwrap().and_hms_opt(hour, 0, 0).unwrap()
}

pub fn reservation(id: &str, person: &str) -> SourceRecord {
    SourceRecord::new(id, at(1, 12), at(25, 8), at(25, 10))
        .with_object(TypedObject::new("person", person).with_field("firstname", person))
        .with_object(TypedObject::new("room", "R1").with_field("name", "Room 1"))
        .with_object(TypedObject::new("date", "2022-03-25").with_field("weekday", "Friday"))
}

/// Scheduling system with reservations per source group.
#[derive(Default)]
pub struct FakeSource {
    records: Mutex<HashMap<String, Vec<SourceRecord>>>,
    pub fetch_calls: AtomicUsize,
    pub empty_fetches: AtomicUsize,
    pub failing: AtomicBool,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, source_group: &str, record: SourceRecord) {
        self.records
            .lock()
            .unwrap()
            .entry(source_group.to_string())
            .or_default()
            .push(record);
    }

    pub fn clear(&self, source_group: &str) {
        self.records.lock().unwrap().remove(source_group);
    }

    /// Record id -> source group it was booked on.
    pub fn owner_of(&self, record_id: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|(_, records)| records.iter().any(|r| r.id == record_id))
            .map(|(group, _)| group.clone())
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for FakeSource {
    async fn fetch_records(&self, source_groups: &[String], _manifest: &FieldManifest) -> SyncResult<Vec<SourceRecord>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if source_groups.is_empty() {
            self.empty_fetches.fetch_add(1, Ordering::SeqCst);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SyncError::source_adapter("connection reset"));
        }

        let records = self.records.lock().unwrap();
        let mut found: Vec<SourceRecord> = Vec::new();
        for group in source_groups {
            for record in records.get(group).into_iter().flatten() {
                if !found.iter().any(|r| r.id == record.id) {
                    found.push(record.clone());
                }
            }
        }
        Ok(found)
    }

    fn record_url(&self, record_id: &str) -> String {
        format!("https://cloud.timeedit.net/test/web/public/ri.html?id={}", record_id)
    }
}

#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub sink_group: String,
    pub payload: SinkEventPayload,
}

/// Calendar keeping events in memory. Counts every call and can be told to
/// fail creations after a number of successes.
#[derive(Default)]
pub struct FakeSink {
    events: Mutex<BTreeMap<String, StoredEvent>>,
    next_id: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    fail_creates_after: Mutex<Option<usize>>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    flag_on_delete: Mutex<Option<(Database, String, String)>>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        let sink = Self::default();
        *sink.latency.lock().unwrap() = Some(latency);
        sink
    }

    pub fn fail_creates_after(&self, successes: Option<usize>) {
        *self.fail_creates_after.lock().unwrap() = successes;
    }

    /// An event someone added by hand in the course calendar.
    pub fn add_untagged(&self, sink_group: &str, title: &str) -> String {
        let id = format!("manual{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let payload = SinkEventPayload {
            title: title.to_string(),
            location_name: String::new(),
            description: String::new(),
            start_at: at(1, 8),
            end_at: at(1, 9),
        };
        self.events.lock().unwrap().insert(
            id.clone(),
            StoredEvent {
                sink_group: sink_group.to_string(),
                payload,
            },
        );
        id
    }

    /// Flags `(sink_group, source_group)` for deletion while the next delete
    /// is in progress, as an administrator acting mid-sync would.
    pub fn flag_mapping_on_next_delete(&self, db: &Database, sink_group: &str, source_group: &str) {
        *self.flag_on_delete.lock().unwrap() = Some((db.clone(), sink_group.to_string(), source_group.to_string()));
    }

    pub fn events_for(&self, sink_group: &str) -> Vec<(String, StoredEvent)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| e.sink_group == sink_group)
            .map(|(id, e)| (id.clone(), e.clone()))
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.events.lock().unwrap().contains_key(id)
    }

    /// Creates plus deletes, i.e. calls that change the calendar.
    pub fn mutations(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst) + self.delete_calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SinkAdapter for FakeSink {
    async fn list_tagged_events(&self, sink_group: &str) -> SyncResult<Vec<SinkEvent>> {
        self.enter().await;
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let events = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| e.sink_group == sink_group && is_tagged(&e.payload.title))
            .map(|(id, e)| SinkEvent {
                id: id.clone(),
                title: e.payload.title.clone(),
                updated_at: Utc.with_ymd_and_hms(2022, 3, 1, 0, 0, 0).unwrap(),
            })
            .collect();
        self.leave();
        Ok(events)
    }

    async fn create_event(&self, sink_group: &str, payload: &SinkEventPayload) -> SyncResult<CreatedEvent> {
        self.enter().await;
        let attempt = self.create_calls.fetch_add(1, Ordering::SeqCst);
        let limit = *self.fail_creates_after.lock().unwrap();
        if let Some(limit) = limit {
            if attempt >= limit {
                self.leave();
                return Err(SyncError::sink_adapter("HTTP 503"));
            }
        }

        let id = format!("ev{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.events.lock().unwrap().insert(
            id.clone(),
            StoredEvent {
                sink_group: sink_group.to_string(),
                payload: payload.clone(),
            },
        );
        self.leave();
        Ok(CreatedEvent { id })
    }

    async fn delete_event(&self, event_id: &str) -> SyncResult<()> {
        self.enter().await;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let pending = self.flag_on_delete.lock().unwrap().take();
        if let Some((db, sink_group, source_group)) = pending {
            db.flag_mapping_for_deletion(&sink_group, &source_group).await.unwrap();
        }
        self.events.lock().unwrap().remove(event_id);
        self.leave();
        Ok(())
    }
}
