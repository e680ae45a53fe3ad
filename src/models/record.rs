// file: src/models/record.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One reservation from the scheduling system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub modified: NaiveDateTime,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    /// Attributes of the reservation itself, addressed by `reservation`
    /// selectors, in the order the source returned them.
    pub top_level_fields: Vec<(String, String)>,
    /// Nested objects, in the order the source returned them.
    pub objects: Vec<TypedObject>,
}

/// A nested object of a reservation (room, person, activity, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedObject {
    pub kind: String,
    pub id: String,
    /// Field name and value pairs, in source order.
    pub fields: Vec<(String, String)>,
}

impl TypedObject {
    pub fn new(kind: &str, id: &str) -> Self {
        Self {
            kind: kind.to_string(),
            id: id.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: &str, value: &str) -> Self {
        set_field(&mut self.fields, field, value);
        self
    }

    pub fn field(&self, field: &str) -> Option<&str> {
        get_field(&self.fields, field)
    }
}

impl SourceRecord {
    pub fn new(id: &str, modified: NaiveDateTime, start_at: NaiveDateTime, end_at: NaiveDateTime) -> Self {
        Self {
            id: id.to_string(),
            modified,
            start_at,
            end_at,
            top_level_fields: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn with_object(mut self, object: TypedObject) -> Self {
        self.objects.push(object);
        self
    }

    pub fn with_top_level_field(mut self, field: &str, value: &str) -> Self {
        set_field(&mut self.top_level_fields, field, value);
        self
    }

    pub fn top_level_field(&self, field: &str) -> Option<&str> {
        get_field(&self.top_level_fields, field)
    }
}

/// Overwrites in place so a repeated name keeps its first position.
fn set_field(fields: &mut Vec<(String, String)>, field: &str, value: &str) {
    match fields.iter_mut().find(|(name, _)| name == field) {
        Some((_, existing)) => *existing = value.to_string(),
        None => fields.push((field.to_string(), value.to_string())),
    }
}

fn get_field<'a>(fields: &'a [(String, String)], field: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(name, _)| name == field)
        .map(|(_, value)| value.as_str())
}
