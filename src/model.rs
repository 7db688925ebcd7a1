//! Typed rows and form payloads for the Zoo Database schema

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Accept ids as either JSON strings or numbers; PostgREST emits numbers
/// for serial keys and strings for uuids.
fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Flatten embedded `breed_tags(tag)` rows into plain tag strings
fn de_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct TagRow {
        tag: String,
    }
    let rows = Vec::<TagRow>::deserialize(deserializer)?;
    Ok(rows.into_iter().map(|r| r.tag).collect())
}

/// Trim a form field; empty becomes JSON null so the column is cleared
fn trimmed_or_null(value: &str) -> Value {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Value::Null
    } else {
        Value::String(trimmed.to_string())
    }
}

/// A kind of animal (Dog, Cat, ...); breeds hang off it
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PetType {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
}

/// One breed row, with tags flattened from the embedded join
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Breed {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub pet_type_id: String,
    pub name: String,
    #[serde(default)]
    pub proper_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Direct URL or an `sb://bucket/path` storage pointer
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub lifespan: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub height_weight: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default, rename = "breed_tags", deserialize_with = "de_tags")]
    pub tags: Vec<String>,
}

/// Editable breed form state. All fields are plain strings; `to_row`
/// applies the trim/null/omit rules the server expects.
#[derive(Debug, Clone, Default)]
pub struct BreedDraft {
    /// Existing row id, or empty to insert a new breed
    pub id: String,
    pub pet_type_id: String,
    pub name: String,
    pub proper_name: String,
    pub description: String,
    pub image_url: String,
    pub lifespan: String,
    pub size: String,
    pub height_weight: String,
    pub group: String,
    pub origin: String,
}

impl BreedDraft {
    /// Start a draft from an existing row
    pub fn from_breed(b: &Breed) -> Self {
        let field = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            id: b.id.clone(),
            pet_type_id: b.pet_type_id.clone(),
            name: b.name.clone(),
            proper_name: field(&b.proper_name),
            description: field(&b.description),
            image_url: field(&b.image_url),
            lifespan: field(&b.lifespan),
            size: field(&b.size),
            height_weight: field(&b.height_weight),
            group: field(&b.group),
            origin: field(&b.origin),
        }
    }

    /// Upsert payload: fields trimmed, empty optionals as null, a blank
    /// id omitted entirely so the row inserts instead of updating.
    pub fn to_row(&self) -> Value {
        let mut row = json!({
            "pet_type_id": self.pet_type_id,
            "name": self.name.trim(),
            "proper_name": trimmed_or_null(&self.proper_name),
            "description": trimmed_or_null(&self.description),
            "image_url": trimmed_or_null(&self.image_url),
            "lifespan": trimmed_or_null(&self.lifespan),
            "size": trimmed_or_null(&self.size),
            "height_weight": trimmed_or_null(&self.height_weight),
            "group": trimmed_or_null(&self.group),
            "origin": trimmed_or_null(&self.origin),
        });
        if !self.id.trim().is_empty() {
            row["id"] = Value::String(self.id.trim().to_string());
        }
        row
    }
}

/// A care-sheet section; `sort_order` fixes the rendering sequence
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CareCategory {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
}

/// Editable category form state
#[derive(Debug, Clone, Default)]
pub struct CategoryDraft {
    /// Existing row id, or empty to insert
    pub id: String,
    pub name: String,
    pub icon: String,
    pub sort_order: i64,
}

impl CategoryDraft {
    /// Upsert payload; a blank icon falls back to the pin marker
    pub fn to_row(&self) -> Value {
        let icon = self.icon.trim();
        let mut row = json!({
            "name": self.name.trim(),
            "icon": if icon.is_empty() { "📌" } else { icon },
            "sort_order": self.sort_order,
        });
        if !self.id.trim().is_empty() {
            row["id"] = Value::String(self.id.trim().to_string());
        }
        row
    }
}

/// Free-text guidance for one category of one breed, unique on
/// `(breed_id, category_id)`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CareGuide {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub breed_id: Option<String>,
    #[serde(deserialize_with = "de_id")]
    pub category_id: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// A user-owned care reminder; plain record, no scheduling attached
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reminder {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub breed_id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub due_on: Option<NaiveDate>,
    #[serde(default)]
    pub repeat_every_days: Option<i32>,
    pub is_active: bool,
}

/// Form state for creating or editing a reminder
#[derive(Debug, Clone, Default)]
pub struct ReminderDraft {
    /// Existing row id, or empty to insert
    pub id: String,
    pub breed_id: String,
    pub title: String,
    pub due_on: Option<NaiveDate>,
    pub repeat_every_days: Option<i32>,
    pub is_active: bool,
}

impl ReminderDraft {
    /// Upsert payload; the owning `user_id` is stamped by the caller
    pub fn to_row(&self, user_id: &str) -> Value {
        let mut row = json!({
            "breed_id": self.breed_id,
            "user_id": user_id,
            "title": self.title.trim(),
            "due_on": self.due_on,
            "repeat_every_days": self.repeat_every_days,
            "is_active": self.is_active,
        });
        if !self.id.trim().is_empty() {
            row["id"] = Value::String(self.id.trim().to_string());
        }
        row
    }
}

/// What a care-log entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Fed,
    WaterChange,
    Cleaned,
    Meds,
    Notes,
}

/// One append-only care-log row
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogEntry {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub breed_id: String,
    pub user_id: String,
    pub kind: LogKind,
    #[serde(default)]
    pub note: Option<String>,
    pub done_at: DateTime<Utc>,
}

/// Payload for appending a care-log entry
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub breed_id: String,
    pub kind: LogKind,
    pub note: Option<String>,
    /// Stamped with the current time when absent
    pub done_at: Option<DateTime<Utc>>,
}

impl NewLogEntry {
    pub fn to_row(&self, user_id: &str, now: DateTime<Utc>) -> Value {
        json!({
            "breed_id": self.breed_id,
            "user_id": user_id,
            "kind": self.kind,
            "note": self.note.as_deref().map(str::trim).filter(|n| !n.is_empty()),
            "done_at": self.done_at.unwrap_or(now),
        })
    }
}
