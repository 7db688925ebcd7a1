//! Typed CRUD over the persistence gateway

use chrono::Utc;
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gateway::{ListQuery, PersistenceGateway, Row};
use crate::image::{normalize_image, ImageSpec};
use crate::model::{
    Breed, BreedDraft, CareCategory, CareGuide, CategoryDraft, LogEntry, NewLogEntry, PetType,
    Reminder, ReminderDraft,
};
use crate::tags::normalize_set;

fn decode_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(row)?)
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter().map(decode_row).collect()
}

/// The application's data operations, typed on both sides of the
/// gateway. Destructive calls (`delete_*`) are irreversible; callers
/// are expected to confirm with the user first.
pub struct Catalog {
    gateway: Arc<dyn PersistenceGateway>,
    image_bucket: String,
    image_spec: ImageSpec,
    log_fetch_limit: u32,
}

impl Catalog {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, config: &Config) -> Self {
        Self {
            gateway,
            image_bucket: config.image_bucket.clone(),
            image_spec: config.image_spec,
            log_fetch_limit: config.log_fetch_limit,
        }
    }

    /// All pet types, by name
    pub async fn pet_types(&self) -> Result<Vec<PetType>> {
        let rows = self
            .gateway
            .fetch_rows(
                "pet_types",
                ListQuery::new().select("id,name").order("name", true),
            )
            .await?;
        decode_rows(rows)
    }

    /// Summary rows for one pet type's breeds, by name, with tags
    pub async fn breeds_for_type(&self, pet_type_id: &str) -> Result<Vec<Breed>> {
        let rows = self
            .gateway
            .fetch_rows(
                "breeds",
                ListQuery::new()
                    .select("id,name,image_url,pet_type_id,breed_tags(tag)")
                    .eq("pet_type_id", pet_type_id)
                    .order("name", true),
            )
            .await?;
        decode_rows(rows)
    }

    /// One breed with every column and its tags; `Ok(None)` if gone
    pub async fn breed(&self, id: &str) -> Result<Option<Breed>> {
        let row = self
            .gateway
            .fetch_one("breeds", id, "*,breed_tags(tag)")
            .await?;
        row.map(decode_row).transpose()
    }

    /// Insert or update a breed. Validation failures never reach the
    /// network. The returned row carries no tags; those are managed by
    /// [`Catalog::replace_tags`].
    pub async fn upsert_breed(&self, draft: &BreedDraft) -> Result<Breed> {
        if draft.pet_type_id.trim().is_empty() {
            return Err(Error::validation("pick a pet type for this breed"));
        }
        if draft.name.trim().is_empty() {
            return Err(Error::validation("breed name is required"));
        }
        let row = self.gateway.upsert("breeds", draft.to_row(), None).await?;
        decode_row(row)
    }

    /// Save a breed and then replace its tag set. The breed save failing
    /// aborts everything; the tag step failing after a persisted breed
    /// surfaces as a partial failure so the caller can say exactly that.
    pub async fn save_breed_with_tags(
        &self,
        draft: &BreedDraft,
        raw_tags: &[String],
    ) -> Result<Breed> {
        let mut breed = self.upsert_breed(draft).await?;
        match self.replace_tags(&breed.id, raw_tags).await {
            Ok(tags) => {
                breed.tags = tags;
                Ok(breed)
            }
            Err(e) => Err(Error::partial("breed saved", "tags failed", e)),
        }
    }

    /// Replace one breed's entire tag set: normalize and de-duplicate,
    /// delete every existing tag row, insert the survivors. Returns the
    /// set actually persisted. An insert failure after the delete went
    /// through is reported as partial so tags alone can be retried.
    pub async fn replace_tags(&self, breed_id: &str, raw_tags: &[String]) -> Result<Vec<String>> {
        let cleaned = normalize_set(raw_tags);
        debug!("replacing tags for breed {}: {:?}", breed_id, cleaned);

        self.gateway
            .delete_eq("breed_tags", "breed_id", breed_id)
            .await?;

        if cleaned.is_empty() {
            return Ok(cleaned);
        }

        let rows: Vec<Row> = cleaned
            .iter()
            .map(|tag| json!({"breed_id": breed_id, "tag": tag}))
            .collect();
        match self.gateway.insert_rows("breed_tags", rows).await {
            Ok(()) => Ok(cleaned),
            Err(e) => Err(Error::partial("tags cleared", "re-insert failed", e)),
        }
    }

    pub async fn delete_breed(&self, id: &str) -> Result<()> {
        self.gateway.delete_eq("breeds", "id", id).await
    }

    /// All care categories in their global rendering order
    pub async fn categories(&self) -> Result<Vec<CareCategory>> {
        let rows = self
            .gateway
            .fetch_rows(
                "care_categories",
                ListQuery::new()
                    .select("id,name,icon,sort_order")
                    .order("sort_order", true),
            )
            .await?;
        decode_rows(rows)
    }

    pub async fn upsert_category(&self, draft: &CategoryDraft) -> Result<CareCategory> {
        if draft.name.trim().is_empty() {
            return Err(Error::validation("category name is required"));
        }
        let row = self
            .gateway
            .upsert("care_categories", draft.to_row(), None)
            .await?;
        decode_row(row)
    }

    pub async fn delete_category(&self, id: &str) -> Result<()> {
        self.gateway.delete_eq("care_categories", "id", id).await
    }

    /// One breed's guide contents, keyed by category id. Missing content
    /// reads as empty text.
    pub async fn guides_for_breed(&self, breed_id: &str) -> Result<HashMap<String, String>> {
        let rows = self
            .gateway
            .fetch_rows(
                "care_guides",
                ListQuery::new()
                    .select("category_id,content")
                    .eq("breed_id", breed_id),
            )
            .await?;
        let guides: Vec<CareGuide> = decode_rows(rows)?;
        Ok(guides
            .into_iter()
            .map(|g| (g.category_id, g.content.unwrap_or_default()))
            .collect())
    }

    /// Whole-row upsert of one guide cell, last write wins
    pub async fn upsert_guide(&self, breed_id: &str, category_id: &str, content: &str) -> Result<()> {
        let row = json!({
            "breed_id": breed_id,
            "category_id": category_id,
            "content": content,
        });
        self.gateway
            .upsert("care_guides", row, Some("breed_id,category_id"))
            .await?;
        Ok(())
    }

    /// Normalize raw image bytes and upload them, returning the
    /// `sb://bucket/path` pointer to store on the breed. The pointer is
    /// resolved to a real URL at display time, never here.
    pub async fn upload_breed_image(&self, bytes: &[u8]) -> Result<String> {
        let normalized = normalize_image(bytes, &self.image_spec)?;
        let path = format!("{}.jpg", Uuid::new_v4());
        self.gateway
            .upload(&self.image_bucket, &path, normalized, "image/jpeg")
            .await?;
        Ok(format!("sb://{}/{}", self.image_bucket, path))
    }

    /// One user's reminders for a breed, soonest due first. No identity
    /// means no reminders, not an error.
    pub async fn reminders(
        &self,
        user_id: Option<&str>,
        breed_id: &str,
    ) -> Result<Vec<Reminder>> {
        let user_id = match user_id {
            Some(user_id) => user_id,
            None => return Ok(Vec::new()),
        };
        let rows = self
            .gateway
            .fetch_rows(
                "reminders",
                ListQuery::new()
                    .eq("user_id", user_id)
                    .eq("breed_id", breed_id)
                    .order("due_on", true),
            )
            .await?;
        decode_rows(rows)
    }

    pub async fn upsert_reminder(
        &self,
        user_id: &str,
        draft: &ReminderDraft,
    ) -> Result<Reminder> {
        if draft.title.trim().is_empty() {
            return Err(Error::validation("reminder title is required"));
        }
        if draft.breed_id.trim().is_empty() {
            return Err(Error::validation("a breed is required for a reminder"));
        }
        let row = self
            .gateway
            .upsert("reminders", draft.to_row(user_id), None)
            .await?;
        decode_row(row)
    }

    pub async fn delete_reminder(&self, id: &str) -> Result<()> {
        self.gateway.delete_eq("reminders", "id", id).await
    }

    /// The most recent care-log entries for one user and breed, newest
    /// first, capped at the configured window
    pub async fn recent_log_entries(
        &self,
        user_id: Option<&str>,
        breed_id: &str,
    ) -> Result<Vec<LogEntry>> {
        let user_id = match user_id {
            Some(user_id) => user_id,
            None => return Ok(Vec::new()),
        };
        let rows = self
            .gateway
            .fetch_rows(
                "care_logs",
                ListQuery::new()
                    .eq("user_id", user_id)
                    .eq("breed_id", breed_id)
                    .order("done_at", false)
                    .limit(self.log_fetch_limit),
            )
            .await?;
        decode_rows(rows)
    }

    /// Append one care-log entry, stamping `done_at` with now when the
    /// caller left it unset
    pub async fn add_log_entry(&self, user_id: &str, entry: &NewLogEntry) -> Result<LogEntry> {
        if entry.breed_id.trim().is_empty() {
            return Err(Error::validation("a breed is required for a log entry"));
        }
        let row = self
            .gateway
            .upsert("care_logs", entry.to_row(user_id, Utc::now()), None)
            .await?;
        decode_row(row)
    }

    pub async fn delete_log_entry(&self, id: &str) -> Result<()> {
        self.gateway.delete_eq("care_logs", "id", id).await
    }
}
