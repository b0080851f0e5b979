use crate::db::DbConnection;
use crate::error::StorageResult;
use shared::{FormOptions, QualityForm, SearchCriteria, StoredRecord};
use tracing::info;

/// Quality service: turns form input into records and drives the record store.
///
/// This is where the form-side policies live: measurements fall back to zero,
/// a blank date means today and the color group follows the color code.
#[derive(Clone)]
pub struct QualityService {
    db: DbConnection,
}

impl QualityService {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    pub fn form_options(&self) -> FormOptions {
        FormOptions::current()
    }

    /// Save a new inspection entry and return its id
    pub async fn save(&self, form: QualityForm) -> StorageResult<i64> {
        let record = form.into_record();
        info!(
            "Saving {} record for batch {:?} (tank {:?})",
            record.color_code, record.batch, record.tank
        );
        let id = self.db.insert_record(&record).await?;
        info!("Saved quality record {}", id);
        Ok(id)
    }

    /// Replace every field of record `id`. Returns false if no such record exists.
    pub async fn update(&self, id: i64, form: QualityForm) -> StorageResult<bool> {
        info!("Updating quality record {}", id);
        let affected = self.db.update_record(id, &form.into_record()).await?;
        if affected == 0 {
            info!("No quality record {} to update", id);
        }
        Ok(affected > 0)
    }

    pub async fn delete(&self, id: i64) -> StorageResult<bool> {
        info!("Deleting quality record {}", id);
        self.db.delete_record(id).await
    }

    pub async fn get(&self, id: i64) -> StorageResult<Option<StoredRecord>> {
        self.db.get_record(id).await
    }

    pub async fn list(&self) -> StorageResult<Vec<StoredRecord>> {
        let records = self.db.list_records().await?;
        info!("Returning {} quality records", records.len());
        Ok(records)
    }

    pub async fn search(&self, criteria: &SearchCriteria) -> StorageResult<Vec<StoredRecord>> {
        info!("Searching quality records with {} conditions", criteria.conditions.len());
        let records = self.db.search_records(criteria).await?;
        info!("Search matched {} quality records", records.len());
        Ok(records)
    }
}
