use super::RecordStore;
use super::collection::Stored;
use crate::core::{CollectionKind, Material, Record, Request, Result, StoreError, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Full snapshot of all collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub users: Vec<User>,
    pub materials: Vec<Material>,
    pub requests: Vec<Request>,
    pub export_date: DateTime<Utc>,
}

impl ExportDocument {
    /// Download name of the export, e.g. `procurement_data_2024-06-01.json`.
    pub fn file_name(&self) -> String {
        format!("procurement_data_{}.json", self.export_date.format("%Y-%m-%d"))
    }
}

/// Same shape as [`ExportDocument`]; every collection is optional and only
/// the ones present are replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImportDocument {
    pub users: Option<Vec<User>>,
    pub materials: Option<Vec<Material>>,
    pub requests: Option<Vec<Request>>,
    pub export_date: Option<DateTime<Utc>>,
}

impl From<ExportDocument> for ImportDocument {
    fn from(doc: ExportDocument) -> Self {
        Self {
            users: Some(doc.users),
            materials: Some(doc.materials),
            requests: Some(doc.requests),
            export_date: Some(doc.export_date),
        }
    }
}

fn check_unique_ids<T: Record>(records: &[T]) -> Result<()> {
    let mut seen = HashSet::new();
    for record in records {
        if record.id() == 0 || !seen.insert(record.id()) {
            return Err(StoreError::validation(format!(
                "{} contains missing or duplicate id {}",
                T::KIND,
                record.id()
            )));
        }
    }
    Ok(())
}

fn check_unique_logins(users: &[User]) -> Result<()> {
    let mut seen = HashSet::new();
    for user in users {
        if !seen.insert(user.login.as_str()) {
            return Err(StoreError::DuplicateLogin(user.login.clone()));
        }
    }
    Ok(())
}

impl RecordStore {
    pub async fn export(&self) -> ExportDocument {
        self.ready().await;
        let state = self.read_state();
        ExportDocument {
            users: state.users.records().to_vec(),
            materials: state.materials.records().to_vec(),
            requests: state.requests.records().to_vec(),
            export_date: Utc::now(),
        }
    }

    /// Pretty-printed export document.
    pub async fn export_json(&self) -> Result<String> {
        let doc = self.export().await;
        serde_json::to_string_pretty(&doc)
            .map_err(|e| StoreError::validation(format!("cannot encode export: {}", e)))
    }

    /// Replaces every collection present in `doc`. The whole document is
    /// checked before anything is replaced; returns the collections replaced.
    pub async fn import(&self, doc: ImportDocument) -> Result<Vec<CollectionKind>> {
        if let Some(users) = &doc.users {
            check_unique_ids(users)?;
            check_unique_logins(users)?;
        }
        if let Some(materials) = &doc.materials {
            check_unique_ids(materials)?;
        }
        if let Some(requests) = &doc.requests {
            check_unique_ids(requests)?;
        }

        self.ready().await;
        let mut replaced = Vec::new();
        if let Some(users) = doc.users {
            self.replace_collection(users).await?;
            replaced.push(CollectionKind::Users);
        }
        if let Some(materials) = doc.materials {
            self.replace_collection(materials).await?;
            replaced.push(CollectionKind::Materials);
        }
        if let Some(requests) = doc.requests {
            self.replace_collection(requests).await?;
            replaced.push(CollectionKind::Requests);
        }
        info!(collections = ?replaced, "import applied");
        Ok(replaced)
    }

    /// Parses and applies an import document. Malformed text leaves the
    /// store untouched.
    pub async fn import_json(&self, text: &str) -> Result<Vec<CollectionKind>> {
        let doc: ImportDocument = serde_json::from_str(text)
            .map_err(|e| StoreError::validation(format!("malformed import document: {}", e)))?;
        self.import(doc).await
    }

    async fn replace_collection<T: Stored>(&self, records: Vec<T>) -> Result<()> {
        let _write = self.inner.write_locks.of(T::KIND).lock().await;
        let payload = {
            let mut state = self.write_state();
            let slot = T::slot_mut(&mut state);
            slot.replace(records);
            slot.to_json()?
        };
        self.persist(T::KIND, payload);
        self.announce_changed(T::KIND);
        Ok(())
    }
}
