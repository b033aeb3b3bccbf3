//! In-process record store used for tests and local development

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;

use crate::database::manager::DatabaseError;
use crate::database::store::{not_found, project, Record, RecordStore};
use crate::filter::{Filter, FilterData, FilterWhere};

/// Tables keyed by name, rows keyed by id
type Tables = HashMap<String, BTreeMap<String, Record>>;

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{ "<table>": [ { "id": ..., "tenant_id": ..., ... }, ... ] }`
    pub async fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DatabaseError::InvalidSeed(format!("{}: {}", path.display(), e)))?;
        let seed: HashMap<String, Vec<Record>> = serde_json::from_str(&raw)
            .map_err(|e| DatabaseError::InvalidSeed(format!("{}: {}", path.display(), e)))?;

        let store = Self::new();
        let count = store.seed(seed).await?;
        info!("Seeded memory store with {} records from {}", count, path.display());
        Ok(store)
    }

    pub async fn seed(&self, seed: HashMap<String, Vec<Record>>) -> Result<usize, DatabaseError> {
        let mut count = 0;
        for (table, records) in seed {
            for record in records {
                self.insert(&table, record).await?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Insert or overwrite a record; `id` and `tenant_id` must be strings
    pub async fn insert(&self, table: &str, record: Record) -> Result<(), DatabaseError> {
        Filter::new(table)?;
        let id = string_field(&record, "id")
            .ok_or_else(|| DatabaseError::InvalidSeed(format!("{} record without string id", table)))?;
        if string_field(&record, "tenant_id").is_none() {
            return Err(DatabaseError::InvalidSeed(format!("{} record {} without tenant_id", table, id)));
        }

        let mut tables = self.tables.write().await;
        tables.entry(table.to_string()).or_default().insert(id, record);
        Ok(())
    }

    /// Raw record regardless of tenant
    pub async fn get(&self, table: &str, id: &str) -> Option<Record> {
        let tables = self.tables.read().await;
        tables.get(table).and_then(|rows| rows.get(id)).cloned()
    }

    pub async fn len(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map_or(0, BTreeMap::len)
    }
}

fn string_field(record: &Record, field: &str) -> Option<String> {
    record.get(field).and_then(Value::as_str).map(str::to_string)
}

fn belongs_to(record: &Record, tenant_id: &str) -> bool {
    record.get("tenant_id").and_then(Value::as_str) == Some(tenant_id)
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_first(
        &self,
        table: &str,
        tenant_id: &str,
        filter: FilterData,
    ) -> Result<Option<Record>, DatabaseError> {
        // Same validation the SQL path applies, so both stores reject the same input
        let mut validated = Filter::new(table)?;
        let filter = filter.and_where(json!({ "tenant_id": tenant_id }));
        validated.assign(filter.clone())?;

        let where_clause = filter.where_clause.unwrap_or(Value::Null);
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            return Ok(None);
        };

        for record in rows.values() {
            if FilterWhere::matches(&where_clause, record)? {
                return Ok(Some(project(record.clone(), filter.select.as_deref())));
            }
        }
        Ok(None)
    }

    async fn update(
        &self,
        table: &str,
        tenant_id: &str,
        id: &str,
        patch: &Record,
    ) -> Result<Record, DatabaseError> {
        let mut tables = self.tables.write().await;
        let record = tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(id))
            .filter(|record| belongs_to(record, tenant_id))
            .ok_or_else(|| not_found(table, id))?;

        for (field, value) in patch {
            record.insert(field.clone(), value.clone());
        }
        if record.contains_key("updated_at") {
            record.insert("updated_at".to_string(), Value::String(Utc::now().to_rfc3339()));
        }
        Ok(record.clone())
    }

    async fn delete(&self, table: &str, tenant_id: &str, id: &str) -> Result<Record, DatabaseError> {
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| not_found(table, id))?;
        match rows.get(id) {
            Some(record) if belongs_to(record, tenant_id) => {}
            _ => return Err(not_found(table, id)),
        }
        rows.remove(id).ok_or_else(|| not_found(table, id))
    }

    async fn owner_tenant(&self, table: &str, id: &str) -> Result<Option<String>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .and_then(|rows| rows.get(id))
            .and_then(|record| string_field(record, "tenant_id")))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
