use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::database::manager::DatabaseError;
use crate::filter::FilterData;

/// A record as stored: field name to JSON value, always carrying `id` and `tenant_id`
pub type Record = Map<String, Value>;

/// Tenant-scoped record access. Every read and write is confined to the
/// given tenant; `owner_tenant` is the one cross-tenant lookup and exists
/// so access control can tell "absent" apart from "someone else's".
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// First record in `table` within the tenant matching `filter`
    async fn find_first(
        &self,
        table: &str,
        tenant_id: &str,
        filter: FilterData,
    ) -> Result<Option<Record>, DatabaseError>;

    /// Replace the fields in `patch` on the record, returning its new state.
    /// Fails with `DatabaseError::NotFound` when the record is absent.
    async fn update(
        &self,
        table: &str,
        tenant_id: &str,
        id: &str,
        patch: &Record,
    ) -> Result<Record, DatabaseError>;

    /// Remove the record, returning its final state.
    /// Fails with `DatabaseError::NotFound` when the record is absent.
    async fn delete(&self, table: &str, tenant_id: &str, id: &str) -> Result<Record, DatabaseError>;

    /// Tenant owning the record with this id, if it exists anywhere
    async fn owner_tenant(&self, table: &str, id: &str) -> Result<Option<String>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;

    /// Release connections held by the store
    async fn close(&self) {}

    fn backend_name(&self) -> &'static str;
}

/// Keep only the selected fields of a record (`*` or an empty list keeps everything)
pub fn project(record: Record, select: Option<&[String]>) -> Record {
    match select {
        Some(columns) if !columns.is_empty() && !columns.iter().any(|c| c == "*") => record
            .into_iter()
            .filter(|(key, _)| columns.iter().any(|c| c == key))
            .collect(),
        _ => record,
    }
}

pub(crate) fn not_found(table: &str, id: &str) -> DatabaseError {
    DatabaseError::NotFound(format!("{} record {} not found", table, id))
}
