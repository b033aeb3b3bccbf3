//! Postgres-backed record store.
//!
//! Rows travel as JSON in both directions: reads project through
//! `to_jsonb`, writes go through `jsonb_populate_record` so the table's own
//! column types drive the casts.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::postgres::PgArguments;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::store::{not_found, Record, RecordStore};
use crate::filter::{Filter, FilterData, FilterError, SqlResult};

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        Ok(Self::new(DatabaseManager::connect(config).await?))
    }
}

type JsonRowQuery<'q> = sqlx::query::QueryScalar<'q, sqlx::Postgres, Value, PgArguments>;

fn bind_param(q: JsonRowQuery<'_>, v: Value) -> JsonRowQuery<'_> {
    match v {
        Value::Null => q.bind(None::<String>),
        Value::Bool(b) => q.bind(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Structured values only reach here as whole JSONB documents
        other => q.bind(other),
    }
}

fn into_record(row: Value) -> Result<Record, DatabaseError> {
    match row {
        Value::Object(record) => Ok(record),
        other => Err(DatabaseError::QueryError(format!("expected a JSON object row, got {}", other))),
    }
}

fn quoted_table(table: &str) -> Result<String, DatabaseError> {
    Ok(format!("\"{}\"", Filter::new(table)?.table_name()))
}

/// First matching row within the tenant, as one JSONB value
fn find_statement(table: &str, tenant_id: &str, filter: FilterData) -> Result<SqlResult, DatabaseError> {
    let mut query = Filter::new(table)?;
    query.assign(FilterData {
        limit: Some(1),
        ..filter.and_where(json!({ "tenant_id": tenant_id }))
    })?;
    let sql = query.to_sql()?;

    Ok(SqlResult {
        query: format!("SELECT to_jsonb(t) AS row FROM ({}) t", sql.query),
        params: sql.params,
    })
}

/// Binds: `$1` patch as JSONB, `$2` id, `$3` tenant id
fn update_statement<'a>(table: &str, columns: impl IntoIterator<Item = &'a String>) -> Result<String, DatabaseError> {
    let mut assignments = Vec::new();
    for column in columns {
        if !Filter::is_identifier(column) {
            return Err(FilterError::InvalidColumn(format!("Invalid column name format: {}", column)).into());
        }
        assignments.push(format!("\"{0}\" = r.\"{0}\"", column));
    }
    if assignments.is_empty() {
        return Err(DatabaseError::QueryError("update without columns".to_string()));
    }

    let table = quoted_table(table)?;
    Ok(format!(
        "UPDATE {table} AS t SET {set} \
         FROM jsonb_populate_record(NULL::{table}, $1::jsonb) AS r \
         WHERE t.\"id\"::text = $2 AND t.\"tenant_id\"::text = $3 \
         RETURNING to_jsonb(t) AS row",
        table = table,
        set = assignments.join(", "),
    ))
}

/// Binds: `$1` id, `$2` tenant id
fn delete_statement(table: &str) -> Result<String, DatabaseError> {
    Ok(format!(
        "DELETE FROM {} AS t WHERE t.\"id\"::text = $1 AND t.\"tenant_id\"::text = $2 RETURNING to_jsonb(t) AS row",
        quoted_table(table)?
    ))
}

/// Binds: `$1` id. Not tenant-scoped.
fn owner_tenant_statement(table: &str) -> Result<String, DatabaseError> {
    Ok(format!(
        "SELECT \"tenant_id\"::text AS tenant_id FROM {} WHERE \"id\"::text = $1 LIMIT 1",
        quoted_table(table)?
    ))
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_first(
        &self,
        table: &str,
        tenant_id: &str,
        filter: FilterData,
    ) -> Result<Option<Record>, DatabaseError> {
        let sql = find_statement(table, tenant_id, filter)?;

        let mut q = sqlx::query_scalar::<_, Value>(&sql.query);
        for param in sql.params {
            q = bind_param(q, param);
        }

        q.fetch_optional(&self.pool).await?.map(into_record).transpose()
    }

    async fn update(
        &self,
        table: &str,
        tenant_id: &str,
        id: &str,
        patch: &Record,
    ) -> Result<Record, DatabaseError> {
        if patch.is_empty() {
            return self
                .find_first(table, tenant_id, FilterData::by_id(id))
                .await?
                .ok_or_else(|| not_found(table, id));
        }

        let statement = update_statement(table, patch.keys())?;
        let row = sqlx::query_scalar::<_, Value>(&statement)
            .bind(Value::Object(patch.clone()))
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(table, id))?;
        into_record(row)
    }

    async fn delete(&self, table: &str, tenant_id: &str, id: &str) -> Result<Record, DatabaseError> {
        let statement = delete_statement(table)?;
        let row = sqlx::query_scalar::<_, Value>(&statement)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(table, id))?;
        into_record(row)
    }

    async fn owner_tenant(&self, table: &str, id: &str) -> Result<Option<String>, DatabaseError> {
        let statement = owner_tenant_statement(table)?;
        let tenant = sqlx::query_scalar::<_, Option<String>>(&statement)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant.flatten())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn close(&self) {
        DatabaseManager::close(&self.pool).await;
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
