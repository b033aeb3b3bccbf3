//! Runs against a live database: `DATABASE_URL=... cargo test -- --ignored`

use anyhow::Result;
use serde_json::{json, Value};
use sqlx::PgPool;

use hrm_api::config::{DatabaseConfig, StoreBackend};
use hrm_api::database::{DatabaseError, DatabaseManager, PgRecordStore, Record, RecordStore};
use hrm_api::filter::FilterData;

struct ScratchTable {
    pool: PgPool,
    store: PgRecordStore,
    name: String,
}

impl ScratchTable {
    async fn create() -> Result<Self> {
        let config = DatabaseConfig {
            backend: StoreBackend::Postgres,
            url: Some(std::env::var("DATABASE_URL")?),
            max_connections: 2,
            connection_timeout: 5,
            seed_path: None,
        };
        let pool = DatabaseManager::connect(&config).await?;
        let name = format!("leave_{}", uuid::Uuid::new_v4().simple());

        sqlx::query(&format!(
            "CREATE TABLE \"{}\" (id text PRIMARY KEY, tenant_id text NOT NULL, status text, days integer)",
            name
        ))
        .execute(&pool)
        .await?;
        sqlx::query(&format!(
            "INSERT INTO \"{}\" VALUES ('l1', 't1', 'pending', 2), ('l2', 't2', 'pending', 5)",
            name
        ))
        .execute(&pool)
        .await?;

        Ok(Self { store: PgRecordStore::new(pool.clone()), pool, name })
    }

    async fn remove(self) -> Result<()> {
        sqlx::query(&format!("DROP TABLE \"{}\"", self.name)).execute(&self.pool).await?;
        self.pool.close().await;
        Ok(())
    }
}

fn patch(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn reads_and_writes_stay_inside_the_tenant() -> Result<()> {
    let t = ScratchTable::create().await?;

    let row = t.store.find_first(&t.name, "t1", FilterData::by_id("l1")).await?.unwrap();
    assert_eq!(row["days"], 2);
    assert!(t.store.find_first(&t.name, "t1", FilterData::by_id("l2")).await?.is_none());

    let updated = t.store.update(&t.name, "t1", "l1", &patch(json!({ "days": 3 }))).await?;
    assert_eq!(updated["days"], 3);
    assert_eq!(updated["status"], "pending");

    let err = t.store.update(&t.name, "t1", "l2", &patch(json!({ "days": 1 }))).await.unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound(_)));
    let err = t.store.delete(&t.name, "t1", "l2").await.unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound(_)));

    assert_eq!(t.store.owner_tenant(&t.name, "l2").await?.as_deref(), Some("t2"));
    assert_eq!(t.store.owner_tenant(&t.name, "missing").await?, None);

    let removed = t.store.delete(&t.name, "t1", "l1").await?;
    assert_eq!(removed["id"], "l1");
    assert!(t.store.find_first(&t.name, "t1", FilterData::by_id("l1")).await?.is_none());

    t.remove().await
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn uncastable_value_is_reported_as_invalid() -> Result<()> {
    let t = ScratchTable::create().await?;

    let err = t.store.update(&t.name, "t1", "l1", &patch(json!({ "days": "many" }))).await.unwrap_err();
    assert!(matches!(err, DatabaseError::InvalidValue(_)), "got {:?}", err);

    t.remove().await
}
