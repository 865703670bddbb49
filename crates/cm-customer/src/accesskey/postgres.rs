//! PostgreSQL Accesskey Repository

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::accesskey::entity::Accesskey;
use crate::accesskey::repository::AccesskeyRepository;
use crate::shared::error::Result;

const TABLE: &str = "customer_accesskeys";

const COLUMNS: &str =
    "id, customer_id, name, detail, token_hash, token_prefix, tm_expire, tm_create, tm_update, tm_delete";

pub struct PostgresAccesskeyRepository {
    pool: PgPool,
}

impl PostgresAccesskeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        let schema = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                customer_id UUID NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                detail TEXT NOT NULL DEFAULT '',
                token_hash TEXT NOT NULL UNIQUE,
                token_prefix TEXT NOT NULL,
                tm_expire TIMESTAMPTZ NOT NULL,
                tm_create TIMESTAMPTZ NOT NULL,
                tm_update TIMESTAMPTZ,
                tm_delete TIMESTAMPTZ
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_customer_id ON {table} (customer_id);
            "#,
            table = TABLE
        );

        sqlx::raw_sql(&schema).execute(&self.pool).await?;

        info!(table = TABLE, "Accesskey schema initialized");
        Ok(())
    }

    fn parse_row(row: &PgRow) -> Result<Accesskey> {
        Ok(Accesskey {
            id: row.try_get("id")?,
            customer_id: row.try_get("customer_id")?,
            name: row.try_get("name")?,
            detail: row.try_get("detail")?,
            token_hash: row.try_get("token_hash")?,
            token_prefix: row.try_get("token_prefix")?,
            tm_expire: row.try_get("tm_expire")?,
            tm_create: row.try_get("tm_create")?,
            tm_update: row.try_get("tm_update")?,
            tm_delete: row.try_get("tm_delete")?,
        })
    }
}

#[async_trait]
impl AccesskeyRepository for PostgresAccesskeyRepository {
    async fn create(&self, accesskey: &Accesskey) -> Result<()> {
        let query = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            TABLE, COLUMNS
        );

        sqlx::query(&query)
            .bind(accesskey.id)
            .bind(accesskey.customer_id)
            .bind(&accesskey.name)
            .bind(&accesskey.detail)
            .bind(&accesskey.token_hash)
            .bind(&accesskey.token_prefix)
            .bind(accesskey.tm_expire)
            .bind(accesskey.tm_create)
            .bind(accesskey.tm_update)
            .bind(accesskey.tm_delete)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Accesskey>> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", COLUMNS, TABLE);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn list_by_customer(&self, customer_id: Uuid) -> Result<Vec<Accesskey>> {
        let query = format!(
            "SELECT {} FROM {} WHERE customer_id = $1 AND tm_delete IS NULL ORDER BY tm_create ASC",
            COLUMNS, TABLE
        );

        let rows = sqlx::query(&query)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::parse_row).collect()
    }
}
