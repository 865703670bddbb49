//! PostgreSQL Customer Repository
//!
//! Conditional transitions are single `UPDATE ... WHERE status = $from
//! RETURNING` statements; a missing returned row means the precondition
//! failed and the current row is re-read for reconciliation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::customer::entity::{
    Customer, CustomerField, CustomerFilter, CustomerStatus, CustomerUpdate, TransitionOutcome,
    WebhookMethod,
};
use crate::customer::repository::CustomerRepository;
use crate::shared::error::{CustomerError, Result};

const TABLE: &str = "customer_customers";

const COLUMNS: &str = "id, name, detail, email, phone_number, address, webhook_method, \
     webhook_uri, billing_account_id, email_verified, status, tm_deletion_scheduled, \
     tm_create, tm_update, tm_delete";

/// Postgres unique_violation
const UNIQUE_VIOLATION: &str = "23505";

pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the table and indexes if they do not exist.
    pub async fn init_schema(&self) -> Result<()> {
        let schema = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                detail TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL,
                phone_number TEXT NOT NULL DEFAULT '',
                address TEXT NOT NULL DEFAULT '',
                webhook_method TEXT NOT NULL DEFAULT 'NONE',
                webhook_uri TEXT NOT NULL DEFAULT '',
                billing_account_id UUID,
                email_verified BOOLEAN NOT NULL DEFAULT FALSE,
                status TEXT NOT NULL DEFAULT 'active',
                tm_deletion_scheduled TIMESTAMPTZ,
                tm_create TIMESTAMPTZ NOT NULL,
                tm_update TIMESTAMPTZ,
                tm_delete TIMESTAMPTZ
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_live_email
                ON {table} (lower(trim(email))) WHERE tm_delete IS NULL;
            CREATE INDEX IF NOT EXISTS idx_{table}_unverified
                ON {table} (tm_create) WHERE email_verified = FALSE AND tm_delete IS NULL;
            CREATE INDEX IF NOT EXISTS idx_{table}_deletion_scheduled
                ON {table} (tm_deletion_scheduled) WHERE status = 'frozen';
            "#,
            table = TABLE
        );

        sqlx::raw_sql(&schema).execute(&self.pool).await?;

        info!(table = TABLE, "Customer schema initialized");
        Ok(())
    }

    fn parse_row(row: &PgRow) -> Result<Customer> {
        let status: String = row.try_get("status")?;
        let status = CustomerStatus::parse(&status)
            .ok_or_else(|| CustomerError::Database(format!("invalid customer status '{}'", status)))?;
        let webhook_method: String = row.try_get("webhook_method")?;

        Ok(Customer {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            detail: row.try_get("detail")?,
            email: row.try_get("email")?,
            phone_number: row.try_get("phone_number")?,
            address: row.try_get("address")?,
            webhook_method: WebhookMethod::parse(&webhook_method),
            webhook_uri: row.try_get("webhook_uri")?,
            billing_account_id: row.try_get("billing_account_id")?,
            email_verified: row.try_get("email_verified")?,
            status,
            tm_deletion_scheduled: row.try_get("tm_deletion_scheduled")?,
            tm_create: row.try_get("tm_create")?,
            tm_update: row.try_get("tm_update")?,
            tm_delete: row.try_get("tm_delete")?,
        })
    }

    async fn conditional_transition(
        &self,
        id: Uuid,
        from: CustomerStatus,
        to: CustomerStatus,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<TransitionOutcome> {
        let query = format!(
            "UPDATE {} SET status = $1, tm_deletion_scheduled = $2, tm_update = $3 \
             WHERE id = $4 AND status = $5 AND tm_delete IS NULL RETURNING {}",
            TABLE, COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(to.as_str())
            .bind(scheduled_at)
            .bind(Utc::now())
            .bind(id)
            .bind(from.as_str())
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Ok(TransitionOutcome {
                applied: true,
                current: Self::parse_row(&row)?,
            });
        }

        debug!(customer_id = %id, from = from.as_str(), "Conditional transition not applied");
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| CustomerError::not_found("customer not found"))?;

        Ok(TransitionOutcome {
            applied: false,
            current,
        })
    }
}

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Customer>> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", COLUMNS, TABLE);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM {} WHERE TRUE", COLUMNS, TABLE));

        if !filter.include_deleted {
            qb.push(" AND tm_delete IS NULL AND status <> 'deleted'");
        }
        if let Some(email) = &filter.email {
            qb.push(" AND lower(trim(email)) = ").push_bind(email.clone());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(verified) = filter.email_verified {
            qb.push(" AND email_verified = ").push_bind(verified);
        }
        if let Some(cutoff) = filter.created_before {
            qb.push(" AND tm_create < ").push_bind(cutoff);
        }
        qb.push(" ORDER BY tm_create ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::parse_row).collect()
    }

    async fn create(&self, customer: &Customer) -> Result<()> {
        let query = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            TABLE, COLUMNS
        );

        let result = sqlx::query(&query)
            .bind(customer.id)
            .bind(&customer.name)
            .bind(&customer.detail)
            .bind(&customer.email)
            .bind(&customer.phone_number)
            .bind(&customer.address)
            .bind(customer.webhook_method.as_str())
            .bind(&customer.webhook_uri)
            .bind(customer.billing_account_id)
            .bind(customer.email_verified)
            .bind(customer.status.as_str())
            .bind(customer.tm_deletion_scheduled)
            .bind(customer.tm_create)
            .bind(customer.tm_update)
            .bind(customer.tm_delete)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(CustomerError::conflict("customer already exists"))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, id: Uuid, update: &CustomerUpdate) -> Result<()> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("UPDATE {} SET tm_update = ", TABLE));
        qb.push_bind(Utc::now());

        for field in update.fields() {
            qb.push(", ").push(field.column()).push(" = ");
            match field {
                CustomerField::Name(v)
                | CustomerField::Detail(v)
                | CustomerField::Email(v)
                | CustomerField::PhoneNumber(v)
                | CustomerField::Address(v)
                | CustomerField::WebhookUri(v) => {
                    qb.push_bind(v.clone());
                }
                CustomerField::WebhookMethod(m) => {
                    qb.push_bind(m.as_str());
                }
                CustomerField::BillingAccountId(v) => {
                    qb.push_bind(*v);
                }
                // Monotonic: a verified row stays verified.
                CustomerField::EmailVerified(v) => {
                    qb.push("email_verified OR ").push_bind(*v);
                }
            }
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND tm_delete IS NULL");

        let result = qb.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(CustomerError::not_found("customer not found"));
        }
        Ok(())
    }

    async fn freeze(&self, id: Uuid, scheduled_at: DateTime<Utc>) -> Result<TransitionOutcome> {
        self.conditional_transition(id, CustomerStatus::Active, CustomerStatus::Frozen, Some(scheduled_at))
            .await
    }

    async fn recover(&self, id: Uuid) -> Result<TransitionOutcome> {
        self.conditional_transition(id, CustomerStatus::Frozen, CustomerStatus::Active, None)
            .await
    }

    async fn delete_unverified(&self, id: Uuid, cutoff: DateTime<Utc>) -> Result<bool> {
        let query = format!(
            "DELETE FROM {} WHERE id = $1 AND email_verified = FALSE \
             AND tm_delete IS NULL AND tm_create < $2",
            TABLE
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn anonymize_expired(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<bool> {
        let now = Utc::now();
        let query = format!(
            "UPDATE {} SET name = $1, email = $2, detail = '', phone_number = '', address = '', \
             webhook_method = 'NONE', webhook_uri = '', status = 'deleted', \
             tm_deletion_scheduled = NULL, tm_update = $3, tm_delete = $3 \
             WHERE id = $4 AND status = 'frozen' AND tm_delete IS NULL \
             AND tm_deletion_scheduled <= $5",
            TABLE
        );

        let result = sqlx::query(&query)
            .bind(name)
            .bind(email)
            .bind(now)
            .bind(id)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_frozen_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Customer>> {
        let query = format!(
            "SELECT {} FROM {} WHERE status = 'frozen' AND tm_delete IS NULL \
             AND tm_deletion_scheduled <= $1 ORDER BY tm_deletion_scheduled ASC",
            COLUMNS, TABLE
        );

        let rows = sqlx::query(&query)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::parse_row).collect()
    }
}
