//! PostgreSQL implementation of CustomerRepository.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::adapters::rows::CustomerRow;
use crate::domain::billing::CustomerRecord;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::CustomerRepository;

use super::db_error;

const CUSTOMER_ID_CONSTRAINT: &str = "customers_stripe_customer_id_key";

pub struct PostgresCustomerRepository {
    pool: PgPool,
}

impl PostgresCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CustomerRepository for PostgresCustomerRepository {
    async fn insert_if_absent(&self, record: &CustomerRecord) -> Result<CustomerRecord, DomainError> {
        let row = CustomerRow::from(record);

        let inserted: Option<CustomerRow> = sqlx::query_as(
            r#"
            INSERT INTO customers (user_id, stripe_customer_id, email, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING user_id, stripe_customer_id, email, created_at
            "#,
        )
        .bind(&row.user_id)
        .bind(&row.stripe_customer_id)
        .bind(&row.email)
        .bind(row.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some(CUSTOMER_ID_CONSTRAINT) {
                    return DomainError::new(
                        ErrorCode::Conflict,
                        format!(
                            "customer {} is already linked to another user",
                            record.stripe_customer_id
                        ),
                    );
                }
            }
            db_error("Failed to insert customer", e)
        })?;

        match inserted {
            Some(row) => CustomerRecord::try_from(row),
            None => self.find_by_user(&record.user_id).await?.ok_or_else(|| {
                DomainError::database("customer row vanished after insert conflict")
            }),
        }
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<CustomerRecord>, DomainError> {
        let row: Option<CustomerRow> = sqlx::query_as(
            r#"
            SELECT user_id, stripe_customer_id, email, created_at
            FROM customers
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find customer", e))?;

        row.map(CustomerRecord::try_from).transpose()
    }

    async fn find_user_by_customer_id(&self, customer_id: &str) -> Result<Option<UserId>, DomainError> {
        let user_id: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM customers WHERE stripe_customer_id = $1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Failed to resolve customer", e))?;

        user_id
            .map(|id| {
                UserId::new(id).map_err(|e| {
                    DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
                })
            })
            .transpose()
    }
}
