//! Expense ledger
//!
//! Completed expense records are written as one row each to a PostgreSQL
//! table. The [`ExpenseLedger`] trait is the seam the agent depends on, so
//! tests can substitute an in-memory ledger.

pub mod record;

pub use record::{parse_date, Amount, Category, ExpenseKind, ExpenseRecord};

use crate::config::{is_valid_table_name, DatabaseConfig};
use crate::error::{FinbotError, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;

/// Durable sink for expense records
#[async_trait]
pub trait ExpenseLedger: Send + Sync {
    /// Persist one record
    ///
    /// # Errors
    ///
    /// Returns `FinbotError::Storage` if the row could not be written
    async fn insert(&self, record: &ExpenseRecord) -> Result<()>;
}

/// PostgreSQL-backed ledger
///
/// The pool connects lazily, so constructing the ledger never touches the
/// network; connection problems surface on the first insert.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: PgPool,
    insert_sql: String,
}

impl PostgresLedger {
    /// Build a ledger from connection settings
    ///
    /// # Errors
    ///
    /// Returns `FinbotError::Config` if the configured table name is not a
    /// plain or schema-qualified identifier
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        if !is_valid_table_name(&config.table) {
            return Err(FinbotError::Config(format!(
                "invalid ledger table name: {}",
                config.table
            ))
            .into());
        }

        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user);
        if let Some(password) = config.password.clone().map(SecretString::from) {
            options = options.password(password.expose_secret());
        }

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(options);

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            table = %config.table,
            "Configured PostgreSQL ledger"
        );

        Ok(Self {
            pool,
            insert_sql: insert_statement(&config.table),
        })
    }
}

/// INSERT statement for a validated table name
pub fn insert_statement(table: &str) -> String {
    format!(
        r#"INSERT INTO {} (tipo, valor, categoria, "date", descripcion) VALUES ($1, $2::numeric, $3, $4, $5)"#,
        table
    )
}

#[async_trait]
impl ExpenseLedger for PostgresLedger {
    async fn insert(&self, record: &ExpenseRecord) -> Result<()> {
        tracing::info!(
            category = %record.category,
            amount = %record.amount,
            date = %record.date,
            "Inserting expense"
        );

        sqlx::query(&self.insert_sql)
            .bind(record.kind.ledger_value())
            .bind(record.amount.as_str())
            .bind(record.category.label())
            .bind(record.date)
            .bind(record.description.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Expense insert failed: {}", e);
                FinbotError::Storage(format!("Error al registrar gasto: {}", e))
            })?;

        Ok(())
    }
}
