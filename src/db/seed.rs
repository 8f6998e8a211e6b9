//! Demo schema and rows used by the `seed` command and integration tests.
//!
//! Runs through the same lease and binding path as agent queries. Inserts
//! are idempotent, so seeding twice leaves one copy of each row.

use crate::db::{BoundStatement, ConnectionPool, Parameters, SqlValue};
use crate::error::DatabaseError;

const CREATE_DEPOSIT: &str = "CREATE TABLE IF NOT EXISTS deposit (\
    account_holder VARCHAR(100) PRIMARY KEY, \
    balance BIGINT NOT NULL)";

const CREATE_LOAN: &str = "CREATE TABLE IF NOT EXISTS loan (\
    borrower VARCHAR(100) PRIMARY KEY, \
    money BIGINT NOT NULL)";

const INSERT_DEPOSIT: &str = "INSERT INTO deposit (account_holder, balance) \
    VALUES (:account_holder, :balance) ON CONFLICT (account_holder) DO NOTHING";

const INSERT_LOAN: &str = "INSERT INTO loan (borrower, money) \
    VALUES (:borrower, :money) ON CONFLICT (borrower) DO NOTHING";

/// Demo deposit balances keyed by account holder.
pub const DEPOSITS: &[(&str, i64)] = &[("Alice", 1000), ("Bob", 1500), ("Charlie", 2000)];

/// Demo loan amounts keyed by borrower.
pub const LOANS: &[(&str, i64)] = &[("Kim", 100_000), ("Lee", 150_000), ("Park", 300_000)];

/// Counts of rows submitted by [`seed_demo_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub deposits: usize,
    pub loans: usize,
}

/// Create the demo tables and insert the demo rows.
pub async fn seed_demo_data(pool: &dyn ConnectionPool) -> Result<SeedReport, DatabaseError> {
    let style = pool.placeholder_style();
    let mut lease = pool.acquire().await?;

    for ddl in [CREATE_DEPOSIT, CREATE_LOAN] {
        let stmt = BoundStatement::compile(ddl, &Parameters::new(), style)?;
        lease.execute(&stmt).await?;
    }

    for (holder, balance) in DEPOSITS {
        let params = Parameters::from([
            ("account_holder".to_string(), SqlValue::from(*holder)),
            ("balance".to_string(), SqlValue::from(*balance)),
        ]);
        let stmt = BoundStatement::compile(INSERT_DEPOSIT, &params, style)?;
        lease.execute(&stmt).await?;
    }

    for (borrower, money) in LOANS {
        let params = Parameters::from([
            ("borrower".to_string(), SqlValue::from(*borrower)),
            ("money".to_string(), SqlValue::from(*money)),
        ]);
        let stmt = BoundStatement::compile(INSERT_LOAN, &params, style)?;
        lease.execute(&stmt).await?;
    }

    let report = SeedReport {
        deposits: DEPOSITS.len(),
        loans: LOANS.len(),
    };
    tracing::info!(deposits = report.deposits, loans = report.loans, "demo data seeded");
    Ok(report)
}
