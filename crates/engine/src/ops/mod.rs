use chrono::{Local, NaiveDate};
use sea_orm::DatabaseConnection;

use crate::ResultEngine;

mod catalog;
mod ledger;
mod levels;
mod search;

pub use search::SearchRows;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// Evaluates to the block's `Result`; failures to begin or commit come back
/// through it as `EngineError::Storage` rather than returning early.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let outcome: Result<_, crate::EngineError> = async {
            let $tx = $self.database.begin().await?;
            let result: Result<_, crate::EngineError> = async { $body }.await;
            match result {
                Ok(value) => match $tx.commit().await {
                    Ok(()) => Ok(value),
                    // a failed commit leaves the connection to roll back on drop
                    Err(commit_err) => Err(crate::EngineError::from(commit_err)),
                },
                Err(err) => {
                    if let Err(rollback_err) = $tx.rollback().await {
                        tracing::error!("rollback failed: {rollback_err}");
                    }
                    Err(err)
                }
            }
        }
        .await;
        outcome
    }};
}

pub(crate) use with_tx;

/// Source of "today" for date rules.
#[derive(Clone, Copy, Debug, Default)]
enum Clock {
    #[default]
    Local,
    Fixed(NaiveDate),
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    clock: Clock,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The calendar date the engine validates against.
    pub fn today(&self) -> NaiveDate {
        match self.clock {
            Clock::Local => Local::now().date_naive(),
            Clock::Fixed(date) => date,
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    clock: Clock,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pin "today" instead of reading the local clock.
    pub fn today(mut self, date: NaiveDate) -> EngineBuilder {
        self.clock = Clock::Fixed(date);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            clock: self.clock,
        })
    }
}
