//! Batch-based inventory ledger.
//!
//! Stock arrives in [`Batch`]es, each with its own delivery and use-by dates and
//! a running quantity. Every change to a batch quantity is paired, in the same
//! database transaction, with an append-only [`Transaction`] ledger entry.
//!
//! The [`Engine`] exposes the write operations (`record_addition`,
//! `record_removal`), the stock level aggregations, and a filter query builder
//! that turns a sparse set of search criteria into one parameterized query.

pub use batches::Batch;
pub use commands::{AdditionCmd, RemovalCmd};
pub use error::EngineError;
pub use filter::{Field, FilterSpec, FilterStatement, FilterValue, PredicateSpec, QueryEntity};
pub use ops::{Engine, EngineBuilder, SearchRows};
pub use stock_names::{StockIdentifier, StockLevel, StockName};
pub use transactions::{RemovalReason, Transaction, TransactionType};
pub use util::{normalize_date, parse_date, parse_quantity};

mod batches;
mod commands;
mod error;
mod filter;
mod ops;
mod stock_names;
mod transactions;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
