//! Ledger entries.
//!
//! A `Transaction` records one quantity movement against a batch. Rows are
//! append-only: the engine inserts them and never updates or deletes them.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Field, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Addition,
    Removal,
}

impl TransactionType {
    pub const ALL: [Self; 2] = [Self::Addition, Self::Removal];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Addition => "addition",
            Self::Removal => "removal",
        }
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "addition" => Ok(Self::Addition),
            "removal" => Ok(Self::Removal),
            other => Err(EngineError::value(
                Field::TransactionType,
                format!("invalid transaction type: {other}"),
            )),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why stock left a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Used,
    OutOfDate,
    Returned,
    Lost,
    Destroyed,
}

impl RemovalReason {
    pub const ALL: [Self; 5] = [
        Self::Used,
        Self::OutOfDate,
        Self::Returned,
        Self::Lost,
        Self::Destroyed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Used => "used",
            Self::OutOfDate => "out_of_date",
            Self::Returned => "returned",
            Self::Lost => "lost",
            Self::Destroyed => "destroyed",
        }
    }
}

impl TryFrom<&str> for RemovalReason {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "used" => Ok(Self::Used),
            "out_of_date" => Ok(Self::OutOfDate),
            "returned" => Ok(Self::Returned),
            "lost" => Ok(Self::Lost),
            "destroyed" => Ok(Self::Destroyed),
            other => Err(EngineError::value(
                Field::RemovalReason,
                format!("invalid removal reason: {other}"),
            )),
        }
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i32,
    pub batch_id: i32,
    pub stock_id: i32,
    pub kind: TransactionType,
    pub quantity: i64,
    /// Business date: delivery date for additions, removal date for removals.
    pub occurred_at: NaiveDate,
    pub removal_reason: Option<RemovalReason>,
    /// When the row was written.
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub batch_id: i32,
    pub stock_id: i32,
    pub transaction_type: String,
    pub quantity: i64,
    pub occurred_at: Date,
    pub removal_reason: Option<String>,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::batches::Entity",
        from = "Column::BatchId",
        to = "super::batches::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Batch,
    #[sea_orm(
        belongs_to = "super::stock_names::Entity",
        from = "Column::StockId",
        to = "super::stock_names::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    StockName,
}

impl Related<super::batches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl Related<super::stock_names::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockName.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let kind = TransactionType::try_from(model.transaction_type.as_str())?;
        let removal_reason = model
            .removal_reason
            .as_deref()
            .map(RemovalReason::try_from)
            .transpose()?;
        match (kind, removal_reason) {
            (TransactionType::Removal, None) => {
                return Err(EngineError::value(
                    Field::RemovalReason,
                    format!("removal {} has no reason", model.id),
                ));
            }
            (TransactionType::Addition, Some(_)) => {
                return Err(EngineError::value(
                    Field::RemovalReason,
                    format!("addition {} carries a removal reason", model.id),
                ));
            }
            _ => {}
        }
        Ok(Self {
            id: model.id,
            batch_id: model.batch_id,
            stock_id: model.stock_id,
            kind,
            quantity: model.quantity,
            occurred_at: model.occurred_at,
            removal_reason,
            recorded_at: model.recorded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_types_round_trip_through_storage_text() {
        for kind in TransactionType::ALL {
            assert_eq!(TransactionType::try_from(kind.as_str()).unwrap(), kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }
        assert_eq!(
            TransactionType::try_from(" Removal ").unwrap(),
            TransactionType::Removal
        );
        let err = TransactionType::try_from("gift").unwrap_err();
        assert_eq!(err.field(), Some(Field::TransactionType));
    }

    #[test]
    fn removal_reasons_round_trip_through_storage_text() {
        for reason in RemovalReason::ALL {
            assert_eq!(RemovalReason::try_from(reason.as_str()).unwrap(), reason);
        }
        assert_eq!(
            RemovalReason::try_from("Out_Of_Date").unwrap(),
            RemovalReason::OutOfDate
        );
    }

    #[test]
    fn unknown_removal_reason_names_the_field() {
        let err = RemovalReason::try_from("stolen").unwrap_err();
        assert_eq!(err.field(), Some(Field::RemovalReason));
    }

    #[test]
    fn removal_row_without_reason_is_rejected() {
        let model = Model {
            id: 7,
            batch_id: 1,
            stock_id: 1,
            transaction_type: "removal".to_string(),
            quantity: 3,
            occurred_at: NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            removal_reason: None,
            recorded_at: Utc::now(),
        };
        assert!(Transaction::try_from(model).is_err());
    }
}
