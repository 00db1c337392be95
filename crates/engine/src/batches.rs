//! Batches: one received lot of a catalog item.
//!
//! `quantity_initial` is fixed at creation and is the audit baseline;
//! `quantity_current` only ever goes down, through removals.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: i32,
    pub stock_id: i32,
    pub quantity_initial: i64,
    pub quantity_current: i64,
    pub delivered_at: NaiveDate,
    pub use_by: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

impl Batch {
    /// Quantity taken out of this batch so far.
    pub fn quantity_removed(&self) -> i64 {
        self.quantity_initial - self.quantity_current
    }
}

impl From<Model> for Batch {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            stock_id: model.stock_id,
            quantity_initial: model.quantity_initial,
            quantity_current: model.quantity_current,
            delivered_at: model.delivered_at,
            use_by: model.use_by,
            recorded_at: model.recorded_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub stock_id: i32,
    pub quantity_initial: i64,
    pub quantity_current: i64,
    pub delivered_at: Date,
    pub use_by: Date,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_names::Entity",
        from = "Column::StockId",
        to = "super::stock_names::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    StockName,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::stock_names::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockName.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
