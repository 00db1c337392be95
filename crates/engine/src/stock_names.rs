//! Stock catalog: the recognized item identities.

use std::fmt;

use sea_orm::{
    FromQueryResult, JoinType, QueryOrder, QuerySelect, Select,
    entity::prelude::*,
    sea_query::{Expr, Func, SimpleExpr},
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockName {
    pub id: i32,
    pub name: String,
}

impl From<Model> for StockName {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

/// How a caller refers to a catalog item: by id or by (case-insensitive) name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockIdentifier {
    Id(i32),
    Name(String),
}

impl StockIdentifier {
    /// A purely numeric input is an id, anything else is a name.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i32>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(trimmed.to_string()),
        }
    }
}

impl From<i32> for StockIdentifier {
    fn from(id: i32) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for StockIdentifier {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for StockIdentifier {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl fmt::Display for StockIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Total current quantity of one catalog item across all of its batches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromQueryResult)]
pub struct StockLevel {
    pub stock_id: i32,
    pub name: String,
    pub total_quantity: i64,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "stock_names")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub name_norm: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::batches::Entity")]
    Batches,
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::batches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batches.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Every catalog item joined with `SUM(batches.quantity_current)`, zero when
/// the item has no batches. Rows come out in catalog order and decode into
/// [`StockLevel`].
pub(crate) fn stock_level_select() -> Select<Entity> {
    let total: SimpleExpr = Func::coalesce([
        Expr::col((
            super::batches::Entity,
            super::batches::Column::QuantityCurrent,
        ))
        .sum(),
        Expr::cust("0"),
    ])
    .into();

    Entity::find()
        .select_only()
        .column_as(Column::Id, "stock_id")
        .column_as(Column::Name, "name")
        .column_as(total, "total_quantity")
        .join(JoinType::LeftJoin, Relation::Batches.def())
        .group_by(Column::Id)
        .group_by(Column::Name)
        .order_by_asc(Column::Id)
}
