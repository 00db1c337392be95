//! Filter query builder.
//!
//! A [`FilterSpec`] is an ordered set of `field → predicate` entries, where each
//! predicate is inactive, an exact match, or an inclusive range. The builder
//! turns the active entries into a single `SELECT` against one
//! [`QueryEntity`], with every value bound as a parameter and the clauses
//! joined by a `Condition::all()` accumulator.
//!
//! Building happens in three steps:
//!
//! 1. [`FilterSpec::criteria`] keeps the active entries (or only the entity's
//!    selector field when that one is active), checks each field applies to
//!    the entity and coerces values to their column type.
//! 2. The engine resolves stock names to catalog ids.
//! 3. [`FilterPlan::compose`] turns the criteria into a typed sea-orm select.

use std::fmt;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    Condition, DbBackend, EntityTrait, QueryFilter, QueryOrder, QueryTrait, Select, Value,
    sea_query::{Expr, IntoCondition},
};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, RemovalReason, ResultEngine, StockIdentifier, TransactionType, batches,
    stock_names, transactions,
    util::{parse_date, parse_quantity},
};

/// Every named input the engine validates or filters on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Catalog item, by id or name.
    Stock,
    BatchId,
    TransactionId,
    Quantity,
    QuantityInitial,
    QuantityCurrent,
    DeliveredAt,
    UseBy,
    RecordedAt,
    OccurredAt,
    RemovalDate,
    TransactionType,
    RemovalReason,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::BatchId => "batch_id",
            Self::TransactionId => "transaction_id",
            Self::Quantity => "quantity",
            Self::QuantityInitial => "quantity_initial",
            Self::QuantityCurrent => "quantity_current",
            Self::DeliveredAt => "delivered_at",
            Self::UseBy => "use_by",
            Self::RecordedAt => "recorded_at",
            Self::OccurredAt => "occurred_at",
            Self::RemovalDate => "removal_date",
            Self::TransactionType => "transaction_type",
            Self::RemovalReason => "removal_reason",
        }
    }

    fn kind(self) -> FieldKind {
        match self {
            Self::Stock => FieldKind::Stock,
            Self::BatchId | Self::TransactionId => FieldKind::Id,
            Self::Quantity | Self::QuantityInitial | Self::QuantityCurrent => FieldKind::Integer,
            Self::DeliveredAt | Self::UseBy | Self::OccurredAt | Self::RemovalDate => {
                FieldKind::Date
            }
            Self::RecordedAt => FieldKind::Timestamp,
            Self::TransactionType => FieldKind::TransactionType,
            Self::RemovalReason => FieldKind::RemovalReason,
        }
    }
}

impl TryFrom<&str> for Field {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        const ALL: [Field; 13] = [
            Field::Stock,
            Field::BatchId,
            Field::TransactionId,
            Field::Quantity,
            Field::QuantityInitial,
            Field::QuantityCurrent,
            Field::DeliveredAt,
            Field::UseBy,
            Field::RecordedAt,
            Field::OccurredAt,
            Field::RemovalDate,
            Field::TransactionType,
            Field::RemovalReason,
        ];
        let wanted = value.trim().to_lowercase();
        ALL.into_iter()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| format!("unknown field: {value}"))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FieldKind {
    Stock,
    Id,
    Integer,
    Date,
    Timestamp,
    TransactionType,
    RemovalReason,
}

impl FieldKind {
    fn allows_range(self) -> bool {
        matches!(self, Self::Id | Self::Integer | Self::Date | Self::Timestamp)
    }
}

/// The relation a filter query reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryEntity {
    Batches,
    Transactions,
    StockNames,
}

impl QueryEntity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Batches => "batches",
            Self::Transactions => "transactions",
            Self::StockNames => "stock_names",
        }
    }

    /// Fields that can be filtered on for this entity.
    pub fn fields(self) -> &'static [Field] {
        match self {
            Self::Batches => &[
                Field::BatchId,
                Field::Stock,
                Field::DeliveredAt,
                Field::UseBy,
                Field::RecordedAt,
                Field::QuantityInitial,
                Field::QuantityCurrent,
            ],
            Self::Transactions => &[
                Field::TransactionId,
                Field::BatchId,
                Field::Stock,
                Field::TransactionType,
                Field::RemovalReason,
                Field::Quantity,
                Field::OccurredAt,
                Field::RecordedAt,
            ],
            Self::StockNames => &[Field::Stock],
        }
    }

    /// The single-record field. When active it is the only filter applied.
    pub fn selector(self) -> Field {
        match self {
            Self::Batches => Field::BatchId,
            Self::Transactions => Field::TransactionId,
            Self::StockNames => Field::Stock,
        }
    }
}

impl TryFrom<&str> for QueryEntity {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "batches" | "batch" => Ok(Self::Batches),
            "transactions" | "transaction" => Ok(Self::Transactions),
            "stock_names" | "stock" => Ok(Self::StockNames),
            other => Err(format!("unknown entity: {other}")),
        }
    }
}

impl fmt::Display for QueryEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value typed into a search field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterValue {
    Integer(i64),
    Text(String),
    Date(NaiveDate),
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<TransactionType> for FilterValue {
    fn from(value: TransactionType) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

impl From<RemovalReason> for FilterValue {
    fn from(value: RemovalReason) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Date(value) => write!(f, "{}", value.format(crate::util::DATE_FORMAT)),
        }
    }
}

/// One search criterion. Ranges are inclusive at both ends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredicateSpec {
    #[default]
    Inactive,
    Equals(FilterValue),
    Range(FilterValue, FilterValue),
}

impl PredicateSpec {
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Inactive)
    }
}

/// Ordered `field → predicate` mapping. Setting a field twice replaces the
/// earlier entry in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSpec {
    predicates: Vec<(Field, PredicateSpec)>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, field: Field, predicate: PredicateSpec) -> Self {
        match self.predicates.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = predicate,
            None => self.predicates.push((field, predicate)),
        }
        self
    }

    #[must_use]
    pub fn equals(self, field: Field, value: impl Into<FilterValue>) -> Self {
        self.set(field, PredicateSpec::Equals(value.into()))
    }

    #[must_use]
    pub fn range(
        self,
        field: Field,
        low: impl Into<FilterValue>,
        high: impl Into<FilterValue>,
    ) -> Self {
        self.set(field, PredicateSpec::Range(low.into(), high.into()))
    }

    #[must_use]
    pub fn inactive(self, field: Field) -> Self {
        self.set(field, PredicateSpec::Inactive)
    }

    pub fn get(&self, field: Field) -> Option<&PredicateSpec> {
        self.predicates
            .iter()
            .find_map(|(f, p)| (*f == field).then_some(p))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &PredicateSpec)> {
        self.predicates.iter().map(|(f, p)| (*f, p))
    }

    /// Active entries for `entity`, coerced to column types.
    ///
    /// Fails with `NoPredicate` when nothing is active. When the entity's
    /// selector is active every other entry is ignored.
    pub(crate) fn criteria(&self, entity: QueryEntity) -> ResultEngine<Vec<Criterion>> {
        let selector = entity.selector();
        let active: Vec<(Field, &PredicateSpec)> = match self.get(selector) {
            Some(predicate) if predicate.is_active() => vec![(selector, predicate)],
            _ => self.iter().filter(|(_, p)| p.is_active()).collect(),
        };
        if active.is_empty() {
            return Err(EngineError::NoPredicate);
        }

        active
            .into_iter()
            .map(|(field, predicate)| {
                if !entity.fields().contains(&field) {
                    return Err(EngineError::value(
                        field,
                        format!("{entity} cannot be filtered by {field}"),
                    ));
                }
                Criterion::coerce(field, predicate)
            })
            .collect()
    }
}

impl FromIterator<(Field, PredicateSpec)> for FilterSpec {
    fn from_iter<I: IntoIterator<Item = (Field, PredicateSpec)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |filter, (field, predicate)| filter.set(field, predicate))
    }
}

/// A value coerced to the type of the column it is compared against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Bound {
    Stock(StockIdentifier),
    Id(i32),
    Integer(i64),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Text(&'static str),
}

impl From<Bound> for Value {
    fn from(bound: Bound) -> Self {
        match bound {
            Bound::Stock(StockIdentifier::Id(id)) | Bound::Id(id) => id.into(),
            Bound::Stock(StockIdentifier::Name(name)) => name.into(),
            Bound::Integer(value) => value.into(),
            Bound::Date(value) => value.into(),
            Bound::Timestamp(value) => value.into(),
            Bound::Text(value) => value.into(),
        }
    }
}

/// An active predicate with typed bounds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Criterion {
    Equals(Field, Bound),
    Range(Field, Bound, Bound),
}

impl Criterion {
    fn coerce(field: Field, predicate: &PredicateSpec) -> ResultEngine<Self> {
        let kind = field.kind();
        match predicate {
            PredicateSpec::Inactive => Err(EngineError::NoPredicate),
            PredicateSpec::Equals(value) => {
                let bound = coerce_value(field, kind, value)?;
                match (kind, bound) {
                    (FieldKind::Timestamp, Bound::Date(day)) => {
                        let (start, end) = whole_days(field, day, day)?;
                        Ok(Self::Range(field, start, end))
                    }
                    (_, bound) => Ok(Self::Equals(field, bound)),
                }
            }
            PredicateSpec::Range(low, high) => {
                if !kind.allows_range() {
                    return Err(EngineError::value(
                        field,
                        "only exact matches are supported",
                    ));
                }
                let low = coerce_value(field, kind, low)?;
                let high = coerce_value(field, kind, high)?;
                ensure_ordered(field, &low, &high)?;
                match (kind, low, high) {
                    (FieldKind::Timestamp, Bound::Date(first), Bound::Date(last)) => {
                        let (start, end) = whole_days(field, first, last)?;
                        Ok(Self::Range(field, start, end))
                    }
                    (_, low, high) => Ok(Self::Range(field, low, high)),
                }
            }
        }
    }

    pub(crate) fn field(&self) -> Field {
        match self {
            Self::Equals(field, _) | Self::Range(field, _, _) => *field,
        }
    }

    /// Number of parameters this criterion binds.
    #[cfg(test)]
    pub(crate) fn arity(&self) -> usize {
        match self {
            Self::Equals(..) => 1,
            Self::Range(..) => 2,
        }
    }

    /// Replaces a stock identifier with the resolved catalog id.
    pub(crate) fn with_stock_id(self, stock_id: i32) -> Self {
        match self {
            Self::Equals(field, Bound::Stock(_)) => Self::Equals(field, Bound::Id(stock_id)),
            other => other,
        }
    }

    pub(crate) fn stock_identifier(&self) -> Option<&StockIdentifier> {
        match self {
            Self::Equals(_, Bound::Stock(identifier)) => Some(identifier),
            _ => None,
        }
    }

    fn condition(self, column: Expr) -> Condition {
        match self {
            Self::Equals(_, bound) => column.eq(Value::from(bound)).into_condition(),
            // Timestamps: half-open [first day 00:00, day after last 00:00).
            Self::Range(_, low @ Bound::Timestamp(_), high) => Condition::all()
                .add(column.clone().gte(Value::from(low)))
                .add(column.lt(Value::from(high))),
            Self::Range(_, low, high) => column
                .between(Value::from(low), Value::from(high))
                .into_condition(),
        }
    }
}

fn coerce_value(field: Field, kind: FieldKind, value: &FilterValue) -> ResultEngine<Bound> {
    match (kind, value) {
        (FieldKind::Stock, FilterValue::Integer(id)) => {
            let id = i32::try_from(*id)
                .map_err(|_| EngineError::UnknownStock(id.to_string()))?;
            Ok(Bound::Stock(StockIdentifier::Id(id)))
        }
        (FieldKind::Stock, FilterValue::Text(text)) => {
            if text.trim().is_empty() {
                return Err(EngineError::value(field, "stock must not be empty"));
            }
            Ok(Bound::Stock(StockIdentifier::parse(text)))
        }
        (FieldKind::Id, FilterValue::Integer(id)) => i32::try_from(*id)
            .map(Bound::Id)
            .map_err(|_| EngineError::value(field, format!("{id} is out of range"))),
        (FieldKind::Id, FilterValue::Text(text)) => text
            .trim()
            .parse::<i32>()
            .map(Bound::Id)
            .map_err(|_| EngineError::value(field, format!("'{}' is not an id", text.trim()))),
        (FieldKind::Integer, FilterValue::Integer(value)) => Ok(Bound::Integer(*value)),
        (FieldKind::Integer, FilterValue::Text(text)) => {
            parse_quantity(field, text).map(Bound::Integer)
        }
        (FieldKind::Date | FieldKind::Timestamp, FilterValue::Date(date)) => Ok(Bound::Date(*date)),
        (FieldKind::Date | FieldKind::Timestamp, FilterValue::Text(text)) => {
            parse_date(field, text).map(Bound::Date)
        }
        (FieldKind::TransactionType, FilterValue::Text(text)) => {
            TransactionType::try_from(text.as_str()).map(|kind| Bound::Text(kind.as_str()))
        }
        (FieldKind::RemovalReason, FilterValue::Text(text)) => {
            RemovalReason::try_from(text.as_str()).map(|reason| Bound::Text(reason.as_str()))
        }
        (FieldKind::Date | FieldKind::Timestamp, FilterValue::Integer(_)) => Err(
            EngineError::date(field, format!("expected a date, got '{value}'")),
        ),
        (FieldKind::Integer, FilterValue::Date(_)) => Err(EngineError::quantity(
            field,
            format!("expected a number, got '{value}'"),
        )),
        (_, other) => Err(EngineError::value(
            field,
            format!("unsupported value '{other}'"),
        )),
    }
}

/// `recorded_at` holds timestamps, so dates typed into it cover whole days.
fn whole_days(field: Field, first: NaiveDate, last: NaiveDate) -> ResultEngine<(Bound, Bound)> {
    let end = last
        .checked_add_days(Days::new(1))
        .ok_or_else(|| EngineError::date(field, "date out of range"))?;
    Ok((
        Bound::Timestamp(first.and_time(NaiveTime::MIN).and_utc()),
        Bound::Timestamp(end.and_time(NaiveTime::MIN).and_utc()),
    ))
}

fn ensure_ordered(field: Field, low: &Bound, high: &Bound) -> ResultEngine<()> {
    let reversed = match (low, high) {
        (Bound::Id(a), Bound::Id(b)) => a > b,
        (Bound::Integer(a), Bound::Integer(b)) => a > b,
        (Bound::Date(a), Bound::Date(b)) => a > b,
        _ => false,
    };
    if !reversed {
        return Ok(());
    }
    match field.kind() {
        FieldKind::Date | FieldKind::Timestamp => Err(EngineError::date(
            field,
            "range start is after range end",
        )),
        FieldKind::Integer => Err(EngineError::quantity(
            field,
            "range start is greater than range end",
        )),
        _ => Err(EngineError::value(
            field,
            "range start is greater than range end",
        )),
    }
}

/// SQL text and the ordered parameters it binds.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl FilterStatement {
    /// Count of `?` placeholders in the SQL text.
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

/// A composed filter query, typed by the entity it reads.
#[derive(Clone, Debug)]
pub(crate) enum FilterPlan {
    Batches(Select<batches::Entity>),
    Transactions(Select<transactions::Entity>),
    StockNames(Select<stock_names::Entity>),
}

impl FilterPlan {
    /// Joins the criteria with `AND` into one select for `entity`.
    ///
    /// Stock criteria must already carry resolved ids.
    pub(crate) fn compose(entity: QueryEntity, criteria: Vec<Criterion>) -> ResultEngine<Self> {
        if criteria.is_empty() {
            return Err(EngineError::NoPredicate);
        }
        let mut condition = Condition::all();
        for criterion in criteria {
            if let Some(identifier) = criterion.stock_identifier() {
                return Err(EngineError::UnknownStock(identifier.to_string()));
            }
            let column = column_for(entity, criterion.field())?;
            condition = condition.add(criterion.condition(column));
        }

        Ok(match entity {
            QueryEntity::Batches => Self::Batches(
                batches::Entity::find()
                    .filter(condition)
                    .order_by_asc(batches::Column::Id),
            ),
            QueryEntity::Transactions => Self::Transactions(
                transactions::Entity::find()
                    .filter(condition)
                    .order_by_asc(transactions::Column::Id),
            ),
            QueryEntity::StockNames => {
                Self::StockNames(stock_names::stock_level_select().filter(condition))
            }
        })
    }

    pub(crate) fn statement(&self) -> FilterStatement {
        let statement = match self {
            Self::Batches(select) => select.build(DbBackend::Sqlite),
            Self::Transactions(select) => select.build(DbBackend::Sqlite),
            Self::StockNames(select) => select.build(DbBackend::Sqlite),
        };
        FilterStatement {
            sql: statement.sql,
            params: statement.values.map(|values| values.0).unwrap_or_default(),
        }
    }
}

fn column_for(entity: QueryEntity, field: Field) -> ResultEngine<Expr> {
    let column = match (entity, field) {
        (QueryEntity::Batches, Field::BatchId) => {
            Expr::col((batches::Entity, batches::Column::Id))
        }
        (QueryEntity::Batches, Field::Stock) => {
            Expr::col((batches::Entity, batches::Column::StockId))
        }
        (QueryEntity::Batches, Field::DeliveredAt) => {
            Expr::col((batches::Entity, batches::Column::DeliveredAt))
        }
        (QueryEntity::Batches, Field::UseBy) => Expr::col((batches::Entity, batches::Column::UseBy)),
        (QueryEntity::Batches, Field::RecordedAt) => {
            Expr::col((batches::Entity, batches::Column::RecordedAt))
        }
        (QueryEntity::Batches, Field::QuantityInitial) => {
            Expr::col((batches::Entity, batches::Column::QuantityInitial))
        }
        (QueryEntity::Batches, Field::QuantityCurrent) => {
            Expr::col((batches::Entity, batches::Column::QuantityCurrent))
        }
        (QueryEntity::Transactions, Field::TransactionId) => {
            Expr::col((transactions::Entity, transactions::Column::Id))
        }
        (QueryEntity::Transactions, Field::BatchId) => {
            Expr::col((transactions::Entity, transactions::Column::BatchId))
        }
        (QueryEntity::Transactions, Field::Stock) => {
            Expr::col((transactions::Entity, transactions::Column::StockId))
        }
        (QueryEntity::Transactions, Field::TransactionType) => {
            Expr::col((transactions::Entity, transactions::Column::TransactionType))
        }
        (QueryEntity::Transactions, Field::RemovalReason) => {
            Expr::col((transactions::Entity, transactions::Column::RemovalReason))
        }
        (QueryEntity::Transactions, Field::Quantity) => {
            Expr::col((transactions::Entity, transactions::Column::Quantity))
        }
        (QueryEntity::Transactions, Field::OccurredAt) => {
            Expr::col((transactions::Entity, transactions::Column::OccurredAt))
        }
        (QueryEntity::Transactions, Field::RecordedAt) => {
            Expr::col((transactions::Entity, transactions::Column::RecordedAt))
        }
        (QueryEntity::StockNames, Field::Stock) => {
            Expr::col((stock_names::Entity, stock_names::Column::Id))
        }
        (entity, field) => {
            return Err(EngineError::value(
                field,
                format!("{entity} cannot be filtered by {field}"),
            ));
        }
    };
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Plays the part of the engine's catalog lookup.
    fn resolve(criteria: Vec<Criterion>) -> Vec<Criterion> {
        criteria
            .into_iter()
            .map(|criterion| match criterion.stock_identifier() {
                Some(_) => criterion.with_stock_id(1),
                None => criterion,
            })
            .collect()
    }

    fn build(entity: QueryEntity, filter: &FilterSpec) -> ResultEngine<FilterStatement> {
        let criteria = resolve(filter.criteria(entity)?);
        Ok(FilterPlan::compose(entity, criteria)?.statement())
    }

    fn sample_predicate(field: Field) -> PredicateSpec {
        match field.kind() {
            FieldKind::Stock => PredicateSpec::Equals("bolts".into()),
            FieldKind::Id => PredicateSpec::Range(1.into(), 9.into()),
            FieldKind::Integer => PredicateSpec::Range(0.into(), 100.into()),
            FieldKind::Date | FieldKind::Timestamp => {
                PredicateSpec::Range("2025-1-1".into(), "2025-12-31".into())
            }
            FieldKind::TransactionType => PredicateSpec::Equals("removal".into()),
            FieldKind::RemovalReason => PredicateSpec::Equals("lost".into()),
        }
    }

    /// Text between `WHERE` and the trailing `GROUP BY`/`ORDER BY`.
    fn where_clause(sql: &str) -> &str {
        let (_, tail) = sql.split_once(" WHERE ").unwrap();
        [" GROUP BY ", " ORDER BY "]
            .iter()
            .filter_map(|keyword| tail.find(keyword))
            .min()
            .map_or(tail, |end| &tail[..end])
    }

    fn assert_well_formed(statement: &FilterStatement) {
        let sql = &statement.sql;
        assert_eq!(statement.placeholder_count(), statement.params.len(), "{sql}");
        assert!(sql.contains(" WHERE "), "{sql}");
        assert!(!sql.contains("AND AND"), "{sql}");
        assert!(!sql.contains("WHERE AND"), "{sql}");
        assert!(!sql.contains("AND ORDER"), "{sql}");
        assert!(!sql.contains("AND GROUP"), "{sql}");
        assert!(!sql.trim_end().ends_with("AND"), "{sql}");
        assert_eq!(sql.matches('(').count(), sql.matches(')').count(), "{sql}");
    }

    #[test]
    fn scenario_name_and_use_by_range() {
        let filter = FilterSpec::new()
            .equals(Field::Stock, "bolts")
            .inactive(Field::DeliveredAt)
            .range(Field::UseBy, "2025-01-01", "2025-12-31");
        let statement = build(QueryEntity::Batches, &filter).unwrap();

        assert_eq!(statement.params.len(), 3);
        assert_eq!(
            where_clause(&statement.sql),
            "\"batches\".\"stock_id\" = ? AND (\"batches\".\"use_by\" BETWEEN ? AND ?)"
        );
        assert_eq!(statement.params[0], Value::from(1i32));
        assert_eq!(statement.params[1], Value::from(date(2025, 1, 1)));
        assert_eq!(statement.params[2], Value::from(date(2025, 12, 31)));
    }

    #[test]
    fn every_non_empty_subset_builds_valid_sql() {
        for entity in [
            QueryEntity::Batches,
            QueryEntity::Transactions,
            QueryEntity::StockNames,
        ] {
            let fields = entity.fields();
            for mask in 1u32..(1 << fields.len()) {
                let filter: FilterSpec = fields
                    .iter()
                    .enumerate()
                    .map(|(bit, field)| {
                        let predicate = if mask & (1 << bit) != 0 {
                            sample_predicate(*field)
                        } else {
                            PredicateSpec::Inactive
                        };
                        (*field, predicate)
                    })
                    .collect();

                let criteria = filter.criteria(entity).unwrap();
                let statement = build(entity, &filter).unwrap();
                assert_well_formed(&statement);

                let expected: usize = criteria.iter().map(Criterion::arity).sum();
                assert_eq!(statement.params.len(), expected, "{}", statement.sql);

                // one AND between clauses, one inside each two-sided clause
                let ranges = criteria
                    .iter()
                    .filter(|c| matches!(c, Criterion::Range(..)))
                    .count();
                assert_eq!(
                    statement.sql.matches(" AND ").count(),
                    criteria.len() - 1 + ranges,
                    "{}",
                    statement.sql
                );

                if filter.get(entity.selector()).is_some_and(PredicateSpec::is_active) {
                    assert_eq!(criteria.len(), 1);
                    assert_eq!(criteria[0].field(), entity.selector());
                } else {
                    assert_eq!(criteria.len(), mask.count_ones() as usize);
                }
            }
        }
    }

    #[test]
    fn selector_overrides_other_predicates() {
        let filter = FilterSpec::new()
            .equals(Field::Stock, "bolts")
            .range(Field::DeliveredAt, "2025-01-01", "2025-02-01")
            .equals(Field::BatchId, 42);
        let statement = build(QueryEntity::Batches, &filter).unwrap();

        assert_eq!(statement.params, vec![Value::from(42i32)]);
        let predicates = where_clause(&statement.sql);
        assert_eq!(predicates, "\"batches\".\"id\" = ?");
        assert!(!predicates.contains("stock_id"));
        assert!(!predicates.contains("delivered_at"));
    }

    #[test]
    fn selector_override_skips_fields_foreign_to_the_entity() {
        // The selector wins before field applicability is checked.
        let filter = FilterSpec::new()
            .equals(Field::RemovalReason, "lost")
            .equals(Field::BatchId, 3);
        let statement = build(QueryEntity::Batches, &filter).unwrap();
        assert_eq!(statement.params.len(), 1);
    }

    #[test]
    fn inactive_only_is_no_predicate() {
        let filter = FilterSpec::new()
            .inactive(Field::Stock)
            .inactive(Field::UseBy);
        assert_eq!(
            filter.criteria(QueryEntity::Batches).unwrap_err(),
            EngineError::NoPredicate
        );
        assert_eq!(
            FilterSpec::new()
                .criteria(QueryEntity::Transactions)
                .unwrap_err(),
            EngineError::NoPredicate
        );
    }

    #[test]
    fn field_not_on_entity_is_rejected() {
        let filter = FilterSpec::new().equals(Field::RemovalReason, "lost");
        let err = filter.criteria(QueryEntity::Batches).unwrap_err();
        assert_eq!(err.field(), Some(Field::RemovalReason));
    }

    #[test]
    fn range_on_equality_field_is_rejected() {
        let filter = FilterSpec::new().range(Field::TransactionType, "addition", "removal");
        let err = filter.criteria(QueryEntity::Transactions).unwrap_err();
        assert!(matches!(err, EngineError::InvalidValue { .. }));
    }

    #[test]
    fn reversed_date_range_is_invalid_date() {
        let filter = FilterSpec::new().range(Field::OccurredAt, "2025-12-31", "2025-01-01");
        let err = filter.criteria(QueryEntity::Transactions).unwrap_err();
        assert!(matches!(err, EngineError::InvalidDate { .. }));
    }

    #[test]
    fn reversed_quantity_range_is_invalid_quantity() {
        let filter = FilterSpec::new().range(Field::QuantityCurrent, 10, 2);
        let err = filter.criteria(QueryEntity::Batches).unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuantity { .. }));
    }

    #[test]
    fn unpadded_dates_are_bound_canonically() {
        let filter = FilterSpec::new().range(Field::DeliveredAt, "2025-6-4", "2025-6-30");
        let statement = build(QueryEntity::Batches, &filter).unwrap();
        assert_eq!(
            statement.params,
            vec![Value::from(date(2025, 6, 4)), Value::from(date(2025, 6, 30))]
        );
    }

    #[test]
    fn recorded_at_range_covers_whole_days() {
        let filter = FilterSpec::new().range(Field::RecordedAt, "2025-06-01", "2025-06-30");
        let statement = build(QueryEntity::Transactions, &filter).unwrap();
        assert!(statement.sql.contains("\"transactions\".\"recorded_at\" >= ?"));
        assert!(statement.sql.contains("\"transactions\".\"recorded_at\" < ?"));
        let end = date(2025, 7, 1).and_time(NaiveTime::MIN).and_utc();
        assert_eq!(statement.params[1], Value::from(end));
    }

    #[test]
    fn user_text_never_reaches_sql() {
        let filter = FilterSpec::new()
            .equals(Field::TransactionType, "removal")
            .equals(Field::RemovalReason, "out_of_date");
        let statement = build(QueryEntity::Transactions, &filter).unwrap();
        assert!(!statement.sql.contains("removal'"));
        assert!(!statement.sql.contains("out_of_date"));
        assert_eq!(
            statement.params,
            vec![Value::from("removal"), Value::from("out_of_date")]
        );
    }

    #[test]
    fn unresolved_stock_name_is_unknown_stock() {
        let criteria = FilterSpec::new()
            .equals(Field::Stock, "washers")
            .criteria(QueryEntity::Batches)
            .unwrap();
        let err = FilterPlan::compose(QueryEntity::Batches, criteria).unwrap_err();
        assert_eq!(err, EngineError::UnknownStock("washers".to_string()));
    }

    #[test]
    fn stock_query_carries_total_quantity() {
        let filter = FilterSpec::new().equals(Field::Stock, "bolts");
        let statement = build(QueryEntity::StockNames, &filter).unwrap();
        assert!(statement.sql.contains("total_quantity"));
        assert!(statement.sql.contains("LEFT JOIN \"batches\""));
        assert!(statement.sql.contains("GROUP BY"));
        assert_eq!(statement.params, vec![Value::from(1i32)]);
    }

    #[test]
    fn setting_a_field_twice_keeps_its_position() {
        let filter = FilterSpec::new()
            .equals(Field::Stock, "bolts")
            .equals(Field::UseBy, "2030-01-01")
            .equals(Field::Stock, "nuts");
        let fields: Vec<Field> = filter.iter().map(|(f, _)| f).collect();
        assert_eq!(fields, vec![Field::Stock, Field::UseBy]);
        assert_eq!(
            filter.get(Field::Stock),
            Some(&PredicateSpec::Equals("nuts".into()))
        );
    }
}
