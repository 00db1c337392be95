//! Command structs for the ledger write operations.
//!
//! Callers build these from already-collected input and hand them to the
//! engine by value; the engine never reads input from anywhere else.
//! `validate` reports every field-level problem at once so a form can mark
//! all offending inputs, while the engine operations stop at the first one.

use chrono::NaiveDate;

use crate::{
    EngineError, Field, RemovalReason, StockIdentifier,
    util::{ensure_positive_quantity, parse_date, parse_quantity},
};

/// Receive a new batch of a catalog item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdditionCmd {
    pub stock: StockIdentifier,
    pub quantity: i64,
    pub delivered_at: NaiveDate,
    pub use_by: NaiveDate,
}

impl AdditionCmd {
    #[must_use]
    pub fn new(
        stock: impl Into<StockIdentifier>,
        quantity: i64,
        delivered_at: NaiveDate,
        use_by: NaiveDate,
    ) -> Self {
        Self {
            stock: stock.into(),
            quantity,
            delivered_at,
            use_by,
        }
    }

    /// Builds the command from raw form text, collecting every parse error.
    pub fn parse(
        stock: &str,
        quantity: &str,
        delivered_at: &str,
        use_by: &str,
    ) -> Result<Self, Vec<EngineError>> {
        let mut errors = Vec::new();
        let quantity = parse_quantity(Field::Quantity, quantity)
            .map_err(|err| errors.push(err))
            .ok();
        let delivered_at = parse_date(Field::DeliveredAt, delivered_at)
            .map_err(|err| errors.push(err))
            .ok();
        let use_by = parse_date(Field::UseBy, use_by)
            .map_err(|err| errors.push(err))
            .ok();
        match (quantity, delivered_at, use_by) {
            (Some(quantity), Some(delivered_at), Some(use_by)) if errors.is_empty() => {
                Ok(Self::new(stock, quantity, delivered_at, use_by))
            }
            _ => Err(errors),
        }
    }

    /// Field checks that need no catalog lookup, evaluated against `today`.
    pub fn validate(&self, today: NaiveDate) -> Vec<EngineError> {
        let mut errors = Vec::new();
        if let StockIdentifier::Name(name) = &self.stock
            && name.trim().is_empty()
        {
            errors.push(EngineError::value(Field::Stock, "stock must not be empty"));
        }
        if let Err(err) = ensure_positive_quantity(Field::Quantity, self.quantity) {
            errors.push(err);
        }
        if self.delivered_at > today {
            errors.push(EngineError::date(
                Field::DeliveredAt,
                format!("delivery date {} is in the future", self.delivered_at),
            ));
        }
        if self.use_by <= today {
            errors.push(EngineError::date(
                Field::UseBy,
                format!("use-by date {} must be after today", self.use_by),
            ));
        } else if self.use_by <= self.delivered_at {
            errors.push(EngineError::date(
                Field::UseBy,
                "use-by date must be after the delivery date",
            ));
        }
        errors
    }
}

/// Take stock out of an existing batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovalCmd {
    pub batch_id: i32,
    pub quantity: i64,
    pub removal_date: NaiveDate,
    pub reason: RemovalReason,
}

impl RemovalCmd {
    #[must_use]
    pub fn new(
        batch_id: i32,
        quantity: i64,
        removal_date: NaiveDate,
        reason: RemovalReason,
    ) -> Self {
        Self {
            batch_id,
            quantity,
            removal_date,
            reason,
        }
    }

    /// Builds the command from raw form text, collecting every parse error.
    pub fn parse(
        batch_id: &str,
        quantity: &str,
        removal_date: &str,
        reason: &str,
    ) -> Result<Self, Vec<EngineError>> {
        let mut errors = Vec::new();
        let batch_id = batch_id
            .trim()
            .parse::<i32>()
            .map_err(|_| {
                errors.push(EngineError::value(
                    Field::BatchId,
                    format!("'{}' is not a batch number", batch_id.trim()),
                ))
            })
            .ok();
        let quantity = parse_quantity(Field::Quantity, quantity)
            .map_err(|err| errors.push(err))
            .ok();
        let removal_date = parse_date(Field::RemovalDate, removal_date)
            .map_err(|err| errors.push(err))
            .ok();
        let reason = RemovalReason::try_from(reason)
            .map_err(|err| errors.push(err))
            .ok();
        match (batch_id, quantity, removal_date, reason) {
            (Some(batch_id), Some(quantity), Some(removal_date), Some(reason))
                if errors.is_empty() =>
            {
                Ok(Self::new(batch_id, quantity, removal_date, reason))
            }
            _ => Err(errors),
        }
    }

    /// Field checks that need no batch lookup, evaluated against `today`.
    pub fn validate(&self, today: NaiveDate) -> Vec<EngineError> {
        let mut errors = Vec::new();
        if let Err(err) = ensure_positive_quantity(Field::Quantity, self.quantity) {
            errors.push(err);
        }
        if self.removal_date > today {
            errors.push(EngineError::date(
                Field::RemovalDate,
                format!("removal date {} is in the future", self.removal_date),
            ));
        }
        errors
    }
}
