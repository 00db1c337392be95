use chrono::Utc;
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    AdditionCmd, Batch, EngineError, Field, RemovalCmd, ResultEngine, Transaction,
    TransactionType, batches, transactions,
};

use super::{Engine, with_tx};

impl Engine {
    /// Receives a new batch and writes its founding `addition` entry.
    ///
    /// The batch row and the ledger row are written in one DB transaction:
    /// if the ledger insert fails the batch insert is rolled back too.
    /// Returns the new batch id.
    pub async fn record_addition(&self, cmd: AdditionCmd) -> ResultEngine<i32> {
        if let Some(err) = cmd.validate(self.today()).into_iter().next() {
            return Err(err);
        }

        let outcome = with_tx!(self, |db_tx| {
            let stock = Self::resolve_stock(&db_tx, &cmd.stock).await?;
            let recorded_at = Utc::now();

            let batch = batches::ActiveModel {
                id: ActiveValue::NotSet,
                stock_id: ActiveValue::Set(stock.id),
                quantity_initial: ActiveValue::Set(cmd.quantity),
                quantity_current: ActiveValue::Set(cmd.quantity),
                delivered_at: ActiveValue::Set(cmd.delivered_at),
                use_by: ActiveValue::Set(cmd.use_by),
                recorded_at: ActiveValue::Set(recorded_at),
            }
            .insert(&db_tx)
            .await?;

            transactions::ActiveModel {
                id: ActiveValue::NotSet,
                batch_id: ActiveValue::Set(batch.id),
                stock_id: ActiveValue::Set(stock.id),
                transaction_type: ActiveValue::Set(TransactionType::Addition.as_str().to_string()),
                quantity: ActiveValue::Set(cmd.quantity),
                occurred_at: ActiveValue::Set(cmd.delivered_at),
                removal_reason: ActiveValue::Set(None),
                recorded_at: ActiveValue::Set(recorded_at),
            }
            .insert(&db_tx)
            .await?;

            Ok((batch.id, stock))
        });

        match outcome {
            Ok((batch_id, stock)) => {
                tracing::info!(
                    batch_id,
                    stock = %stock.name,
                    quantity = cmd.quantity,
                    "batch added"
                );
                Ok(batch_id)
            }
            Err(err) => {
                if matches!(err, EngineError::Storage(_)) {
                    tracing::warn!(stock = %cmd.stock, "addition rolled back: {err}");
                }
                Err(err)
            }
        }
    }

    /// Takes stock out of a batch and appends the matching `removal` entry.
    ///
    /// The removal date must not precede the batch delivery date. The
    /// quantity decrement and the ledger row commit together or not at all.
    pub async fn record_removal(&self, cmd: RemovalCmd) -> ResultEngine<()> {
        if let Some(err) = cmd.validate(self.today()).into_iter().next() {
            return Err(err);
        }

        let outcome = with_tx!(self, |db_tx| {
            let batch = batches::Entity::find_by_id(cmd.batch_id)
                .one(&db_tx)
                .await?
                .ok_or(EngineError::UnknownBatch(cmd.batch_id))?;

            if cmd.quantity > batch.quantity_current {
                return Err(EngineError::quantity(
                    Field::Quantity,
                    format!(
                        "cannot remove {} from batch {}: only {} left",
                        cmd.quantity, batch.id, batch.quantity_current
                    ),
                ));
            }
            if cmd.removal_date < batch.delivered_at {
                return Err(EngineError::date(
                    Field::RemovalDate,
                    format!(
                        "removal date {} is before delivery date {}",
                        cmd.removal_date, batch.delivered_at
                    ),
                ));
            }

            let remaining = batch.quantity_current - cmd.quantity;
            batches::ActiveModel {
                id: ActiveValue::Unchanged(batch.id),
                quantity_current: ActiveValue::Set(remaining),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;

            transactions::ActiveModel {
                id: ActiveValue::NotSet,
                batch_id: ActiveValue::Set(batch.id),
                stock_id: ActiveValue::Set(batch.stock_id),
                transaction_type: ActiveValue::Set(TransactionType::Removal.as_str().to_string()),
                quantity: ActiveValue::Set(cmd.quantity),
                occurred_at: ActiveValue::Set(cmd.removal_date),
                removal_reason: ActiveValue::Set(Some(cmd.reason.as_str().to_string())),
                recorded_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;

            Ok(remaining)
        });

        match outcome {
            Ok(remaining) => {
                tracing::info!(
                    batch_id = cmd.batch_id,
                    quantity = cmd.quantity,
                    remaining,
                    reason = %cmd.reason,
                    "stock removed"
                );
                Ok(())
            }
            Err(err) => {
                if matches!(err, EngineError::Storage(_)) {
                    tracing::warn!(batch_id = cmd.batch_id, "removal rolled back: {err}");
                }
                Err(err)
            }
        }
    }

    /// A single batch by id.
    pub async fn batch(&self, batch_id: i32) -> ResultEngine<Batch> {
        batches::Entity::find_by_id(batch_id)
            .one(&self.database)
            .await?
            .map(Batch::from)
            .ok_or(EngineError::UnknownBatch(batch_id))
    }

    /// Ledger entries of one batch, oldest first.
    pub async fn batch_transactions(&self, batch_id: i32) -> ResultEngine<Vec<Transaction>> {
        let batch = self.batch(batch_id).await?;
        transactions::Entity::find()
            .filter(transactions::Column::BatchId.eq(batch.id))
            .order_by_asc(transactions::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }
}
