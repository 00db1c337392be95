use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    EngineError, ResultEngine, StockIdentifier, StockName, stock_names,
    util::{normalize_stock_display, normalize_stock_key},
};

use super::{Engine, with_tx};

impl Engine {
    /// Adds an item to the stock catalog.
    ///
    /// Names are unique ignoring case and surrounding/inner whitespace.
    pub async fn add_stock_name(&self, name: &str) -> ResultEngine<StockName> {
        let display = normalize_stock_display(name)?;
        let name_norm = normalize_stock_key(&display);

        with_tx!(self, |db_tx| {
            let existing = stock_names::Entity::find()
                .filter(stock_names::Column::NameNorm.eq(name_norm.clone()))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                return Err(EngineError::DuplicateStock(display.clone()));
            }

            let model = stock_names::ActiveModel {
                id: ActiveValue::NotSet,
                name: ActiveValue::Set(display.clone()),
                name_norm: ActiveValue::Set(name_norm.clone()),
            }
            .insert(&db_tx)
            .await?;
            tracing::info!(stock_id = model.id, name = %model.name, "stock item added");
            Ok(StockName::from(model))
        })
    }

    /// The whole catalog, in catalog order.
    pub async fn stock_names(&self) -> ResultEngine<Vec<StockName>> {
        let models = stock_names::Entity::find()
            .order_by_asc(stock_names::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(StockName::from).collect())
    }

    /// Looks up a single catalog item by id or case-insensitive name.
    pub async fn stock_name(&self, identifier: &StockIdentifier) -> ResultEngine<StockName> {
        Self::resolve_stock(&self.database, identifier).await
    }

    pub(super) async fn resolve_stock<C>(
        db: &C,
        identifier: &StockIdentifier,
    ) -> ResultEngine<StockName>
    where
        C: ConnectionTrait,
    {
        let model = match identifier {
            StockIdentifier::Id(id) => stock_names::Entity::find_by_id(*id).one(db).await?,
            StockIdentifier::Name(name) => {
                let key = normalize_stock_key(name);
                if key.is_empty() {
                    return Err(EngineError::UnknownStock(name.clone()));
                }
                stock_names::Entity::find()
                    .filter(stock_names::Column::NameNorm.eq(key))
                    .one(db)
                    .await?
            }
        };
        let model = model.ok_or_else(|| EngineError::UnknownStock(identifier.to_string()))?;
        tracing::debug!(%identifier, stock_id = model.id, "stock resolved");
        Ok(StockName::from(model))
    }
}
