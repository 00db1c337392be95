use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, FromQueryResult, QueryFilter, Statement, Value, prelude::*};

use crate::{
    ResultEngine, StockIdentifier, StockLevel, TransactionType, stock_names,
    stock_names::stock_level_select,
};

use super::Engine;

impl Engine {
    /// Current stock per catalog item: the sum of `quantity_current` over its
    /// batches, zero when it has none.
    ///
    /// With a filter only that item is returned; an unknown item is an
    /// `UnknownStock` error rather than an empty result.
    pub async fn current_stock_levels(
        &self,
        filter: Option<&StockIdentifier>,
    ) -> ResultEngine<Vec<StockLevel>> {
        let mut query = stock_level_select();
        if let Some(identifier) = filter {
            let stock = Self::resolve_stock(&self.database, identifier).await?;
            query = query.filter(stock_names::Column::Id.eq(stock.id));
        }
        let levels = query
            .into_model::<StockLevel>()
            .all(&self.database)
            .await?;
        Ok(levels)
    }

    /// Stock per catalog item as of the end of `date`, replayed from the
    /// ledger: additions minus removals whose business date is `<= date`.
    pub async fn stock_levels_at(
        &self,
        date: NaiveDate,
        filter: Option<&StockIdentifier>,
    ) -> ResultEngine<Vec<StockLevel>> {
        let stock_id = match filter {
            Some(identifier) => Some(Self::resolve_stock(&self.database, identifier).await?.id),
            None => None,
        };

        let mut values: Vec<Value> = vec![TransactionType::Addition.as_str().into(), date.into()];
        let stock_cond = match stock_id {
            Some(id) => {
                values.push(id.into());
                " WHERE s.id = ?"
            }
            None => "",
        };
        let stmt = Statement::from_sql_and_values(
            self.database.get_database_backend(),
            format!(
                "SELECT s.id AS stock_id, s.name AS name, \
                 COALESCE(SUM(CASE WHEN t.transaction_type = ? THEN t.quantity \
                                   ELSE -t.quantity END), 0) AS total_quantity \
                 FROM stock_names s \
                 LEFT JOIN transactions t ON t.stock_id = s.id AND t.occurred_at <= ?\
                 {stock_cond} \
                 GROUP BY s.id, s.name \
                 ORDER BY s.id"
            ),
            values,
        );
        let levels = StockLevel::find_by_statement(stmt)
            .all(&self.database)
            .await?;
        Ok(levels)
    }
}
