use serde::Serialize;

use crate::{
    Batch, FilterSpec, FilterStatement, QueryEntity, ResultEngine, StockLevel, Transaction,
    filter::{Criterion, FilterPlan},
};

use super::Engine;

/// Rows returned by [`Engine::search`], typed by the entity searched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "entity", content = "rows", rename_all = "snake_case")]
pub enum SearchRows {
    Batches(Vec<Batch>),
    Transactions(Vec<Transaction>),
    Stock(Vec<StockLevel>),
}

impl SearchRows {
    pub fn len(&self) -> usize {
        match self {
            Self::Batches(rows) => rows.len(),
            Self::Transactions(rows) => rows.len(),
            Self::Stock(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Engine {
    /// Builds the parameterised `SELECT` for a search without running it.
    ///
    /// Stock names in the filter are resolved against the catalog first, so
    /// an unknown name fails with `UnknownStock` instead of matching nothing.
    pub async fn build_filter_query(
        &self,
        entity: QueryEntity,
        filter: &FilterSpec,
    ) -> ResultEngine<FilterStatement> {
        let statement = self.plan(entity, filter).await?.statement();
        tracing::debug!(
            %entity,
            sql = %statement.sql,
            params = statement.params.len(),
            "filter query built"
        );
        Ok(statement)
    }

    /// Runs a filter query and returns the matching rows, ordered by id.
    pub async fn search(
        &self,
        entity: QueryEntity,
        filter: &FilterSpec,
    ) -> ResultEngine<SearchRows> {
        let rows = match self.plan(entity, filter).await? {
            FilterPlan::Batches(select) => SearchRows::Batches(
                select
                    .all(&self.database)
                    .await?
                    .into_iter()
                    .map(Batch::from)
                    .collect(),
            ),
            FilterPlan::Transactions(select) => SearchRows::Transactions(
                select
                    .all(&self.database)
                    .await?
                    .into_iter()
                    .map(Transaction::try_from)
                    .collect::<ResultEngine<_>>()?,
            ),
            FilterPlan::StockNames(select) => SearchRows::Stock(
                select
                    .into_model::<StockLevel>()
                    .all(&self.database)
                    .await?,
            ),
        };
        tracing::debug!(%entity, rows = rows.len(), "search done");
        Ok(rows)
    }

    async fn plan(&self, entity: QueryEntity, filter: &FilterSpec) -> ResultEngine<FilterPlan> {
        let criteria = filter.criteria(entity)?;
        let criteria = self.resolve_criteria(criteria).await?;
        FilterPlan::compose(entity, criteria)
    }

    async fn resolve_criteria(&self, criteria: Vec<Criterion>) -> ResultEngine<Vec<Criterion>> {
        let mut resolved = Vec::with_capacity(criteria.len());
        for criterion in criteria {
            let stock_id = match criterion.stock_identifier() {
                Some(identifier) => Some(Self::resolve_stock(&self.database, identifier).await?.id),
                None => None,
            };
            resolved.push(match stock_id {
                Some(id) => criterion.with_stock_id(id),
                None => criterion,
            });
        }
        Ok(resolved)
    }
}
