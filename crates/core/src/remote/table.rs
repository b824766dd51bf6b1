//! Typed access to one collection.

use std::marker::PhantomData;

use serde_json::Value;

use super::{Query, RowStore, StoreError, StoreResult};
use crate::records::Record;

/// Typed view over the collection of `R`.
///
/// Converts drafts to JSON on the way in and rows to `R` on the way out; a
/// row that does not decode is reported as [`StoreError::Decode`].
pub struct Table<'a, R, S: ?Sized> {
    store: &'a S,
    _record: PhantomData<fn() -> R>,
}

impl<'a, R, S> Table<'a, R, S>
where
    R: Record,
    S: RowStore + ?Sized,
{
    /// Typed view over `store`.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    /// A query over this collection in its default order.
    #[must_use]
    pub fn query(&self) -> Query {
        Query::new(R::COLLECTION).sort(R::SORT)
    }

    /// Every row, in the collection's default order.
    ///
    /// # Errors
    ///
    /// Returns the store error, or `StoreError::Decode` for malformed rows.
    pub async fn list(&self) -> StoreResult<Vec<R>> {
        self.select(&self.query()).await
    }

    /// Rows matching `query`.
    ///
    /// # Errors
    ///
    /// Returns the store error, or `StoreError::Decode` for malformed rows.
    pub async fn select(&self, query: &Query) -> StoreResult<Vec<R>> {
        let rows = self.store.select(query).await?;
        decode_rows(rows)
    }

    /// Rows whose `column` equals `value`, in default order.
    ///
    /// # Errors
    ///
    /// Returns the store error, or `StoreError::Decode` for malformed rows.
    pub async fn find_by(&self, column: &str, value: impl Into<Value> + Send) -> StoreResult<Vec<R>> {
        let query = self.query().eq(column, value);
        self.select(&query).await
    }

    /// The row with the given ID, if present.
    ///
    /// # Errors
    ///
    /// Returns the store error, or `StoreError::Decode` for a malformed row.
    pub async fn find(&self, id: R::Id) -> StoreResult<Option<R>> {
        let query = Query::new(R::COLLECTION).eq("id", id.to_string()).limit(1);
        Ok(self.select(&query).await?.into_iter().next())
    }

    /// The first row in default order, if any.
    ///
    /// # Errors
    ///
    /// Returns the store error, or `StoreError::Decode` for a malformed row.
    pub async fn first(&self) -> StoreResult<Option<R>> {
        let query = self.query().limit(1);
        Ok(self.select(&query).await?.into_iter().next())
    }

    /// Insert one row.
    ///
    /// # Errors
    ///
    /// Returns the store error, or `StoreError::Decode` if the store does
    /// not echo exactly the stored row.
    pub async fn insert(&self, draft: &R::Draft) -> StoreResult<R> {
        let row = serde_json::to_value(draft)?;
        let stored = self.store.insert(R::COLLECTION, vec![row]).await?;
        decode_rows::<R>(stored)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("insert into {} returned no row", R::COLLECTION)))
    }

    /// Insert several rows in a single request.
    ///
    /// # Errors
    ///
    /// Returns the store error, or `StoreError::Decode` for malformed rows.
    pub async fn insert_many(&self, drafts: &[R::Draft]) -> StoreResult<Vec<R>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let rows = drafts
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        let stored = self.store.insert(R::COLLECTION, rows).await?;
        decode_rows(stored)
    }

    /// Overwrite a row with the contents of `draft`.
    ///
    /// # Errors
    ///
    /// Returns the store error, or `StoreError::Decode` for a malformed row.
    pub async fn update(&self, id: R::Id, draft: &R::Draft) -> StoreResult<R> {
        let patch = serde_json::to_value(draft)?;
        self.patch(id, patch).await
    }

    /// Apply a partial update to a row.
    ///
    /// # Errors
    ///
    /// Returns the store error, or `StoreError::Decode` for a malformed row.
    pub async fn patch(&self, id: R::Id, patch: Value) -> StoreResult<R> {
        let stored = self
            .store
            .update(R::COLLECTION, &id.to_string(), patch)
            .await?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Delete a row.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn delete(&self, id: R::Id) -> StoreResult<()> {
        self.store.delete(R::COLLECTION, &id.to_string()).await
    }
}

fn decode_rows<R: Record>(rows: Vec<Value>) -> StoreResult<Vec<R>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(StoreError::from))
        .collect()
}
