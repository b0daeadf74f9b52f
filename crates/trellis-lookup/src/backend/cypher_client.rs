//! Cypher-speaking backend adapter
//!
//! [`CypherTransaction`] renders every read with [`crate::query::cypher`] and
//! hands the text plus parameters to a [`CypherClient`], which owns the
//! actual database session. Rows come back as JSON objects keyed by the
//! `RETURN` aliases and are decoded with serde.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::trace;

use super::{
    BackendError, BackendResult, Direction, EntryRecord, EntryRow, EntryTypeRecord,
    GraphTransaction, ImageFeature, PropertyFact, PropertyRecord, RelationshipFact,
    RelationshipFilter,
};
use crate::ids::{EntryId, EntryTypeId, PropertyId, SiteId};
use crate::query::cypher::{self, RenderedQuery};
use crate::query::{EntrySetQuery, RowQuery, Window};

/// Runs one read-only Cypher query inside the caller's transaction
#[async_trait]
pub trait CypherClient: Send + Sync {
    async fn run(&self, query: RenderedQuery) -> BackendResult<Vec<serde_json::Value>>;
}

/// [`GraphTransaction`] that renders reads to Cypher
#[derive(Debug)]
pub struct CypherTransaction<C> {
    client: C,
}

#[derive(Deserialize)]
struct CountRow {
    count: u64,
}

impl<C: CypherClient> CypherTransaction<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn rows<T: DeserializeOwned>(&self, query: RenderedQuery) -> BackendResult<Vec<T>> {
        trace!(cypher = %query.cypher, params = query.params.len(), "running cypher read");
        self.client
            .run(query)
            .await?
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(BackendError::from))
            .collect()
    }

    async fn count(&self, query: RenderedQuery) -> BackendResult<u64> {
        let rows: Vec<CountRow> = self.rows(query).await?;
        rows.first()
            .map(|row| row.count)
            .ok_or_else(|| BackendError::Decode("count query returned no rows".to_string()))
    }
}

#[async_trait]
impl<C: CypherClient> GraphTransaction for CypherTransaction<C> {
    async fn fetch_entry_set(
        &self,
        query: &EntrySetQuery,
        window: Window,
    ) -> BackendResult<Vec<EntryRow>> {
        self.rows(cypher::entry_set_slice(query, window)).await
    }

    async fn count_entry_set(&self, query: &EntrySetQuery) -> BackendResult<u64> {
        self.count(cypher::entry_set_count(query)).await
    }

    async fn fetch_rows(
        &self,
        query: &RowQuery,
        window: Window,
    ) -> BackendResult<Vec<serde_json::Value>> {
        self.rows(cypher::rows_slice(query, window)).await
    }

    async fn count_rows(&self, query: &RowQuery) -> BackendResult<u64> {
        self.count(cypher::rows_count(query)).await
    }

    async fn entries(&self, site: &SiteId, ids: &[EntryId]) -> BackendResult<Vec<EntryRecord>> {
        self.rows(cypher::entries(site, ids)).await
    }

    async fn entries_by_friendly_id(
        &self,
        site: &SiteId,
        friendly_ids: &[String],
    ) -> BackendResult<Vec<EntryRecord>> {
        self.rows(cypher::entries_by_friendly_id(site, friendly_ids)).await
    }

    async fn entry_types(
        &self,
        site: &SiteId,
        ids: &[EntryTypeId],
    ) -> BackendResult<Vec<EntryTypeRecord>> {
        self.rows(cypher::entry_types(site, ids)).await
    }

    async fn properties(
        &self,
        site: &SiteId,
        ids: &[PropertyId],
    ) -> BackendResult<Vec<PropertyRecord>> {
        self.rows(cypher::properties(site, ids)).await
    }

    async fn relationships(
        &self,
        site: &SiteId,
        entries: &[EntryId],
        filter: &RelationshipFilter,
        direction: Direction,
    ) -> BackendResult<Vec<RelationshipFact>> {
        self.rows(cypher::relationships(site, entries, filter, direction))
            .await
    }

    async fn property_facts(
        &self,
        site: &SiteId,
        entries: &[EntryId],
        property: &PropertyId,
    ) -> BackendResult<Vec<PropertyFact>> {
        self.rows(cypher::property_facts(site, entries, property)).await
    }

    async fn image_features(
        &self,
        site: &SiteId,
        entries: &[EntryId],
    ) -> BackendResult<Vec<ImageFeature>> {
        self.rows(cypher::image_features(site, entries)).await
    }
}
