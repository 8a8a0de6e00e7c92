//! Single-value image lookups, each a fixed-order fallback chain.

use common::{CdrId, ImageDocument, ImageHash};
use serde_json::Value;
use sources::{BoolFilterQuery, SearchHit, SearchRequest, SourceError};

use crate::context::MemexContext;
use crate::error::QueryResult;
use crate::outcome::{Outcome, Resolution, Resolver};

/// Page size for the parent-ad fallback query.
const PARENT_QUERY_SIZE: usize = 100;

/// Read a cell holding an [`ImageDocument`].
async fn row_document(ctx: &MemexContext, table: &str, column: &str, key: &str) -> Outcome<ImageDocument> {
    Outcome::from_lookup(ctx.row_store.get_string(table, key, column).await).and_then(|raw| {
        match serde_json::from_str::<ImageDocument>(&raw) {
            Ok(doc) => Outcome::Found(doc),
            Err(e) => Outcome::Failed(SourceError::Decode(format!(
                "{table}/{key}/{column}: {e}"
            ))),
        }
    })
}

/// First hit whose `_id` matches exactly.
async fn search_by_id(ctx: &MemexContext, id: &CdrId) -> Outcome<SearchHit> {
    let request = SearchRequest::new(
        ctx.config.search_index.clone(),
        BoolFilterQuery::new().must_match("_id", id.as_str()),
    )
    .with_size(1);
    match ctx.search.search(&request).await {
        Ok(hits) => Outcome::from_option(hits.into_iter().next()),
        Err(e) => Outcome::Failed(e),
    }
}

/// Epoch seconds from a JSON number or numeric string.
pub(crate) fn value_as_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Where the image's raw binary is stored.
///
/// Row store image document, then the search index document.
pub async fn image_stored_url(ctx: &MemexContext, image_id: &CdrId) -> QueryResult<Resolution<String>> {
    let tables = &ctx.config.tables;
    let mut resolver = Resolver::new("stored_url", image_id.as_str(), ctx.policy());

    resolver
        .try_source("row_store:images", async {
            row_document(ctx, &tables.images, &tables.images_column, image_id.as_str())
                .await
                .and_then(|doc| Outcome::from_option(doc.obj_stored_url.as_deref().and_then(non_empty)))
        })
        .await?;

    resolver
        .try_source("search_index", async {
            search_by_id(ctx, image_id).await.and_then(|hit| {
                Outcome::from_option(
                    hit.source_field("obj_stored_url")
                        .and_then(Value::as_str)
                        .and_then(non_empty),
                )
            })
        })
        .await?;

    Ok(resolver.finish())
}

/// SHA-1 of the image binary.
///
/// The precomputed hash table first; otherwise the binary is located with
/// [`image_stored_url`], fetched and hashed. There is no index fallback.
pub async fn image_hash(ctx: &MemexContext, image_id: &CdrId) -> QueryResult<Resolution<ImageHash>> {
    let tables = &ctx.config.tables;
    let mut resolver = Resolver::new("image_hash", image_id.as_str(), ctx.policy());

    resolver
        .try_source("row_store:sha1", async {
            Outcome::from_lookup(
                ctx.row_store
                    .get_string(&tables.sha1, image_id.as_str(), &tables.sha1_column)
                    .await,
            )
            .and_then(|raw| match ImageHash::from_hex(&raw) {
                Ok(hash) => Outcome::Found(hash),
                Err(e) => Outcome::Failed(SourceError::Decode(format!(
                    "{}/{image_id}: {e}",
                    tables.sha1
                ))),
            })
        })
        .await?;

    if !resolver.is_found() {
        let mut url = image_stored_url(ctx, image_id).await?;
        resolver.absorb(&mut url);
        let stored_url = url.into_value();

        resolver
            .try_source("binary_fetch", async {
                match stored_url.as_deref() {
                    Some(url) => match ctx.fetcher.fetch(url).await {
                        Ok(bytes) => Outcome::Found(ImageHash::compute(&bytes)),
                        Err(e) => Outcome::Failed(e),
                    },
                    None => Outcome::NotFound,
                }
            })
            .await?;
    }

    Ok(resolver.finish())
}

/// Timestamp at which a CDR record was first seen.
///
/// Image document, then the image-id table, then the search index.
pub async fn timestamp_for_cdr_id(ctx: &MemexContext, cdr_id: &CdrId) -> QueryResult<Resolution<i64>> {
    let tables = &ctx.config.tables;
    let mut resolver = Resolver::new("timestamp", cdr_id.as_str(), ctx.policy());

    resolver
        .try_source("row_store:images", async {
            row_document(ctx, &tables.images, &tables.images_column, cdr_id.as_str())
                .await
                .and_then(|doc| Outcome::from_option(doc.timestamp))
        })
        .await?;

    resolver
        .try_source("row_store:image_ht_id", async {
            Outcome::from_lookup(
                ctx.row_store
                    .get_string(&tables.image_ht_id, cdr_id.as_str(), &tables.timestamp_column)
                    .await,
            )
            .and_then(|raw| match raw.trim().parse::<i64>() {
                Ok(ts) => Outcome::Found(ts),
                Err(e) => Outcome::Failed(SourceError::Decode(format!(
                    "{}/{cdr_id}: {e}",
                    tables.image_ht_id
                ))),
            })
        })
        .await?;

    resolver
        .try_source("search_index", async {
            search_by_id(ctx, cdr_id)
                .await
                .and_then(|hit| Outcome::from_option(hit.source_field("timestamp").and_then(value_as_timestamp)))
        })
        .await?;

    Ok(resolver.finish())
}

/// Split a comma-separated id list, dropping blanks.
pub(crate) fn split_parent_ids(raw: &str) -> Vec<CdrId> {
    raw.split(',')
        .filter_map(non_empty)
        .map(CdrId::from)
        .collect()
}

/// Every ad the image was posted in.
///
/// The precomputed parent table (keyed by image hash), then the parents
/// recorded on the image's search document.
pub async fn parent_ad_ids(ctx: &MemexContext, image_id: &CdrId) -> QueryResult<Resolution<Vec<CdrId>>> {
    let tables = &ctx.config.tables;
    let mut hash = image_hash(ctx, image_id).await?;
    let mut resolver = Resolver::new("parent_ad_ids", image_id.as_str(), ctx.policy());
    resolver.absorb(&mut hash);

    resolver
        .try_source("row_store:image_infos", async {
            let Some(hash) = hash.value.as_ref() else {
                return Outcome::NotFound;
            };
            Outcome::from_lookup(
                ctx.row_store
                    .get_string(&tables.image_infos, &hash.to_hex(), &tables.parent_ids_column)
                    .await,
            )
            .and_then(|raw| {
                let ids = split_parent_ids(&raw);
                if ids.is_empty() {
                    Outcome::NotFound
                } else {
                    Outcome::Found(ids)
                }
            })
        })
        .await?;

    resolver
        .try_source("search_index", async {
            let request = SearchRequest::new(
                ctx.config.search_index.clone(),
                BoolFilterQuery::new().must_match("_id", image_id.as_str()),
            )
            .with_fields(["obj_parent"])
            .with_size(PARENT_QUERY_SIZE);

            match ctx.search.search(&request).await {
                Ok(hits) => {
                    let ids: Vec<CdrId> = hits
                        .iter()
                        .flat_map(|hit| hit.field_values("obj_parent"))
                        .filter_map(Value::as_str)
                        .filter_map(non_empty)
                        .map(CdrId::from)
                        .collect();
                    if ids.is_empty() {
                        Outcome::NotFound
                    } else {
                        Outcome::Found(ids)
                    }
                }
                Err(e) => Outcome::Failed(e),
            }
        })
        .await?;

    Ok(resolver.finish())
}

/// [`parent_ad_ids`] for queries built on top of it: an empty list means
/// the image was confirmed never posted, and an unconfirmed absence is
/// [`QueryError::Degraded`](crate::error::QueryError::Degraded).
pub(crate) async fn confirmed_parent_ad_ids(ctx: &MemexContext, image_id: &CdrId) -> QueryResult<Vec<CdrId>> {
    Ok(parent_ad_ids(ctx, image_id)
        .await?
        .confirmed("parent_ad_ids", image_id.as_str())?
        .unwrap_or_default())
}
