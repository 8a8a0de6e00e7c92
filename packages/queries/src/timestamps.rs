use common::CdrId;
use sources::{BoolFilterQuery, SearchRequest};
use tracing::debug;

use crate::context::MemexContext;
use crate::error::{QueryError, QueryResult};
use crate::lookups::{confirmed_parent_ad_ids, value_as_timestamp};

/// Posting timestamps of every ad that used the image, in index order.
///
/// Ad timestamps only live in the search index, so the bulk query has no
/// fallback and its failure is returned.
pub async fn ad_timestamps_for_image(ctx: &MemexContext, image_id: &CdrId) -> QueryResult<Vec<i64>> {
    let ad_ids = confirmed_parent_ad_ids(ctx, image_id).await?;
    ad_timestamps(ctx, &ad_ids).await
}

/// Posting timestamps for a set of ads.
pub async fn ad_timestamps(ctx: &MemexContext, ad_ids: &[CdrId]) -> QueryResult<Vec<i64>> {
    if ad_ids.is_empty() {
        return Ok(Vec::new());
    }

    let request = SearchRequest::new(
        ctx.config.search_index.clone(),
        BoolFilterQuery::new().must_match_any("_id", ad_ids.iter().map(CdrId::as_str)),
    )
    .with_fields(["timestamp"])
    .with_size(ad_ids.len());

    let hits = ctx
        .search
        .search(&request)
        .await
        .map_err(|e| QueryError::from_source("search_index", e))?;

    let mut timestamps = Vec::with_capacity(hits.len());
    for hit in &hits {
        match hit.field_values("timestamp").first().and_then(|v| value_as_timestamp(v)) {
            Some(ts) => timestamps.push(ts),
            None => debug!(ad_id = %hit.id, "Ad has no timestamp"),
        }
    }
    Ok(timestamps)
}

/// Earliest posting of the image, if it was ever posted.
pub async fn first_posted(ctx: &MemexContext, image_id: &CdrId) -> QueryResult<Option<i64>> {
    Ok(ad_timestamps_for_image(ctx, image_id).await?.into_iter().min())
}
