//! Which phone numbers posted an image, filtered by post date.
//!
//! Each query resolves the image's parent ads, translates them to local ids
//! and filters the phone / post-date snapshot join. Dates compare strictly:
//! a posting on the reference date is neither before nor after it.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use common::{CdrId, parse_datetime};
use sources::{SnapshotTable, SnapshotTableName};
use tracing::debug;

use crate::context::MemexContext;
use crate::error::{QueryError, QueryResult};
use crate::lookups::confirmed_parent_ad_ids;

const WITH_DATES: &[SnapshotTableName] = &[SnapshotTableName::Phone, SnapshotTableName::PostDate];
const PHONES_ONLY: &[SnapshotTableName] = &[SnapshotTableName::Phone];

/// Parse a reference date given as text.
pub fn parse_reference_date(s: &str) -> QueryResult<NaiveDateTime> {
    parse_datetime(s).ok_or_else(|| QueryError::InvalidDate(s.to_string()))
}

/// Snapshot rows for every ad that used the image.
pub async fn postings_for_image(
    ctx: &MemexContext,
    image_id: &CdrId,
    tables: &[SnapshotTableName],
) -> QueryResult<SnapshotTable> {
    let ad_ids = confirmed_parent_ad_ids(ctx, image_id).await?;
    if ad_ids.is_empty() {
        debug!(image_id = %image_id, "No parent ads");
        return Ok(SnapshotTable::default());
    }

    let local_ids = ctx
        .snapshot
        .translate(&ad_ids)
        .await
        .map_err(|e| QueryError::from_source("snapshot_store", e))?;
    if local_ids.is_empty() {
        debug!(image_id = %image_id, ads = ad_ids.len(), "No parent ads in snapshot");
        return Ok(SnapshotTable::default());
    }

    ctx.snapshot
        .load(&local_ids, tables)
        .await
        .map_err(|e| QueryError::from_source("snapshot_store", e))
}

/// Phones that posted on the earliest post date in `table`.
pub fn first_date_phones(table: &SnapshotTable) -> BTreeSet<String> {
    match table.min_post_date() {
        Some(first) => table.phones_where(|r| r.post_date == Some(first)),
        None => BTreeSet::new(),
    }
}

pub fn phones_posted_before(table: &SnapshotTable, date: NaiveDateTime) -> BTreeSet<String> {
    table.phones_where(|r| r.post_date.is_some_and(|d| d < date))
}

pub fn phones_posted_after(table: &SnapshotTable, date: NaiveDateTime) -> BTreeSet<String> {
    table.phones_where(|r| r.post_date.is_some_and(|d| d > date))
}

/// Phones other than `excluded` that posted before `date`.
pub fn other_phones_posted_before(
    table: &SnapshotTable,
    excluded: &str,
    date: NaiveDateTime,
) -> BTreeSet<String> {
    table.phones_where(|r| r.phone != excluded && r.post_date.is_some_and(|d| d < date))
}

/// Phones that posted the image on the first date it appeared.
pub async fn phones_on_first_date(ctx: &MemexContext, image_id: &CdrId) -> QueryResult<BTreeSet<String>> {
    let table = postings_for_image(ctx, image_id, WITH_DATES).await?;
    Ok(first_date_phones(&table))
}

/// Phones that posted the image before `date`.
pub async fn phones_before(
    ctx: &MemexContext,
    image_id: &CdrId,
    date: NaiveDateTime,
) -> QueryResult<BTreeSet<String>> {
    let table = postings_for_image(ctx, image_id, WITH_DATES).await?;
    Ok(phones_posted_before(&table, date))
}

pub async fn count_phones_before(
    ctx: &MemexContext,
    image_id: &CdrId,
    date: NaiveDateTime,
) -> QueryResult<usize> {
    Ok(phones_before(ctx, image_id, date).await?.len())
}

/// Phones that posted the image after `date`.
pub async fn phones_after(
    ctx: &MemexContext,
    image_id: &CdrId,
    date: NaiveDateTime,
) -> QueryResult<BTreeSet<String>> {
    let table = postings_for_image(ctx, image_id, WITH_DATES).await?;
    Ok(phones_posted_after(&table, date))
}

pub async fn count_phones_after(
    ctx: &MemexContext,
    image_id: &CdrId,
    date: NaiveDateTime,
) -> QueryResult<usize> {
    Ok(phones_after(ctx, image_id, date).await?.len())
}

/// Every phone that posted the image, dated or not.
pub async fn all_phones(ctx: &MemexContext, image_id: &CdrId) -> QueryResult<BTreeSet<String>> {
    let table = postings_for_image(ctx, image_id, PHONES_ONLY).await?;
    Ok(table.phones())
}

pub async fn count_phones(ctx: &MemexContext, image_id: &CdrId) -> QueryResult<usize> {
    Ok(all_phones(ctx, image_id).await?.len())
}

/// Phones other than `phone` that posted the image before `date`.
pub async fn other_phones_before(
    ctx: &MemexContext,
    image_id: &CdrId,
    phone: &str,
    date: NaiveDateTime,
) -> QueryResult<BTreeSet<String>> {
    let table = postings_for_image(ctx, image_id, WITH_DATES).await?;
    Ok(other_phones_posted_before(&table, phone, date))
}

pub async fn count_other_phones_before(
    ctx: &MemexContext,
    image_id: &CdrId,
    phone: &str,
    date: NaiveDateTime,
) -> QueryResult<usize> {
    Ok(other_phones_before(ctx, image_id, phone, date).await?.len())
}
