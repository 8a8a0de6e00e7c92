//! Time since an image was last posted.

use common::CdrId;

use crate::context::MemexContext;
use crate::error::QueryResult;
use crate::timestamps::ad_timestamps_for_image;

/// Gap between postings, in the same unit as `timestamps`.
///
/// Without a reference time this is the gap between the latest and
/// second-latest postings: `None` when never posted, `0` when posted once.
///
/// With a reference time it is the distance back to the latest posting
/// strictly before the reference, or `0` when there is none. A posting at
/// exactly the reference time does not count as before it.
///
/// Gaps wider than `i64` can hold saturate at `i64::MAX`.
pub fn photo_gap(timestamps: &[i64], reference: Option<i64>) -> Option<i64> {
    let mut sorted = timestamps.to_vec();
    sorted.sort_unstable();

    match reference {
        None => match sorted.as_slice() {
            [] => None,
            [_] => Some(0),
            [.., second_latest, latest] => Some(latest.saturating_sub(*second_latest)),
        },
        Some(reference) => Some(
            sorted
                .iter()
                .rev()
                .find(|&&ts| ts < reference)
                .map_or(0, |&ts| reference.saturating_sub(ts)),
        ),
    }
}

/// [`photo_gap`] over every posting of `image_id`.
pub async fn photo_gap_for_image(
    ctx: &MemexContext,
    image_id: &CdrId,
    reference: Option<i64>,
) -> QueryResult<Option<i64>> {
    let timestamps = ad_timestamps_for_image(ctx, image_id).await?;
    Ok(photo_gap(&timestamps, reference))
}
