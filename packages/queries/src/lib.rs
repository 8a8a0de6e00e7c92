//! Investigative queries over the MEMEX CDR image and ad records.
//!
//! Lookups try cheap precomputed tables first and fall back to the search
//! index only on a miss. Every lookup reports which sources failed along the
//! way so a degraded backend is never mistaken for a missing record.

pub mod context;
pub mod error;
pub mod lookups;
pub mod outcome;
pub mod phones;
pub mod photo_gap;
pub mod timestamps;

#[cfg(test)]
mod testing;

pub use context::MemexContext;
pub use error::{QueryError, QueryResult};
pub use lookups::{image_hash, image_stored_url, parent_ad_ids, timestamp_for_cdr_id};
pub use outcome::{Outcome, Resolution, Resolver, SourceFailure};
pub use phones::{
    all_phones, count_other_phones_before, count_phones, count_phones_after, count_phones_before,
    other_phones_before, parse_reference_date, phones_after, phones_before, phones_on_first_date,
};
pub use photo_gap::{photo_gap, photo_gap_for_image};
pub use timestamps::{ad_timestamps, ad_timestamps_for_image, first_posted};
