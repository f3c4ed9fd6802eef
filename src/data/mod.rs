//! Data module - loading, reshaping, bucketing and aggregation

mod aggregator;
mod categorizer;
mod loader;
mod normalizer;

pub use aggregator::{group_sum, sort_rows, to_frame, AggregateRow, AggregatorError, UNKNOWN_BUCKET};
pub use categorizer::{apply_buckets, bucket, BucketRule, CategorizerError, FALLBACK_BUCKET};
pub use loader::{DataLoader, LoaderError};
pub use normalizer::{
    flag_to_bool, parse_date_column, reshape_wide_to_long, with_date_parts, NormalizerError,
    ISO_DATE,
};
