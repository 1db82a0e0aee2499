//! Aggregations that turn a filtered table into chart-ready data.
//!
//! Missing values are left out of every calculation: a bucket, group or
//! column pair with nothing to aggregate is omitted or reported as `None`,
//! never as zero.
pub mod bucket;
pub mod correlation;
pub mod decompose;
pub mod distribution;
