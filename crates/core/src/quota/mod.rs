//! Per-requester concurrency limits.

mod tracker;

pub use tracker::QuotaTracker;
