//! Batch data model and the aggregator contract.

pub mod aggregator;
pub mod batch;
