//! The two relay endpoints.
//!
//! - [`sender::Sender`] batches monitor results and ships one frame per flush.
//! - [`receiver::Receiver`] accepts frames one connection at a time and feeds
//!   an aggregator until asked to stop.

pub mod receiver;
pub mod sender;
