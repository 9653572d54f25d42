//! Network transports.

pub mod tcp;
