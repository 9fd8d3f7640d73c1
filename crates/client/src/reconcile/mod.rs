//! Domain side effects replayed locally.
//!
//! The server derives some fields from others: run start times follow the
//! schedule, parent bids sum their options. Patches that change the inputs
//! must replay the derivation or the cache drifts until the next refetch.

pub mod bids;
pub mod schedule;
