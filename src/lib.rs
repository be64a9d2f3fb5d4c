//! Trade lifecycle and settlement engine for a vehicle barter marketplace.
//!
//! Participants propose exchanging one vehicle for another, optionally
//! topped up with cash; the target owner (or an admin) approves or
//! rejects; approval swaps ownership of both vehicles atomically with the
//! status flip; settlement records payment of the cash top-up against the
//! approved trade. Reporting reads the persisted records without mutating
//! them.

pub mod error;
pub mod report;
pub mod service;
pub mod store;
pub mod trade;
pub mod utils;
pub mod vehicle;
