//! # Cell Scout Library
//!
//! Log the serving cell tower together with the device location.
//!
//! This library provides the measurement engine: it pairs location fixes with
//! the registered cell, keeps only samples taken far enough apart, and writes
//! them to a per-technology SQLite store.

pub mod cell;
pub mod config;
pub mod error;
pub mod filter;
pub mod location;
pub mod nudge;
pub mod record;
pub mod replay;
pub mod sampling;
pub mod store;
