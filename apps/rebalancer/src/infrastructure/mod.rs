//! Infrastructure Layer - Adapters
//!
//! Concrete implementations of the application ports, plus the file-based
//! recommendation feed.

pub mod broker;
pub mod feed;
pub mod marketdata;
