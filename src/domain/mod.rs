//! Core domain types and logic.

pub mod ohlcv;
pub mod overlay;
pub mod split;
pub mod time;
pub mod feed;
pub mod events;
pub mod scenario;
pub mod config_validation;
pub mod error;
