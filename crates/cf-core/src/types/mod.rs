//! Core data types, enums, and market data structures.

pub mod enums;
pub mod market_data;

pub use enums::*;
pub use market_data::*;
