//! Utilities shared by the clinic chat binaries: logging setup and clocks.

pub mod logger;
pub mod time;
