//! Utility modules
//!
//! The console logger backing the `log` facade.

pub mod log;

pub use self::log::{Console, ConsoleLogger};
