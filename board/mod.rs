//! Board support
//!
//! Board-specific data and bring-up: the interrupt line map, the
//! interrupt configuration table, the error source map and the functions
//! that load them into the controller at boot.

pub mod explorer;
