//! Treasury core for a private school: tariff resolution, debt evaluation
//! and special-case billing windows.
//!
//! `tariff`, `billing` and `progress` are pure. `store` is the only module
//! that talks to SQLite. `treasury` wires the two together.

pub mod billing;
pub mod concept;
pub mod config;
pub mod error;
pub mod progress;
pub mod special_case;
pub mod store;
pub mod tariff;
pub mod treasury;
pub mod types;
