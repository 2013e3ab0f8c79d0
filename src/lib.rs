//! glance: a news and movie dashboard with favorites and saved preferences.
//!
//! The library holds everything except the command-line surface:
//! provider clients, the durable store, the state container and the
//! [`dashboard::Dashboard`] coordinator that ties them together.

pub mod config;
pub mod dashboard;
pub mod model;
pub mod providers;
pub mod storage;
pub mod store;
pub mod util;
