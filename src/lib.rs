//! Air quality and weather dashboard.
//!
//! The library holds everything that does not draw: the dataset registry,
//! filtering, aggregation, chart descriptions and the per-session
//! controller. The `airq-dashboard` binary puts an egui front end on top.

pub mod analysis;
pub mod chart;
pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod state;

pub use error::{DashboardError, Result};
