//! Data layer: core types, loading, combining, registry and filtering.
//!
//! Architecture:
//! ```text
//!  .csv / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader  │  parse file → Table (typed cells, role columns)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │   join   │  concat files / inner join on (timestamp, location)
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ registry │  name → cached Arc<Dataset>
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter  │  date range + city → filtered Table
//!   └──────────┘
//! ```

pub mod filter;
pub mod join;
pub mod loader;
pub mod model;
pub mod registry;
