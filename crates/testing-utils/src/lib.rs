//! # Collector Testing Utils
//!
//! Shared testing utilities for the tiered collection scheduler.
//!
//! - **Mock collaborators**: in-memory `DataCollector`, `TierStore` and
//!   `FeaturePipeline` with scripted behaviour and call recording
//! - **Builders**: tier configurations and asset assignments with sensible defaults
//! - **Helpers**: fast resilience settings and polling utilities
//!
//! ```toml
//! [dev-dependencies]
//! collector-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
