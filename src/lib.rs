//! Classification and validation rule engine for field-service tickets.
//!
//! Free-text tickets are classified into a ticket type by weighted keyword
//! scoring, then checked against the prioritized validation rules bound to
//! that type. The engine is a pure, synchronous computation per call: rule
//! and type configuration is read fresh from the [`store::RuleStore`]
//! boundary, every active rule is evaluated, and the only external call is
//! the optional FIAS address lookup inside `fias_check` rules, which fails
//! open on any provider outage.

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod fias;
pub mod store;
pub mod telemetry;
pub mod templates;

pub use engine::{ValidationEngine, ValidationResult};
