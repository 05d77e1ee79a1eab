//! Clinical quality measure types
//!
//! This crate defines the value types shared by every other crate in the workspace:
//! - Terminology: code systems, codings, value sets and resolved code sets
//! - The measurement period a measure is evaluated over
//! - The card a measure evaluation produces, and the effect that carries it to the host

pub mod card;
pub mod codes;
pub mod error;
pub mod period;
pub mod value_set;

pub use card::{Card, CardStatus, CommandKind, CommandRef, ProtocolCardEffect, Recommendation};
pub use codes::{CodeSystem, Coding};
pub use error::{TypesError, TypesResult};
pub use period::MeasurementPeriod;
pub use value_set::{CodeSet, ValueSet, ValueSetLibrary};
