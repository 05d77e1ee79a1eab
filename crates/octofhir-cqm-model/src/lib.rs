//! Clinical quality measure data model
//!
//! This crate provides:
//! - The patient snapshot a measure is evaluated against (`PatientRecord`)
//! - The closed set of clinical facts a record may hold (`ClinicalFact`)
//! - Inbound clinical events that trigger re-evaluation
//! - The async `RecordLoader` trait and in-memory / JSON-directory loaders

pub mod date;
pub mod event;
pub mod fact;
pub mod patient;
pub mod provider;
pub mod retriever;

pub use event::{ClinicalEvent, EventKind};
pub use fact::{
    ClaimLineItem, ClaimStatus, ClinicalFact, ClinicalStatus, Condition, DateSpan, Device,
    DeviceStatus, Encounter, EncounterState, Fact, FactKind, LabReport, LabValue,
    MedicationStatement, MedicationStatus, Observation, PlaceOfService, ProcedureReport,
};
pub use patient::{Patient, PatientRecord};
pub use provider::{LoaderError, RecordLoader};
pub use retriever::{InMemoryRecordLoader, JsonDirectoryLoader};
