//! # housing-shared
//!
//! Domain vocabulary for the student housing vault: application types, the
//! fee and distance policy tables, priority scoring, reference numbers, form
//! validation and at-rest sealing.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod reference;
pub mod scoring;
pub mod types;
pub mod validation;

pub use error::{CryptoError, ValidationError, ValidationIssue};
pub use types::{
    Application, ApplicationForm, ApplicationPatch, ApplicationStatus, Gender, Province, RoomType,
    Specialization,
};
