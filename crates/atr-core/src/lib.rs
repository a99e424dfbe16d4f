//! Shared vocabulary for the ATR bulk data server: resource types, validation
//! errors, reference and date parsing.

pub mod error;
pub mod fhir;
pub mod fhir_reference;
pub mod id;
pub mod time;

pub use error::{Result, ValidationError};
pub use fhir::ResourceType;
pub use fhir_reference::{ReferenceError, ResourceRef, canonical_reference};
pub use id::{IdError, parse_resource_id};
pub use time::{DatePrecision, DateRange, format_instant, parse_date_range, parse_date_start};
