//! Typed constraint values per search parameter type.

pub mod date;
pub mod reference;
pub mod token;

pub use date::{DateBound, DateRangeConstraint};
pub use reference::{ReferenceConstraint, ReferenceValue, resolve_reference};
pub use token::{TokenConstraint, TokenValue, parse_token_value};
