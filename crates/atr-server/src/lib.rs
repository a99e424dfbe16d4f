//! # atr-server
//!
//! Search, versioned read, create/update and patient-scoped bulk export over
//! a [`atr_storage::DocumentStore`]. [`ResourceService`] is the facade a
//! transport layer drives; configuration comes from [`config::loader`].

pub mod bulk;
pub mod config;
pub mod error;
pub mod mutation;
pub mod observability;
pub mod resolver;
pub mod service;
pub mod version;

pub use bulk::{
    BulkExportEngine, BulkExportOutcome, BulkExportRequest, TypeExport, TypeExportFailure,
};
pub use config::AppConfig;
pub use error::{ErrorKind, PartialExportError, ServiceError};
pub use mutation::{Clock, MutationOutcome, MutationPipeline, SystemClock};
pub use resolver::VersionResolver;
pub use service::{ResourceService, SearchOutcome, SearchRequest};
pub use version::{ConstantVersion, SequentialVersion};
