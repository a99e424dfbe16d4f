//! Search parameter model and query translation.
//!
//! Raw boundary values become a typed [`SearchParameterModel`], which the
//! [`QueryTranslator`] compiles into a backend-neutral [`atr_storage::StoreQuery`].

pub mod model;
pub mod parameters;
pub mod registry;
pub mod sql_builder;
pub mod translator;
pub mod types;

pub use model::{Constraint, ParameterConstraint, SearchParameterModel, SortSpec};
pub use parameters::{
    ParameterSource, SearchModifier, SearchParameter, SearchParameterType, SearchPrefix,
};
pub use registry::{ExportProfile, SearchParameterRegistry};
pub use sql_builder::{BuiltQuery, SqlBuilderError, SqlParam, render_postgres};
pub use translator::{QueryTranslator, TranslatedQuery};
