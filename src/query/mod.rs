//! Query specification parsing and the feature pipeline that turns it into a bounded collection query.

pub mod coerce;
pub mod features;
pub mod model;
pub mod spec;

pub use features::{PreparedQuery, QueryFeatures, DEFAULT_LIMIT, MAX_LIMIT};
pub use model::{CollectionQuery, CompareOp, Condition, FilterSet, Projection, SortKey, TextSearch};
pub use spec::{QuerySpec, QueryValue};
