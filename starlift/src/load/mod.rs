//! Loading: object storage into landing tables, and query-derived rows into
//! the star schema.

mod insert;
mod spec;
mod stage;

pub use insert::{load_via_query, DimensionLoader, FactLoader};
pub use spec::{DimensionSpec, FactSpec, JsonFormat, StageSpec};
pub use stage::StageLoader;
