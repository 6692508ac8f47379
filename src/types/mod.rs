// Shared domain types: produced by the GraphQL layer, consumed by the
// flattener and the export pipeline. Neither side depends on the other.

pub mod item;
pub mod project;

pub use item::*;
pub use project::*;
