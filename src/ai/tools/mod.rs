//! Tool declarations and the catalog that binds them to implementations.

mod catalog;
mod schema;

pub use catalog::{
    AsyncToolFn, ScopedCatalog, SharedCatalog, SyncToolFn, Tool, ToolCatalog, ToolDefinition,
    ToolHandler,
};
pub use schema::{ParamType, SchemaBuilder};
