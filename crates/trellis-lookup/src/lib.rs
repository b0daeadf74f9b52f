//! Lookup expressions for Trellis knowledge graphs
//!
//! This crate evaluates small, pure expressions over one site's content
//! graph: `this.andAncestors().get(prop=[[/prop/_pColor]])`,
//! `[[/entry/plants]].descendants().count()`, and so on.
//!
//! ## Features
//!
//! - **Typed values**: a closed [`LookupValue`] family with annotations,
//!   casting and a tagged JSON form
//! - **Lazy entry sets**: graph navigation composes a query AST and only
//!   reads one window (or one count) when a result is needed
//! - **Cypher rendering**: every composed query renders to read-only,
//!   parameterised Cypher
//! - **Surface syntax**: [`parse_lookup`] turns text into an
//!   [`LookupExpression`], and `to_string` renders it back
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trellis_lookup::{parse_lookup, EvalContext, MemoryGraph, SiteId, EntryId};
//!
//! let graph = Arc::new(MemoryGraph::from_json(&snapshot_json)?);
//! let ctx = EvalContext::new(graph, SiteId::new("_site")).with_entry(EntryId::new("_oak"));
//! let expr = parse_lookup("this.ancestors()")?;
//! let page = expr.get_concrete_value(&ctx).await?;
//! println!("{}", serde_json::to_string_pretty(&page.to_json()?)?);
//! ```

pub mod backend;
pub mod context;
pub mod error;
pub mod expr;
pub mod graph;
pub mod ids;
pub mod query;
pub mod syntax;
pub mod test_support;
pub mod value;

// Re-exports
pub use backend::{
    BackendError, BackendResult, CypherClient, CypherTransaction, Direction, GraphSnapshot,
    GraphTransaction, MemoryGraph,
};
pub use context::{EvalContext, EvalLimits, DEFAULT_PAGE_SIZE};
pub use error::{LookupError, LookupResult};
pub use expr::LookupExpression;
pub use ids::{EntryId, EntryTypeId, FactId, PropertyId, SiteId};
pub use query::{EntrySetQuery, RowQuery, Window};
pub use syntax::{parse_lookup, ParseError};
pub use value::{AnyValueJson, LookupValue, ValueJson, ValueKind};
