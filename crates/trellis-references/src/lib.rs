//! Reference extraction for Trellis
//!
//! Given a rendered lookup value (or a markdown document), works out which
//! entries, entry types and properties it refers to, evaluates any lookups
//! embedded in markdown, and loads the records a client needs to display
//! links without further requests.
//!
//! ```rust,ignore
//! let mut cache = ReferenceCache::new();
//! cache.extract_lookup_references(&value.to_json()?, Some(&entry_id));
//! let data = cache.get_data(&ctx).await?;
//! ```

pub mod cache;
pub mod data;
pub mod error;
pub mod markdown;

pub use cache::{ExtractionLimits, ReferenceCache, PARSE_ERROR_CLASS};
pub use data::{LookupRecord, ReferenceData};
pub use error::{ReferenceError, ReferenceResult};
pub use markdown::{scan_markdown, MarkdownReferences};
