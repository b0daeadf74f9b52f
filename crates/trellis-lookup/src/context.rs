//! Evaluation context
//!
//! Bundles the caller's read transaction, the active site, the optional
//! current entry and the default page size. Contexts are immutable;
//! [`EvalContext::for_entry`] derives a copy for a nested entry scope.

use std::fmt;
use std::sync::Arc;

use crate::backend::GraphTransaction;
use crate::error::{LookupError, LookupResult};
use crate::expr::LookupExpression;
use crate::ids::{EntryId, SiteId};

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Bounds applied during evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalLimits {
    /// Maximum number of hops followed by ancestor/descendant traversal.
    pub max_traversal_depth: u32,
    /// Maximum depth of nested entry scopes (stored values evaluating
    /// other stored values).
    pub max_nesting_depth: u32,
    /// Length at which expressions are shortened in error messages.
    pub debug_string_limit: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            max_traversal_depth: 50,
            max_nesting_depth: 16,
            debug_string_limit: 50,
        }
    }
}

#[derive(Clone)]
pub struct EvalContext {
    transaction: Arc<dyn GraphTransaction>,
    site_id: SiteId,
    entry_id: Option<EntryId>,
    default_page_size: u64,
    limits: EvalLimits,
    depth: u32,
}

impl EvalContext {
    pub fn new(transaction: Arc<dyn GraphTransaction>, site_id: SiteId) -> Self {
        Self {
            transaction,
            site_id,
            entry_id: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            limits: EvalLimits::default(),
            depth: 0,
        }
    }

    #[must_use]
    pub fn with_entry(mut self, entry_id: EntryId) -> Self {
        self.entry_id = Some(entry_id);
        self
    }

    #[must_use]
    pub fn with_default_page_size(mut self, page_size: u64) -> Self {
        self.default_page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: EvalLimits) -> Self {
        self.limits = limits;
        self
    }

    /// A sub-context scoped to `entry_id`, one level deeper.
    pub fn for_entry(&self, entry_id: &EntryId) -> LookupResult<Self> {
        let depth = self.depth + 1;
        if depth > self.limits.max_nesting_depth {
            return Err(LookupError::evaluation(format!(
                "Evaluating the value of entry {entry_id} nested more than {} levels deep.",
                self.limits.max_nesting_depth
            )));
        }
        Ok(Self {
            entry_id: Some(entry_id.clone()),
            depth,
            ..self.clone()
        })
    }

    pub fn transaction(&self) -> &dyn GraphTransaction {
        self.transaction.as_ref()
    }

    pub fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    pub fn entry_id(&self) -> Option<&EntryId> {
        self.entry_id.as_ref()
    }

    pub fn default_page_size(&self) -> u64 {
        self.default_page_size
    }

    pub fn limits(&self) -> &EvalLimits {
        &self.limits
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// `expr` shortened for an error message.
    pub fn describe(&self, expr: &LookupExpression) -> String {
        expr.debug_string_with_limit(self.limits.debug_string_limit)
    }
}

impl fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalContext")
            .field("site_id", &self.site_id)
            .field("entry_id", &self.entry_id)
            .field("default_page_size", &self.default_page_size)
            .field("limits", &self.limits)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
