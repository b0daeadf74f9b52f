//! Expression Tree
//!
//! Immutable lookup expressions. A tree is equal to another exactly when it
//! has the same node kinds and the same children, and
//! `parse_lookup(&expr.to_string()) == expr` for every tree the parser can
//! produce.
//!
//! Evaluation is recursive and async: [`LookupExpression::get_value`] returns
//! a boxed future, evaluates children left to right and awaits every backend
//! read in turn.

mod display;
mod media;
mod property;
mod scalar;
mod sequence;
mod traversal;

pub use sequence::resolve_slice;

use futures::future::BoxFuture;

use crate::backend::Direction;
use crate::context::EvalContext;
use crate::error::{LookupError, LookupResult};
use crate::ids::{EntryId, EntryTypeId, PropertyId};
use crate::value::{LookupValue, ValueKind};

/// Length at which [`LookupExpression::debug_string`] shortens its output.
pub const DEBUG_STRING_LIMIT: usize = 50;

/// Trailing characters kept by a shortened debug string.
const DEBUG_STRING_TAIL: usize = 5;

// ============================================================================
// Node types
// ============================================================================

/// A literal value. Only null, booleans, integers and strings have a
/// literal form; the evaluator also binds already-resolved entries as
/// literals (see [`LookupExpression::resolved_entry`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    value: LookupValue,
}

impl Literal {
    pub fn new(value: LookupValue) -> LookupResult<Self> {
        match value {
            LookupValue::Null
            | LookupValue::Boolean(_)
            | LookupValue::Integer(_)
            | LookupValue::String(_) => Ok(Self { value }),
            other => Err(LookupError::internal(format!(
                "a {} value cannot be used as a literal",
                other.kind()
            ))),
        }
    }

    pub fn value(&self) -> &LookupValue {
        &self.value
    }
}

/// `target.fn(prop=...)`
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyLookup {
    pub target: Box<LookupExpression>,
    pub prop: Box<LookupExpression>,
}

/// `from.related(via=..., direction=...)`
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedLookup {
    pub from: Box<LookupExpression>,
    pub via: Option<Box<LookupExpression>>,
    /// `"from"`, `"to"` or `"both"`; absent means both.
    pub direction: Option<Box<LookupExpression>>,
}

/// `iterable.slice(start=..., end=..., size=...)`
#[derive(Debug, Clone, PartialEq)]
pub struct SliceLookup {
    pub iterable: Box<LookupExpression>,
    pub start: Option<Box<LookupExpression>>,
    pub end: Option<Box<LookupExpression>>,
    pub size: Option<Box<LookupExpression>>,
}

/// `if(condition, then=..., else=...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub condition: Box<LookupExpression>,
    pub then: Option<Box<LookupExpression>>,
    pub otherwise: Option<Box<LookupExpression>>,
}

/// A lookup expression node
#[derive(Debug, Clone, PartialEq)]
pub enum LookupExpression {
    Literal(Literal),
    This,
    List(Vec<LookupExpression>),
    /// `[[/entry/<id or friendly id>]]`
    EntryRef(String),
    PropertyRef(PropertyId),
    EntryTypeRef(EntryTypeId),
    /// `$name`, replaced by [`LookupExpression::substitute`] before evaluation.
    Placeholder(String),
    AllEntries,
    Ancestors(Box<LookupExpression>),
    AndAncestors(Box<LookupExpression>),
    Descendants(Box<LookupExpression>),
    AndDescendants(Box<LookupExpression>),
    Related(RelatedLookup),
    Get(PropertyLookup),
    Reverse(PropertyLookup),
    Graph(Box<LookupExpression>),
    Count(Box<LookupExpression>),
    First(Box<LookupExpression>),
    Slice(SliceLookup),
    If(Conditional),
    Date(Box<LookupExpression>),
    Markdown(Box<LookupExpression>),
    Image(Box<LookupExpression>),
    Files(Box<LookupExpression>),
    WithDetail(PropertyLookup),
    EntryTypeOf(Box<LookupExpression>),
}

// ============================================================================
// Construction helpers
// ============================================================================

impl LookupExpression {
    pub fn literal(value: LookupValue) -> LookupResult<Self> {
        Literal::new(value).map(Self::Literal)
    }

    pub fn integer(value: i64) -> Self {
        Self::Literal(Literal {
            value: LookupValue::integer(value),
        })
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal {
            value: LookupValue::string(value),
        })
    }

    pub fn boolean(value: bool) -> Self {
        Self::Literal(Literal {
            value: LookupValue::Boolean(value),
        })
    }

    pub fn null() -> Self {
        Self::Literal(Literal {
            value: LookupValue::Null,
        })
    }

    pub fn entry_ref(key: impl Into<String>) -> Self {
        Self::EntryRef(key.into())
    }

    /// An entry the backend has already produced. Evaluates to the id as-is,
    /// without the id-shape check or friendly-id lookup of [`Self::entry_ref`].
    pub(crate) fn resolved_entry(id: EntryId) -> Self {
        Self::Literal(Literal {
            value: LookupValue::Entry(id),
        })
    }

    pub fn property_ref(id: impl Into<PropertyId>) -> Self {
        Self::PropertyRef(id.into())
    }

    pub fn get(target: LookupExpression, prop: LookupExpression) -> Self {
        Self::Get(PropertyLookup {
            target: Box::new(target),
            prop: Box::new(prop),
        })
    }
}

// ============================================================================
// Tree traversal
// ============================================================================

impl LookupExpression {
    /// Direct children, in evaluation order.
    pub fn children(&self) -> Vec<&LookupExpression> {
        match self {
            Self::Literal(_)
            | Self::This
            | Self::EntryRef(_)
            | Self::PropertyRef(_)
            | Self::EntryTypeRef(_)
            | Self::Placeholder(_)
            | Self::AllEntries => Vec::new(),
            Self::List(items) => items.iter().collect(),
            Self::Ancestors(inner)
            | Self::AndAncestors(inner)
            | Self::Descendants(inner)
            | Self::AndDescendants(inner)
            | Self::Graph(inner)
            | Self::Count(inner)
            | Self::First(inner)
            | Self::Date(inner)
            | Self::Markdown(inner)
            | Self::Image(inner)
            | Self::Files(inner)
            | Self::EntryTypeOf(inner) => vec![inner.as_ref()],
            Self::Related(related) => {
                let mut children = vec![related.from.as_ref()];
                children.extend(related.via.as_deref());
                children.extend(related.direction.as_deref());
                children
            }
            Self::Get(lookup) | Self::Reverse(lookup) | Self::WithDetail(lookup) => {
                vec![lookup.target.as_ref(), lookup.prop.as_ref()]
            }
            Self::Slice(slice) => {
                let mut children = vec![slice.iterable.as_ref()];
                children.extend(slice.start.as_deref());
                children.extend(slice.end.as_deref());
                children.extend(slice.size.as_deref());
                children
            }
            Self::If(conditional) => {
                let mut children = vec![conditional.condition.as_ref()];
                children.extend(conditional.then.as_deref());
                children.extend(conditional.otherwise.as_deref());
                children
            }
        }
    }

    /// A copy of this node with every direct child replaced by `f(child)`.
    fn map_children(&self, f: &mut dyn FnMut(&LookupExpression) -> LookupExpression) -> Self {
        let mut boxed = |child: &LookupExpression| Box::new(f(child));
        match self {
            Self::Literal(_)
            | Self::This
            | Self::EntryRef(_)
            | Self::PropertyRef(_)
            | Self::EntryTypeRef(_)
            | Self::Placeholder(_)
            | Self::AllEntries => self.clone(),
            Self::List(items) => Self::List(items.iter().map(|item| *boxed(item)).collect()),
            Self::Ancestors(inner) => Self::Ancestors(boxed(inner.as_ref())),
            Self::AndAncestors(inner) => Self::AndAncestors(boxed(inner.as_ref())),
            Self::Descendants(inner) => Self::Descendants(boxed(inner.as_ref())),
            Self::AndDescendants(inner) => Self::AndDescendants(boxed(inner.as_ref())),
            Self::Graph(inner) => Self::Graph(boxed(inner.as_ref())),
            Self::Count(inner) => Self::Count(boxed(inner.as_ref())),
            Self::First(inner) => Self::First(boxed(inner.as_ref())),
            Self::Date(inner) => Self::Date(boxed(inner.as_ref())),
            Self::Markdown(inner) => Self::Markdown(boxed(inner.as_ref())),
            Self::Image(inner) => Self::Image(boxed(inner.as_ref())),
            Self::Files(inner) => Self::Files(boxed(inner.as_ref())),
            Self::EntryTypeOf(inner) => Self::EntryTypeOf(boxed(inner.as_ref())),
            Self::Related(related) => Self::Related(RelatedLookup {
                from: boxed(related.from.as_ref()),
                via: related.via.as_deref().map(&mut boxed),
                direction: related.direction.as_deref().map(&mut boxed),
            }),
            Self::Get(lookup) => Self::Get(PropertyLookup {
                target: boxed(lookup.target.as_ref()),
                prop: boxed(lookup.prop.as_ref()),
            }),
            Self::Reverse(lookup) => Self::Reverse(PropertyLookup {
                target: boxed(lookup.target.as_ref()),
                prop: boxed(lookup.prop.as_ref()),
            }),
            Self::WithDetail(lookup) => Self::WithDetail(PropertyLookup {
                target: boxed(lookup.target.as_ref()),
                prop: boxed(lookup.prop.as_ref()),
            }),
            Self::Slice(slice) => Self::Slice(SliceLookup {
                iterable: boxed(slice.iterable.as_ref()),
                start: slice.start.as_deref().map(&mut boxed),
                end: slice.end.as_deref().map(&mut boxed),
                size: slice.size.as_deref().map(&mut boxed),
            }),
            Self::If(conditional) => Self::If(Conditional {
                condition: boxed(conditional.condition.as_ref()),
                then: conditional.then.as_deref().map(&mut boxed),
                otherwise: conditional.otherwise.as_deref().map(&mut boxed),
            }),
        }
    }

    /// Visits every child (recursively) and then this node.
    pub fn traverse_tree<F>(&self, visitor: &mut F)
    where
        F: FnMut(&LookupExpression),
    {
        for child in self.children() {
            child.traverse_tree(visitor);
        }
        visitor(self);
    }

    /// Rebuilds the tree bottom-up, passing every rebuilt node through
    /// `replacer`.
    pub fn traverse_tree_and_replace<F>(&self, replacer: &mut F) -> LookupExpression
    where
        F: FnMut(LookupExpression) -> LookupExpression,
    {
        let rebuilt = self.map_children(&mut |child| child.traverse_tree_and_replace(replacer));
        replacer(rebuilt)
    }

    /// Replaces every `$name` placeholder with `replacement`.
    pub fn substitute(&self, name: &str, replacement: &LookupExpression) -> LookupExpression {
        self.traverse_tree_and_replace(&mut |node| match node {
            Self::Placeholder(placeholder) if placeholder == name => replacement.clone(),
            other => other,
        })
    }

    /// Canonical text shortened to [`DEBUG_STRING_LIMIT`] characters.
    pub fn debug_string(&self) -> String {
        self.debug_string_with_limit(DEBUG_STRING_LIMIT)
    }

    /// Canonical text; when longer than `limit` characters, the first
    /// `limit - 5` and the last 5 are kept around an ellipsis.
    pub fn debug_string_with_limit(&self, limit: usize) -> String {
        let text = self.to_string();
        let length = text.chars().count();
        if length <= limit {
            return text;
        }
        let head: String = text
            .chars()
            .take(limit.saturating_sub(DEBUG_STRING_TAIL))
            .collect();
        let tail: String = text
            .chars()
            .skip(length.saturating_sub(DEBUG_STRING_TAIL))
            .collect();
        format!("{head}…{tail}")
    }
}

// ============================================================================
// Evaluation
// ============================================================================

impl LookupExpression {
    /// Evaluates the expression. Lazy results stay lazy.
    pub fn get_value<'a>(&'a self, ctx: &'a EvalContext) -> BoxFuture<'a, LookupResult<LookupValue>> {
        Box::pin(async move {
            match self {
                Self::Literal(literal) => Ok(literal.value().clone()),
                Self::This => scalar::this(ctx),
                Self::List(items) => sequence::list(ctx, items).await,
                Self::EntryRef(key) => scalar::entry_ref(ctx, key).await,
                Self::PropertyRef(id) => Ok(LookupValue::Property(id.clone())),
                Self::EntryTypeRef(id) => Ok(LookupValue::EntryType(id.clone())),
                Self::Placeholder(name) => Err(LookupError::evaluation(format!(
                    "The placeholder ${name} has not been bound to a value."
                ))),
                Self::AllEntries => Ok(traversal::all_entries(ctx)),
                Self::Ancestors(inner) => {
                    traversal::ancestors(ctx, inner, Direction::Outgoing, false).await
                }
                Self::AndAncestors(inner) => {
                    traversal::ancestors(ctx, inner, Direction::Outgoing, true).await
                }
                Self::Descendants(inner) => {
                    traversal::ancestors(ctx, inner, Direction::Incoming, false).await
                }
                Self::AndDescendants(inner) => {
                    traversal::ancestors(ctx, inner, Direction::Incoming, true).await
                }
                Self::Related(related) => traversal::related(ctx, related).await,
                Self::Get(lookup) => property::get(ctx, lookup).await,
                Self::Reverse(lookup) => property::reverse(ctx, lookup).await,
                Self::Graph(inner) => traversal::graph(ctx, inner).await,
                Self::Count(inner) => sequence::count(ctx, inner).await,
                Self::First(inner) => sequence::first(ctx, inner).await,
                Self::Slice(slice) => sequence::slice(ctx, slice).await,
                Self::If(conditional) => scalar::conditional(ctx, conditional).await,
                Self::Date(inner) => scalar::date(ctx, inner).await,
                Self::Markdown(inner) => scalar::markdown(ctx, inner).await,
                Self::Image(inner) => media::image(ctx, inner).await,
                Self::Files(inner) => media::files(ctx, inner).await,
                Self::WithDetail(lookup) => property::with_detail(ctx, lookup).await,
                Self::EntryTypeOf(inner) => property::entry_type_of(ctx, inner).await,
            }
        })
    }

    /// Evaluates and casts to `kind`, failing with a type error naming this
    /// expression.
    pub async fn get_value_as(&self, ctx: &EvalContext, kind: ValueKind) -> LookupResult<LookupValue> {
        let value = self.get_value(ctx).await?;
        value.cast_to(kind, ctx).ok_or_else(|| {
            LookupError::not_convertible(&ctx.describe(self), kind, value.kind())
        })
    }

    /// Evaluates and makes the result concrete with the context's page
    /// size. Pages produced from lazy values remember this expression.
    pub async fn get_concrete_value(&self, ctx: &EvalContext) -> LookupResult<LookupValue> {
        let value = self.get_value(ctx).await?;
        let concrete = value.make_concrete(ctx, ctx.default_page_size()).await?;
        Ok(match concrete {
            LookupValue::Page(page) if value.is_lazy() => {
                LookupValue::Page(page.with_source(self.clone(), ctx.entry_id().cloned()))
            }
            other => other,
        })
    }

    pub(crate) async fn get_entry_id(&self, ctx: &EvalContext) -> LookupResult<EntryId> {
        match self.get_value_as(ctx, ValueKind::Entry).await?.into_parts().0 {
            LookupValue::Entry(id) => Ok(id),
            other => Err(LookupError::internal(format!(
                "cast to Entry produced {}",
                other.kind()
            ))),
        }
    }

    pub(crate) async fn get_property_id(&self, ctx: &EvalContext) -> LookupResult<PropertyId> {
        match self.get_value_as(ctx, ValueKind::Property).await?.into_parts().0 {
            LookupValue::Property(id) => Ok(id),
            other => Err(LookupError::internal(format!(
                "cast to Property produced {}",
                other.kind()
            ))),
        }
    }

    pub(crate) async fn get_string(&self, ctx: &EvalContext) -> LookupResult<String> {
        match self.get_value_as(ctx, ValueKind::String).await?.into_parts().0 {
            LookupValue::String(text) => Ok(text),
            other => Err(LookupError::internal(format!(
                "cast to String produced {}",
                other.kind()
            ))),
        }
    }

    pub(crate) async fn get_integer(&self, ctx: &EvalContext) -> LookupResult<num_bigint::BigInt> {
        match self.get_value_as(ctx, ValueKind::Integer).await?.into_parts().0 {
            LookupValue::Integer(value) => Ok(value),
            other => Err(LookupError::internal(format!(
                "cast to Integer produced {}",
                other.kind()
            ))),
        }
    }
}
