//! Canonical surface syntax.
//!
//! Entry-flow functions render as method chains (`this.ancestors()`), the
//! rest as calls (`date("2024-01-01")`). Optional arguments that were not
//! given are omitted.

use std::fmt::{self, Display, Formatter, Write};

use super::{Conditional, LookupExpression, PropertyLookup, RelatedLookup, SliceLookup};
use crate::value::LookupValue;

impl Display for LookupExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => write_literal(f, literal.value()),
            Self::This => f.write_str("this"),
            Self::List(items) => {
                f.write_char('[')?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_char(']')
            }
            Self::EntryRef(key) => write!(f, "[[/entry/{key}]]"),
            Self::PropertyRef(id) => write!(f, "[[/prop/{id}]]"),
            Self::EntryTypeRef(id) => write!(f, "[[/etype/{id}]]"),
            Self::Placeholder(name) => write!(f, "${name}"),
            Self::AllEntries => f.write_str("allEntries()"),
            Self::Ancestors(inner) => write!(f, "{inner}.ancestors()"),
            Self::AndAncestors(inner) => write!(f, "{inner}.andAncestors()"),
            Self::Descendants(inner) => write!(f, "{inner}.descendants()"),
            Self::AndDescendants(inner) => write!(f, "{inner}.andDescendants()"),
            Self::Related(RelatedLookup {
                from,
                via,
                direction,
            }) => {
                write!(f, "{from}.related(")?;
                write_named(f, &[("via", via.as_deref()), ("direction", direction.as_deref())])?;
                f.write_char(')')
            }
            Self::Get(lookup) => write_property_lookup(f, "get", lookup),
            Self::Reverse(lookup) => write_property_lookup(f, "reverse", lookup),
            Self::WithDetail(lookup) => write_property_lookup(f, "withDetail", lookup),
            Self::Graph(inner) => write!(f, "{inner}.graph()"),
            Self::Count(inner) => write!(f, "{inner}.count()"),
            Self::First(inner) => write!(f, "{inner}.first()"),
            Self::Slice(SliceLookup {
                iterable,
                start,
                end,
                size,
            }) => {
                write!(f, "{iterable}.slice(")?;
                write_named(
                    f,
                    &[
                        ("start", start.as_deref()),
                        ("end", end.as_deref()),
                        ("size", size.as_deref()),
                    ],
                )?;
                f.write_char(')')
            }
            Self::If(Conditional {
                condition,
                then,
                otherwise,
            }) => {
                write!(f, "if({condition}")?;
                if then.is_some() || otherwise.is_some() {
                    f.write_str(", ")?;
                }
                write_named(f, &[("then", then.as_deref()), ("else", otherwise.as_deref())])?;
                f.write_char(')')
            }
            Self::Date(inner) => write!(f, "date({inner})"),
            Self::Markdown(inner) => write!(f, "markdown({inner})"),
            Self::Image(inner) => write!(f, "{inner}.image()"),
            Self::Files(inner) => write!(f, "{inner}.files()"),
            Self::EntryTypeOf(inner) => write!(f, "{inner}.entryType()"),
        }
    }
}

fn write_property_lookup(f: &mut Formatter<'_>, name: &str, lookup: &PropertyLookup) -> fmt::Result {
    write!(f, "{}.{name}(prop={})", lookup.target, lookup.prop)
}

fn write_named(f: &mut Formatter<'_>, args: &[(&str, Option<&LookupExpression>)]) -> fmt::Result {
    let mut first = true;
    for (name, value) in args {
        if let Some(value) = value {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
            first = false;
        }
    }
    Ok(())
}

fn write_literal(f: &mut Formatter<'_>, value: &LookupValue) -> fmt::Result {
    match value {
        LookupValue::Null => f.write_str("null"),
        LookupValue::Boolean(value) => write!(f, "{value}"),
        LookupValue::Integer(value) => write!(f, "{value}"),
        LookupValue::String(text) => write_quoted(f, text),
        LookupValue::Entry(id) => write!(f, "[[/entry/{id}]]"),
        // Literal::new only admits the kinds above.
        other => write!(f, "<{}>", other.kind()),
    }
}

fn write_quoted(f: &mut Formatter<'_>, text: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            other => f.write_char(other)?,
        }
    }
    f.write_char('"')
}
