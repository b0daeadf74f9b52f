//! Validation of parsed shapes into expression trees.

use super::grammar::{RawArg, RawExpr, RefKind};
use super::ParseError;
use crate::expr::{Conditional, LookupExpression, PropertyLookup, RelatedLookup, SliceLookup};
use crate::ids::{EntryTypeId, PropertyId};
use crate::value::LookupValue;

/// A parameter of a built-in function: its name and whether it is required.
type Param = (&'static str, bool);

const NONE: &[Param] = &[];
const ONE: &[Param] = &[("x", true)];
const PROPERTY: &[Param] = &[("x", true), ("prop", true)];
const RELATED: &[Param] = &[("from", true), ("via", false), ("direction", false)];
const SLICE: &[Param] = &[("x", true), ("start", false), ("end", false), ("size", false)];
const IF: &[Param] = &[("condition", true), ("then", false), ("else", false)];

fn signature(name: &str) -> Option<&'static [Param]> {
    Some(match name {
        "allEntries" => NONE,
        "ancestors" | "andAncestors" | "descendants" | "andDescendants" | "graph" | "count"
        | "first" | "date" | "markdown" | "image" | "files" | "entryType" => ONE,
        "get" | "reverse" | "withDetail" => PROPERTY,
        "related" => RELATED,
        "slice" => SLICE,
        "if" => IF,
        _ => return None,
    })
}

pub(super) fn build(raw: RawExpr) -> Result<LookupExpression, ParseError> {
    match raw {
        RawExpr::Integer(value) => LookupExpression::literal(LookupValue::Integer(value))
            .map_err(|err| ParseError::InvalidLiteral(err.to_string())),
        RawExpr::String(text) => Ok(LookupExpression::string(text)),
        RawExpr::Name(name) => match name.as_str() {
            "this" => Ok(LookupExpression::This),
            "true" => Ok(LookupExpression::boolean(true)),
            "false" => Ok(LookupExpression::boolean(false)),
            "null" => Ok(LookupExpression::null()),
            _ => Err(ParseError::Syntax(format!(
                "\"{name}\" is not a keyword; functions need parentheses, as in {name}()"
            ))),
        },
        RawExpr::List(items) => Ok(LookupExpression::List(
            items.into_iter().map(build).collect::<Result<_, _>>()?,
        )),
        RawExpr::Reference { kind, key } => Ok(match kind {
            RefKind::Entry => LookupExpression::EntryRef(key),
            RefKind::Property => LookupExpression::PropertyRef(PropertyId::new(key)),
            RefKind::EntryType => LookupExpression::EntryTypeRef(EntryTypeId::new(key)),
        }),
        RawExpr::Placeholder(name) => Ok(LookupExpression::Placeholder(name)),
        RawExpr::Call {
            name,
            receiver,
            args,
        } => build_call(name, receiver.map(|receiver| *receiver), args),
    }
}

fn build_call(
    name: String,
    receiver: Option<RawExpr>,
    args: Vec<RawArg>,
) -> Result<LookupExpression, ParseError> {
    let params = signature(&name).ok_or_else(|| ParseError::UnknownFunction(name.clone()))?;
    let mut all_args = Vec::with_capacity(args.len() + 1);
    if let Some(receiver) = receiver {
        all_args.push(RawArg {
            name: None,
            value: receiver,
        });
    }
    all_args.extend(args);
    let mut bound = bind(&name, params, all_args)?.into_iter();
    let mut next = || bound.next().flatten();
    let required = |value: Option<LookupExpression>| {
        value.map(Box::new).ok_or_else(|| ParseError::InvalidArguments {
            function: name.clone(),
            message: "a required argument is missing".to_string(),
        })
    };

    let expr = match name.as_str() {
        "allEntries" => LookupExpression::AllEntries,
        "ancestors" => LookupExpression::Ancestors(required(next())?),
        "andAncestors" => LookupExpression::AndAncestors(required(next())?),
        "descendants" => LookupExpression::Descendants(required(next())?),
        "andDescendants" => LookupExpression::AndDescendants(required(next())?),
        "graph" => LookupExpression::Graph(required(next())?),
        "count" => LookupExpression::Count(required(next())?),
        "first" => LookupExpression::First(required(next())?),
        "date" => LookupExpression::Date(required(next())?),
        "markdown" => LookupExpression::Markdown(required(next())?),
        "image" => LookupExpression::Image(required(next())?),
        "files" => LookupExpression::Files(required(next())?),
        "entryType" => LookupExpression::EntryTypeOf(required(next())?),
        "get" | "reverse" | "withDetail" => {
            let lookup = PropertyLookup {
                target: required(next())?,
                prop: required(next())?,
            };
            match name.as_str() {
                "get" => LookupExpression::Get(lookup),
                "reverse" => LookupExpression::Reverse(lookup),
                _ => LookupExpression::WithDetail(lookup),
            }
        }
        "related" => {
            let from = required(next())?;
            let via = next().map(Box::new);
            // "both" is the default and is not kept in the tree.
            let direction = next()
                .filter(|direction| *direction != LookupExpression::string("both"))
                .map(Box::new);
            LookupExpression::Related(RelatedLookup {
                from,
                via,
                direction,
            })
        }
        "slice" => LookupExpression::Slice(SliceLookup {
            iterable: required(next())?,
            start: next().map(Box::new),
            end: next().map(Box::new),
            size: next().map(Box::new),
        }),
        "if" => LookupExpression::If(Conditional {
            condition: required(next())?,
            then: next().map(Box::new),
            otherwise: next().map(Box::new),
        }),
        _ => return Err(ParseError::UnknownFunction(name.clone())),
    };
    Ok(expr)
}

/// Matches positional then named arguments to `params`, in parameter order.
fn bind(
    function: &str,
    params: &[Param],
    args: Vec<RawArg>,
) -> Result<Vec<Option<LookupExpression>>, ParseError> {
    let invalid = |message: String| ParseError::InvalidArguments {
        function: function.to_string(),
        message,
    };
    let mut slots: Vec<Option<LookupExpression>> = vec![None; params.len()];
    let mut positional = 0;
    let mut seen_named = false;

    for arg in args {
        let index = match &arg.name {
            None => {
                if seen_named {
                    return Err(invalid(
                        "positional arguments must come before named ones".to_string(),
                    ));
                }
                positional += 1;
                if positional > params.len() {
                    return Err(invalid(format!(
                        "expected at most {} argument(s)",
                        params.len()
                    )));
                }
                positional - 1
            }
            Some(name) => {
                seen_named = true;
                params
                    .iter()
                    .position(|(param, _)| *param == name.as_str())
                    .ok_or_else(|| invalid(format!("unknown argument \"{name}\"")))?
            }
        };
        if slots[index].is_some() {
            return Err(invalid(format!(
                "argument \"{}\" given more than once",
                params[index].0
            )));
        }
        slots[index] = Some(build(arg.value)?);
    }

    for ((param, required), slot) in params.iter().zip(&slots) {
        if *required && slot.is_none() {
            return Err(invalid(format!("missing argument \"{param}\"")));
        }
    }
    Ok(slots)
}
