//! chumsky grammar for lookup expressions.
//!
//! The grammar only knows about shapes (literals, references, calls and
//! method chains). Function names and arguments are checked afterwards by
//! the builder.

use chumsky::extra;
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;
use num_bigint::BigInt;

/// Extra type for parsers - uses Rich errors for better messages
pub type Extra<'src> = extra::Err<Rich<'src, char>>;

// ============================================================================
// Intermediate types (before validation)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Entry,
    Property,
    EntryType,
}

/// One argument of a call, positional or `name=value`
#[derive(Debug, Clone, PartialEq)]
pub struct RawArg {
    pub name: Option<String>,
    pub value: RawExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawExpr {
    Integer(BigInt),
    String(String),
    /// A bare identifier: `this`, `true`, `false`, `null`, or a mistake.
    Name(String),
    List(Vec<RawExpr>),
    Reference { kind: RefKind, key: String },
    Placeholder(String),
    /// `name(args)`, or `receiver.name(args)` when `receiver` is set.
    Call {
        name: String,
        receiver: Option<Box<RawExpr>>,
        args: Vec<RawArg>,
    },
}

// ============================================================================
// Primitive parsers
// ============================================================================

/// Parser for identifiers: ASCII letters, digits and underscore
fn ident<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice()
        .map(|s: &str| s.to_string())
        .labelled("identifier")
}

fn integer<'src>() -> impl Parser<'src, &'src str, BigInt, Extra<'src>> + Clone {
    just('-')
        .or_not()
        .then(
            any()
                .filter(|c: &char| c.is_ascii_digit())
                .repeated()
                .at_least(1),
        )
        .to_slice()
        .try_map(|s: &str, span: SimpleSpan| {
            s.parse::<BigInt>()
                .map_err(|_| Rich::custom(span, "invalid integer literal"))
        })
        .labelled("integer")
}

/// Double-quoted string with `\"`, `\\`, `\n` and `\t` escapes
fn string_literal<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    let escape = just('\\').ignore_then(choice((
        just('"').to('"'),
        just('\\').to('\\'),
        just('n').to('\n'),
        just('t').to('\t'),
    )));

    none_of("\"\\")
        .or(escape)
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .labelled("string literal")
}

/// `[[/entry/key]]`, `[[/prop/id]]` or `[[/etype/id]]`
fn reference<'src>() -> impl Parser<'src, &'src str, RawExpr, Extra<'src>> + Clone {
    let kind = choice((
        just("entry").to(RefKind::Entry),
        just("prop").to(RefKind::Property),
        just("etype").to(RefKind::EntryType),
    ));

    just("[[/")
        .ignore_then(kind)
        .then_ignore(just('/'))
        .then(
            none_of("]\n")
                .repeated()
                .at_least(1)
                .to_slice()
                .map(|s: &str| s.trim().to_string()),
        )
        .then_ignore(just("]]"))
        .map(|(kind, key)| RawExpr::Reference { kind, key })
        .labelled("reference like [[/entry/_id]]")
}

// ============================================================================
// Expressions
// ============================================================================

pub fn expression<'src>() -> impl Parser<'src, &'src str, RawExpr, Extra<'src>> + Clone {
    recursive(|expr| {
        let arg = ident()
            .then_ignore(just('=').padded())
            .or_not()
            .then(expr.clone())
            .map(|(name, value)| RawArg { name, value });

        let args = arg
            .separated_by(just(',').padded())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just('(').padded(), just(')').padded())
            .labelled("argument list");

        let list = expr
            .clone()
            .separated_by(just(',').padded())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just('[').padded(), just(']').padded())
            .map(RawExpr::List);

        let placeholder = just('$').ignore_then(ident()).map(RawExpr::Placeholder);

        let name_or_call = ident().then(args.clone().or_not()).map(|(name, args)| match args {
            Some(args) => RawExpr::Call {
                name,
                receiver: None,
                args,
            },
            None => RawExpr::Name(name),
        });

        let atom = choice((
            reference(),
            list,
            string_literal().map(RawExpr::String),
            integer().map(RawExpr::Integer),
            placeholder,
            name_or_call,
        ))
        .padded();

        let method = just('.').padded().ignore_then(ident()).then(args);

        atom.foldl(method.repeated(), |receiver, (name, args)| RawExpr::Call {
            name,
            receiver: Some(Box::new(receiver)),
            args,
        })
        .padded()
    })
}

pub fn lookup<'src>() -> impl Parser<'src, &'src str, RawExpr, Extra<'src>> {
    expression().then_ignore(end())
}
