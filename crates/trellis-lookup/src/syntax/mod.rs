//! Surface syntax parser.
//!
//! Turns text such as `this.andAncestors().get(prop=[[/prop/_pColor]])` into
//! a [`LookupExpression`]. Parsing is two passes: a chumsky grammar produces
//! call shapes, then a builder checks function names and arguments against
//! the built-in function table.
//!
//! Every function accepts both the call form (`ancestors(this)`) and the
//! method form (`this.ancestors()`); in the method form the receiver is the
//! first positional argument. Rendering a parsed tree with `to_string` and
//! parsing the result gives back an equal tree.

mod build;
mod grammar;

use chumsky::prelude::*;
use thiserror::Error;

use crate::expr::LookupExpression;

/// Malformed lookup text. Distinct from evaluation errors: this is a bad
/// query, not bad data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unknown function: {0}()")]
    UnknownFunction(String),

    #[error("Invalid arguments to {function}(): {message}")]
    InvalidArguments { function: String, message: String },

    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),
}

/// Parses lookup text into an expression tree.
pub fn parse_lookup(input: &str) -> Result<LookupExpression, ParseError> {
    let raw = grammar::lookup()
        .parse(input)
        .into_result()
        .map_err(|errs| ParseError::Syntax(format_errors(&errs, input)))?;
    build::build(raw)
}

fn format_errors(errs: &[Rich<'_, char>], input: &str) -> String {
    errs.iter()
        .map(|e| {
            let start = e.span().start;
            let line = input[..start].matches('\n').count() + 1;
            let col = start - input[..start].rfind('\n').map_or(0, |i| i + 1);
            let found = e
                .found()
                .map_or("end of input".to_string(), |c| format!("'{}'", c));
            format!("Line {}, column {}: {} (found {})", line, col + 1, e.reason(), found)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
