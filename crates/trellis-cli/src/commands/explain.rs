//! Shows what an expression turns into before anything is fetched.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use trellis_config::TrellisConfig;
use trellis_lookup::query::cypher::{self, RenderedQuery};
use trellis_lookup::{LookupValue, Window};

use crate::cli::GraphArgs;
use crate::commands::{load_context, parse};

pub async fn execute(config: &TrellisConfig, args: GraphArgs, expr: String) -> Result<()> {
    let ctx = load_context(&args, config).await?;
    let expr = parse(&expr)?;
    println!("Expression: {expr}");

    let value = expr
        .get_value(&ctx)
        .await
        .with_context(|| format!("Failed to evaluate {}", expr.debug_string()))?;
    let window = Window::first(ctx.default_page_size());

    match value.unannotated() {
        LookupValue::LazyEntrySet(set) => {
            print_query("First page", &cypher::entry_set_slice(set.query(), window))?;
            print_query("Count", &cypher::entry_set_count(set.query()))?;
        }
        LookupValue::LazyRows(rows) => {
            print_query("First page", &cypher::rows_slice(rows.query(), window))?;
            print_query("Count", &cypher::rows_count(rows.query()))?;
        }
        other => println!("\nValue: {} (no backend query)", other.kind()),
    }
    Ok(())
}

fn print_query(title: &str, query: &RenderedQuery) -> Result<()> {
    let params: BTreeMap<_, _> = query.params.iter().collect();
    println!("\n{title}:\n{}", query.cypher);
    if !params.is_empty() {
        println!("Parameters: {}", serde_json::to_string_pretty(&params)?);
    }
    Ok(())
}
