pub mod eval;
pub mod explain;
pub mod refs;

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::debug;
use trellis_config::TrellisConfig;
use trellis_lookup::{EntryId, EvalContext, LookupExpression, MemoryGraph, SiteId};

use crate::cli::GraphArgs;

/// Build an evaluation context over a snapshot file.
pub async fn load_context(args: &GraphArgs, config: &TrellisConfig) -> Result<EvalContext> {
    let json = tokio::fs::read_to_string(&args.graph)
        .await
        .with_context(|| format!("Failed to read graph snapshot {}", args.graph.display()))?;
    let graph = MemoryGraph::from_json(&json)
        .with_context(|| format!("Failed to load graph snapshot {}", args.graph.display()))?;

    let site = SiteId::new(args.site.as_str());
    if graph.snapshot().site(&site).is_none() {
        anyhow::bail!("Site {} is not in {}", site, args.graph.display());
    }

    let page_size = args.page_size.unwrap_or(config.lookup.default_page_size);
    if page_size == 0 {
        anyhow::bail!("--page-size must be greater than 0");
    }
    debug!("Evaluating against site {} with page size {}", site, page_size);

    let ctx = EvalContext::new(Arc::new(graph), site)
        .with_limits(config.lookup.eval_limits())
        .with_default_page_size(page_size);
    Ok(match &args.entry {
        Some(entry) => ctx.with_entry(EntryId::new(entry.as_str())),
        None => ctx,
    })
}

pub fn parse(text: &str) -> Result<LookupExpression> {
    trellis_lookup::parse_lookup(text).with_context(|| format!("Failed to parse lookup: {text}"))
}

pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let value: Value = serde_json::to_value(value).context("Failed to serialize output")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
