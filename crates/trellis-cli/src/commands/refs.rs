use anyhow::{Context, Result};
use tracing::info;
use trellis_config::TrellisConfig;
use trellis_lookup::EntryId;
use trellis_references::ReferenceCache;

use crate::cli::GraphArgs;
use crate::commands::{load_context, print_json};

pub async fn execute(config: &TrellisConfig, args: GraphArgs, markdown: String) -> Result<()> {
    let markdown = match markdown.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read markdown from {path}"))?,
        None => markdown,
    };
    let ctx = load_context(&args, config).await?;
    let entry = args.entry.as_deref().map(EntryId::new);

    let mut cache = ReferenceCache::new().with_limits(config.references.extraction_limits());
    cache.extract_markdown_references(&markdown, entry.as_ref());
    let data = cache
        .get_data(&ctx)
        .await
        .context("Failed to load reference data")?;
    info!(
        "Resolved {} entries and {} lookups",
        data.entries.len(),
        data.lookups.len()
    );
    print_json(&data)
}
