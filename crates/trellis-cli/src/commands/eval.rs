use anyhow::{Context, Result};
use trellis_config::TrellisConfig;

use crate::cli::GraphArgs;
use crate::commands::{load_context, parse, print_json};

pub async fn execute(config: &TrellisConfig, args: GraphArgs, expr: String) -> Result<()> {
    let ctx = load_context(&args, config).await?;
    let expr = parse(&expr)?;

    let value = expr
        .get_concrete_value(&ctx)
        .await
        .with_context(|| format!("Failed to evaluate {}", expr.debug_string()))?;
    print_json(&value.to_json()?)
}
