use std::{env, fs, path::PathBuf};

use anyhow::Context;
use storefront_orders::openapi::ApiDocV1;
use utoipa::OpenApi;

/// Writes the OpenAPI document to `openapi/storefront-orders.v1.json`, or to
/// the directory given as the first argument.
fn main() -> anyhow::Result<()> {
    let json = ApiDocV1::openapi()
        .to_pretty_json()
        .context("failed to serialize OpenAPI document")?;

    let output_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi"));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let output_path = output_dir.join("storefront-orders.v1.json");
    fs::write(&output_path, json)
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    println!("OpenAPI spec written to {}", output_path.display());
    Ok(())
}
