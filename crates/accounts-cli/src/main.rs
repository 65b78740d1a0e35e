use std::path::PathBuf;

use accounts_cli::{default_registry, settings_path};
use accounts_core::logging::setup_logging;
use accounts_core::settings_loader;
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let registry = default_registry();
    let matches = registry.build_cli().get_matches();

    let path = settings_path(&matches);
    let settings = settings_loader::load(path.map(PathBuf::as_path)).with_context(|| {
        path.map_or_else(
            || "failed to load settings".to_string(),
            |p| format!("failed to load settings from {}", p.display()),
        )
    })?;
    setup_logging(&settings);

    registry.execute(&matches, &settings).await?;
    Ok(())
}
