use std::path::PathBuf;

use anyhow::{Result, anyhow};
use nodesea::{AcquireRequest, Acquirer, Platform, SeaConfig, Specifier, default_cache_dir};

use crate::cli::{CLI, NodeseaCommand};

/// Version used when neither the CLI nor the config pins one.
const DEFAULT_NODE_VERSION: &str = "22.11.0";

pub async fn execute(cli: CLI) -> Result<()> {
    match cli.command {
        NodeseaCommand::Fetch {
            specifier,
            config,
            platform,
            cache_dir,
            retries,
        } => execute_fetch(specifier, config, platform, cache_dir, retries).await,
        NodeseaCommand::Resolve { specifier } => execute_resolve(specifier).await,
        NodeseaCommand::Clean { cache_dir } => execute_clean(cache_dir),
    }
}

async fn execute_fetch(
    specifier: Option<String>,
    config: Option<PathBuf>,
    platform: Option<String>,
    cache_dir: Option<PathBuf>,
    retries: Option<u32>,
) -> Result<()> {
    let config = match config {
        Some(path) => Some(SeaConfig::load(&path)?),
        None => None,
    };
    let specifier = specifier
        .or_else(|| config.as_ref().and_then(|c| c.node_version.clone()))
        .unwrap_or_else(|| DEFAULT_NODE_VERSION.to_string());
    let platform = match platform {
        Some(name) => name.parse::<Platform>().map_err(|e| anyhow!(e))?,
        None => Platform::current(),
    };
    let cache_dir = match cache_dir {
        Some(dir) => dir,
        None => default_cache_dir()?,
    };

    let mut request = AcquireRequest::new(specifier, cache_dir, platform);
    if let Some(retries) = retries {
        request = request.retries(retries);
    }
    let binary = Acquirer::new().acquire(&request).await?;
    println!("{}", binary.display());
    Ok(())
}

async fn execute_resolve(specifier: String) -> Result<()> {
    let spec = Specifier::parse(&specifier)?;
    if let Specifier::LocalFile(path) = &spec {
        println!("local archive: {}", path.display());
        return Ok(());
    }
    let release = Acquirer::new().resolve(&spec).await?;
    println!("{}", release.version);
    println!("{}", release.base_url);
    Ok(())
}

fn execute_clean(cache_dir: Option<PathBuf>) -> Result<()> {
    let cache_dir = match cache_dir {
        Some(dir) => dir,
        None => default_cache_dir()?,
    };
    nodesea::clean_cache(&cache_dir)?;
    println!("Cache cleaned: {}", cache_dir.display());
    Ok(())
}
