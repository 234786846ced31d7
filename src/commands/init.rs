//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub force: bool,
}

/// Write a default configuration, create the database schema and object store root
pub async fn cmd_init(options: InitOptions) -> Result<Config> {
    let InitOptions {
        base_dir,
        config_path,
        force,
    } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.paths.base_dir = base_dir.clone();
    config.paths.config_file = config_path.clone();
    config.paths.db_file = base_dir.join("metadata.db");
    config.validate()?;

    config.save()?;
    info!("Created config at {:?}", config_path);

    let db = MetaDb::connect(&config).await?;
    db.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    let storage_root = config.storage_root();
    std::fs::create_dir_all(&storage_root)?;
    info!("Object store root at {:?}", storage_root);

    Ok(config)
}
