pub use config::{Config, File as ConfigFile};
pub use once_cell::sync::OnceCell;

use crate::error::Result;

static GLOBAL_CONFIG: OnceCell<Config> = OnceCell::new();

/// Load `config.toml` into the process-wide config. The file is optional;
/// every setting it carries can also come from CLI flags.
///
/// Recognized keys:
/// - `paths.chainstate_dir`, `paths.output_file`
/// - `scan.flush_interval`, `scan.progress_interval`, `scan.estimated_total`
pub fn init_global_config() -> Result<()> {
    let mut config = Config::default();
    if std::path::Path::new("config.toml").exists() {
        config.merge(ConfigFile::with_name("config.toml"))?;
    }
    GLOBAL_CONFIG
        .set(config)
        .map_err(|_| config::ConfigError::Message("config already set".to_string()))?;
    Ok(())
}

pub fn get_global_config() -> &'static Config {
    GLOBAL_CONFIG.get().expect("Config not initialized")
}

/// String setting with a fallback, `config.toml` first.
pub fn get_string_or(config: &Config, key: &str, default: &str) -> String {
    config
        .get_string(key)
        .unwrap_or_else(|_| default.to_string())
}

/// Unsigned setting with a fallback.
pub fn get_u64_or(config: &Config, key: &str, default: u64) -> u64 {
    config
        .get_int(key)
        .ok()
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(default)
}
