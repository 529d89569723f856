use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::de::DeserializeOwned;

/// Load settings from an optional `<file_stem>.{toml,yaml,json,...}` file,
/// overridden by `APP__`-prefixed environment variables (`__` separates
/// nested keys, e.g. `APP__ORCID__CLIENT_ID`).
pub fn load_settings<T: DeserializeOwned>(file_stem: &str) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let config = Cfg::builder()
        .add_source(File::with_name(file_stem).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

/// Load a required settings file without environment overrides.
pub fn load_file<T: DeserializeOwned>(path: &str) -> Result<T, AppError> {
    let config = Cfg::builder()
        .add_source(File::with_name(path).required(true))
        .build()?;

    Ok(config.try_deserialize()?)
}
