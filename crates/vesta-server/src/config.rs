use clap::Parser;
use std::path::PathBuf;
use vesta_client::CommercetoolsCredentials;
use vesta_core::error::AppError;
use vesta_core::{
    load_index_settings, EnsureIndexPolicy, IndexConfig, SyncSettings, UntypedEventPolicy,
};

/// Server configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "vesta")]
#[command(
    author,
    version,
    about = "Keeps an Algolia index in sync with commercetools product events"
)]
#[command(after_help = "Examples:
  vesta                                       # Everything from the environment / .env
  vesta --port 3000 --ensure-index publish-only
  vesta --index-config-file ./index.toml")]
pub struct Config {
    /// Port the push endpoint listens on
    #[arg(long, env = "PORT", default_value = "8080")]
    pub port: u16,

    /// commercetools project key
    #[arg(long, env = "CTP_PROJECT_KEY")]
    pub ctp_project_key: String,

    /// commercetools API client id
    #[arg(long, env = "CTP_CLIENT_ID")]
    pub ctp_client_id: String,

    /// commercetools API client secret
    #[arg(long, env = "CTP_CLIENT_SECRET", hide_env_values = true)]
    pub ctp_client_secret: String,

    /// Space-separated OAuth scopes requested for the API client
    #[arg(long, env = "CTP_SCOPE")]
    pub ctp_scope: Option<String>,

    /// commercetools authentication host
    #[arg(long, env = "CTP_AUTH_URL")]
    pub ctp_auth_url: String,

    /// commercetools API host
    #[arg(long, env = "CTP_API_URL")]
    pub ctp_api_url: String,

    /// Algolia application id
    #[arg(long, env = "ALGOLIA_APP_ID")]
    pub algolia_app_id: String,

    /// Algolia API key with write access
    #[arg(long, env = "ALGOLIA_WRITE_API_KEY", hide_env_values = true)]
    pub algolia_write_api_key: String,

    /// Index that receives product records unless a notification names another one
    #[arg(long, env = "ALGOLIA_INDEX_NAME")]
    pub algolia_index_name: String,

    /// Index settings as a JSON object; takes precedence over the settings file
    #[arg(long, env = "ALGOLIA_INDEX_CONFIG")]
    pub algolia_index_config: Option<String>,

    /// Algolia host override (defaults to https://<app id>.algolia.net)
    #[arg(long, env = "ALGOLIA_BASE_URL")]
    pub algolia_base_url: Option<String>,

    /// Index settings as a TOML file (defaults to <config dir>/vesta/index.toml)
    #[arg(long, env = "VESTA_INDEX_CONFIG_FILE", value_name = "PATH")]
    pub index_config_file: Option<PathBuf>,

    /// When the index is created if missing: always, or only before publishing
    #[arg(long, env = "ENSURE_INDEX", default_value = "always")]
    pub ensure_index: EnsureIndexPolicy,

    /// What to do with notifications that carry no type: ignore, or treat them as published
    #[arg(long, env = "UNTYPED_EVENTS", default_value = "ignore")]
    pub untyped_events: UntypedEventPolicy,
}

impl Config {
    pub fn commercetools_credentials(&self) -> CommercetoolsCredentials {
        CommercetoolsCredentials {
            project_key: self.ctp_project_key.clone(),
            client_id: self.ctp_client_id.clone(),
            client_secret: self.ctp_client_secret.clone(),
            scope: self.ctp_scope.clone(),
            auth_url: self.ctp_auth_url.clone(),
            api_url: self.ctp_api_url.clone(),
        }
    }

    /// Builds the default index configuration.
    ///
    /// Settings come from `ALGOLIA_INDEX_CONFIG` when set, otherwise from the TOML settings
    /// file, otherwise the index is created with empty settings.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the JSON settings are not an object, the index name
    /// is blank, or the settings file cannot be loaded.
    pub fn index_config(&self) -> Result<IndexConfig, AppError> {
        let index = match self.algolia_index_config.as_deref() {
            Some(raw) => IndexConfig::from_json(&self.algolia_index_name, raw)
                .map_err(|e| AppError::ConfigError(e.to_string()))?,
            None => {
                let settings = load_index_settings(self.index_config_file.as_deref())?;
                IndexConfig::new(&self.algolia_index_name, settings.unwrap_or_default())
            }
        };
        index
            .validate()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        Ok(index)
    }

    pub fn sync_settings(&self) -> Result<SyncSettings, AppError> {
        Ok(SyncSettings {
            index: self.index_config()?,
            ensure_index: self.ensure_index,
            untyped_events: self.untyped_events,
        })
    }
}
