//! Process configuration.
//!
//! Reads `LOCAL_BIGQUERY_*` env vars into a plain settings struct. The
//! HTTP listener fields exist so a
//! collaborator dispatcher can read them from the same config value; this
//! crate never binds a socket itself.

use std::path::PathBuf;

const ENV_PREFIX: &str = "LOCAL_BIGQUERY_";

/// Runtime configuration for the emulator core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// HTTP bind host, read by the collaborator dispatcher.
    pub listen_host: String,
    /// HTTP bind port, read by the collaborator dispatcher.
    pub listen_port: u16,
    /// Root directory under which one attached storage file is kept per project.
    pub data_dir: PathBuf,
    /// Pre-created project id that exists from process start.
    pub default_project_id: String,
    /// Pre-created dataset id inside the default project.
    pub default_dataset_id: String,
    /// Project id holding the internal metadata catalog.
    pub internal_project_id: String,
    /// Dataset id holding the internal metadata tables.
    pub internal_dataset_id: String,
    /// Connection id string that `EXTERNAL_QUERY(connection_id, ...)` must match.
    pub federation_connection_id: String,
    /// Connection string for the federated relational source.
    pub federation_source_uri: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            listen_port: 9050,
            data_dir: PathBuf::from("/tmp/bigquery"),
            default_project_id: "default".to_string(),
            default_dataset_id: "default".to_string(),
            internal_project_id: "__internal__".to_string(),
            internal_dataset_id: "__internal__".to_string(),
            federation_connection_id: "external".to_string(),
            federation_source_uri: String::new(),
        }
    }
}

impl Config {
    /// Reads overrides from `LOCAL_BIGQUERY_*` environment variables, falling
    /// back to [`Config::default`] for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_var("LISTEN_HOST") {
            config.listen_host = v;
        }
        if let Some(v) = env_var("LISTEN_PORT").and_then(|v| v.parse().ok()) {
            config.listen_port = v;
        }
        if let Some(v) = env_var("DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_var("DEFAULT_PROJECT_ID") {
            config.default_project_id = v;
        }
        if let Some(v) = env_var("DEFAULT_DATASET_ID") {
            config.default_dataset_id = v;
        }
        if let Some(v) = env_var("INTERNAL_PROJECT_ID") {
            config.internal_project_id = v;
        }
        if let Some(v) = env_var("INTERNAL_DATASET_ID") {
            config.internal_dataset_id = v;
        }
        if let Some(v) = env_var("FEDERATION_CONNECTION_ID") {
            config.federation_connection_id = v;
        }
        if let Some(v) = env_var("FEDERATION_SOURCE_URI") {
            config.federation_source_uri = v;
        }
        config
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{suffix}")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_reserved_projects() {
        let config = Config::default();
        assert_ne!(config.default_project_id, config.internal_project_id);
        assert_eq!(config.listen_port, 9050);
    }
}
