//! # Endpoint Configuration
//!
//! Layered configuration for the data-access client: built-in defaults,
//! overridden by a JSON config file, overridden by environment variables
//! and CLI flags. Every field is optional until `resolved()` validates
//! the final merge.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::Credential;
use crate::utils::backoff::RetryPolicy;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Livedata client endpoint configuration")]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    #[clap(long, env = "LIVEDATA_BASE_URL", help = "Base HTTP URL of the backend, e.g. https://api.example.com/v1/.")]
    pub base_url: Option<String>,

    #[clap(long, env = "LIVEDATA_WS_URL", help = "WebSocket URL for subscriptions. Derived from the base URL when omitted.")]
    pub ws_url: Option<String>,

    #[clap(long, env = "LIVEDATA_TENANT", help = "Tenant identifier all requests are scoped to.")]
    pub tenant: Option<String>,

    #[clap(long, env = "LIVEDATA_AUTH_TOKEN", help = "Bearer token attached to every request.")]
    pub auth_token: Option<String>,

    #[clap(long, env = "LIVEDATA_CONFIG_PATH", help = "Path to a JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "LIVEDATA_PAGE_SIZE", help = "Default page size for collection queries.")]
    pub page_size: Option<u32>,

    #[clap(long, env = "LIVEDATA_RETRY_MAX_ATTEMPTS", help = "Total attempts per operation, including the first.")]
    pub retry_max_attempts: Option<u32>,

    #[clap(long, env = "LIVEDATA_RETRY_BASE_DELAY_MS", help = "Base delay in milliseconds between retry attempts.")]
    pub retry_base_delay_ms: Option<u64>,

    #[clap(long, env = "LIVEDATA_RETRY_MAX_DELAY_MS", help = "Maximum delay in milliseconds between retry attempts.")]
    pub retry_max_delay_ms: Option<u64>,
}

impl EndpointConfig {
    // Merge two configs, where 'other' overrides 'self' for Some values
    pub fn merge(self, other: EndpointConfig) -> EndpointConfig {
        EndpointConfig {
            base_url: other.base_url.or(self.base_url),
            ws_url: other.ws_url.or(self.ws_url),
            tenant: other.tenant.or(self.tenant),
            auth_token: other.auth_token.or(self.auth_token),
            config_path: other.config_path.or(self.config_path),
            page_size: other.page_size.or(self.page_size),
            retry_max_attempts: other.retry_max_attempts.or(self.retry_max_attempts),
            retry_base_delay_ms: other.retry_base_delay_ms.or(self.retry_base_delay_ms),
            retry_max_delay_ms: other.retry_max_delay_ms.or(self.retry_max_delay_ms),
        }
    }

    /// Loads the full layering: defaults < config file < env/CLI flags.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let cli = EndpointConfig::parse();
        Self::load_with(cli)
    }

    /// Same layering but with the env/CLI layer passed in (testable).
    pub fn load_with(cli: EndpointConfig) -> anyhow::Result<Self> {
        let mut merged = EndpointConfig::default();
        if let Some(path) = cli.config_path.clone().or_else(default_config_path) {
            if path.exists() {
                let raw = fs::read_to_string(&path)?;
                let from_file: EndpointConfig = serde_json::from_str(&raw)?;
                log::info!("Loaded configuration file {}", path.display());
                merged = merged.merge(from_file);
            }
        }
        Ok(merged.merge(cli))
    }

    /// Validates the merge and produces the concrete client settings.
    pub fn resolved(&self) -> anyhow::Result<ResolvedEndpoint> {
        let base_url = self
            .base_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("base URL is required (--base-url or LIVEDATA_BASE_URL)"))?;
        let tenant = self
            .tenant
            .clone()
            .ok_or_else(|| anyhow::anyhow!("tenant is required (--tenant or LIVEDATA_TENANT)"))?;
        let ws_url = match self.ws_url.clone() {
            Some(url) => url,
            None => derive_ws_url(&base_url)?,
        };
        let retry = RetryPolicy {
            max_attempts: self.retry_max_attempts.unwrap_or(4),
            base_delay: Duration::from_millis(self.retry_base_delay_ms.unwrap_or(250)),
            max_delay: Duration::from_millis(self.retry_max_delay_ms.unwrap_or(5_000)),
        };
        Ok(ResolvedEndpoint {
            base_url,
            ws_url,
            credential: Credential::new(tenant, self.auth_token.clone()),
            retry,
            page_size: self.page_size.unwrap_or(25),
        })
    }
}

/// Final, validated client settings.
#[derive(Debug, Clone)]
pub struct ResolvedEndpoint {
    pub base_url: String,
    /// Full subscription endpoint, e.g. `ws://host:port/subscriptions`.
    pub ws_url: String,
    pub credential: Credential,
    pub retry: RetryPolicy,
    pub page_size: u32,
}

fn default_config_path() -> Option<PathBuf> {
    Some(PathBuf::from("livedata.json"))
}

fn derive_ws_url(base_url: &str) -> anyhow::Result<String> {
    let socket_base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        anyhow::bail!("cannot derive a socket URL from '{}'", base_url);
    };
    Ok(format!(
        "{}/subscriptions",
        socket_base.trim_end_matches('/')
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn later_layers_override_earlier_ones() {
        let file_layer = EndpointConfig {
            base_url: Some("http://file.example".to_string()),
            tenant: Some("file-tenant".to_string()),
            page_size: Some(10),
            ..Default::default()
        };
        let cli_layer = EndpointConfig {
            tenant: Some("cli-tenant".to_string()),
            ..Default::default()
        };
        let merged = file_layer.merge(cli_layer);
        assert_eq!(merged.base_url.as_deref(), Some("http://file.example"));
        assert_eq!(merged.tenant.as_deref(), Some("cli-tenant"));
        assert_eq!(merged.page_size, Some(10));
    }

    #[test]
    fn config_file_layer_is_read_and_overridden() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "baseUrl": "http://from-file.example/", "tenant": "acme", "pageSize": 50 }}"#
        )
        .unwrap();
        let cli = EndpointConfig {
            config_path: Some(file.path().to_path_buf()),
            page_size: Some(5),
            ..Default::default()
        };
        let merged = EndpointConfig::load_with(cli).unwrap();
        assert_eq!(merged.base_url.as_deref(), Some("http://from-file.example/"));
        assert_eq!(merged.page_size, Some(5));
    }

    #[test]
    fn resolution_requires_base_url_and_tenant() {
        let missing = EndpointConfig::default();
        assert!(missing.resolved().is_err());

        let ok = EndpointConfig {
            base_url: Some("http://localhost:8080/".to_string()),
            tenant: Some("acme".to_string()),
            ..Default::default()
        };
        let resolved = ok.resolved().unwrap();
        assert_eq!(resolved.ws_url, "ws://localhost:8080/subscriptions");
        assert_eq!(resolved.page_size, 25);
        assert_eq!(resolved.retry.max_attempts, 4);
    }

    #[test]
    fn explicit_ws_url_is_not_derived() {
        let cfg = EndpointConfig {
            base_url: Some("https://api.example.com/".to_string()),
            ws_url: Some("wss://stream.example.com/subscriptions".to_string()),
            tenant: Some("acme".to_string()),
            ..Default::default()
        };
        let resolved = cfg.resolved().unwrap();
        assert_eq!(resolved.ws_url, "wss://stream.example.com/subscriptions");
    }
}
