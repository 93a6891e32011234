use crate::gas_client::DEFAULT_BASE_URL;
use crate::models::Credentials;
use std::time::Duration;

const MIN_SCAN_INTERVAL_SECS: u64 = 60;

/// Runtime settings loaded from the environment.
#[derive(Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub encrypted_username: String,
    pub encrypted_password: String,
    pub base_url: String,
    pub scan_interval_secs: u64,
    pub port: u16,
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))
        .and_then(|value| {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            Ok(value)
        })
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            client_id: required("BJGAS_CLIENT_ID")?,
            client_secret: required("BJGAS_CLIENT_SECRET")?,
            encrypted_username: required("BJGAS_USERNAME")?,
            encrypted_password: required("BJGAS_PASSWORD")?,
            base_url: std::env::var("BJGAS_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            scan_interval_secs: std::env::var("SCAN_INTERVAL_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SCAN_INTERVAL_SECS must be a number of seconds"))?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
        };
        config.validate()?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Beijing Gas Base URL: {}", config.base_url);
        tracing::debug!("Client ID: {}", config.client_id);
        tracing::debug!("Scan interval: {}s", config.scan_interval_secs);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("BJGAS_BASE_URL must start with http:// or https://");
        }
        if self.scan_interval_secs < MIN_SCAN_INTERVAL_SECS {
            anyhow::bail!(
                "SCAN_INTERVAL_SECS must be at least {}",
                MIN_SCAN_INTERVAL_SECS
            );
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            encrypted_username: self.encrypted_username.clone(),
            encrypted_password: self.encrypted_password.clone(),
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            encrypted_username: "user".to_string(),
            encrypted_password: "pass".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            scan_interval_secs: 600,
            port: 3000,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut cfg = config();
        cfg.base_url = "zt.bjgas.com".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_short_scan_interval() {
        let mut cfg = config();
        cfg.scan_interval_secs = 5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_credentials_copy_login_fields() {
        let creds = config().credentials();
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.encrypted_password, "pass");
        assert_eq!(config().scan_interval(), Duration::from_secs(600));
    }
}
