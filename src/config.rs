//! Client configuration
//!
//! Plain struct with defaults, loadable from `GATEKEY_*` environment
//! variables. The `gatekey` binary layers clap arguments on top.

use std::time::Duration;

use crate::error::{GateKeyError, Result};
use crate::transport::TransportConfig;
use crate::types::{ClientIdentity, CommunityContext, ServiceEndpoints, DEFAULT_TIMEZONE};

pub const ENV_ACCOUNT_ID: &str = "GATEKEY_ACCOUNT_ID";
pub const ENV_AUTH_TOKEN: &str = "GATEKEY_AUTH_TOKEN";
pub const ENV_API_HOST: &str = "GATEKEY_API_HOST";
pub const ENV_CARD_HOST: &str = "GATEKEY_CARD_HOST";
pub const ENV_COMMUNITY_ID: &str = "GATEKEY_COMMUNITY_ID";
pub const ENV_COMMUNITY_TIMEZONE: &str = "GATEKEY_COMMUNITY_TZ";
pub const ENV_OPERATOR_TIMEZONE: &str = "GATEKEY_OPERATOR_TZ";
pub const ENV_PUBLIC_KEY_PATH: &str = "GATEKEY_PUBLIC_KEY_PATH";
pub const ENV_TIMEOUT_SECS: &str = "GATEKEY_TIMEOUT_SECS";
pub const ENV_ACCEPT_INVALID_CERTS: &str = "GATEKEY_ACCEPT_INVALID_CERTS";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub account_id: String,
    pub auth_token: String,
    /// Base URL of the API (e.g. "https://api.example.com/")
    pub api_host: String,
    /// Base URL serving access links
    pub card_host: String,
    /// Community to act on; may also be set later on the client
    pub community_id: Option<u32>,
    /// IANA timezone of the community (default: Asia/Shanghai)
    pub community_timezone: String,
    /// IANA timezone callers express times in (default: Asia/Shanghai)
    pub operator_timezone: String,
    /// Replaces the bundled link public key
    pub public_key_pem: Option<String>,
    pub transport: TransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            auth_token: String::new(),
            api_host: String::new(),
            card_host: String::new(),
            community_id: None,
            community_timezone: DEFAULT_TIMEZONE.to_string(),
            operator_timezone: DEFAULT_TIMEZONE.to_string(),
            public_key_pem: None,
            transport: TransportConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Load from `GATEKEY_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get(ENV_ACCOUNT_ID) {
            config.account_id = v;
        }
        if let Some(v) = get(ENV_AUTH_TOKEN) {
            config.auth_token = v;
        }
        if let Some(v) = get(ENV_API_HOST) {
            config.api_host = v;
        }
        if let Some(v) = get(ENV_CARD_HOST) {
            config.card_host = v;
        }
        if let Some(v) = get(ENV_COMMUNITY_ID) {
            config.community_id = Some(parse_var(ENV_COMMUNITY_ID, &v)?);
        }
        if let Some(v) = get(ENV_COMMUNITY_TIMEZONE) {
            config.community_timezone = v;
        }
        if let Some(v) = get(ENV_OPERATOR_TIMEZONE) {
            config.operator_timezone = v;
        }
        if let Some(path) = get(ENV_PUBLIC_KEY_PATH) {
            let pem = std::fs::read_to_string(&path).map_err(|e| {
                GateKeyError::Configuration(format!("cannot read public key {}: {}", path, e))
            })?;
            config.public_key_pem = Some(pem);
        }
        if let Some(v) = get(ENV_TIMEOUT_SECS) {
            config.transport.timeout = Some(Duration::from_secs(parse_var(ENV_TIMEOUT_SECS, &v)?));
        }
        if let Some(v) = get(ENV_ACCEPT_INVALID_CERTS) {
            config.transport.accept_invalid_certs = parse_var(ENV_ACCEPT_INVALID_CERTS, &v)?;
        }

        Ok(config)
    }

    pub fn identity(&self) -> Result<ClientIdentity> {
        ClientIdentity::new(self.account_id.as_str(), self.auth_token.as_str())
    }

    pub fn endpoints(&self) -> Result<ServiceEndpoints> {
        ServiceEndpoints::new(&self.api_host, &self.card_host)
    }

    pub fn community_context(&self) -> Result<CommunityContext> {
        let mut context = CommunityContext::new(&self.community_timezone, &self.operator_timezone)?;
        if let Some(id) = self.community_id {
            context.set_community_no(id);
        }
        Ok(context)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.identity()?;
        self.endpoints()?;
        self.community_context()?;
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| GateKeyError::Configuration(format!("{} has invalid value {:?}", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.community_timezone, "Asia/Shanghai");
        assert_eq!(config.operator_timezone, "Asia/Shanghai");
        assert_eq!(config.transport.timeout, None);
        assert!(!config.transport.accept_invalid_certs);
        assert!(config.transport.user_agent.starts_with("gatekey-client/"));
    }

    #[test]
    fn test_default_config_is_incomplete() {
        assert!(matches!(
            ClientConfig::default().validate(),
            Err(GateKeyError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_ACCOUNT_ID, "acct"),
            (ENV_AUTH_TOKEN, "token"),
            (ENV_API_HOST, "https://api.example.com"),
            (ENV_CARD_HOST, "https://card.example.com"),
            (ENV_COMMUNITY_ID, "12"),
            (ENV_OPERATOR_TIMEZONE, "UTC"),
            (ENV_TIMEOUT_SECS, "15"),
            (ENV_ACCEPT_INVALID_CERTS, "true"),
        ]))
        .unwrap();

        assert_eq!(config.account_id, "acct");
        assert_eq!(config.community_id, Some(12));
        assert_eq!(config.community_timezone, "Asia/Shanghai");
        assert_eq!(config.operator_timezone, "UTC");
        assert_eq!(config.transport.timeout, Some(Duration::from_secs(15)));
        assert!(config.transport.accept_invalid_certs);
        config.validate().unwrap();
        assert_eq!(config.community_context().unwrap().community_id(), Some(12));
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let result = ClientConfig::from_lookup(lookup(&[(ENV_COMMUNITY_ID, "twelve")]));
        assert!(matches!(result, Err(GateKeyError::Configuration(_))));
    }

    #[test]
    fn test_missing_public_key_file() {
        let result =
            ClientConfig::from_lookup(lookup(&[(ENV_PUBLIC_KEY_PATH, "/nonexistent/key.pem")]));
        assert!(matches!(result, Err(GateKeyError::Configuration(_))));
    }
}
