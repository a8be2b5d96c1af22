//! RPC connection settings.
//!
//! Precedence, highest first: explicit overrides (command line), the
//! `HASHPROBE_RPC_*` environment variables, the network preset.

use probe_core::params::NetworkType;

use crate::error::SourceError;
use crate::rpc::RpcBlockSource;

pub const ENV_RPC_URL: &str = "HASHPROBE_RPC_URL";
pub const ENV_RPC_USER: &str = "HASHPROBE_RPC_USER";
pub const ENV_RPC_PASSWORD: &str = "HASHPROBE_RPC_PASSWORD";

#[derive(Clone, PartialEq, Eq)]
pub struct RpcSettings {
    pub url: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for RpcSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcSettings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RpcSettings {
    /// The network's built-in node location and credentials.
    pub fn preset(network: NetworkType) -> Self {
        let endpoint = network.rpc_defaults();
        Self {
            url: endpoint.url(),
            user: endpoint.user,
            password: endpoint.password,
        }
    }

    /// Preset values, replaced by any `HASHPROBE_RPC_*` variable that is set.
    pub fn from_env(network: NetworkType) -> Self {
        Self::preset(network).layered(|key| std::env::var(key).ok())
    }

    /// Replace fields for which `lookup` returns a value.
    pub fn layered<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            url: lookup(ENV_RPC_URL).unwrap_or(self.url),
            user: lookup(ENV_RPC_USER).unwrap_or(self.user),
            password: lookup(ENV_RPC_PASSWORD).unwrap_or(self.password),
        }
    }

    /// Apply command-line overrides.
    pub fn with_overrides(self, url: Option<String>, user: Option<String>, password: Option<String>) -> Self {
        Self {
            url: url.unwrap_or(self.url),
            user: user.unwrap_or(self.user),
            password: password.unwrap_or(self.password),
        }
    }

    pub fn connect(&self) -> Result<RpcBlockSource, SourceError> {
        RpcBlockSource::new(&self.url, &self.user, &self.password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let main = RpcSettings::preset(NetworkType::Mainnet);
        assert_eq!(main.url, "http://127.0.0.1:7116");
        assert_eq!(main.user, "bitcoinrpc");
        let reg = RpcSettings::preset(NetworkType::Regtest);
        assert_eq!(reg.url, "http://127.0.0.1:16101");
        assert_eq!(reg.password, "pass");
    }

    #[test]
    fn environment_overrides_preset() {
        let settings = RpcSettings::preset(NetworkType::Testnet).layered(|key| match key {
            ENV_RPC_USER => Some("alice".to_string()),
            _ => None,
        });
        assert_eq!(settings.user, "alice");
        assert_eq!(settings.url, "http://127.0.0.1:17116");
        assert_eq!(settings.password, "123456");
    }

    #[test]
    fn overrides_win() {
        let settings = RpcSettings::preset(NetworkType::Testnet)
            .layered(|_| Some("from-env".to_string()))
            .with_overrides(Some("http://10.0.0.2:9000".into()), None, None);
        assert_eq!(settings.url, "http://10.0.0.2:9000");
        assert_eq!(settings.user, "from-env");
    }

    #[test]
    fn debug_hides_password() {
        let text = format!("{:?}", RpcSettings::preset(NetworkType::Mainnet));
        assert!(!text.contains("123456"));
    }
}
