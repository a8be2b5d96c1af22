//! Network parameters. One immutable [`NetworkParams`] per network.
//!
//! Nothing here is global: callers pick a [`NetworkType`], build its
//! parameters once and pass them by reference into every component.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compact;
use crate::error::ParamsError;
use crate::{Target, U256};

/// Design block interval in seconds.
pub const TARGET_SOLVETIME_SECS: u64 = 600;

/// LWMA averaging window in blocks.
pub const LWMA_WINDOW: u64 = 72;

/// Interval-Retarget adjustment interval in blocks.
pub const ADJUST_INTERVAL: u64 = 72;

/// Maximum factor by which one Interval-Retarget step may move the target.
pub const RETARGET_FACTOR: u64 = 2;

/// Height at which mainnet switched from the legacy rule to LWMA.
pub const MAINNET_FORK_HEIGHT: u64 = 495_866;

/// Compact form of the difficulty-1 reference target.
pub const REFERENCE_BITS: u32 = 0x1d00ffff;

/// Which retarget algorithm a network runs after its fork height.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetargetAlgorithm {
    /// Discrete adjustment every `adjust_interval` blocks, clamped by `retarget_factor`.
    IntervalRetarget,
    /// Linearly weighted moving average, adjusted every block.
    Lwma,
}

impl fmt::Display for RetargetAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntervalRetarget => f.write_str("interval"),
            Self::Lwma => f.write_str("lwma"),
        }
    }
}

impl FromStr for RetargetAlgorithm {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "interval" | "interval-retarget" => Ok(Self::IntervalRetarget),
            "lwma" => Ok(Self::Lwma),
            other => Err(ParamsError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Network type: Mainnet, Testnet, or Regtest.
///
/// # Examples
///
/// ```
/// use probe_core::params::NetworkType;
/// let net: NetworkType = "testnet".parse().unwrap();
/// assert_eq!(net, NetworkType::Testnet);
/// assert_eq!(net.rpc_defaults().port, 17116);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetworkType {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local regression-test network with an easy limit.
    Regtest,
}

impl NetworkType {
    /// Immutable consensus parameters for this network.
    pub fn params(&self) -> NetworkParams {
        let reference_target = compact::decode(REFERENCE_BITS);
        match self {
            Self::Mainnet => NetworkParams {
                network: *self,
                algorithm: RetargetAlgorithm::Lwma,
                target_solvetime: TARGET_SOLVETIME_SECS,
                average_window: LWMA_WINDOW,
                adjust_interval: ADJUST_INTERVAL,
                retarget_factor: RETARGET_FACTOR,
                pow_limit: (U256::one() << 224usize) - U256::one(),
                fork_height: MAINNET_FORK_HEIGHT,
                reference_target,
            },
            Self::Testnet => NetworkParams {
                network: *self,
                algorithm: RetargetAlgorithm::Lwma,
                target_solvetime: TARGET_SOLVETIME_SECS,
                average_window: LWMA_WINDOW,
                adjust_interval: ADJUST_INTERVAL,
                retarget_factor: RETARGET_FACTOR,
                pow_limit: (U256::one() << 224usize) - U256::one(),
                fork_height: 1,
                reference_target,
            },
            Self::Regtest => NetworkParams {
                network: *self,
                algorithm: RetargetAlgorithm::IntervalRetarget,
                target_solvetime: TARGET_SOLVETIME_SECS,
                average_window: LWMA_WINDOW,
                adjust_interval: ADJUST_INTERVAL,
                retarget_factor: RETARGET_FACTOR,
                pow_limit: (U256::one() << 255usize) - U256::one(),
                fork_height: 1,
                reference_target,
            },
        }
    }

    /// Default JSON-RPC location and credentials of this network's node.
    pub fn rpc_defaults(&self) -> RpcEndpoint {
        match self {
            Self::Mainnet => RpcEndpoint::new("127.0.0.1", 7116, "bitcoinrpc", "123456"),
            Self::Testnet => RpcEndpoint::new("127.0.0.1", 17116, "bitcoinrpc", "123456"),
            Self::Regtest => RpcEndpoint::new("127.0.0.1", 16101, "user", "pass"),
        }
    }

    /// Lowercase name, also used as a data directory suffix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkType {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            "regtest" => Ok(Self::Regtest),
            other => Err(ParamsError::UnknownNetwork(other.to_string())),
        }
    }
}

/// Where and how to reach a node's JSON-RPC interface.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl RpcEndpoint {
    pub fn new(host: &str, port: u16, user: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    /// HTTP URL without credentials.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Consensus parameters consumed by the retarget engine and difficulty calculator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    /// Network these parameters belong to.
    pub network: NetworkType,
    /// Retarget variant active from `fork_height`.
    pub algorithm: RetargetAlgorithm,
    /// Expected seconds per block.
    pub target_solvetime: u64,
    /// LWMA window N.
    pub average_window: u64,
    /// Interval-Retarget window N.
    pub adjust_interval: u64,
    /// Interval-Retarget clamp bound.
    pub retarget_factor: u64,
    /// Easiest permissible target (minimum difficulty).
    pub pow_limit: Target,
    /// Height from which the configured algorithm is active.
    pub fork_height: u64,
    /// Target of difficulty 1.
    pub reference_target: Target,
}

impl NetworkParams {
    /// `adjust_interval × target_solvetime`.
    pub fn target_time_span(&self) -> u64 {
        self.adjust_interval * self.target_solvetime
    }

    /// Reject parameters the retarget arithmetic cannot run on.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let fields = [
            ("target_solvetime", self.target_solvetime),
            ("average_window", self.average_window),
            ("adjust_interval", self.adjust_interval),
            ("retarget_factor", self.retarget_factor),
        ];
        if let Some(&(field, _)) = fields.iter().find(|(_, v)| *v == 0) {
            return Err(ParamsError::Zero { field });
        }
        if self.pow_limit.is_zero() {
            return Err(ParamsError::Zero { field: "pow_limit" });
        }
        Ok(())
    }

    /// Compact form of `pow_limit`.
    pub fn pow_limit_bits(&self) -> u32 {
        // pow_limit is non-zero by construction, so encode cannot fail.
        compact::encode(self.pow_limit).unwrap_or(REFERENCE_BITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_limit_encodes_to_reference_bits() {
        let p = NetworkType::Mainnet.params();
        assert_eq!(p.pow_limit_bits(), 0x1d00ffff);
        assert_eq!(p.algorithm, RetargetAlgorithm::Lwma);
        assert_eq!(p.fork_height, MAINNET_FORK_HEIGHT);
    }

    #[test]
    fn regtest_limit() {
        let p = NetworkType::Regtest.params();
        assert_eq!(p.pow_limit_bits(), 0x207fffff);
        assert_eq!(p.algorithm, RetargetAlgorithm::IntervalRetarget);
    }

    #[test]
    fn reference_target_is_difficulty_one() {
        for net in [NetworkType::Mainnet, NetworkType::Testnet, NetworkType::Regtest] {
            assert_eq!(net.params().reference_target, compact::decode(0x1d00ffff));
        }
    }

    #[test]
    fn presets_are_valid() {
        for net in [NetworkType::Mainnet, NetworkType::Testnet, NetworkType::Regtest] {
            assert_eq!(net.params().validate(), Ok(()));
        }
    }

    #[test]
    fn zero_fields_are_rejected() {
        let base = NetworkType::Testnet.params();
        let cases = [
            ("target_solvetime", NetworkParams { target_solvetime: 0, ..base.clone() }),
            ("average_window", NetworkParams { average_window: 0, ..base.clone() }),
            ("adjust_interval", NetworkParams { adjust_interval: 0, ..base.clone() }),
            ("retarget_factor", NetworkParams { retarget_factor: 0, ..base.clone() }),
            ("pow_limit", NetworkParams { pow_limit: U256::zero(), ..base.clone() }),
        ];
        for (field, params) in cases {
            assert_eq!(params.validate(), Err(ParamsError::Zero { field }));
        }
    }

    #[test]
    fn target_time_span() {
        let p = NetworkType::Testnet.params();
        assert_eq!(p.target_time_span(), 72 * 600);
    }

    #[test]
    fn parse_network_names() {
        assert_eq!("mainnet".parse::<NetworkType>().unwrap(), NetworkType::Mainnet);
        assert_eq!("REGTEST".parse::<NetworkType>().unwrap(), NetworkType::Regtest);
        assert!(matches!(
            "signet".parse::<NetworkType>(),
            Err(ParamsError::UnknownNetwork(_))
        ));
    }

    #[test]
    fn network_display_round_trips() {
        for net in [NetworkType::Mainnet, NetworkType::Testnet, NetworkType::Regtest] {
            assert_eq!(net.to_string().parse::<NetworkType>().unwrap(), net);
        }
    }

    #[test]
    fn parse_algorithm_names() {
        assert_eq!("lwma".parse::<RetargetAlgorithm>().unwrap(), RetargetAlgorithm::Lwma);
        assert_eq!(
            "interval".parse::<RetargetAlgorithm>().unwrap(),
            RetargetAlgorithm::IntervalRetarget
        );
        assert!("dgw".parse::<RetargetAlgorithm>().is_err());
    }

    #[test]
    fn rpc_defaults() {
        assert_eq!(NetworkType::Mainnet.rpc_defaults().url(), "http://127.0.0.1:7116");
        assert_eq!(NetworkType::Regtest.rpc_defaults().user, "user");
    }
}
