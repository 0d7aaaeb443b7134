// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at start-up.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root for key pairs, local blobs, the ledger db and audit logs | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `IPFS_PROTOCOL` | Remote blob API scheme | `http` |
//! | `IPFS_HOST` | Remote blob API host | `localhost` |
//! | `IPFS_PORT` | Remote blob API port | `5001` |
//! | `IPFS_ENABLED` | Use the remote blob backend at all | `true` |
//! | `VAULT_STORAGE_TIMEOUT_SECS` | Bound on each remote blob call, at least 1 | `5` |
//! | `VAULT_PROBE_INTERVAL_SECS` | Background health probe interval, at least 1 | `30` |
//! | `BLOCKDAG_NETWORK` | `mainnet` or `testnet` | `mainnet` |
//! | `BLOCKDAG_RPC_URL` | RPC endpoint override | network default |
//! | `VAULT_CONTRACT_ADDRESS` | Handshake contract | built-in address |
//! | `VAULT_PRIVATE_KEY` | Mirror signer key (hex) | unset, mirror disabled |
//! | `VAULT_PRIVATE_KEY_PEM_PATH` | Mirror signer key (PEM file) | unset |
//! | `VAULT_LEDGER_TIMEOUT_SECS` | Bound on each ledger call, at least 1 | `8` |
//! | `VAULT_RECEIVER_ALIASES` | `alias=receiverId;...` | empty |
//! | `VAULT_RECEIVER_ADDRESSES` | `receiverId=0xaddress;...` | empty |
//! | `VAULT_ALIAS_CASE_INSENSITIVE` | Case-insensitive alias matching | `true` |
//! | `VAULT_ACCEPT_CANONICAL_IDS` | UUID-shaped input resolves to itself | `true` |
//! | `VAULT_RSA_BITS` | Receiver key size, at least 2048 | `2048` |
//! | `VAULT_MAX_UPLOAD_BYTES` | Request body limit for uploads | `104857600` |

use std::path::PathBuf;
use std::time::Duration;

use crate::blockchain::{network_by_key, NetworkConfig, BLOCKDAG_MAINNET, DEFAULT_VAULT_CONTRACT};
use crate::crypto::MIN_RSA_BITS;
use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default size limit for upload bodies (100 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var}: malformed entry '{entry}', expected key=value")]
    MalformedPair { var: &'static str, entry: String },
}

/// Remote blob backend settings.
#[derive(Debug, Clone)]
pub struct IpfsConfig {
    pub enabled: bool,
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl IpfsConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Where the mirror signer key comes from.
#[derive(Clone)]
pub enum SignerSource {
    Hex(String),
    PemFile(PathBuf),
}

impl std::fmt::Debug for SignerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignerSource::Hex(_) => f.write_str("Hex([REDACTED])"),
            SignerSource::PemFile(path) => f.debug_tuple("PemFile").field(path).finish(),
        }
    }
}

/// External ledger mirror settings.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub network: NetworkConfig,
    pub rpc_url: String,
    pub contract_address: String,
    /// `None` disables the mirror.
    pub signer: Option<SignerSource>,
    pub timeout: Duration,
}

/// Receiver alias table settings.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub aliases: Vec<(String, String)>,
    pub addresses: Vec<(String, String)>,
    pub case_insensitive: bool,
    pub accept_canonical_ids: bool,
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub json_logs: bool,
    pub ipfs: IpfsConfig,
    pub storage_timeout: Duration,
    pub probe_interval: Duration,
    pub ledger: LedgerConfig,
    pub resolver: ResolverConfig,
    pub rsa_bits: usize,
    pub max_upload_bytes: usize,
}

impl VaultConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let network = match get("BLOCKDAG_NETWORK") {
            Some(raw) => network_by_key(&raw).ok_or_else(|| ConfigError::Invalid {
                var: "BLOCKDAG_NETWORK",
                value: raw,
                reason: "expected 'mainnet' or 'testnet'".to_string(),
            })?,
            None => BLOCKDAG_MAINNET,
        };

        let signer = match (get("VAULT_PRIVATE_KEY"), get("VAULT_PRIVATE_KEY_PEM_PATH")) {
            (Some(hex), _) => Some(SignerSource::Hex(hex)),
            (None, Some(path)) => Some(SignerSource::PemFile(PathBuf::from(path))),
            (None, None) => None,
        };

        let rsa_bits: usize = parse_or(&get, "VAULT_RSA_BITS", MIN_RSA_BITS)?;
        if rsa_bits < MIN_RSA_BITS {
            return Err(ConfigError::Invalid {
                var: "VAULT_RSA_BITS",
                value: rsa_bits.to_string(),
                reason: format!("must be at least {MIN_RSA_BITS}"),
            });
        }

        Ok(Self {
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string())),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 8080)?,
            json_logs: get("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            ipfs: IpfsConfig {
                enabled: parse_bool(&get, "IPFS_ENABLED", true)?,
                protocol: get("IPFS_PROTOCOL").unwrap_or_else(|| "http".to_string()),
                host: get("IPFS_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_or(&get, "IPFS_PORT", 5001)?,
            },
            storage_timeout: parse_secs(&get, "VAULT_STORAGE_TIMEOUT_SECS", 5)?,
            probe_interval: parse_secs(&get, "VAULT_PROBE_INTERVAL_SECS", 30)?,
            ledger: LedgerConfig {
                rpc_url: get("BLOCKDAG_RPC_URL").unwrap_or_else(|| network.rpc_url.to_string()),
                network,
                contract_address: get("VAULT_CONTRACT_ADDRESS")
                    .unwrap_or_else(|| DEFAULT_VAULT_CONTRACT.to_string()),
                signer,
                timeout: parse_secs(&get, "VAULT_LEDGER_TIMEOUT_SECS", 8)?,
            },
            resolver: ResolverConfig {
                aliases: parse_pairs("VAULT_RECEIVER_ALIASES", get("VAULT_RECEIVER_ALIASES"))?,
                addresses: parse_pairs(
                    "VAULT_RECEIVER_ADDRESSES",
                    get("VAULT_RECEIVER_ADDRESSES"),
                )?,
                case_insensitive: parse_bool(&get, "VAULT_ALIAS_CASE_INSENSITIVE", true)?,
                accept_canonical_ids: parse_bool(&get, "VAULT_ACCEPT_CANONICAL_IDS", true)?,
            },
            rsa_bits,
            max_upload_bytes: parse_or(&get, "VAULT_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }

    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// A whole number of seconds, at least one.
fn parse_secs<G>(get: &G, var: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(get, var, default)?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: secs.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool<G>(get: &G, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                var,
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
        None => Ok(default),
    }
}

/// Parse `key=value;key=value` lists. Empty segments are skipped.
pub fn parse_pairs(
    var: &'static str,
    raw: Option<String>,
) -> Result<Vec<(String, String)>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() && !value.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(ConfigError::MalformedPair {
                var,
                entry: entry.to_string(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<VaultConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        VaultConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/data"));
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8080");
        assert!(!cfg.json_logs);
        assert!(cfg.ipfs.enabled);
        assert_eq!(cfg.ipfs.base_url(), "http://localhost:5001");
        assert_eq!(cfg.storage_timeout, Duration::from_secs(5));
        assert_eq!(cfg.probe_interval, Duration::from_secs(30));
        assert_eq!(cfg.ledger.network, BLOCKDAG_MAINNET);
        assert_eq!(cfg.ledger.rpc_url, BLOCKDAG_MAINNET.rpc_url);
        assert_eq!(cfg.ledger.contract_address, DEFAULT_VAULT_CONTRACT);
        assert!(cfg.ledger.signer.is_none());
        assert_eq!(cfg.ledger.timeout, Duration::from_secs(8));
        assert!(cfg.resolver.aliases.is_empty());
        assert!(cfg.resolver.case_insensitive);
        assert_eq!(cfg.rsa_bits, 2048);
        assert_eq!(cfg.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("DATA_DIR", "/tmp/vault"),
            ("PORT", "9000"),
            ("LOG_FORMAT", "JSON"),
            ("IPFS_ENABLED", "false"),
            ("IPFS_PROTOCOL", "https"),
            ("IPFS_HOST", "ipfs.internal"),
            ("IPFS_PORT", "443"),
            ("BLOCKDAG_NETWORK", "testnet"),
            ("VAULT_PRIVATE_KEY", "0xabc"),
            ("VAULT_RECEIVER_ALIASES", "TestUser=alice; ops=bob;"),
            ("VAULT_RSA_BITS", "3072"),
        ])
        .unwrap();

        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/vault"));
        assert_eq!(cfg.port, 9000);
        assert!(cfg.json_logs);
        assert!(!cfg.ipfs.enabled);
        assert_eq!(cfg.ipfs.base_url(), "https://ipfs.internal:443");
        assert_eq!(cfg.ledger.network.key, "testnet");
        assert!(matches!(cfg.ledger.signer, Some(SignerSource::Hex(_))));
        assert_eq!(
            cfg.resolver.aliases,
            vec![
                ("TestUser".to_string(), "alice".to_string()),
                ("ops".to_string(), "bob".to_string())
            ]
        );
        assert_eq!(cfg.rsa_bits, 3072);
    }

    #[test]
    fn hex_key_wins_over_pem_path() {
        let cfg = config(&[
            ("VAULT_PRIVATE_KEY_PEM_PATH", "/keys/signer.pem"),
            ("VAULT_PRIVATE_KEY", "0xabc"),
        ])
        .unwrap();
        assert!(matches!(cfg.ledger.signer, Some(SignerSource::Hex(_))));

        let cfg = config(&[("VAULT_PRIVATE_KEY_PEM_PATH", "/keys/signer.pem")]).unwrap();
        assert!(matches!(cfg.ledger.signer, Some(SignerSource::PemFile(_))));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            config(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        ));
        assert!(matches!(
            config(&[("BLOCKDAG_NETWORK", "devnet")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[("VAULT_RSA_BITS", "1024")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[("IPFS_ENABLED", "maybe")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            config(&[("VAULT_RECEIVER_ALIASES", "novalue")]),
            Err(ConfigError::MalformedPair { .. })
        ));
    }

    #[test]
    fn signer_debug_is_redacted() {
        let source = SignerSource::Hex("0xdeadbeef".to_string());
        assert!(!format!("{source:?}").contains("deadbeef"));
    }

    #[test]
    fn zero_durations_are_rejected() {
        for var in [
            "VAULT_STORAGE_TIMEOUT_SECS",
            "VAULT_PROBE_INTERVAL_SECS",
            "VAULT_LEDGER_TIMEOUT_SECS",
        ] {
            let err = config(&[(var, "0")]).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Invalid { var: v, .. } if *v == var),
                "{var}: {err}"
            );
        }

        let cfg = config(&[("VAULT_LEDGER_TIMEOUT_SECS", "1")]).unwrap();
        assert_eq!(cfg.ledger.timeout, Duration::from_secs(1));
    }
}
