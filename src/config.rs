// ⚙️ Configuration - Library switches and server settings from the environment

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "trial-merge.db";
pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_AUDIT_ACTOR: &str = "duplicate_merge";

// ============================================================================
// MERGE OPTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Group on trimmed, case-folded keys instead of exact strings
    pub normalize_group_keys: bool,

    /// Actor written to the audit trail; `None` disables auditing
    pub audit_actor: Option<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            normalize_group_keys: false,
            audit_actor: Some(DEFAULT_AUDIT_ACTOR.to_string()),
        }
    }
}

// ============================================================================
// SERVER CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub merge: MergeOptions,
}

impl ServerConfig {
    /// Read `TRIAL_MERGE_*` variables from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("TRIAL_MERGE_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let addr = lookup("TRIAL_MERGE_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let bind_addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("TRIAL_MERGE_ADDR is not a socket address: {}", addr))?;

        let normalize_group_keys = match lookup("TRIAL_MERGE_NORMALIZE_KEYS") {
            Some(value) => parse_flag("TRIAL_MERGE_NORMALIZE_KEYS", &value)?,
            None => false,
        };

        let audit = match lookup("TRIAL_MERGE_AUDIT") {
            Some(value) => parse_flag("TRIAL_MERGE_AUDIT", &value)?,
            None => true,
        };

        Ok(ServerConfig {
            db_path,
            bind_addr,
            merge: MergeOptions {
                normalize_group_keys,
                audit_actor: audit.then(|| DEFAULT_AUDIT_ACTOR.to_string()),
            },
        })
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{} must be true or false, got '{}'", name, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.merge, MergeOptions::default());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("TRIAL_MERGE_DB", "/tmp/trials.db"),
            ("TRIAL_MERGE_ADDR", "127.0.0.1:8080"),
            ("TRIAL_MERGE_NORMALIZE_KEYS", "yes"),
            ("TRIAL_MERGE_AUDIT", "off"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/trials.db"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert!(config.merge.normalize_group_keys);
        assert_eq!(config.merge.audit_actor, None);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(ServerConfig::from_lookup(lookup_from(&[("TRIAL_MERGE_ADDR", "nowhere")])).is_err());
        assert!(
            ServerConfig::from_lookup(lookup_from(&[("TRIAL_MERGE_AUDIT", "maybe")])).is_err()
        );
    }
}
