//! Layered configuration.
//!
//! Values are resolved lowest to highest priority from built-in defaults,
//! then a config file, then `TWIN_`-prefixed environment variables. Nested
//! keys in the environment are separated by a double underscore, so
//! `TWIN_LOOKUP_PARAMS__OUTPUT=json` sets `lookup_params.output`.
//!
//! ```toml
//! gateway = "https://files.example.com/group1"
//! chunk_size = 4194304
//! lookup_timeout = 5
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::BaseDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use twin_catalog::{CatalogOptions, DEFAULT_LOOKUP_PATH, DEFAULT_TIMEOUT};
use twin_hash::DEFAULT_CHUNK_SIZE;

const APP_DIR: &str = "twin";
const CONFIG_FILE: &str = "config.toml";
const CACHE_FILE: &str = "digests.sqlite3";
const ENV_PREFIX: &str = "TWIN_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root address of the store; lookups go to `<gateway><lookup_path>`.
    pub gateway: Option<String>,
    pub lookup_path: String,
    /// Query parameters sent with every lookup, ahead of `md5`.
    pub lookup_params: BTreeMap<String, String>,
    /// Bytes read per hashing step.
    pub chunk_size: u64,
    /// Seconds before a lookup is abandoned.
    pub lookup_timeout: u64,
    /// Where the digest cache lives. Defaults to the user cache directory.
    pub cache_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: None,
            lookup_path: DEFAULT_LOOKUP_PATH.to_string(),
            lookup_params: BTreeMap::from([("output".to_string(), "json2".to_string())]),
            chunk_size: DEFAULT_CHUNK_SIZE,
            lookup_timeout: DEFAULT_TIMEOUT.as_secs(),
            cache_path: None,
        }
    }
}

impl Config {
    /// Load and validate configuration.
    ///
    /// `explicit` must exist if given. Without it, `<config dir>/twin/config.toml`
    /// is read when present and silently skipped otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(explicit)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// The merged providers, before extraction.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                figment = merge_file(figment, path);
            },
            None => {
                if let Some(path) = default_config_path()
                    && path.is_file()
                {
                    figment = merge_file(figment, &path);
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            exn::bail!(ErrorKind::InvalidChunkSize);
        }
        if self.lookup_timeout == 0 {
            exn::bail!(ErrorKind::InvalidTimeout);
        }
        if let Some(gateway) = &self.gateway {
            check_gateway(gateway)?;
        }
        Ok(())
    }

    /// The gateway, for commands that can't work without one.
    pub fn require_gateway(&self) -> Result<&str> {
        let gateway = self.gateway.as_deref().filter(|g| !g.trim().is_empty()).ok_or_raise(|| ErrorKind::MissingGateway)?;
        check_gateway(gateway)?;
        Ok(gateway)
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            lookup_path: self.lookup_path.clone(),
            params: self.lookup_params.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            timeout: Duration::from_secs(self.lookup_timeout),
        }
    }

    /// Configured cache location, or the per-user default.
    pub fn cache_path(&self) -> Option<PathBuf> {
        self.cache_path.clone().or_else(default_cache_path)
    }
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    tracing::debug!(path = %path.display(), "reading config file");
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

fn check_gateway(gateway: &str) -> Result<()> {
    let host = gateway.strip_prefix("https://").or_else(|| gateway.strip_prefix("http://"));
    match host {
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') => Ok(()),
        _ => exn::bail!(ErrorKind::InvalidGateway(gateway.to_string())),
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join(APP_DIR).join(CONFIG_FILE))
}

pub fn default_cache_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.cache_dir().join(APP_DIR).join(CACHE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    /// Loads `contents` from a file in a fresh jail, which also shields the
    /// test from `TWIN_*` variables other tests set.
    fn load_from(name: &str, contents: &str) -> std::result::Result<Result<Config>, String> {
        let mut loaded = None;
        Jail::try_with(|jail| {
            jail.create_file(name, contents)?;
            loaded = Some(Config::load(Some(Path::new(name))));
            Ok(())
        })
        .map_err(|e| e.to_string())?;
        loaded.ok_or_else(|| "jail did not run".to_string())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 2 * 1024 * 1024);
        assert_eq!(config.lookup_timeout, 10);
        assert_eq!(config.lookup_path, "/file1/upload");
        assert_eq!(config.catalog_options(), CatalogOptions::default());
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case("twin.toml", "gateway = \"http://files.local\"\nchunk_size = 1024\n")]
    #[case("twin.yaml", "gateway: http://files.local\nchunk_size: 1024\n")]
    #[case("twin.json", r#"{"gateway": "http://files.local", "chunk_size": 1024}"#)]
    fn test_file_formats(#[case] name: &str, #[case] contents: &str) {
        let config = load_from(name, contents).unwrap().unwrap();
        assert_eq!(config.gateway.as_deref(), Some("http://files.local"));
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.lookup_timeout, 10);
        assert_eq!(config.lookup_params.get("output").map(String::as_str), Some("json2"));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[rstest]
    #[case("chunk_size = 0", "chunk")]
    #[case("lookup_timeout = 0", "timeout")]
    #[case("gateway = \"files.local\"", "gateway")]
    #[case("chunk_size = \"big\"", "load")]
    fn test_invalid_values(#[case] contents: &str, #[case] which: &str) {
        let err = load_from("twin.toml", contents).unwrap().unwrap_err();
        let matched = match which {
            "chunk" => matches!(&*err, ErrorKind::InvalidChunkSize),
            "timeout" => matches!(&*err, ErrorKind::InvalidTimeout),
            "gateway" => matches!(&*err, ErrorKind::InvalidGateway(_)),
            _ => matches!(&*err, ErrorKind::Load),
        };
        assert!(matched, "unexpected error: {err:?}");
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("twin.toml", "gateway = \"http://from-file\"\nlookup_timeout = 3\n")?;
            jail.set_env("TWIN_GATEWAY", "https://from-env");
            jail.set_env("TWIN_LOOKUP_PARAMS__SCENE", "docs");
            let config = Config::load(Some(Path::new("twin.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.gateway.as_deref(), Some("https://from-env"));
            assert_eq!(config.lookup_timeout, 3);
            assert_eq!(config.lookup_params.get("scene").map(String::as_str), Some("docs"));
            assert_eq!(config.lookup_params.get("output").map(String::as_str), Some("json2"));
            Ok(())
        });
    }

    #[rstest]
    #[case(None, false)]
    #[case(Some(""), false)]
    #[case(Some("ftp://files.local"), false)]
    #[case(Some("https://"), false)]
    #[case(Some("https://files.local/group1"), true)]
    fn test_require_gateway(#[case] gateway: Option<&str>, #[case] ok: bool) {
        let config = Config { gateway: gateway.map(str::to_string), ..Config::default() };
        assert_eq!(config.require_gateway().is_ok(), ok);
    }

    #[test]
    fn test_cache_path() {
        let config = Config { cache_path: Some(PathBuf::from("/tmp/twin.sqlite3")), ..Config::default() };
        assert_eq!(config.cache_path(), Some(PathBuf::from("/tmp/twin.sqlite3")));
        if let Some(path) = Config::default().cache_path() {
            assert!(path.ends_with("twin/digests.sqlite3"));
        }
    }
}
