use std::{
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Mutex, PoisonError},
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::VenomConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["venom.toml", "venom.yaml", "venom.yml", "venom.json"];

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Set a custom config directory. When set, discovery only looks there.
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(path);
}

/// Clear the config directory override, restoring default discovery.
pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<VenomConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./venom.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/venom/venom.{toml,yaml,yml,json}` (user-global)
///
/// Returns `VenomConfig::default()` if no file is found or it fails to parse.
pub fn discover_and_load() -> VenomConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return VenomConfig::default();
    };
    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            VenomConfig::default()
        },
    }
}

/// Discovered config with process environment overrides applied.
pub fn load_effective() -> VenomConfig {
    let mut config = discover_and_load();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

/// Apply `PORT`, `API_KEY`, `RATE_WINDOW_MS`, `RATE_MAX` and the `VENOM_*`
/// variables on top of file values. Unparseable numbers and zero throttle
/// values are ignored.
pub fn apply_env_overrides(config: &mut VenomConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(bind) = lookup("VENOM_BIND").filter(|v| !v.is_empty()) {
        config.server.bind = bind;
    }
    if let Some(port) = parse_var(&lookup, "PORT") {
        config.server.port = port;
    }
    if let Some(key) = lookup("API_KEY").filter(|v| !v.is_empty()) {
        config.server.api_key = Some(Secret::new(key));
    }
    if let Some(window_ms) = parse_nonzero(&lookup, "RATE_WINDOW_MS") {
        config.throttle.window_ms = window_ms;
    }
    if let Some(max) = parse_nonzero(&lookup, "RATE_MAX") {
        config.throttle.max_requests = max;
    }
    if let Some(delay) = parse_var(&lookup, "VENOM_RECONNECT_DELAY_MS") {
        config.session.reconnect_delay_ms = delay;
    }
    if let Some(cap) = parse_var(&lookup, "VENOM_MAX_RECONNECTS") {
        config.session.max_reconnect_attempts = Some(cap);
    }
    if let Some(timeout) = parse_var(&lookup, "VENOM_UPSTREAM_TIMEOUT_MS") {
        config.session.upstream_timeout_ms = timeout;
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparseable environment override");
            None
        },
    }
}

fn parse_nonzero<T: FromStr + Default + PartialEq>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let value = parse_var(lookup, name)?;
    if value == T::default() {
        warn!(var = name, "ignoring zero environment override");
        return None;
    }
    Some(value)
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        // Override is set, don't fall through to other locations.
        return first_existing(&dir);
    }

    if let Some(p) = CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
    {
        return Some(p);
    }

    config_dir().and_then(|dir| first_existing(&dir))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: override, or `~/.config/venom/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return Some(dir);
    }
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("venom"))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<VenomConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("venom.toml");
        std::fs::write(&path, "[server]\nport = 9000\n[bridge]\ncommand = \"bun\"\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.bridge.command, "bun");
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("venom.yaml");
        std::fs::write(&yaml, "throttle:\n  max_requests: 7\n").unwrap();
        assert_eq!(load_config(&yaml).unwrap().throttle.max_requests, 7);

        let json = dir.path().join("venom.json");
        std::fs::write(&json, r#"{"session":{"max_reconnect_attempts":3}}"#).unwrap();
        assert_eq!(
            load_config(&json).unwrap().session.max_reconnect_attempts,
            Some(3)
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("venom.ini");
        std::fs::write(&path, "port=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn env_overrides_win() {
        let mut cfg = VenomConfig::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("PORT", "4000"),
                ("API_KEY", "k"),
                ("RATE_WINDOW_MS", "1000"),
                ("RATE_MAX", "2"),
                ("VENOM_MAX_RECONNECTS", "10"),
            ]),
        );
        assert_eq!(cfg.server.port, 4000);
        assert_eq!(
            cfg.server.api_key.as_ref().map(|k| k.expose_secret().clone()),
            Some("k".to_string())
        );
        assert_eq!(cfg.throttle.window_ms, 1000);
        assert_eq!(cfg.throttle.max_requests, 2);
        assert_eq!(cfg.session.max_reconnect_attempts, Some(10));
    }

    #[test]
    fn bad_numbers_are_ignored() {
        let mut cfg = VenomConfig::default();
        apply_env_overrides(&mut cfg, env(&[("PORT", "eighty"), ("RATE_MAX", "-1")]));
        assert_eq!(cfg.server.port, 3371);
        assert_eq!(cfg.throttle.max_requests, 30);
    }

    #[test]
    fn zero_throttle_overrides_are_ignored() {
        let mut cfg = VenomConfig::default();
        apply_env_overrides(&mut cfg, env(&[("RATE_WINDOW_MS", "0"), ("RATE_MAX", "0")]));
        assert_eq!(cfg.throttle.window_ms, 60_000);
        assert_eq!(cfg.throttle.max_requests, 30);
    }

    #[test]
    fn empty_api_key_does_not_override() {
        let mut cfg = VenomConfig::default();
        apply_env_overrides(&mut cfg, env(&[("API_KEY", "")]));
        assert!(cfg.server.api_key.is_none());
    }

    #[test]
    fn discovery_honours_override_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("venom.toml"), "[server]\nport = 5050\n").unwrap();

        set_config_dir(dir.path().to_path_buf());
        let cfg = discover_and_load();
        clear_config_dir();

        assert_eq!(cfg.server.port, 5050);
    }
}
