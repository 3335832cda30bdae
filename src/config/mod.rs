mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::net::IpAddr;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./hlsproxy.toml", "~/.config/hlsproxy/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let host: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Server host is not an IP address: {}", config.server.host))?;
    if !host.is_loopback() {
        anyhow::bail!("Server host must be a loopback address, got {}", host);
    }

    let cache = &config.cache;
    if cache.disk_capacity_bytes == 0 {
        anyhow::bail!("Cache disk capacity cannot be 0");
    }
    if cache.ttl_secs == 0 {
        anyhow::bail!("Cache TTL cannot be 0");
    }
    if cache.memory_max_items == 0 || cache.memory_max_cost_bytes == 0 {
        anyhow::bail!("Memory cache bounds cannot be 0");
    }
    if cache.sweep_interval_secs == 0 {
        anyhow::bail!("Cache sweep interval cannot be 0");
    }

    if config.upstream.timeout_secs == 0 {
        anyhow::bail!("Upstream timeout cannot be 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 1234);
        assert_eq!(config.cache.disk_capacity_bytes, 200 * 1024 * 1024);
        assert_eq!(config.cache.ttl_secs, 7 * 24 * 60 * 60);
        assert_eq!(config.cache.memory_max_items, 25);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 4321

[cache]
dir = "/tmp/hls"
ttl_secs = 60
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 4321);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.cache.dir, std::path::PathBuf::from("/tmp/hls"));
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.memory_max_items, 25);
        assert_eq!(config.upstream.timeout_secs, 30);
    }

    #[test]
    fn test_rejects_non_loopback_host() {
        let mut config = Config::default();
        config.server.host = "0.0.0.0".to_string();
        assert!(validate_config(&config).is_err());

        config.server.host = "::1".to_string();
        assert!(validate_config(&config).is_ok());

        config.server.host = "localhost".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_bounds() {
        let mut config = Config::default();
        config.cache.ttl_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.cache.disk_capacity_bytes = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
