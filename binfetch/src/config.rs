//! Loading, saving and validating the project config.

use binfetch_schema::Config;
use camino::Utf8Path;
use tracing::info;

use crate::errors::{BinfetchError, BinfetchResult};

/// Where the config lives unless told otherwise
pub const DEFAULT_CONFIG_PATH: &str = "binfetch.yml";

/// Load the config at `path`
pub fn load_config(path: &Utf8Path) -> BinfetchResult<Config> {
    if !path.exists() {
        return Err(BinfetchError::MissingConfig {
            path: path.to_owned(),
        });
    }
    let src = std::fs::read_to_string(path)?;
    Ok(serde_yml::from_str(&src)?)
}

/// Load the config at `path`, or start a fresh one if it isn't there yet
pub fn load_or_default(path: &Utf8Path) -> BinfetchResult<Config> {
    if path.exists() {
        load_config(path)
    } else {
        info!("no config at {path}, starting a fresh one");
        Ok(Config::default())
    }
}

/// Write the config to `path`
pub fn save_config(path: &Utf8Path, config: &Config) -> BinfetchResult<()> {
    std::fs::write(path, serde_yml::to_string(config)?)?;
    Ok(())
}

/// Check one dependency: it must resolve on every system it declares,
/// and every URL that resolution can produce must have a checksum.
pub fn validate_dependency(config: &Config, name: &str) -> BinfetchResult<()> {
    for system in config.systems_for(name)? {
        let resolved = config.resolved_dependency(name, &system)?;
        if !config.url_checksums.contains_key(&resolved.url) {
            return Err(BinfetchError::MissingChecksum { url: resolved.url });
        }
    }
    Ok(())
}

/// Check every dependency in the config
pub fn validate_config(config: &Config) -> BinfetchResult<()> {
    for name in config.dependencies.keys() {
        validate_dependency(config, name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use binfetch_schema::{Dependency, SortedMap, System};
    use camino::Utf8PathBuf;

    fn minimal_config() -> Config {
        let template = Dependency {
            url: Some("https://dl.example/tool_{{.version}}_{{.os}}_{{.arch}}.tar.gz".to_owned()),
            bin: Some("tool".to_owned()),
            required_vars: vec!["version".to_owned()],
            systems: vec![System::new("linux", "amd64")],
            ..Dependency::default()
        };
        let pinned = Dependency {
            template: Some("tool".to_owned()),
            vars: SortedMap::from([("version".to_owned(), "1.0.0".to_owned())]),
            ..Dependency::default()
        };
        Config {
            dependencies: SortedMap::from([("tool".to_owned(), pinned)]),
            templates: SortedMap::from([("tool".to_owned(), template)]),
            url_checksums: SortedMap::from([(
                "https://dl.example/tool_1.0.0_linux_amd64.tar.gz".to_owned(),
                "aa".repeat(32),
            )]),
            ..Config::default()
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("binfetch.yml")).unwrap();
        let config = minimal_config();
        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn missing_config_is_its_own_error() {
        let err = load_config(Utf8Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(matches!(err, BinfetchError::MissingConfig { .. }));
        let fresh = load_or_default(Utf8Path::new("/definitely/not/here.yml")).unwrap();
        assert_eq!(fresh, Config::default());
    }

    #[test]
    fn validation_wants_checksum_coverage() {
        let config = minimal_config();
        validate_config(&config).unwrap();

        let mut broken = config;
        broken.url_checksums.clear();
        let err = validate_config(&broken).unwrap_err();
        assert!(matches!(err, BinfetchError::MissingChecksum { .. }));
    }
}
