use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
///
/// Environment variables use the `SPINDLE_` prefix and `__` as the section
/// separator, e.g. `SPINDLE_PIPELINE__DELETE_ENABLED=true`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("SPINDLE_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransferBackend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[pipeline]
default_parameter = "modelA"
local_staging_root = "/scratch/staging"

[compute]
program = "basecaller"
artifacts = ["reads.bam"]
"#;

    #[test]
    fn test_load_config_from_str_defaults() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.pipeline.default_parameter, "modelA");
        assert!(!config.pipeline.delete_enabled);
        assert!(config.pipeline.include_failed_subset);
        assert_eq!(config.pipeline.admission_limit, 1);
        assert_eq!(config.transfer.backend, TransferBackend::Filesystem);
        assert_eq!(config.compute.artifacts, vec!["reads.bam".to_string()]);
    }

    #[test]
    fn test_load_config_from_str_missing_pipeline() {
        let toml = r#"
[compute]
program = "basecaller"
artifacts = ["reads.bam"]
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/spindle.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[pipeline]
default_parameter = "hac"
local_staging_root = "/tmp/stage"
delete_enabled = true
admission_limit = 3

[compute]
program = "basecaller"
artifacts = ["reads.bam", "summary.tsv"]
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert!(config.pipeline.delete_enabled);
        assert_eq!(config.pipeline.admission_limit, 3);
        assert_eq!(config.compute.artifacts.len(), 2);
    }
}
