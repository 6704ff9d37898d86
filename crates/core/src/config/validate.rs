use super::{types::Config, ConfigError, TransferBackend};

/// Validate configuration
/// Currently validates:
/// - Pipeline section (enforced by serde) has a usable parameter, staging root and admission limit
/// - Compute program and artifact list are set
/// - The selected transfer backend has its section and command templates
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let pipeline = &config.pipeline;

    if pipeline.admission_limit == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.admission_limit must be at least 1".to_string(),
        ));
    }

    if pipeline.default_parameter.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "pipeline.default_parameter cannot be empty".to_string(),
        ));
    }

    if pipeline.local_staging_root.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "pipeline.local_staging_root cannot be empty".to_string(),
        ));
    }

    if pipeline.raw_data_dirs.is_empty() {
        return Err(ConfigError::ValidationError(
            "pipeline.raw_data_dirs cannot be empty".to_string(),
        ));
    }

    if config.compute.program.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "compute.program cannot be empty".to_string(),
        ));
    }

    if config.compute.artifacts.is_empty() {
        return Err(ConfigError::ValidationError(
            "compute.artifacts must name at least one output".to_string(),
        ));
    }

    match config.transfer.backend {
        TransferBackend::Filesystem => {}
        TransferBackend::Command => {
            let Some(command) = &config.transfer.command else {
                return Err(ConfigError::ValidationError(
                    "transfer.backend = \"command\" requires a [transfer.command] section"
                        .to_string(),
                ));
            };
            for (name, template) in [
                ("copy", &command.copy),
                ("list", &command.list),
                ("remove", &command.remove),
            ] {
                if template.is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "transfer.command.{} cannot be empty",
                        name
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base_config() -> Config {
        load_config_from_str(
            r#"
[pipeline]
default_parameter = "modelA"
local_staging_root = "/scratch"

[compute]
program = "basecaller"
artifacts = ["reads.bam"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_zero_admission_limit_fails() {
        let mut config = base_config();
        config.pipeline.admission_limit = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_blank_default_parameter_fails() {
        let mut config = base_config();
        config.pipeline.default_parameter = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_artifacts_fails() {
        let mut config = base_config();
        config.compute.artifacts.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_command_backend_requires_section() {
        let mut config = base_config();
        config.transfer.backend = TransferBackend::Command;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("[transfer.command]"));
    }
}
