//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push("storage.database_path must not be empty".to_string());
    }

    if config.provider.api_base.trim().is_empty() {
        errors.push("provider.api_base must not be empty".to_string());
    }
    if config.provider.model.trim().is_empty() {
        errors.push("provider.model must not be empty".to_string());
    }
    if config.provider.timeout_seconds == 0 {
        errors.push("provider.timeout_seconds must be > 0".to_string());
    }

    match config.logging.format.to_lowercase().as_str() {
        "text" | "json" => {}
        other => errors.push(format!("logging.format must be text or json, got '{other}'")),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_empty_model_rejected() {
        let mut config = Config::default();
        config.provider.model = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("provider.model"));
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = Config::default();
        config.logging.format = "yaml".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("logging.format"));
    }
}
