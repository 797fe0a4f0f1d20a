use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: set {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// The environment variable that sets a dotted configuration key
pub fn to_env_var(field: &str) -> String {
    format!("PARLEY_{}", field.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("provider.api_key"), "PARLEY_PROVIDER__API_KEY");
        assert_eq!(to_env_var("type"), "PARLEY_TYPE");
    }

    #[test]
    fn test_missing_env_var_message() {
        let err = ConfigError::MissingEnvVar {
            env_var: to_env_var("retrieval.collection"),
        };
        assert_eq!(
            err.to_string(),
            "Missing required configuration: set PARLEY_RETRIEVAL__COLLECTION"
        );
    }
}
