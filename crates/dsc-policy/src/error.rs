use thiserror::Error;

/// Errors raised while parsing or registering policies.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// A constraint named an operator outside the supported set.
    #[error("unknown constraint operator {0:?}")]
    UnknownOperator(String),

    /// The policy document could not be parsed as JSON.
    #[error("invalid policy JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The policy document could not be parsed as YAML.
    #[error("invalid policy YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A policy key was invalid.
    #[error(transparent)]
    Key(#[from] dsc_core::DscError),
}
