use thiserror::Error;

/// Error types for the skillopt-rs library.
#[derive(Error, Debug)]
pub enum SkillOptError {
    /// Malformed or internally inconsistent model specification.
    #[error("Specification error: {0}")]
    Specification(String),

    /// A constraint selector matched no rows of the parameter table.
    #[error("Selector {selector} matched no parameters")]
    SelectorResolution { selector: String },

    /// A row is claimed by incompatible constraints.
    #[error("Constraint conflict on parameter {key}: {message}")]
    ConstraintConflict { key: String, message: String },

    /// A constraint specification is malformed on its own.
    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),

    /// A filled parameter table cannot be evaluated.
    #[error("Invalid parameter {key}: {message}")]
    ParameterValidation { key: String, message: String },

    /// A filter query could not be parsed.
    #[error("Invalid query '{query}': {message}")]
    QueryParse { query: String, message: String },

    /// Error for boundary constraint violations.
    #[error("Bounds error: {0}")]
    Bounds(#[from] crate::params::bounds::BoundsError),

    /// The dataset does not fit the model specification.
    #[error("Data error: {0}")]
    Data(String),

    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error during function evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Error indicating optimization failed.
    #[error("Optimization failed: {0}")]
    OptimizationFailure(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl SkillOptError {
    /// Shorthand for a [`SkillOptError::ParameterValidation`] error.
    pub(crate) fn invalid_param(key: impl ToString, message: impl Into<String>) -> Self {
        SkillOptError::ParameterValidation {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

impl From<crate::constraints::query::QueryError> for SkillOptError {
    fn from(err: crate::constraints::query::QueryError) -> Self {
        SkillOptError::QueryParse {
            query: err.query.clone(),
            message: err.message,
        }
    }
}

/// Result type alias for skillopt-rs operations.
pub type Result<T> = std::result::Result<T, SkillOptError>;
