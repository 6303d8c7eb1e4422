use thiserror::Error;

/// Failures reported by the parameter validator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("missing required parameters: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("parameter '{name}' must be of type {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl ParameterError {
    /// Offending parameter names.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Missing(names) => names.iter().map(String::as_str).collect(),
            Self::TypeMismatch { name, .. } => vec![name.as_str()],
        }
    }
}
