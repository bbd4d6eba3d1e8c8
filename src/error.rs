/// Error type for configuration and authoring problems.
///
/// Expected gameplay refusals (cooldowns, costs, blocking tags) are not errors;
/// those surface as [`ActivationFailure`](crate::activation::ActivationFailure).
#[derive(Debug, Clone, PartialEq)]
pub enum HubError {
    /// An expression failed to compile
    InvalidExpression { expression: String, details: String },

    /// No behaviour is registered for an ability's behaviour key
    MissingBehaviour { key: String, ability: String },

    /// A behaviour key was registered twice
    DuplicateBehaviour { key: String },

    /// A modifier targets an attribute the set does not define
    UnknownAttribute { attribute: String },

    /// A definition failed validation
    InvalidDefinition { name: String, details: String },
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::InvalidExpression { expression, details } => {
                write!(f, "Failed to compile expression '{}': {}", expression, details)
            }
            HubError::MissingBehaviour { key, ability } => {
                write!(f, "No behaviour registered for key '{}' (ability '{}')", key, ability)
            }
            HubError::DuplicateBehaviour { key } => {
                write!(f, "Behaviour key '{}' is already registered", key)
            }
            HubError::UnknownAttribute { attribute } => {
                write!(f, "Attribute '{}' not found", attribute)
            }
            HubError::InvalidDefinition { name, details } => {
                write!(f, "Invalid definition '{}': {}", name, details)
            }
        }
    }
}

impl std::error::Error for HubError {}

// Type alias for Result with HubError
pub type HubResult<T> = Result<T, HubError>;
