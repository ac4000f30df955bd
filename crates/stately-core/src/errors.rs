use tracing::error;

/// A hook was invoked with missing, ambiguous, or unusable parameters.
///
/// Carries the registered name of the originating hook so the host can render
/// `"<hook>: <message>"` in its internal-error response. Construction logs the
/// message, matching the notifier discipline of the hosting server.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{hook}: {message}")]
pub struct ConfigurationError {
    pub hook: &'static str,
    pub message: String,
}

impl ConfigurationError {
    pub fn new(hook: &'static str, message: impl Into<String>) -> Self {
        let err = Self {
            hook,
            message: message.into(),
        };
        error!(hook = err.hook, "{}", err.message);
        err
    }
}

/// A template could not be rendered. Hook handlers attribute this to their
/// own hook name when converting to a [`ConfigurationError`].
#[derive(Clone, Debug, thiserror::Error)]
#[error("template render failed: {0}")]
pub struct TemplateError(pub String);

/// A nested string-pattern predicate was structurally invalid.
#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid pattern configuration: {0}")]
pub struct PatternError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_is_prefixed_with_hook_name() {
        let err = ConfigurationError::new("recordState", "no context specified");
        assert_eq!(err.to_string(), "recordState: no context specified");
    }

    #[test]
    fn template_error_display() {
        let err = TemplateError("unbalanced braces".into());
        assert_eq!(err.to_string(), "template render failed: unbalanced braces");
    }
}
