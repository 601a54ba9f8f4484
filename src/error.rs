use thiserror::Error;

/// Boxed error used as the cause type throughout the crate.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Configuration errors raised while compiling route definitions.
///
/// These abort startup; none of them can occur per request.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid path template '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("duplicate path parameter '{name}' in template '{path}'")]
    DuplicatePathParameter { name: String, path: String },

    #[error("path parameter '{name}' does not appear in template '{path}'")]
    UnknownPathParameter { name: String, path: String },

    #[error("unknown media type '{0}'")]
    InvalidMediaType(String),

    #[error("no body deserializer for consumed media types {consumes:?} (target type {target})")]
    NoBodyDeserializer { consumes: Vec<String>, target: &'static str },

    #[error("endpoint {method} {path} has no handler attached")]
    MissingHandler { method: String, path: String },
}

/// Writer registration errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("missing media type")]
    MissingMediaType,

    #[error("unknown media type '{0}'")]
    InvalidMediaType(String),

    #[error("missing return type key")]
    MissingReturnType,

    #[error("writer registry is sealed, writers must be registered before traffic starts")]
    Sealed,
}

/// Per-request argument binding failures. The dispatcher maps these to a
/// 400 response; they never abort the process.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("invalid value '{value}' for {what} '{name}', expected {expected}")]
    Conversion {
        what: &'static str,
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error("missing required query parameter '{0}'")]
    MissingQuery(String),

    #[error("missing required header '{0}'")]
    MissingHeader(String),

    #[error("request body is missing")]
    MissingBody,

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}

/// Failure raised by handler code, carrying the HTTP status the response
/// must use. Plain failures default to 500; the dispatcher uses the carried
/// status verbatim and the cause's message as the response body.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExecuteError {
    status: u16,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ExecuteError {
    /// Pairs an HTTP status with an underlying cause.
    pub fn new<E>(status: u16, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        let source = cause.into();
        Self {
            status,
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn with_message(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            source: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(500, message)
    }

    pub fn status(&self) -> u16 {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_error_carries_status_and_message() {
        let err = ExecuteError::new(404, "no such user");
        assert_eq!(err.status(), 404);
        assert_eq!(err.to_string(), "no such user");
    }

    #[test]
    fn test_execute_error_defaults_to_500() {
        let err = ExecuteError::internal("boom");
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_bind_error_display_names_the_parameter() {
        let err = BindError::Conversion {
            what: "query parameter",
            name: "page".to_string(),
            value: "abc".to_string(),
            expected: "integer",
        };
        assert!(err.to_string().contains("page"));
        assert!(err.to_string().contains("abc"));
    }
}
