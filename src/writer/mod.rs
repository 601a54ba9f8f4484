pub mod registry;

use crate::context::ResponseSink;
use crate::error::{BoxError, ExecuteError};
use crate::route::RouteDefinition;
use serde_json::Value;
use std::any::type_name;
use std::sync::Arc;
use tracing::error;

pub use registry::WriterRegistry;

/// Builds a fresh writer instance per dispatch. Construction may fail;
/// resolution then degrades to the generic writer instead of failing the
/// request.
pub type WriterFactory = Arc<dyn Fn() -> Result<Box<dyn ResponseWriter>, BoxError> + Send + Sync>;

/// Wraps an infallible writer constructor into a registry factory.
pub fn writer_factory<W, F>(build: F) -> WriterFactory
where
    W: ResponseWriter + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    Arc::new(move || Ok(Box::new(build()) as Box<dyn ResponseWriter>))
}

/// Result of a handler invocation, type-erased for writer resolution.
#[derive(Debug, Clone)]
pub enum ReturnValue {
    /// Void-equivalent, resolves to the no-content writer.
    Unit,
    Text(String),
    /// Structured payload tagged with the concrete type it came from, so a
    /// writer registered for that type can claim it.
    Json {
        type_key: &'static str,
        value: Value,
    },
    /// Status-carrying result, applied verbatim by its writer.
    Reply(Reply),
}

impl ReturnValue {
    pub fn text(text: impl Into<String>) -> Self {
        ReturnValue::Text(text.into())
    }

    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, ExecuteError> {
        Ok(ReturnValue::Json {
            type_key: type_name::<T>(),
            value: serde_json::to_value(value).map_err(|e| ExecuteError::new(500, e))?,
        })
    }

    /// Key into the by-return-type writer table. `None` means the handler
    /// declared no meaningful return.
    pub fn type_key(&self) -> Option<&str> {
        match self {
            ReturnValue::Unit => None,
            ReturnValue::Text(_) => Some(type_name::<String>()),
            ReturnValue::Json { type_key, .. } => Some(type_key),
            ReturnValue::Reply(_) => Some(type_name::<Reply>()),
        }
    }
}

/// Status-carrying handler result: final status plus any headers and body
/// to apply on top of whatever the route definition declares.
#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn into_return(self) -> ReturnValue {
        ReturnValue::Reply(self)
    }
}

/// Serializes a handler result onto the response. Writers are stateless and
/// instantiated fresh per dispatch through their registered factory.
pub trait ResponseWriter: Send {
    /// Sets default headers, content type in particular, before the body is
    /// written. Anything set here may be overridden downstream.
    fn add_response_headers(&self, definition: &RouteDefinition, response: &mut dyn ResponseSink);

    /// Serializes and writes the body. May set the final status and headers
    /// itself, and may fully terminate the response.
    fn write(&self, result: &ReturnValue, response: &mut dyn ResponseSink);
}

/// First declared non-wildcard produces entry, or the given fallback.
fn declared_content_type(definition: &RouteDefinition, fallback: &str) -> String {
    definition
        .produces()
        .iter()
        .find(|m| !m.is_wildcard())
        .map(|m| m.key())
        .unwrap_or_else(|| fallback.to_string())
}

/// Plain-text representation of any result value. Total, never fails.
fn text_of(result: &ReturnValue) -> String {
    match result {
        ReturnValue::Unit => String::new(),
        ReturnValue::Text(text) => text.clone(),
        ReturnValue::Json { value, .. } => value.to_string(),
        ReturnValue::Reply(reply) => reply.body.clone().unwrap_or_default(),
    }
}

/// Fallback writer: writes the result's string representation. Safe for any
/// input, including a void result.
pub struct GenericWriter;

impl ResponseWriter for GenericWriter {
    fn add_response_headers(&self, definition: &RouteDefinition, response: &mut dyn ResponseSink) {
        response.set_header("content-type", &declared_content_type(definition, "text/plain"));
    }

    fn write(&self, result: &ReturnValue, response: &mut dyn ResponseSink) {
        let text = text_of(result);
        if !text.is_empty() {
            response.write_body(text.as_bytes());
        }
    }
}

/// Serializes the result as JSON.
pub struct JsonWriter;

impl ResponseWriter for JsonWriter {
    fn add_response_headers(&self, _definition: &RouteDefinition, response: &mut dyn ResponseSink) {
        response.set_header("content-type", "application/json");
    }

    fn write(&self, result: &ReturnValue, response: &mut dyn ResponseSink) {
        let value = match result {
            ReturnValue::Unit => Value::Null,
            ReturnValue::Text(text) => Value::String(text.clone()),
            ReturnValue::Json { value, .. } => value.clone(),
            ReturnValue::Reply(reply) => {
                reply.body.clone().map(Value::String).unwrap_or(Value::Null)
            }
        };
        match serde_json::to_string(&value) {
            Ok(encoded) => response.write_body(encoded.as_bytes()),
            Err(e) => error!(error = %e, "failed to encode response body as JSON"),
        }
    }
}

/// Writer for handlers with no meaningful return: empty body, status
/// unchanged.
pub struct NoContentWriter;

impl ResponseWriter for NoContentWriter {
    fn add_response_headers(&self, _definition: &RouteDefinition, _response: &mut dyn ResponseSink) {}

    fn write(&self, _result: &ReturnValue, _response: &mut dyn ResponseSink) {}
}

/// Applies an embedded `Reply`: its status, its headers, then its body.
pub struct ReplyWriter;

impl ResponseWriter for ReplyWriter {
    fn add_response_headers(&self, definition: &RouteDefinition, response: &mut dyn ResponseSink) {
        if !definition.produces().is_empty() {
            response.set_header("content-type", &declared_content_type(definition, "text/plain"));
        }
    }

    fn write(&self, result: &ReturnValue, response: &mut dyn ResponseSink) {
        match result {
            ReturnValue::Reply(reply) => {
                response.set_status(reply.status);
                for (name, value) in &reply.headers {
                    response.set_header(name, value);
                }
                if let Some(body) = &reply.body {
                    response.write_body(body.as_bytes());
                }
            }
            other => {
                let text = text_of(other);
                if !text.is_empty() {
                    response.write_body(text.as_bytes());
                }
            }
        }
    }
}
