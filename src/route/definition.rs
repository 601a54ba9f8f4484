use crate::error::CompileError;
use crate::route::params::{ParamSource, ParameterSpec};
use crate::writer::WriterFactory;
use std::fmt;

/// HTTP method of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized media type. Keys are always `type/subtype`, lowercased, with
/// any parameters (`; charset=...`) stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    main: String,
    sub: String,
}

impl MediaType {
    pub fn parse(raw: &str) -> Result<Self, CompileError> {
        let value = raw.trim();
        let value = value.split(';').next().unwrap_or_default().trim();
        let (main, sub) = value
            .split_once('/')
            .ok_or_else(|| CompileError::InvalidMediaType(raw.to_string()))?;
        if main.is_empty() || sub.is_empty() {
            return Err(CompileError::InvalidMediaType(raw.to_string()));
        }
        Ok(Self {
            main: main.to_ascii_lowercase(),
            sub: sub.to_ascii_lowercase(),
        })
    }

    /// Registry lookup key, `type/subtype`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.main, self.sub)
    }

    pub fn is_wildcard(&self) -> bool {
        self.main == "*" && self.sub == "*"
    }

    /// Wildcard-aware match against another media type.
    pub fn matches(&self, other: &MediaType) -> bool {
        (self.main == "*" || other.main == "*" || self.main == other.main)
            && (self.sub == "*" || other.sub == "*" || self.sub == other.sub)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main, self.sub)
    }
}

/// Canonical, immutable description of one endpoint. Produced by the route
/// compiler; transports and writers only ever read it.
pub struct RouteDefinition {
    method: HttpMethod,
    path: String,
    consumes: Vec<MediaType>,
    produces: Vec<MediaType>,
    writer: Option<WriterFactory>,
    params: Vec<ParameterSpec>,
    request_has_body: bool,
}

impl RouteDefinition {
    pub(crate) fn new(
        method: HttpMethod,
        path: String,
        consumes: Vec<MediaType>,
        produces: Vec<MediaType>,
        writer: Option<WriterFactory>,
        params: Vec<ParameterSpec>,
    ) -> Self {
        let request_has_body = params.iter().any(|p| p.source() == ParamSource::Body);
        Self {
            method,
            path,
            consumes,
            produces,
            writer,
            params,
            request_has_body,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Absolute path template with `{name}` placeholders.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn consumes(&self) -> &[MediaType] {
        &self.consumes
    }

    pub fn produces(&self) -> &[MediaType] {
        &self.produces
    }

    /// Explicitly declared writer, if any. Wins over every registry table.
    pub fn writer(&self) -> Option<&WriterFactory> {
        self.writer.as_ref()
    }

    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    /// True when any parameter binds to the request body.
    pub fn request_has_body(&self) -> bool {
        self.request_has_body
    }
}

impl fmt::Display for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

impl fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("consumes", &self.consumes)
            .field("produces", &self.produces)
            .field("has_writer", &self.writer.is_some())
            .field("params", &self.params)
            .field("request_has_body", &self.request_has_body)
            .finish()
    }
}
