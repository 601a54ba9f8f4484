use crate::binding::ArgValue;
use crate::error::{CompileError, ExecuteError};
use crate::route::definition::{HttpMethod, MediaType, RouteDefinition};
use crate::route::params::{ParamSource, ParameterSpec, TargetType};
use crate::writer::{ReturnValue, WriterFactory};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Type-erased handler call signature. Arguments arrive in declaration
/// order, already converted by the argument provider.
pub type HandlerFn =
    Box<dyn Fn(&[ArgValue]) -> Result<ReturnValue, ExecuteError> + Send + Sync>;

/// A handler-bearing object. Implementations declare an optional
/// application-level path prefix, a resource-level prefix and the endpoints
/// below them. Several objects can be compiled together; prefixes resolve
/// independently per object.
pub trait RestApi: Send + Sync {
    /// Outermost path prefix, e.g. "/v1".
    fn application_path(&self) -> Option<&str> {
        None
    }

    /// Prefix composed after the application prefix.
    fn resource_path(&self) -> &str {
        "/"
    }

    /// Declared endpoints. Consumed once, at compile time.
    fn endpoints(&self) -> Vec<Endpoint>;
}

/// Declarative description of one endpoint, built up before compilation.
pub struct Endpoint {
    method: HttpMethod,
    path: String,
    consumes: Vec<String>,
    produces: Vec<String>,
    writer: Option<WriterFactory>,
    params: Vec<ParameterSpec>,
    handler: Option<HandlerFn>,
}

impl Endpoint {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            consumes: Vec::new(),
            produces: Vec::new(),
            writer: None,
            params: Vec::new(),
            handler: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, path)
    }

    pub fn consumes(mut self, media_type: impl Into<String>) -> Self {
        self.consumes.push(media_type.into());
        self
    }

    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        self.produces.push(media_type.into());
        self
    }

    /// Declares an explicit writer, overriding every registry table.
    pub fn writer(mut self, factory: WriterFactory) -> Self {
        self.writer = Some(factory);
        self
    }

    pub fn param(mut self, spec: ParameterSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[ArgValue]) -> Result<ReturnValue, ExecuteError> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }
}

/// Pairs a compiled definition with its invocable handler. Created at
/// compile time, never mutated afterwards.
pub struct HandlerBinding {
    definition: Arc<RouteDefinition>,
    handler: HandlerFn,
}

impl HandlerBinding {
    pub fn definition(&self) -> &RouteDefinition {
        &self.definition
    }

    pub fn invoke(&self, args: &[ArgValue]) -> Result<ReturnValue, ExecuteError> {
        (self.handler)(args)
    }
}

/// Abstraction over the underlying router the compiled table is mounted on.
/// The transport adapter implements this; tests use counting fakes.
pub trait RouteMounter {
    /// Registers the shared body-handling middleware. Called at most once
    /// per mounted table.
    fn install_body_handler(&mut self);

    fn mount(&mut self, index: usize, definition: &Arc<RouteDefinition>);
}

/// Immutable, ordered table of compiled routes. Built once at startup and
/// read-only from then on.
pub struct RoutingTable {
    bindings: Vec<HandlerBinding>,
}

impl std::fmt::Debug for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingTable")
            .field("len", &self.bindings.len())
            .finish()
    }
}

impl RoutingTable {
    pub fn bindings(&self) -> &[HandlerBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HandlerBinding> {
        self.bindings.get(index)
    }

    /// Looks up a binding by method and path template.
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&HandlerBinding> {
        self.bindings
            .iter()
            .find(|b| b.definition.method() == method && b.definition.path() == path)
    }

    /// Looks up a definition by path template alone.
    pub fn find_definition(&self, path: &str) -> Option<&RouteDefinition> {
        self.bindings
            .iter()
            .map(|b| b.definition())
            .find(|d| d.path() == path)
    }

    /// Walks the table in order, mounting every definition. The first
    /// definition that needs a request body triggers a single
    /// `install_body_handler` call for the whole table.
    pub fn mount_on(&self, mounter: &mut dyn RouteMounter) {
        let mut body_handler_installed = false;
        for (index, binding) in self.bindings.iter().enumerate() {
            if binding.definition.request_has_body() && !body_handler_installed {
                mounter.install_body_handler();
                body_handler_installed = true;
            }
            mounter.mount(index, &binding.definition);
        }
    }
}

/// Compiles one or more handler-bearing objects into a routing table.
/// All validation happens here; a table that compiles will not produce
/// configuration errors at request time. Two endpoints with the same method
/// and composed path are a registration conflict resolved in favor of the
/// last one, so callers can deliberately override earlier routes.
pub fn compile(apis: &[&dyn RestApi]) -> Result<RoutingTable, CompileError> {
    let mut bindings: Vec<HandlerBinding> = Vec::new();

    for api in apis {
        let application = api.application_path().unwrap_or("");
        let resource = api.resource_path();

        for endpoint in api.endpoints() {
            let path = compose_path(&[application, resource, &endpoint.path]);
            let placeholders = parse_placeholders(&path)?;
            validate_params(&endpoint, &path, &placeholders)?;

            let consumes = parse_media_types(&endpoint.consumes)?;
            let produces = parse_media_types(&endpoint.produces)?;
            validate_body_target(&endpoint, &consumes)?;

            let handler = endpoint.handler.ok_or_else(|| CompileError::MissingHandler {
                method: endpoint.method.to_string(),
                path: path.clone(),
            })?;

            let definition = Arc::new(RouteDefinition::new(
                endpoint.method,
                path,
                consumes,
                produces,
                endpoint.writer,
                endpoint.params,
            ));

            info!("registering route: {definition}");

            let conflict = bindings.iter().position(|b| {
                b.definition.method() == definition.method()
                    && b.definition.path() == definition.path()
            });
            match conflict {
                Some(index) => {
                    debug!("route {definition} replaces an earlier registration");
                    bindings[index] = HandlerBinding { definition, handler };
                }
                None => bindings.push(HandlerBinding { definition, handler }),
            }
        }
    }

    Ok(RoutingTable { bindings })
}

/// Joins path parts into one absolute template with no duplicate
/// separators.
fn compose_path(parts: &[&str]) -> String {
    let mut composed = String::new();
    for part in parts {
        for segment in part.split('/').filter(|s| !s.is_empty()) {
            composed.push('/');
            composed.push_str(segment);
        }
    }
    if composed.is_empty() {
        composed.push('/');
    }
    composed
}

/// Validates template syntax and collects `{name}` placeholders.
fn parse_placeholders(path: &str) -> Result<HashSet<String>, CompileError> {
    let mut names = HashSet::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment.starts_with('{') || segment.ends_with('}') {
            let inner = segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
                .ok_or_else(|| CompileError::InvalidPath {
                    path: path.to_string(),
                    reason: format!("malformed placeholder segment '{segment}'"),
                })?;
            if inner.is_empty() || inner.contains('{') || inner.contains('}') {
                return Err(CompileError::InvalidPath {
                    path: path.to_string(),
                    reason: format!("malformed placeholder segment '{segment}'"),
                });
            }
            if !names.insert(inner.to_string()) {
                return Err(CompileError::DuplicatePathParameter {
                    name: inner.to_string(),
                    path: path.to_string(),
                });
            }
        } else if segment.contains('{') || segment.contains('}') {
            return Err(CompileError::InvalidPath {
                path: path.to_string(),
                reason: format!("stray brace in segment '{segment}'"),
            });
        }
    }
    Ok(names)
}

fn validate_params(
    endpoint: &Endpoint,
    path: &str,
    placeholders: &HashSet<String>,
) -> Result<(), CompileError> {
    for spec in &endpoint.params {
        if spec.source() == ParamSource::Path && !placeholders.contains(spec.name()) {
            return Err(CompileError::UnknownPathParameter {
                name: spec.name().to_string(),
                path: path.to_string(),
            });
        }
    }
    Ok(())
}

fn parse_media_types(raw: &[String]) -> Result<Vec<MediaType>, CompileError> {
    raw.iter().map(|s| MediaType::parse(s)).collect()
}

/// A body parameter targeting JSON needs a JSON deserializer for the
/// declared consumes set. Caught here so it never surfaces per request.
fn validate_body_target(endpoint: &Endpoint, consumes: &[MediaType]) -> Result<(), CompileError> {
    let json_target = endpoint
        .params
        .iter()
        .any(|p| p.source() == ParamSource::Body && p.target() == TargetType::Json);
    if !json_target || consumes.is_empty() {
        return Ok(());
    }
    let json = MediaType::parse("application/json").map_err(|_| CompileError::InvalidMediaType(
        "application/json".to_string(),
    ))?;
    if consumes.iter().any(|m| m.matches(&json)) {
        return Ok(());
    }
    Err(CompileError::NoBodyDeserializer {
        consumes: consumes.iter().map(|m| m.key()).collect(),
        target: "JSON",
    })
}
