use crate::context::RequestContext;
use crate::error::BindError;
use crate::route::{ParamSource, ParameterSpec, RouteDefinition, TargetType};
use serde_json::Value;

/// One bound handler argument. `Context` borrows the request it came from;
/// every other variant owns its converted value.
#[derive(Debug)]
pub enum ArgValue<'a> {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Json(Value),
    Context(&'a RequestContext),
}

impl<'a> ArgValue<'a> {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ArgValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ArgValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn context(&self) -> Option<&'a RequestContext> {
        match self {
            ArgValue::Context(ctx) => Some(ctx),
            _ => None,
        }
    }
}

/// Extracts and converts request data into the positional arguments a
/// handler expects, in declaration order. Runs once per request, before
/// handler invocation.
pub struct ArgumentProvider;

impl ArgumentProvider {
    pub fn bind<'a>(
        definition: &RouteDefinition,
        ctx: &'a RequestContext,
    ) -> Result<Vec<ArgValue<'a>>, BindError> {
        definition
            .params()
            .iter()
            .map(|spec| Self::bind_one(spec, ctx))
            .collect()
    }

    fn bind_one<'a>(
        spec: &ParameterSpec,
        ctx: &'a RequestContext,
    ) -> Result<ArgValue<'a>, BindError> {
        match spec.source() {
            ParamSource::Path => {
                // Route matching guarantees presence.
                let raw = ctx.path_param(spec.name()).unwrap_or_default();
                convert(raw, spec.target(), "path parameter", spec.name())
            }
            ParamSource::Query => match ctx.query_param(spec.name()) {
                Some(raw) => convert(raw, spec.target(), "query parameter", spec.name()),
                None if spec.is_required() => {
                    Err(BindError::MissingQuery(spec.name().to_string()))
                }
                None => Ok(default_for(spec.target())),
            },
            ParamSource::Header => match ctx.header(spec.name()) {
                Some(raw) => convert(raw, spec.target(), "header", spec.name()),
                None if spec.is_required() => {
                    Err(BindError::MissingHeader(spec.name().to_string()))
                }
                None => Ok(default_for(spec.target())),
            },
            ParamSource::Body => {
                let bytes = ctx.body().ok_or(BindError::MissingBody)?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| BindError::MalformedBody(e.to_string()))?;
                match spec.target() {
                    TargetType::Json => serde_json::from_str(text)
                        .map(ArgValue::Json)
                        .map_err(|e| BindError::MalformedBody(e.to_string())),
                    target => convert(text, target, "body", "body"),
                }
            }
            ParamSource::Context => Ok(ArgValue::Context(ctx)),
        }
    }
}

/// String to target-type conversion following the target's canonical
/// textual format. Deterministic and total over the declared type set; a
/// failure is a client error.
fn convert<'a>(
    raw: &str,
    target: TargetType,
    what: &'static str,
    name: &str,
) -> Result<ArgValue<'a>, BindError> {
    let fail = |expected: &'static str| BindError::Conversion {
        what,
        name: name.to_string(),
        value: raw.to_string(),
        expected,
    };
    match target {
        TargetType::String => Ok(ArgValue::Str(raw.to_string())),
        TargetType::Int => raw
            .trim()
            .parse::<i64>()
            .map(ArgValue::Int)
            .map_err(|_| fail("integer")),
        TargetType::Float => raw
            .trim()
            .parse::<f64>()
            .map(ArgValue::Float)
            .map_err(|_| fail("floating point")),
        TargetType::Bool => raw
            .trim()
            .parse::<bool>()
            .map(ArgValue::Bool)
            .map_err(|_| fail("boolean")),
        TargetType::Json => serde_json::from_str(raw)
            .map(ArgValue::Json)
            .map_err(|_| fail("JSON")),
    }
}

/// Type-appropriate empty value for an absent optional parameter.
fn default_for<'a>(target: TargetType) -> ArgValue<'a> {
    match target {
        TargetType::String => ArgValue::Str(String::new()),
        TargetType::Int => ArgValue::Int(0),
        TargetType::Float => ArgValue::Float(0.0),
        TargetType::Bool => ArgValue::Bool(false),
        TargetType::Json => ArgValue::Json(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{Endpoint, HttpMethod, RestApi};
    use crate::writer::ReturnValue;
    use bytes::Bytes;
    use serde_json::json;

    struct Fixture(Vec<ParameterSpec>);

    impl RestApi for Fixture {
        fn endpoints(&self) -> Vec<Endpoint> {
            let mut endpoint = Endpoint::new(HttpMethod::Get, "/items/{id}")
                .handler(|_| Ok(ReturnValue::Unit));
            for spec in &self.0 {
                endpoint = endpoint.param(spec.clone());
            }
            vec![endpoint]
        }
    }

    fn definition_with(params: Vec<ParameterSpec>) -> crate::route::RoutingTable {
        crate::route::compile(&[&Fixture(params)]).unwrap()
    }

    #[test]
    fn test_binds_in_declaration_order() {
        let table = definition_with(vec![
            ParameterSpec::path("id", TargetType::Int),
            ParameterSpec::query("verbose", TargetType::Bool),
            ParameterSpec::header("x-trace", TargetType::String),
        ]);
        let ctx = RequestContext::new()
            .with_path_param("id", "42")
            .with_query("verbose", "true")
            .with_header("X-Trace", "abc");

        let args = ArgumentProvider::bind(table.bindings()[0].definition(), &ctx).unwrap();
        assert_eq!(args[0].as_i64(), Some(42));
        assert_eq!(args[1].as_bool(), Some(true));
        assert_eq!(args[2].as_str(), Some("abc"));
    }

    #[test]
    fn test_conversion_failure_is_client_error() {
        let table = definition_with(vec![ParameterSpec::path("id", TargetType::Int)]);
        let ctx = RequestContext::new().with_path_param("id", "forty-two");

        let err = ArgumentProvider::bind(table.bindings()[0].definition(), &ctx).unwrap_err();
        assert!(matches!(err, BindError::Conversion { .. }));
    }

    #[test]
    fn test_absent_optional_params_get_typed_defaults() {
        let table = definition_with(vec![
            ParameterSpec::query("q", TargetType::String),
            ParameterSpec::query("page", TargetType::Int),
            ParameterSpec::query("ratio", TargetType::Float),
            ParameterSpec::query("deep", TargetType::Bool),
            ParameterSpec::query("filter", TargetType::Json),
        ]);
        let ctx = RequestContext::new();

        let args = ArgumentProvider::bind(table.bindings()[0].definition(), &ctx).unwrap();
        assert_eq!(args[0].as_str(), Some(""));
        assert_eq!(args[1].as_i64(), Some(0));
        assert_eq!(args[2].as_f64(), Some(0.0));
        assert_eq!(args[3].as_bool(), Some(false));
        assert_eq!(args[4].as_json(), Some(&Value::Null));
    }

    #[test]
    fn test_missing_required_query_fails() {
        let table =
            definition_with(vec![ParameterSpec::query("token", TargetType::String).required(true)]);
        let ctx = RequestContext::new();

        let err = ArgumentProvider::bind(table.bindings()[0].definition(), &ctx).unwrap_err();
        assert!(matches!(err, BindError::MissingQuery(name) if name == "token"));
    }

    #[test]
    fn test_first_query_value_wins() {
        let table = definition_with(vec![ParameterSpec::query("tag", TargetType::String)]);
        let ctx = RequestContext::new()
            .with_query("tag", "first")
            .with_query("tag", "second");

        let args = ArgumentProvider::bind(table.bindings()[0].definition(), &ctx).unwrap();
        assert_eq!(args[0].as_str(), Some("first"));
    }

    #[test]
    fn test_json_body_is_deserialized() {
        let table = definition_with(vec![ParameterSpec::body(TargetType::Json)]);
        let ctx = RequestContext::new().with_body(Bytes::from_static(b"{\"name\":\"ana\"}"));

        let args = ArgumentProvider::bind(table.bindings()[0].definition(), &ctx).unwrap();
        assert_eq!(args[0].as_json(), Some(&json!({"name": "ana"})));
    }

    #[test]
    fn test_missing_body_fails() {
        let table = definition_with(vec![ParameterSpec::body(TargetType::String)]);
        let ctx = RequestContext::new();

        let err = ArgumentProvider::bind(table.bindings()[0].definition(), &ctx).unwrap_err();
        assert!(matches!(err, BindError::MissingBody));
    }

    #[test]
    fn test_malformed_json_body_fails() {
        let table = definition_with(vec![ParameterSpec::body(TargetType::Json)]);
        let ctx = RequestContext::new().with_body(Bytes::from_static(b"{not json"));

        let err = ArgumentProvider::bind(table.bindings()[0].definition(), &ctx).unwrap_err();
        assert!(matches!(err, BindError::MalformedBody(_)));
    }

    #[test]
    fn test_context_argument_passes_raw_context() {
        let table = definition_with(vec![ParameterSpec::context()]);
        let ctx = RequestContext::new().with_header("x-trace", "abc");

        let args = ArgumentProvider::bind(table.bindings()[0].definition(), &ctx).unwrap();
        let passed = args[0].context().unwrap();
        assert_eq!(passed.header("x-trace"), Some("abc"));
    }
}
