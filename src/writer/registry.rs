use crate::error::RegistryError;
use crate::route::{MediaType, RouteDefinition};
use crate::writer::{
    writer_factory, GenericWriter, JsonWriter, NoContentWriter, Reply, ReplyWriter,
    ResponseWriter, WriterFactory,
};
use std::any::type_name;
use std::collections::HashMap;
use tracing::warn;

/// Process-wide writer tables with a two-phase lifecycle: mutable while the
/// application registers writers at startup, then sealed before traffic
/// starts. Resolution consults the by-return-type table before the
/// by-media-type table; tests depend on that order.
pub struct WriterRegistry {
    by_return_type: HashMap<String, WriterFactory>,
    by_media_type: HashMap<String, WriterFactory>,
    sealed: bool,
}

impl Default for WriterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterRegistry {
    /// Seeded with the defaults: the generic writer for plain text results,
    /// the reply writer for status-carrying results and the JSON writer for
    /// `application/json`.
    pub fn new() -> Self {
        let mut by_return_type = HashMap::new();
        by_return_type.insert(
            type_name::<String>().to_string(),
            writer_factory(|| GenericWriter),
        );
        by_return_type.insert(
            type_name::<Reply>().to_string(),
            writer_factory(|| ReplyWriter),
        );

        let mut by_media_type = HashMap::new();
        by_media_type.insert("application/json".to_string(), writer_factory(|| JsonWriter));

        Self {
            by_return_type,
            by_media_type,
            sealed: false,
        }
    }

    /// Registers a writer for a media type. The key is normalized to
    /// `type/subtype`. Later registrations replace earlier ones.
    pub fn register_media_writer(
        &mut self,
        media_type: &str,
        factory: WriterFactory,
    ) -> Result<(), RegistryError> {
        if self.sealed {
            return Err(RegistryError::Sealed);
        }
        if media_type.trim().is_empty() {
            return Err(RegistryError::MissingMediaType);
        }
        let parsed = MediaType::parse(media_type)
            .map_err(|_| RegistryError::InvalidMediaType(media_type.to_string()))?;
        self.by_media_type.insert(parsed.key(), factory);
        Ok(())
    }

    /// Registers a writer for a return type key, as produced by
    /// `ReturnValue::type_key`.
    pub fn register_return_writer(
        &mut self,
        type_key: &str,
        factory: WriterFactory,
    ) -> Result<(), RegistryError> {
        if self.sealed {
            return Err(RegistryError::Sealed);
        }
        if type_key.trim().is_empty() {
            return Err(RegistryError::MissingReturnType);
        }
        self.by_return_type.insert(type_key.to_string(), factory);
        Ok(())
    }

    /// Registers a writer for the Rust type `T`, matching results built with
    /// `ReturnValue::json::<T>`.
    pub fn register_return_writer_for<T>(
        &mut self,
        factory: WriterFactory,
    ) -> Result<(), RegistryError> {
        self.register_return_writer(type_name::<T>(), factory)
    }

    /// Freezes the registry. Every registration call afterwards fails;
    /// resolution is the only operation left.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Resolves the writer for a handler result. Order, first match wins:
    /// the definition's explicit writer, the no-content writer for a void
    /// result, the by-return-type table, the first declared produces entry
    /// in the by-media-type table, and finally the generic writer. A writer
    /// whose construction fails is logged and replaced by the generic
    /// writer; the request is never failed here.
    pub fn resolve(
        &self,
        return_type: Option<&str>,
        definition: &RouteDefinition,
    ) -> Box<dyn ResponseWriter> {
        if let Some(factory) = definition.writer() {
            return instantiate(factory);
        }

        let Some(key) = return_type else {
            return Box::new(NoContentWriter);
        };

        if let Some(factory) = self.by_return_type.get(key) {
            return instantiate(factory);
        }

        if let Some(media) = definition.produces().first() {
            if let Some(factory) = self.by_media_type.get(&media.key()) {
                return instantiate(factory);
            }
        }

        Box::new(GenericWriter)
    }
}

fn instantiate(factory: &WriterFactory) -> Box<dyn ResponseWriter> {
    match factory() {
        Ok(writer) => writer,
        Err(e) => {
            warn!(error = %e, "response writer construction failed, using generic writer");
            Box::new(GenericWriter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{BufferedResponse, ResponseSink};
    use crate::writer::ReturnValue;
    use std::sync::Arc;

    /// Writes a fixed marker so tests can tell which writer was picked.
    struct MarkerWriter(&'static str);

    impl ResponseWriter for MarkerWriter {
        fn add_response_headers(
            &self,
            _definition: &RouteDefinition,
            response: &mut dyn ResponseSink,
        ) {
            response.set_header("x-writer", self.0);
        }

        fn write(&self, _result: &ReturnValue, response: &mut dyn ResponseSink) {
            response.write_body(self.0.as_bytes());
        }
    }

    fn marker(name: &'static str) -> WriterFactory {
        writer_factory(move || MarkerWriter(name))
    }

    struct Routes;

    impl crate::route::RestApi for Routes {
        fn endpoints(&self) -> Vec<crate::route::Endpoint> {
            use crate::route::{Endpoint, HttpMethod};
            vec![
                Endpoint::new(HttpMethod::Get, "/plain").handler(|_| Ok(ReturnValue::Unit)),
                Endpoint::new(HttpMethod::Get, "/json")
                    .produces("application/json")
                    .handler(|_| Ok(ReturnValue::Unit)),
                Endpoint::new(HttpMethod::Get, "/explicit")
                    .produces("application/json")
                    .writer(marker("explicit"))
                    .handler(|_| Ok(ReturnValue::Unit)),
            ]
        }
    }

    fn table() -> crate::route::RoutingTable {
        crate::route::compile(&[&Routes]).unwrap()
    }

    fn written_by(writer: Box<dyn ResponseWriter>, def: &RouteDefinition) -> String {
        let mut resp = BufferedResponse::new();
        writer.add_response_headers(def, &mut resp);
        writer.write(&ReturnValue::text("fallthrough"), &mut resp);
        resp.body_text()
    }

    #[test]
    fn test_return_type_beats_media_type() {
        let mut registry = WriterRegistry::new();
        registry
            .register_return_writer("demo::User", marker("by-type"))
            .unwrap();
        registry
            .register_media_writer("application/json", marker("by-media"))
            .unwrap();

        let table = table();
        let def = table.find_definition("/json").unwrap();
        let writer = registry.resolve(Some("demo::User"), def);
        assert_eq!(written_by(writer, def), "by-type");
    }

    #[test]
    fn test_explicit_writer_overrides_both_tables() {
        let mut registry = WriterRegistry::new();
        registry
            .register_return_writer("demo::User", marker("by-type"))
            .unwrap();
        registry
            .register_media_writer("application/json", marker("by-media"))
            .unwrap();

        let table = table();
        let def = table.find_definition("/explicit").unwrap();
        let writer = registry.resolve(Some("demo::User"), def);
        assert_eq!(written_by(writer, def), "explicit");
    }

    #[test]
    fn test_void_result_uses_no_content_writer() {
        let registry = WriterRegistry::new();
        let table = table();
        let def = table.find_definition("/plain").unwrap();

        let writer = registry.resolve(None, def);
        let mut resp = BufferedResponse::new();
        writer.add_response_headers(def, &mut resp);
        writer.write(&ReturnValue::Unit, &mut resp);
        assert!(resp.body().is_empty());
        assert_eq!(resp.status(), 200);
    }

    #[test]
    fn test_produces_media_type_round_trip() {
        let mut registry = WriterRegistry::new();
        registry
            .register_media_writer("application/json", marker("json-writer"))
            .unwrap();

        let table = table();
        let def = table.find_definition("/json").unwrap();
        // Return type with no direct registration falls through to produces.
        let writer = registry.resolve(Some("demo::Unregistered"), def);
        assert_eq!(written_by(writer, def), "json-writer");
    }

    #[test]
    fn test_unmatched_resolution_falls_back_to_generic() {
        let registry = WriterRegistry::new();
        let table = table();
        let def = table.find_definition("/plain").unwrap();

        let writer = registry.resolve(Some("demo::Unregistered"), def);
        assert_eq!(written_by(writer, def), "fallthrough");
    }

    #[test]
    fn test_factory_failure_degrades_to_generic() {
        let mut registry = WriterRegistry::new();
        let failing: WriterFactory = Arc::new(|| Err("constructor exploded".into()));
        registry
            .register_return_writer("demo::Broken", failing)
            .unwrap();

        let table = table();
        let def = table.find_definition("/plain").unwrap();
        let writer = registry.resolve(Some("demo::Broken"), def);
        assert_eq!(written_by(writer, def), "fallthrough");
    }

    #[test]
    fn test_seeded_json_writer_serves_application_json() {
        let registry = WriterRegistry::new();
        let table = table();
        let def = table.find_definition("/json").unwrap();

        let writer = registry.resolve(Some("demo::Unregistered"), def);
        let mut resp = BufferedResponse::new();
        writer.add_response_headers(def, &mut resp);
        assert_eq!(resp.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_registration_rejects_bad_media_types() {
        let mut registry = WriterRegistry::new();
        assert!(matches!(
            registry.register_media_writer("", marker("x")),
            Err(RegistryError::MissingMediaType)
        ));
        assert!(matches!(
            registry.register_media_writer("not-a-type", marker("x")),
            Err(RegistryError::InvalidMediaType(_))
        ));
        assert!(matches!(
            registry.register_return_writer("  ", marker("x")),
            Err(RegistryError::MissingReturnType)
        ));
    }

    #[test]
    fn test_sealed_registry_rejects_registration() {
        let mut registry = WriterRegistry::new();
        registry.seal();
        assert!(matches!(
            registry.register_media_writer("application/xml", marker("x")),
            Err(RegistryError::Sealed)
        ));
        assert!(matches!(
            registry.register_return_writer("demo::User", marker("x")),
            Err(RegistryError::Sealed)
        ));
    }
}
