use bytes::Bytes;
use std::collections::HashMap;

/// Inbound request data, as handed over by the transport once route matching
/// and body collection are done. Query parameters and headers are
/// multi-valued; reads return the first value.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    path_params: HashMap<String, String>,
    query: HashMap<String, Vec<String>>,
    headers: HashMap<String, Vec<String>>,
    body: Option<Bytes>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into().to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    /// Matched path-template variable.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// First value of the named query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// First value of the named header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Parsed body payload, present only when the matched route declared one.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }
}

/// Outbound response surface the dispatcher and writers operate on. The
/// transport maps this onto its own response type.
pub trait ResponseSink {
    fn set_status(&mut self, status: u16);

    /// Replaces any existing header with the same name.
    fn set_header(&mut self, name: &str, value: &str);

    /// Appends a header, keeping existing values.
    fn add_header(&mut self, name: &str, value: &str);

    /// Appends a body chunk. Writes after `end()` are dropped.
    fn write_body(&mut self, chunk: &[u8]);

    /// Terminates the response. Idempotent.
    fn end(&mut self);

    fn ended(&self) -> bool;
}

/// In-memory response used by the transport adapter and by tests.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    ended: bool,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            ended: false,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

impl ResponseSink for BufferedResponse {
    fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write_body(&mut self, chunk: &[u8]) {
        if !self.ended {
            self.body.extend_from_slice(chunk);
        }
    }

    fn end(&mut self) {
        self.ended = true;
    }

    fn ended(&self) -> bool {
        self.ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_query_value_wins() {
        let ctx = RequestContext::new()
            .with_query("tag", "a")
            .with_query("tag", "b");
        assert_eq!(ctx.query_param("tag"), Some("a"));
    }

    #[test]
    fn test_headers_are_case_insensitive_first_wins() {
        let ctx = RequestContext::new()
            .with_header("X-Token", "one")
            .with_header("x-token", "two");
        assert_eq!(ctx.header("X-TOKEN"), Some("one"));
    }

    #[test]
    fn test_set_header_replaces_add_header_appends() {
        let mut resp = BufferedResponse::new();
        resp.set_header("Content-Type", "text/plain");
        resp.set_header("content-type", "application/json");
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
        assert_eq!(resp.headers().len(), 1);

        resp.add_header("Vary", "Accept");
        resp.add_header("Vary", "Origin");
        assert_eq!(resp.headers().len(), 3);
    }

    #[test]
    fn test_end_is_idempotent_and_stops_writes() {
        let mut resp = BufferedResponse::new();
        resp.write_body(b"hello");
        resp.end();
        resp.end();
        resp.write_body(b" world");
        assert!(resp.ended());
        assert_eq!(resp.body_text(), "hello");
    }
}
