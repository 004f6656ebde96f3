//! Transport-neutral request/response surface used by plugin routes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use quill_core::error::AppError;
use quill_core::result::AppResult;

/// HTTP method of a plugin route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Upper-case wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(AppError::validation(format!("Unsupported method '{other}'"))),
        }
    }
}

/// An incoming request as seen by a plugin route handler.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginRequest {
    /// Request method.
    pub method: Method,
    /// Original URL including the query string.
    pub url: String,
    /// Path component of `url`.
    pub path: String,
    /// Headers with lower-cased names.
    pub headers: BTreeMap<String, String>,
    /// Decoded query parameters.
    pub query: BTreeMap<String, String>,
    /// Parsed body; `Null` when empty.
    pub body: Value,
    /// Path parameters captured by the matched route.
    pub params: BTreeMap<String, String>,
}

impl PluginRequest {
    /// Creates a request from a method and URL. The query string is split
    /// into `query` without percent-decoding.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let url = url.into();
        let (path, raw_query) = match url.split_once('?') {
            Some((path, query)) => (path.to_string(), query),
            None => (url.clone(), ""),
        };

        let query = raw_query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect();

        Self {
            method,
            url,
            path,
            headers: BTreeMap::new(),
            query,
            body: Value::Null,
            params: BTreeMap::new(),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Replaces the query parameters.
    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = query;
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Looks up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Looks up a path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Looks up a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Deserializes the body.
    pub fn json<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| AppError::validation(format!("Invalid request body: {e}")))
    }
}

/// Response surface a route handler writes to.
pub trait PluginResponse: Send {
    /// Sets the status code.
    fn status(&mut self, code: u16) -> &mut dyn PluginResponse;

    /// Sets a header, replacing any previous value.
    fn set_header(&mut self, name: &str, value: &str) -> &mut dyn PluginResponse;

    /// Sends a JSON body.
    fn json(&mut self, data: Value);

    /// Sends a text body.
    fn send(&mut self, data: String);
}

/// Body written to a [`BufferedResponse`].
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseBody {
    /// Nothing was sent.
    #[default]
    Empty,
    /// JSON body.
    Json(Value),
    /// Text body.
    Text(String),
}

/// In-memory [`PluginResponse`] the host converts into its own response type.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: ResponseBody,
}

impl Default for BufferedResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: ResponseBody::Empty,
        }
    }
}

impl BufferedResponse {
    /// Creates an empty `200` response.
    pub fn new() -> Self {
        Self::default()
    }

    /// The status code.
    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// Looks up a header case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All headers in insertion order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The body.
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// The JSON body, if one was sent.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Splits the response into status, headers and body.
    pub fn into_parts(self) -> (u16, Vec<(String, String)>, ResponseBody) {
        (self.status, self.headers, self.body)
    }

    fn default_content_type(&mut self, content_type: &str) {
        if self.header("content-type").is_none() {
            self.headers
                .push(("content-type".to_string(), content_type.to_string()));
        }
    }
}

impl PluginResponse for BufferedResponse {
    fn status(&mut self, code: u16) -> &mut dyn PluginResponse {
        self.status = code;
        self
    }

    fn set_header(&mut self, name: &str, value: &str) -> &mut dyn PluginResponse {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    fn json(&mut self, data: Value) {
        self.default_content_type("application/json");
        self.body = ResponseBody::Json(data);
    }

    fn send(&mut self, data: String) {
        self.default_content_type("text/plain; charset=utf-8");
        self.body = ResponseBody::Text(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_splits_url() {
        let req = PluginRequest::new(Method::Get, "/plugins/seo/sitemap?page=2&draft")
            .with_header("X-Request-Id", "abc");
        assert_eq!(req.path, "/plugins/seo/sitemap");
        assert_eq!(req.query_param("page"), Some("2"));
        assert_eq!(req.query_param("draft"), Some(""));
        assert_eq!(req.header("x-request-id"), Some("abc"));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("put".parse::<Method>().unwrap(), Method::Put);
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn test_buffered_response_chaining() {
        let mut res = BufferedResponse::new();
        res.status(201).set_header("X-Plugin", "seo").json(json!({ "ok": true }));

        assert_eq!(res.status_code(), 201);
        assert_eq!(res.header("x-plugin"), Some("seo"));
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.json_body(), Some(&json!({ "ok": true })));
    }

    #[test]
    fn test_explicit_content_type_is_kept() {
        let mut res = BufferedResponse::new();
        res.set_header("Content-Type", "application/xml")
            .send("<urlset/>".to_string());
        assert_eq!(res.header("content-type"), Some("application/xml"));
        assert_eq!(res.body(), &ResponseBody::Text("<urlset/>".to_string()));
    }
}
