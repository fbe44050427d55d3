use bytes::Bytes;

/// HTTP request methods.
///
/// The closed set of methods the request line may carry. Matching is exact
/// and case-sensitive; anything else is a bad request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Submit a form (login, registration)
    POST,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// TRACE - Message loop-back test
    TRACE,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// CONNECT - Establish a tunnel
    CONNECT,
}

impl Method {
    /// Parses an HTTP method token.
    ///
    /// # Example
    ///
    /// ```
    /// # use tinyserve::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "HEAD" => Some(Method::HEAD),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "TRACE" => Some(Method::TRACE),
            "OPTIONS" => Some(Method::OPTIONS),
            "CONNECT" => Some(Method::CONNECT),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::HEAD => "HEAD",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::TRACE => "TRACE",
            Method::OPTIONS => "OPTIONS",
            Method::CONNECT => "CONNECT",
        }
    }
}

/// A fully parsed request.
///
/// Every field is copied out of the connection's read buffer when the
/// request completes, so a `Request` stays valid after the buffer is reused
/// for the next request on a keep-alive connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Normalized path, always starting with `/`, query string removed.
    pub url: String,
    /// Version token as sent (e.g. "HTTP/1.1")
    pub version: String,
    /// `Host` header value, if any
    pub host: Option<String>,
    pub content_length: usize,
    /// True iff the client sent `Connection: keep-alive`
    pub keep_alive: bool,
    pub body: Bytes,
}
