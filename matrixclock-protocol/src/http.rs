//! Minimal HTTP/1.1 request parsing and response framing.
//!
//! The configuration server handles one request per connection and always
//! closes afterwards, so only what that needs is supported:
//!
//! - request line (`METHOD SP target SP version`)
//! - query string and `application/x-www-form-urlencoded` bodies
//! - `Content-Length` to know when a request has fully arrived
//!
//! Responses carry an explicit `Content-Length` and `Connection: close`.

use core::fmt::{self, Write};
use heapless::{String, Vec};

/// Largest request the server buffers
pub const MAX_REQUEST_SIZE: usize = 1536;

/// Largest response body a handler can produce
pub const MAX_BODY_SIZE: usize = 6144;

/// Capacity of a rendered response head
pub const MAX_HEAD_SIZE: usize = 192;

/// Capacity of a decoded argument name
pub const MAX_ARG_NAME: usize = 32;

/// Capacity of a decoded argument value
pub const MAX_ARG_VALUE: usize = 128;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Errors that can occur while parsing a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HttpError {
    /// Header block not terminated yet
    Incomplete,
    /// Request is not valid UTF-8
    InvalidUtf8,
    /// Request line does not have method, target and version
    MalformedRequestLine,
    /// Response body exceeded its capacity
    BodyOverflow,
}

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Method {
    Get,
    Post,
    Other,
}

impl Method {
    fn parse(s: &str) -> Self {
        match s {
            "GET" => Method::Get,
            "POST" => Method::Post,
            _ => Method::Other,
        }
    }
}

/// A parsed request borrowing from the receive buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    /// Request method
    pub method: Method,
    /// Path component of the target, without the query
    pub path: &'a str,
    /// Raw query string (without `?`), possibly empty
    pub query: &'a str,
    /// Raw body, possibly empty
    pub body: &'a str,
    /// Whether the body is form encoded and contributes arguments
    pub form_body: bool,
}

impl<'a> Request<'a> {
    /// Parse a complete request
    pub fn parse(raw: &'a [u8]) -> Result<Self, HttpError> {
        let text = core::str::from_utf8(raw).map_err(|_| HttpError::InvalidUtf8)?;
        let head_end = text.find("\r\n\r\n").ok_or(HttpError::Incomplete)?;
        let head = &text[..head_end];
        let body = &text[head_end + 4..];

        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or("");
        let mut parts = request_line.split(' ').filter(|p| !p.is_empty());
        let (method, target, _version) = match (parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(t), Some(v)) => (m, t, v),
            _ => return Err(HttpError::MalformedRequestLine),
        };

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };

        let form_body = lines
            .filter_map(|line| line.split_once(':'))
            .any(|(name, value)| {
                name.trim().eq_ignore_ascii_case("content-type")
                    && value.trim().starts_with(FORM_CONTENT_TYPE)
            });

        Ok(Self {
            method: Method::parse(method),
            path,
            query,
            body,
            form_body,
        })
    }

    /// Iterate raw `(name, value)` pairs: query first, then a form body
    pub fn args(&self) -> Args<'a> {
        Args {
            query: self.query.split('&'),
            body: if self.form_body { Some(self.body.split('&')) } else { None },
        }
    }

    /// Number of arguments in the request
    pub fn arg_count(&self) -> usize {
        self.args().count()
    }

    /// Decoded value of the first argument with the given name
    pub fn arg(&self, name: &str) -> Option<String<MAX_ARG_VALUE>> {
        self.args()
            .find(|(raw_name, _)| url_decode::<MAX_ARG_NAME>(raw_name).as_str() == name)
            .map(|(_, raw_value)| url_decode(raw_value))
    }
}

/// Iterator over the raw argument pairs of a request
pub struct Args<'a> {
    query: core::str::Split<'a, char>,
    body: Option<core::str::Split<'a, char>>,
}

impl<'a> Iterator for Args<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let segment = match self.query.next() {
                Some(segment) => segment,
                None => self.body.as_mut()?.next()?,
            };
            if segment.is_empty() {
                continue;
            }
            return Some(segment.split_once('=').unwrap_or((segment, "")));
        }
    }
}

/// Total length of the message once its header block has arrived
///
/// Returns `None` while the header terminator is still missing.
pub fn message_len(raw: &[u8]) -> Option<usize> {
    let head_end = raw.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
    let head = core::str::from_utf8(&raw[..head_end]).ok()?;
    let content_length = head
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    Some(head_end + content_length)
}

/// Percent-decode a form/query component (`+` decodes to a space)
///
/// Malformed escapes are kept literally; output beyond `N` bytes is
/// dropped.
pub fn url_decode<const N: usize>(s: &str) -> String<N> {
    let mut bytes: Vec<u8, N> = Vec::new();
    let raw = s.as_bytes();
    let mut i = 0;
    while i < raw.len() {
        let byte = match raw[i] {
            b'+' => b' ',
            b'%' if i + 2 < raw.len() => {
                match (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        i += 2;
                        (hi << 4) | lo
                    }
                    _ => b'%',
                }
            }
            other => other,
        };
        if bytes.push(byte).is_err() {
            break;
        }
        i += 1;
    }

    match String::from_utf8(bytes.clone()) {
        Ok(decoded) => decoded,
        Err(_) => {
            // Keep the ASCII subset of an invalid sequence
            let mut lossy = String::new();
            for &b in bytes.iter().filter(|b| b.is_ascii()) {
                let _ = lossy.push(b as char);
            }
            lossy
        }
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusCode {
    Ok,
    BadRequest,
    NotFound,
}

impl StatusCode {
    /// Numeric status code
    pub fn code(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
        }
    }

    /// Reason phrase
    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
        }
    }
}

/// Response media type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ContentType {
    Html,
    Plain,
    Json,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Html => "text/html",
            ContentType::Plain => "text/plain",
            ContentType::Json => "application/json",
        }
    }
}

/// A response produced by a route handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub content_type: ContentType,
    /// Value of a `Refresh` header, e.g. `"60"` or `"3;/"`
    pub refresh: Option<&'static str>,
    body: String<MAX_BODY_SIZE>,
}

impl Response {
    /// Create an empty response
    pub fn new(status: StatusCode, content_type: ContentType) -> Self {
        Self {
            status,
            content_type,
            refresh: None,
            body: String::new(),
        }
    }

    /// `200 OK` HTML response with an empty body
    pub fn html() -> Self {
        Self::new(StatusCode::Ok, ContentType::Html)
    }

    /// Plain-text response with the given body
    pub fn plain(status: StatusCode, text: &str) -> Self {
        let mut response = Self::new(status, ContentType::Plain);
        let _ = response.push_str(text);
        response
    }

    /// `200 OK` JSON response with the given body
    pub fn json(text: &str) -> Self {
        let mut response = Self::new(StatusCode::Ok, ContentType::Json);
        let _ = response.push_str(text);
        response
    }

    /// Attach a `Refresh` header
    pub fn with_refresh(mut self, refresh: &'static str) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// Append to the body
    pub fn push_str(&mut self, s: &str) -> Result<(), HttpError> {
        self.body.push_str(s).map_err(|_| HttpError::BodyOverflow)
    }

    /// Response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Render the status line and headers, including the blank line
    pub fn head(&self) -> String<MAX_HEAD_SIZE> {
        let mut head = String::new();
        let _ = write!(
            head,
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n",
            self.status.code(),
            self.status.reason(),
            self.content_type.as_str(),
            self.body.len()
        );
        if let Some(refresh) = self.refresh {
            let _ = write!(head, "Refresh: {}\r\n", refresh);
        }
        let _ = head.push_str("Connection: close\r\n\r\n");
        head
    }
}

impl Write for Response {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.body.push_str(s).map_err(|_| fmt::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_get_with_query() {
        let raw = b"GET /configSave?set-time=2024-01-01T00%3A00%3A00 HTTP/1.1\r\nHost: clock\r\n\r\n";
        let req = Request::parse(raw).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path, "/configSave");
        assert_eq!(req.query, "set-time=2024-01-01T00%3A00%3A00");
        assert_eq!(req.arg_count(), 1);
        assert_eq!(req.arg("set-time").unwrap().as_str(), "2024-01-01T00:00:00");
    }

    #[test]
    fn test_parse_form_post() {
        let raw = b"POST /configSave HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 25\r\n\r\nset-time=2024-05-06T07:08";
        let req = Request::parse(raw).unwrap();
        assert_eq!(req.method, Method::Post);
        assert!(req.form_body);
        assert_eq!(req.arg("set-time").unwrap().as_str(), "2024-05-06T07:08");
    }

    #[test]
    fn test_non_form_body_has_no_args() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Type: text/plain\r\n\r\na=b";
        let req = Request::parse(raw).unwrap();
        assert!(!req.form_body);
        assert_eq!(req.arg_count(), 0);
    }

    #[test]
    fn test_parse_incomplete_and_malformed() {
        assert_eq!(
            Request::parse(b"GET / HTTP/1.1\r\nHost: x\r\n"),
            Err(HttpError::Incomplete)
        );
        assert_eq!(
            Request::parse(b"GET\r\n\r\n"),
            Err(HttpError::MalformedRequestLine)
        );
        assert_eq!(
            Request::parse(&[0xFF, 0xFE, b'\r', b'\n', b'\r', b'\n']),
            Err(HttpError::InvalidUtf8)
        );
    }

    #[test]
    fn test_args_skip_empty_segments() {
        let raw = b"GET /x?a=1&&b&c= HTTP/1.1\r\n\r\n";
        let req = Request::parse(raw).unwrap();
        let mut args = req.args();
        assert_eq!(args.next(), Some(("a", "1")));
        assert_eq!(args.next(), Some(("b", "")));
        assert_eq!(args.next(), Some(("c", "")));
        assert_eq!(args.next(), None);
        assert_eq!(req.arg("b").as_deref(), Some(""));
        assert_eq!(req.arg("d"), None);
    }

    #[test]
    fn test_message_len() {
        assert_eq!(message_len(b"GET / HTTP/1.1\r\n"), None);
        assert_eq!(message_len(b"GET / HTTP/1.1\r\n\r\n"), Some(18));
        let post = b"POST / HTTP/1.1\r\ncontent-length: 5\r\n\r\nab";
        assert_eq!(message_len(post), Some(post.len() + 3));
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode::<32>("a+b%20c").as_str(), "a b c");
        assert_eq!(url_decode::<32>("100%").as_str(), "100%");
        assert_eq!(url_decode::<32>("%zz").as_str(), "%zz");
        assert_eq!(url_decode::<32>("caf%C3%A9").as_str(), "café");
        assert_eq!(url_decode::<4>("abcdef").as_str(), "abcd");
    }

    #[test]
    fn test_response_head() {
        let response = Response::plain(StatusCode::Ok, "Restart!");
        assert_eq!(
            response.head().as_str(),
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 8\r\nConnection: close\r\n\r\n"
        );

        let page = Response::html().with_refresh("3;/");
        assert!(page.head().contains("Refresh: 3;/\r\n"));
    }

    #[test]
    fn test_response_overflow_is_reported() {
        let mut response = Response::html();
        let chunk = [b'x'; 1024];
        let chunk = core::str::from_utf8(&chunk).unwrap();
        for _ in 0..(MAX_BODY_SIZE / 1024) {
            assert!(response.push_str(chunk).is_ok());
        }
        assert_eq!(response.push_str("y"), Err(HttpError::BodyOverflow));
    }

    proptest! {
        #[test]
        fn prop_unreserved_text_decodes_to_itself(s in "[A-Za-z0-9._~-]{0,32}") {
            let decoded = url_decode::<64>(&s);
            prop_assert_eq!(decoded.as_str(), s.as_str());
        }

        #[test]
        fn prop_percent_encoding_roundtrips(s in "[ -~]{0,20}") {
            let mut encoded: String<64> = String::new();
            for b in s.bytes() {
                write!(encoded, "%{:02X}", b).unwrap();
            }
            let decoded = url_decode::<64>(&encoded);
            prop_assert_eq!(decoded.as_str(), s.as_str());
        }
    }
}
