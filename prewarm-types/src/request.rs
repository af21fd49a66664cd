//! Parsing of single-line request templates.
//!
//! HTTP templates have the form `<method>:<path>[:<body>]`. The line is split at the first two
//! colons only, so the body may contain further colons, e.g. JSON:
//!
//! ```text
//! post:/db:{"db": "true"}
//! get:ping
//! ```
//!
//! gRPC templates have the form `<package.Service>/<Method>[:<message>]`:
//!
//! ```text
//! grpc.health.v1.Health/Check
//! ```

use std::fmt;
use std::str::FromStr;

use crate::interpolate::Interpolator;

/// Errors returned when a template line cannot be parsed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    /// The line is not of the form `<method>:<path>[:<body>]`.
    #[error("invalid request {0:?}, expected <method>:<path>[:<body>]")]
    InvalidFormat(String),
    /// The method is not a standard HTTP method.
    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),
    /// The path segment is empty.
    #[error("request path must not be empty")]
    EmptyPath,
    /// The gRPC line does not name a `<service>/<method>`.
    #[error("invalid gRPC service method {0:?}, expected <package.Service>/<Method>")]
    InvalidServiceMethod(String),
}

/// Standard HTTP request methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `CONNECT`
    Connect,
    /// `OPTIONS`
    Options,
    /// `TRACE`
    Trace,
}

impl Method {
    /// Returns the canonical, uppercase name of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
        }
    }
}

impl FromStr for Method {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s {
            s if s.eq_ignore_ascii_case("get") => Method::Get,
            s if s.eq_ignore_ascii_case("head") => Method::Head,
            s if s.eq_ignore_ascii_case("post") => Method::Post,
            s if s.eq_ignore_ascii_case("put") => Method::Put,
            s if s.eq_ignore_ascii_case("patch") => Method::Patch,
            s if s.eq_ignore_ascii_case("delete") => Method::Delete,
            s if s.eq_ignore_ascii_case("connect") => Method::Connect,
            s if s.eq_ignore_ascii_case("options") => Method::Options,
            s if s.eq_ignore_ascii_case("trace") => Method::Trace,
            s => return Err(ParseError::InvalidMethod(s.to_owned())),
        };

        Ok(method)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns a template into a concrete request by expanding its placeholders.
pub trait Render {
    /// The concrete request type produced by this template.
    type Output;

    /// Renders the template, drawing fresh placeholder values from `interpolator`.
    fn render(&self, interpolator: &mut Interpolator) -> Self::Output;
}

/// A parsed HTTP request line whose placeholders have not been expanded yet.
///
/// The [`Display`](fmt::Display) implementation writes the template back in its line form, so
/// that parsing the output again yields the same template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestTemplate {
    /// The HTTP method.
    pub method: Method,
    /// The literal request path, with or without a leading `/`.
    pub path: String,
    /// The literal request body, if the line had a third segment.
    pub body: Option<String>,
}

impl FromStr for RequestTemplate {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.splitn(3, ':');
        let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
            return Err(ParseError::InvalidFormat(line.to_owned()));
        };
        let body = parts.next();

        let method = method.parse()?;
        if path.is_empty() {
            return Err(ParseError::EmptyPath);
        }

        Ok(Self {
            method,
            path: path.to_owned(),
            body: body.map(str::to_owned),
        })
    }
}

impl fmt::Display for RequestTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.method, self.path)?;
        if let Some(ref body) = self.body {
            write!(f, ":{body}")?;
        }
        Ok(())
    }
}

impl Render for RequestTemplate {
    type Output = RequestSpec;

    fn render(&self, interpolator: &mut Interpolator) -> RequestSpec {
        RequestSpec {
            method: self.method,
            path: interpolator.expand(&self.path),
            body: self.body.as_deref().map(|body| interpolator.expand(body)),
        }
    }
}

/// A concrete HTTP request, ready to be sent to the target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestSpec {
    /// The HTTP method.
    pub method: Method,
    /// The request path, relative to the target's base URL.
    pub path: String,
    /// The request body, if any.
    pub body: Option<String>,
}

/// Parses an HTTP request line and expands its placeholders.
///
/// This uses a fresh [`Interpolator`] backed by the system clock. To render the same line
/// repeatedly, parse a [`RequestTemplate`] once and [`render`](Render::render) it instead.
///
/// # Examples
///
/// ```
/// use prewarm_types::{Method, parse};
///
/// let request = parse(r#"post:/db:{"db": "true"}"#).unwrap();
/// assert_eq!(request.method, Method::Post);
/// assert_eq!(request.path, "/db");
/// assert_eq!(request.body.as_deref(), Some(r#"{"db": "true"}"#));
///
/// assert!(parse("hmm:/ping:all=true").is_err());
/// ```
pub fn parse(line: &str) -> Result<RequestSpec, ParseError> {
    let template: RequestTemplate = line.parse()?;
    Ok(template.render(&mut Interpolator::new()))
}

/// A parsed gRPC request line whose placeholders have not been expanded yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrpcTemplate {
    /// The fully qualified method, as `<package.Service>/<Method>`.
    pub service_method: String,
    /// The literal request message. Empty if the line had no message segment.
    pub message: String,
}

impl FromStr for GrpcTemplate {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (service_method, message) = line.split_once(':').unwrap_or((line, ""));
        let service_method = service_method.trim_start_matches('/');

        match service_method.split_once('/') {
            Some((service, method))
                if !service.is_empty() && !method.is_empty() && !method.contains('/') => {}
            _ => return Err(ParseError::InvalidServiceMethod(service_method.to_owned())),
        }

        Ok(Self {
            service_method: service_method.to_owned(),
            message: message.to_owned(),
        })
    }
}

impl fmt::Display for GrpcTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.service_method)?;
        if !self.message.is_empty() {
            write!(f, ":{}", self.message)?;
        }
        Ok(())
    }
}

impl Render for GrpcTemplate {
    type Output = GrpcRequest;

    fn render(&self, interpolator: &mut Interpolator) -> GrpcRequest {
        GrpcRequest {
            service_method: self.service_method.clone(),
            message: interpolator.expand(&self.message),
        }
    }
}

/// A concrete gRPC request, ready to be sent to the target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrpcRequest {
    /// The fully qualified method, as `<package.Service>/<Method>`.
    pub service_method: String,
    /// The request message payload.
    pub message: String,
}

/// Parses a gRPC request line and expands its placeholders.
pub fn parse_grpc(line: &str) -> Result<GrpcRequest, ParseError> {
    let template: GrpcTemplate = line.parse()?;
    Ok(template.render(&mut Interpolator::new()))
}

#[cfg(test)]
mod tests {
    use chrono::{Days, Local};

    use super::*;

    #[test]
    fn parses_body() {
        let request = parse(r#"post:/db:{"db": "true"}"#).unwrap();

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "/db");
        assert_eq!(request.body.as_deref(), Some(r#"{"db": "true"}"#));
    }

    #[test]
    fn parses_without_body() {
        let request = parse("get:ping").unwrap();

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.path, "ping");
        assert_eq!(request.body, None);
    }

    #[test]
    fn empty_body_is_present() {
        let request = parse("put:/x:").unwrap();
        assert_eq!(request.body.as_deref(), Some(""));
    }

    #[test]
    fn body_keeps_colons() {
        let request = parse("post:/kv:a:b:c").unwrap();

        assert_eq!(request.path, "/kv");
        assert_eq!(request.body.as_deref(), Some("a:b:c"));
    }

    #[test]
    fn method_is_case_insensitive() {
        for line in ["get:/", "GET:/", "Get:/", "gEt:/"] {
            assert_eq!(parse(line).unwrap().method, Method::Get);
        }
        assert_eq!(parse("DELETE:/x").unwrap().method, Method::Delete);
        assert_eq!(parse("patch:/x").unwrap().method, Method::Patch);
    }

    #[test]
    fn rejects_invalid_method() {
        assert_eq!(
            parse("hmm:/ping:all=true"),
            Err(ParseError::InvalidMethod("hmm".into()))
        );
        assert_eq!(parse(":/ping"), Err(ParseError::InvalidMethod("".into())));
    }

    #[test]
    fn rejects_missing_path() {
        assert_eq!(parse("get"), Err(ParseError::InvalidFormat("get".into())));
        assert_eq!(parse(""), Err(ParseError::InvalidFormat("".into())));
        assert_eq!(parse("get:"), Err(ParseError::EmptyPath));
        assert_eq!(parse("get::body"), Err(ParseError::EmptyPath));
    }

    #[test]
    fn interpolates_path_and_body() {
        let request = parse(r#"post:/path_{numbers-5}:{"body": "{numbers-10}"}"#).unwrap();

        assert_eq!(request.path.len(), 11);
        assert_eq!(request.body.as_ref().map(String::len), Some(22));
        assert!(request.path[6..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn interpolates_dates() {
        let date = (Local::now().date_naive() + Days::new(1))
            .format("%Y-%m-%d")
            .to_string();

        let request = parse(r#"post:/db_{tomorrow}:{"db": "{tomorrow}"}"#).unwrap();
        assert_eq!(request.path, format!("/db_{date}"));
        assert_eq!(request.body, Some(format!(r#"{{"db": "{date}"}}"#)));
    }

    #[test]
    fn template_round_trips() {
        for line in [
            r#"POST:/db:{"db": "true"}"#,
            "GET:ping",
            "PUT:/x:",
            "DELETE:/items/{numbers-3}:a:b",
            "OPTIONS:*",
        ] {
            let template: RequestTemplate = line.parse().unwrap();
            assert_eq!(template.to_string(), line);

            let reparsed: RequestTemplate = template.to_string().parse().unwrap();
            assert_eq!(reparsed, template);
        }
    }

    #[test]
    fn template_keeps_placeholders() {
        let template: RequestTemplate = "get:/users/{chars-8}".parse().unwrap();
        assert_eq!(template.path, "/users/{chars-8}");
    }

    #[test]
    fn renders_fresh_values() {
        let template: RequestTemplate = "get:/users/{chars-32}".parse().unwrap();
        let mut interpolator = Interpolator::new();

        let first = template.render(&mut interpolator);
        let second = template.render(&mut interpolator);
        assert_ne!(first.path, second.path);
    }

    #[test]
    fn parses_grpc() {
        let request = parse_grpc("grpc.health.v1.Health/Check").unwrap();
        assert_eq!(request.service_method, "grpc.health.v1.Health/Check");
        assert_eq!(request.message, "");

        let request = parse_grpc(r#"/echo.Echo/Say:{"text": "a:b"}"#).unwrap();
        assert_eq!(request.service_method, "echo.Echo/Say");
        assert_eq!(request.message, r#"{"text": "a:b"}"#);
    }

    #[test]
    fn rejects_invalid_grpc() {
        for line in ["", "Check", "Health/", "/Check", "a/b/c", ":message"] {
            assert!(
                matches!(
                    parse_grpc(line),
                    Err(ParseError::InvalidServiceMethod(_))
                ),
                "{line:?} should be rejected"
            );
        }
    }

    #[test]
    fn grpc_template_round_trips() {
        for line in ["echo.Echo/Say", "echo.Echo/Say:{numbers-4}"] {
            let template: GrpcTemplate = line.parse().unwrap();
            assert_eq!(template.to_string(), line);
        }
    }
}
