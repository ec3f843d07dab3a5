use actix_web::body::BoxBody;
use actix_web::HttpResponse;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Framing and connection-scoped headers that must not be copied from the
/// upstream response.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
  "connection",
  "keep-alive",
  "proxy-authenticate",
  "proxy-authorization",
  "te",
  "trailers",
  "transfer-encoding",
  "upgrade",
  "content-length",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
  HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// A fully received upstream response.
#[derive(Debug)]
pub struct UpstreamReply {
  pub status: StatusCode,
  pub headers: HeaderMap,
  pub body: Bytes,
}

impl UpstreamReply {
  pub async fn read(response: Response) -> Result<UpstreamReply, UpstreamError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?;

    Ok(UpstreamReply { status, headers, body })
  }

  pub fn to_http_response(&self) -> HttpResponse {
    let mut http_response = HttpResponse::new(self.status);
    let headers = http_response.headers_mut();

    for (name, value) in self.headers.iter().filter(|(name, _)| !is_hop_by_hop(name)) {
      headers.append(name.clone(), value.clone());
    }

    http_response.set_body(BoxBody::new(self.body.clone()))
  }
}

#[derive(Serialize, PartialEq, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamErrorKind {
  Timeout,
  Connect,
  Redirect,
  Body,
  Request,
  Other,
}

impl UpstreamErrorKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      UpstreamErrorKind::Timeout => "timeout",
      UpstreamErrorKind::Connect => "connect",
      UpstreamErrorKind::Redirect => "redirect",
      UpstreamErrorKind::Body => "body",
      UpstreamErrorKind::Request => "request",
      UpstreamErrorKind::Other => "other",
    }
  }
}

impl Display for UpstreamErrorKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<&reqwest::Error> for UpstreamErrorKind {
  fn from(err: &reqwest::Error) -> Self {
    if err.is_timeout() {
      UpstreamErrorKind::Timeout
    } else if err.is_connect() {
      UpstreamErrorKind::Connect
    } else if err.is_redirect() {
      UpstreamErrorKind::Redirect
    } else if err.is_body() || err.is_decode() {
      UpstreamErrorKind::Body
    } else if err.is_request() {
      UpstreamErrorKind::Request
    } else {
      UpstreamErrorKind::Other
    }
  }
}

/// Transport-level failure: no complete upstream response was received.
#[derive(Debug, Error)]
#[error("{kind} error: {}", error_chain(.source))]
pub struct UpstreamError {
  kind: UpstreamErrorKind,
  #[source]
  source: reqwest::Error,
}

impl UpstreamError {
  pub fn kind(&self) -> UpstreamErrorKind {
    self.kind
  }

  pub fn message(&self) -> String {
    error_chain(&self.source)
  }

  pub fn to_http_response(&self, target_url: &str) -> HttpResponse {
    HttpResponse::BadGateway().json(BadGatewayBody {
      detail: "Upstream request failed",
      error: self.message(),
      error_kind: self.kind,
      target_url,
    })
  }
}

impl From<reqwest::Error> for UpstreamError {
  fn from(source: reqwest::Error) -> Self {
    UpstreamError {
      kind: UpstreamErrorKind::from(&source),
      source,
    }
  }
}

/// The error followed by every distinct cause in its source chain.
fn error_chain(err: &reqwest::Error) -> String {
  let mut message = err.to_string();
  let mut cause = err.source();

  while let Some(inner) = cause {
    let text = inner.to_string();
    if !message.contains(&text) {
      message.push_str(": ");
      message.push_str(&text);
    }
    cause = inner.source();
  }

  message
}

#[derive(Serialize)]
struct BadGatewayBody<'a> {
  detail: &'static str,
  error: String,
  error_kind: UpstreamErrorKind,
  target_url: &'a str,
}
