use actix_web::web::Query;
use actix_web::HttpRequest;
use chrono::{SecondsFormat, Utc};
use log::{error, warn};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Upper bound for the upstream body copied into a log record.
pub const MAX_LOGGED_BODY_BYTES: usize = 64 * 1024;

const TRUNCATION_MARKER: &str = "...";

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
  TriggerRequest,
  TriggerError,
}

/// Inbound request metadata, captured before the upstream call.
#[derive(Debug, Clone)]
pub struct RequestContext {
  pub timestamp: String,
  pub method: String,
  pub path: String,
  pub query: BTreeMap<String, String>,
  pub headers: BTreeMap<String, String>,
}

impl RequestContext {
  pub fn capture(request: &HttpRequest) -> RequestContext {
    let query = match Query::<BTreeMap<String, String>>::from_query(request.query_string()) {
      Ok(params) => params.into_inner(),
      Err(err) => {
        warn!("Unable to parse query parameters {}", err);
        BTreeMap::new()
      }
    };

    RequestContext {
      timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
      method: request.method().to_string(),
      path: request.path().to_string(),
      query,
      headers: collect_headers(request.headers().iter()),
    }
  }
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct LogEntry {
  pub event: TriggerEvent,
  pub timestamp: String,
  pub method: String,
  pub path: String,
  pub query: BTreeMap<String, String>,
  pub headers: BTreeMap<String, String>,
  pub target_url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<u16>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub upstream_headers: Option<BTreeMap<String, String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub upstream_body: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_kind: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl LogEntry {
  fn base(event: TriggerEvent, context: RequestContext, target_url: &str) -> LogEntry {
    let RequestContext {
      timestamp,
      method,
      path,
      query,
      headers,
    } = context;

    LogEntry {
      event,
      timestamp,
      method,
      path,
      query,
      headers,
      target_url: target_url.to_string(),
      status: None,
      upstream_headers: None,
      upstream_body: None,
      error_kind: None,
      error: None,
    }
  }

  /// An upstream response was received, whatever its status.
  pub fn success<'a, I>(context: RequestContext, target_url: &str, status: u16, headers: I, body: &[u8]) -> LogEntry
  where
    I: IntoIterator<Item = (&'a HeaderName, &'a HeaderValue)>,
  {
    LogEntry {
      status: Some(status),
      upstream_headers: Some(collect_headers(headers)),
      upstream_body: Some(body_for_log(body, MAX_LOGGED_BODY_BYTES)),
      ..LogEntry::base(TriggerEvent::TriggerRequest, context, target_url)
    }
  }

  pub fn failure(context: RequestContext, target_url: &str, error_kind: &str, message: String) -> LogEntry {
    LogEntry {
      error_kind: Some(error_kind.to_string()),
      error: Some(message),
      ..LogEntry::base(TriggerEvent::TriggerError, context, target_url)
    }
  }
}

/// Repeated headers are joined with ", ".
pub(crate) fn collect_headers<'a, I>(headers: I) -> BTreeMap<String, String>
where
  I: IntoIterator<Item = (&'a HeaderName, &'a HeaderValue)>,
{
  let mut collected: BTreeMap<String, String> = BTreeMap::new();

  for (name, value) in headers {
    let value = String::from_utf8_lossy(value.as_bytes());
    collected
      .entry(name.as_str().to_string())
      .and_modify(|existing| {
        existing.push_str(", ");
        existing.push_str(&value);
      })
      .or_insert_with(|| value.into_owned());
  }

  collected
}

fn body_for_log(body: &[u8], limit: usize) -> String {
  if body.len() <= limit {
    return String::from_utf8_lossy(body).into_owned();
  }

  let mut text = String::from_utf8_lossy(&body[..limit]).into_owned();
  text.push_str(TRUNCATION_MARKER);
  text
}

#[derive(Debug, Error)]
pub enum LogWriteError {
  #[error("unable to serialize log entry: {0}")]
  Serialize(#[from] serde_json::Error),
  #[error("unable to append to '{}': {source}", .path.display())]
  File {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("unable to write to stdout: {0}")]
  Stdout(#[source] std::io::Error),
}

/// Append-only destination for trigger records: the log file and stdout.
pub struct LogSink {
  path: PathBuf,
  file: Mutex<File>,
}

impl LogSink {
  pub fn open(path: &Path) -> std::io::Result<LogSink> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(LogSink {
      path: path.to_path_buf(),
      file: Mutex::new(file),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Write failures are reported on the console and never returned.
  pub fn append(&self, entry: &LogEntry) {
    let line = match serde_json::to_string(entry) {
      Ok(mut line) => {
        line.push('\n');
        line
      }
      Err(err) => {
        error!("{}", LogWriteError::from(err));
        return;
      }
    };

    if let Err(err) = self.write_file(&line) {
      error!("{}", err);
    }

    if let Err(err) = write_stdout(&line) {
      error!("{}", err);
    }
  }

  fn write_file(&self, line: &str) -> Result<(), LogWriteError> {
    let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);

    file.write_all(line.as_bytes()).map_err(|source| LogWriteError::File {
      path: self.path.clone(),
      source,
    })
  }
}

fn write_stdout(line: &str) -> Result<(), LogWriteError> {
  let mut stdout = std::io::stdout().lock();
  stdout
    .write_all(line.as_bytes())
    .and_then(|_| stdout.flush())
    .map_err(LogWriteError::Stdout)
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::test::TestRequest;
  use reqwest::header::HeaderMap;
  use std::fs;
  use std::sync::Arc;
  use std::thread;

  fn context() -> RequestContext {
    let request = TestRequest::get()
      .uri("/trigger?run=1&mode=fast")
      .insert_header(("x-caller", "tests"))
      .to_http_request();
    RequestContext::capture(&request)
  }

  #[test]
  fn captures_request_metadata() {
    let context = context();

    assert_eq!(context.method, "GET");
    assert_eq!(context.path, "/trigger");
    assert_eq!(context.query.get("run").map(String::as_str), Some("1"));
    assert_eq!(context.query.get("mode").map(String::as_str), Some("fast"));
    assert_eq!(context.headers.get("x-caller").map(String::as_str), Some("tests"));
    assert!(chrono::DateTime::parse_from_rfc3339(&context.timestamp).is_ok());
  }

  #[test]
  fn repeated_headers_are_joined() {
    let mut headers = HeaderMap::new();
    headers.append("set-cookie", HeaderValue::from_static("a=1"));
    headers.append("set-cookie", HeaderValue::from_static("b=2"));
    headers.append("content-type", HeaderValue::from_static("text/plain"));

    let collected = collect_headers(headers.iter());

    assert_eq!(collected.get("set-cookie").map(String::as_str), Some("a=1, b=2"));
    assert_eq!(collected.get("content-type").map(String::as_str), Some("text/plain"));
  }

  #[test]
  fn long_bodies_are_truncated() {
    assert_eq!(body_for_log(b"short", 16), "short");
    assert_eq!(body_for_log(b"0123456789", 4), "0123...");
    assert_eq!(body_for_log(&[0xff, b'a'], 16), "\u{fffd}a");
  }

  #[test]
  fn success_entry_omits_error_fields() {
    let mut headers = HeaderMap::new();
    headers.insert("x-upstream", HeaderValue::from_static("yes"));

    let entry = LogEntry::success(context(), "http://upstream/hook", 201, headers.iter(), b"created");
    let json: serde_json::Value = serde_json::to_value(&entry).unwrap();

    assert_eq!(json["event"], "trigger_request");
    assert_eq!(json["status"], 201);
    assert_eq!(json["upstream_headers"]["x-upstream"], "yes");
    assert_eq!(json["upstream_body"], "created");
    assert_eq!(json["target_url"], "http://upstream/hook");
    assert!(json.get("error").is_none());
    assert!(json.get("error_kind").is_none());
  }

  #[test]
  fn failure_entry_omits_upstream_fields() {
    let entry = LogEntry::failure(context(), "http://upstream/hook", "connect", "connection refused".into());
    let json: serde_json::Value = serde_json::to_value(&entry).unwrap();

    assert_eq!(json["event"], "trigger_error");
    assert_eq!(json["error_kind"], "connect");
    assert_eq!(json["error"], "connection refused");
    assert!(json.get("status").is_none());
    assert!(json.get("upstream_body").is_none());
  }

  #[test]
  fn appends_one_json_line_per_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trigger.log");
    let sink = LogSink::open(&path).unwrap();

    sink.append(&LogEntry::failure(context(), "http://a", "timeout", "timed out".into()));
    sink.append(&LogEntry::success(context(), "http://a", 200, HeaderMap::new().iter(), b"ok"));

    let content = fs::read_to_string(&path).unwrap();
    let entries: Vec<LogEntry> = content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event, TriggerEvent::TriggerError);
    assert_eq!(entries[1].status, Some(200));
  }

  #[test]
  fn reopening_keeps_previous_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trigger.log");

    LogSink::open(&path)
      .unwrap()
      .append(&LogEntry::failure(context(), "http://a", "connect", "refused".into()));
    LogSink::open(&path)
      .unwrap()
      .append(&LogEntry::failure(context(), "http://a", "connect", "refused".into()));

    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
  }

  #[test]
  fn write_failures_are_swallowed() {
    let full_device = Path::new("/dev/full");
    if !full_device.exists() {
      return;
    }

    let sink = LogSink::open(full_device).unwrap();
    sink.append(&LogEntry::failure(context(), "http://a", "connect", "refused".into()));
    sink.append(&LogEntry::success(context(), "http://a", 200, HeaderMap::new().iter(), b"ok"));
  }

  #[test]
  fn concurrent_appends_keep_lines_whole() {
    const THREADS: usize = 8;
    const APPENDS_PER_THREAD: usize = 10;
    const BODY_SIZE: usize = 60 * 1024;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trigger.log");
    let sink = Arc::new(LogSink::open(&path).unwrap());

    let handles: Vec<_> = (0..THREADS)
      .map(|index| {
        let body = vec![b'a' + index as u8; BODY_SIZE];
        let entry = LogEntry::success(context(), "http://a", 200, HeaderMap::new().iter(), &body);
        let sink = sink.clone();

        thread::spawn(move || {
          for _ in 0..APPENDS_PER_THREAD {
            sink.append(&entry);
          }
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }

    let content = fs::read_to_string(&path).unwrap();
    let entries: Vec<LogEntry> = content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();

    assert_eq!(entries.len(), THREADS * APPENDS_PER_THREAD);
    for entry in entries {
      let body = entry.upstream_body.unwrap();
      assert_eq!(body.len(), BODY_SIZE);
      let first = body.as_bytes()[0];
      assert!(body.bytes().all(|byte| byte == first));
    }
  }
}
