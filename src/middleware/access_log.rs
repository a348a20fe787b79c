//! Combined Log Format access log.
//!
//! One line per request, as defined at
//! <https://httpd.apache.org/docs/2.4/logs.html#combined>:
//!
//! ```text
//! 203.0.113.5 - - [02/Jan/2024:03:04:05 -0700] "GET /index.html HTTP/1.1" 200 4 "" "test-agent"
//! ```
//!
//! The timestamp is taken when the request arrives. Status and byte count are
//! collected by a [`ResponseSink`] riding along with the response body, so the
//! byte count covers everything the body actually produced. The line is written
//! when the body ends, or when it is dropped early (client went away), and
//! never twice.

use std::fmt;
use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{REFERER, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, Method, StatusCode, Uri, Version};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use chrono::{DateTime, FixedOffset, Local};
use http_body::{Body as HttpBody, Frame, SizeHint};

use super::Middleware;

/// strftime pattern for the bracketed timestamp.
pub const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Shared output for access log lines.
///
/// Each line is written with a single `write_all` under a lock, so lines from
/// concurrent requests interleave but never mix.
#[derive(Clone)]
pub struct LogSink(Arc<Mutex<Box<dyn Write + Send>>>);

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink")
    }
}

impl LogSink {
    pub fn new<W: Write + Send + 'static>(output: W) -> Self {
        Self(Arc::new(Mutex::new(Box::new(output))))
    }

    /// Standard output, which is line buffered.
    ///
    /// Writes are blocking and happen on the runtime thread that finishes the
    /// response body. A reader that stops draining stdout (a full pipe)
    /// stalls that worker and every request waiting on the sink lock.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    // Best effort: a failed write is not the request's problem.
    fn write_line(&self, line: &str) {
        let mut output = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = output
            .write_all(line.as_bytes())
            .and_then(|()| output.flush())
        {
            tracing::debug!(error = %err, "Failed to write access log line");
        }
    }
}

/// Request fields captured when the request arrives.
#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub client: Option<IpAddr>,
    pub start: DateTime<FixedOffset>,
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub referer: String,
    pub user_agent: String,
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default()
}

// HTTP/1 keeps the request line's form (origin, absolute or `*`). HTTP/2
// requests always carry scheme and authority, so only the path is logged.
fn request_target(uri: &Uri, version: Version) -> String {
    match version {
        Version::HTTP_2 | Version::HTTP_3 => uri
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| uri.to_string()),
        _ => uri.to_string(),
    }
}

impl RequestRecord {
    pub fn from_request(request: &Request, start: DateTime<FixedOffset>) -> Self {
        let uri = request.uri();
        Self {
            client: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
            start,
            method: request.method().clone(),
            target: request_target(uri, request.version()),
            version: request.version(),
            referer: header_text(request.headers(), REFERER),
            user_agent: header_text(request.headers(), USER_AGENT),
        }
    }

    /// Format the log line, newline included.
    pub fn combined_log_line(&self, status: StatusCode, bytes: u64) -> String {
        let client = self
            .client
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{client} - - [{}] \"{} {} {:?}\" {} {bytes} \"{}\" \"{}\"\n",
            self.start.format(TIMESTAMP_FORMAT),
            self.method,
            self.target,
            self.version,
            status.as_u16(),
            self.referer,
            self.user_agent,
        )
    }
}

/// Per-request response state: status (200 until told otherwise) and the
/// number of body bytes produced. Writes the log line exactly once.
#[derive(Debug)]
pub struct ResponseSink {
    record: RequestRecord,
    output: LogSink,
    status: StatusCode,
    bytes: u64,
    logged: bool,
}

impl ResponseSink {
    pub fn new(record: RequestRecord, output: LogSink) -> Self {
        Self {
            record,
            output,
            status: StatusCode::OK,
            bytes: 0,
            logged: false,
        }
    }

    pub fn write_header(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn write(&mut self, len: usize) {
        self.bytes += len as u64;
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    fn finish(&mut self) {
        if self.logged {
            return;
        }
        self.logged = true;
        self.output
            .write_line(&self.record.combined_log_line(self.status, self.bytes));
    }
}

impl Drop for ResponseSink {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Response body counting the bytes it yields into a [`ResponseSink`].
struct LoggedBody {
    inner: Body,
    sink: ResponseSink,
}

impl HttpBody for LoggedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.sink.write(data.len());
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.sink.finish(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Middleware writing a Combined Log Format line to `output` for every
/// request handled by the wrapped handler.
pub fn combined_log_format(output: LogSink) -> Middleware {
    Middleware::new(move |handler| {
        handler.layer(from_fn_with_state(output.clone(), access_log_layer))
    })
}

async fn access_log_layer(State(output): State<LogSink>, request: Request, next: Next) -> Response {
    let record = RequestRecord::from_request(&request, Local::now().fixed_offset());
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let mut sink = ResponseSink::new(record, output);
    sink.write_header(parts.status);

    Response::from_parts(parts, Body::new(LoggedBody { inner: body, sink }))
}
