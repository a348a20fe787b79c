//! Per-connection timeouts and error reporting.
//!
//! Every accepted TCP stream is wrapped in a [`DeadlineStream`] before it
//! reaches the inner acceptor (plain or TLS), so the TLS handshake, request
//! reads, response writes and the wait for the next keep-alive request are all
//! bounded. Errors from the inner acceptor and timeouts raised later on the
//! connection are written to the server's [`ErrorLog`] and only fail the one
//! connection.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum_server::accept::Accept;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Sleep;

use super::error_log::ErrorLog;

/// Connection timeouts. `None` leaves a direction unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub read: Option<Duration>,
    pub write: Option<Duration>,
    pub idle: Option<Duration>,
}

impl Timeouts {
    // An idle keep-alive connection is a pending read, so reads are bounded by
    // whichever of the two is shorter.
    fn read_limit(&self) -> Option<Duration> {
        match (self.read, self.idle) {
            (Some(read), Some(idle)) => Some(read.min(idle)),
            (read, idle) => read.or(idle),
        }
    }
}

#[derive(Debug)]
struct Deadline {
    limit: Option<Duration>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Deadline {
    fn new(limit: Option<Duration>) -> Self {
        Self { limit, sleep: None }
    }

    fn reset(&mut self) {
        self.sleep = None;
    }

    /// Called while the operation is pending. The clock starts on the first
    /// pending poll after the last bit of progress.
    fn poll_expired(&mut self, cx: &mut Context<'_>) -> bool {
        let Some(limit) = self.limit else {
            return false;
        };
        let sleep = self
            .sleep
            .get_or_insert_with(|| Box::pin(tokio::time::sleep(limit)));
        sleep.as_mut().poll(cx).is_ready()
    }
}

fn timed_out(direction: &str, error_log: &ErrorLog) -> io::Error {
    error_log.error(format_args!("connection {direction} timed out"));
    io::Error::new(io::ErrorKind::TimedOut, format!("{direction} timed out"))
}

/// Stream that fails a read or write left pending past its timeout.
///
/// Progress in either direction restarts the read clock, so a slow download
/// does not trip the read timeout while the peer is still receiving.
#[derive(Debug)]
pub struct DeadlineStream<S> {
    inner: S,
    read: Deadline,
    write: Deadline,
    error_log: ErrorLog,
}

impl<S> DeadlineStream<S> {
    pub fn new(inner: S, timeouts: Timeouts, error_log: ErrorLog) -> Self {
        Self {
            inner,
            read: Deadline::new(timeouts.read_limit()),
            write: Deadline::new(timeouts.write),
            error_log,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for DeadlineStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.read.reset();
                Poll::Ready(result)
            }
            Poll::Pending if this.read.poll_expired(cx) => {
                Poll::Ready(Err(timed_out("read", &this.error_log)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: AsyncWrite + Unpin> DeadlineStream<S> {
    fn poll_write_op<T>(
        &mut self,
        cx: &mut Context<'_>,
        op: impl FnOnce(Pin<&mut S>, &mut Context<'_>) -> Poll<io::Result<T>>,
    ) -> Poll<io::Result<T>> {
        match op(Pin::new(&mut self.inner), cx) {
            Poll::Ready(result) => {
                self.write.reset();
                self.read.reset();
                Poll::Ready(result)
            }
            Poll::Pending if self.write.poll_expired(cx) => {
                Poll::Ready(Err(timed_out("write", &self.error_log)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for DeadlineStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut()
            .poll_write_op(cx, |inner, cx| inner.poll_write(cx, buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut()
            .poll_write_op(cx, |inner, cx| inner.poll_flush(cx))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut()
            .poll_write_op(cx, |inner, cx| inner.poll_shutdown(cx))
    }
}

/// Acceptor applying [`Timeouts`] beneath an inner acceptor and logging the
/// connections it rejects.
#[derive(Debug, Clone)]
pub struct ServerAcceptor<A> {
    inner: A,
    timeouts: Timeouts,
    error_log: ErrorLog,
}

impl<A> ServerAcceptor<A> {
    pub fn new(inner: A, timeouts: Timeouts, error_log: ErrorLog) -> Self {
        Self {
            inner,
            timeouts,
            error_log,
        }
    }
}

impl<A, I, S> Accept<I, S> for ServerAcceptor<A>
where
    A: Accept<DeadlineStream<I>, S>,
    A::Future: Send + 'static,
    I: AsyncRead + AsyncWrite + Unpin,
{
    type Stream = A::Stream;
    type Service = A::Service;
    type Future = BoxFuture<'static, io::Result<(Self::Stream, Self::Service)>>;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        let accept = self
            .inner
            .accept(
                DeadlineStream::new(stream, self.timeouts, self.error_log.clone()),
                service,
            );
        let error_log = self.error_log.clone();
        Box::pin(async move {
            accept
                .await
                .inspect_err(|err| error_log.error(format_args!("connection rejected: {err}")))
        })
    }
}
