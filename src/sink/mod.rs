//! Response sinks — where a request handler writes its answer.
//!
//! A handler receives a sink by value, sets status and headers, writes body
//! chunks, and finally calls [`ResponseSink::end`]. Because `end` consumes
//! the sink, a response cannot be ended twice.
//!
//! [`ResponseWriter`] is the sink the [`Server`](crate::server::Server)
//! hands out: it accumulates a [`Response`] and delivers it over a oneshot
//! channel when ended.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::http::{Response, StatusCode};

/// Errors reported by a [`ResponseSink`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The receiving side is gone (e.g. the client disconnected).
    #[error("response sink is closed")]
    Closed,
}

/// The write side of an HTTP response.
///
/// Implementations must treat calls after the peer went away as harmless and
/// report them with [`SinkError::Closed`].
pub trait ResponseSink: Send {
    /// Sets the status code. Defaults to `200 OK` if never called.
    fn set_status(&mut self, status: StatusCode) -> Result<(), SinkError>;

    /// Sets a header, replacing any earlier value with the same name.
    fn set_header(&mut self, name: &str, value: &str) -> Result<(), SinkError>;

    /// Appends a chunk to the body.
    fn write(&mut self, chunk: &[u8]) -> Result<(), SinkError>;

    /// Finishes the response.
    fn end(self) -> Result<(), SinkError>;
}

/// A [`ResponseSink`] that buffers a [`Response`] and sends it on `end`.
///
/// # Examples
///
/// ```
/// use double_facade::sink::{ResponseSink, ResponseWriter};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (mut writer, pending) = ResponseWriter::channel(true);
/// writer.set_header("Content-Type", "text/plain").unwrap();
/// writer.write(b"hi").unwrap();
/// writer.end().unwrap();
///
/// let response = pending.recv().await.unwrap();
/// assert_eq!(response.body_bytes(), b"hi");
/// # }
/// ```
#[derive(Debug)]
pub struct ResponseWriter {
    response: Response,
    sender: oneshot::Sender<Response>,
}

/// The receiving half of a [`ResponseWriter`].
#[derive(Debug)]
pub struct PendingResponse {
    receiver: oneshot::Receiver<Response>,
}

impl ResponseWriter {
    /// Creates a writer and the handle that will receive the finished response.
    pub fn channel(keep_alive: bool) -> (Self, PendingResponse) {
        let (sender, receiver) = oneshot::channel();
        let writer = Self {
            response: Response::default().keep_alive(keep_alive),
            sender,
        };
        (writer, PendingResponse { receiver })
    }

    fn ensure_open(&self) -> Result<(), SinkError> {
        if self.sender.is_closed() {
            Err(SinkError::Closed)
        } else {
            Ok(())
        }
    }
}

impl ResponseSink for ResponseWriter {
    fn set_status(&mut self, status: StatusCode) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.response.set_status(status);
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.response.set_header(name, value);
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        self.ensure_open()?;
        self.response.append_body(chunk);
        Ok(())
    }

    fn end(self) -> Result<(), SinkError> {
        self.sender
            .send(self.response)
            .map_err(|_| SinkError::Closed)
    }
}

impl PendingResponse {
    /// Waits for the writer to end.
    ///
    /// Returns `None` if the writer was dropped without calling `end`.
    pub async fn recv(self) -> Option<Response> {
        self.receiver.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn end_delivers_the_accumulated_response() {
        let (mut writer, pending) = ResponseWriter::channel(false);
        writer.set_status(StatusCode::BadRequest).unwrap();
        writer.set_header("X-One", "1").unwrap();
        writer.set_header("x-one", "2").unwrap();
        writer.write(b"ab").unwrap();
        writer.write(b"cd").unwrap();
        writer.end().unwrap();

        let response = pending.recv().await.unwrap();
        assert_eq!(response.status(), StatusCode::BadRequest);
        assert_eq!(response.headers().get("X-One"), Some("2"));
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.body_bytes(), b"abcd");
        assert!(!response.is_keep_alive());
    }

    #[tokio::test]
    async fn dropped_writer_yields_none() {
        let (writer, pending) = ResponseWriter::channel(true);
        drop(writer);
        assert!(pending.recv().await.is_none());
    }

    #[test]
    fn closed_receiver_turns_calls_into_errors() {
        let (mut writer, pending) = ResponseWriter::channel(true);
        drop(pending);

        assert_eq!(writer.set_header("A", "b"), Err(SinkError::Closed));
        assert_eq!(writer.write(b"x"), Err(SinkError::Closed));
        assert_eq!(writer.set_status(StatusCode::Ok), Err(SinkError::Closed));
        assert_eq!(writer.end(), Err(SinkError::Closed));
    }
}
