//! Newline-delimited JSON-RPC framing for the stdio transport.
//!
//! Each inbound line is decoded on its own. A line that is not JSON, or not a
//! valid MCP message, is answered with a JSON-RPC error and skipped; the
//! session keeps reading.

use futures::channel::mpsc::{self, UnboundedReceiver};
use futures::future::ready;
use futures::{Sink, SinkExt, Stream, StreamExt};
use rmcp::RoleServer;
use rmcp::model::ErrorCode;
use rmcp::service::{RxJsonRpcMessage, TxJsonRpcMessage};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use crate::error::BiolinkMcpError;

const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// An inbound line that could not be turned into an MCP message.
#[derive(Debug)]
pub(crate) struct Rejection {
    code: ErrorCode,
    id: Value,
    error: BiolinkMcpError,
}

impl Rejection {
    fn parse_error(reason: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::PARSE_ERROR,
            id: Value::Null,
            error: BiolinkMcpError::Protocol(reason.into()),
        }
    }

    fn invalid_request(id: Value, reason: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::INVALID_REQUEST,
            id,
            error: BiolinkMcpError::Protocol(reason.into()),
        }
    }

    /// JSON-RPC error response for this line.
    pub(crate) fn to_response(&self) -> Value {
        let message = if self.code == ErrorCode::PARSE_ERROR {
            "Parse error"
        } else {
            "Invalid Request"
        };
        json!({
            "jsonrpc": "2.0",
            "id": self.id,
            "error": {
                "code": self.code.0,
                "message": message,
                "data": self.error.to_descriptor()["error"],
            }
        })
    }
}

#[derive(Debug)]
pub(crate) enum Frame {
    Message(RxJsonRpcMessage<RoleServer>),
    Rejected(Rejection),
}

impl Frame {
    fn from_line(line: &str) -> Self {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                return Self::Rejected(Rejection::parse_error(format!("invalid JSON: {err}")));
            }
        };
        let id = value
            .get("id")
            .filter(|id| id.is_string() || id.is_number())
            .cloned()
            .unwrap_or(Value::Null);
        match serde_json::from_value(value) {
            Ok(message) => Self::Message(message),
            Err(err) => Self::Rejected(Rejection::invalid_request(
                id,
                format!("not a valid MCP message: {err}"),
            )),
        }
    }
}

/// Line decoder that reports bad lines as frames instead of stream errors.
#[derive(Debug)]
pub(crate) struct JsonLineCodec {
    lines: LinesCodec,
    max_length: usize,
}

impl JsonLineCodec {
    pub(crate) fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    pub(crate) fn with_max_length(max_length: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max_length),
            max_length,
        }
    }

    fn frame(
        &self,
        decoded: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<Option<Frame>>, std::io::Error> {
        match decoded {
            Ok(Some(line)) if line.trim().is_empty() => Ok(Some(None)),
            Ok(Some(line)) => Ok(Some(Some(Frame::from_line(&line)))),
            Ok(None) => Ok(None),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Some(Frame::Rejected(
                Rejection::parse_error(format!("message exceeds {} bytes", self.max_length)),
            )))),
            Err(LinesCodecError::Io(err)) if err.kind() == std::io::ErrorKind::InvalidData => {
                Ok(Some(Some(Frame::Rejected(Rejection::parse_error(err.to_string())))))
            }
            Err(LinesCodecError::Io(err)) => Err(err),
        }
    }
}

impl Decoder for JsonLineCodec {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, std::io::Error> {
        loop {
            let decoded = self.lines.decode(buf);
            match self.frame(decoded)? {
                Some(Some(frame)) => return Ok(Some(frame)),
                Some(None) => continue,
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, std::io::Error> {
        loop {
            let decoded = self.lines.decode_eof(buf);
            match self.frame(decoded)? {
                Some(Some(frame)) => return Ok(Some(frame)),
                Some(None) => continue,
                None => return Ok(None),
            }
        }
    }
}

/// Splits a byte pipe into the sink/stream pair rmcp serves over.
///
/// Outbound messages and rejection responses share one writer task, so lines
/// never interleave.
pub(crate) fn line_transport<R, W>(
    reader: R,
    writer: W,
) -> (
    impl Sink<TxJsonRpcMessage<RoleServer>, Error = BiolinkMcpError> + Send + 'static,
    impl Stream<Item = RxJsonRpcMessage<RoleServer>> + Send + 'static,
)
where
    R: AsyncRead + Send + 'static,
    W: AsyncWrite + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded::<String>();
    tokio::spawn(write_lines(rx, writer));

    let rejections = tx.clone();
    let inbound = FramedRead::new(reader, JsonLineCodec::new())
        .take_while(|frame| {
            if let Err(err) = frame {
                warn!("Failed to read from stdin: {err}");
            }
            ready(frame.is_ok())
        })
        .filter_map(move |frame| {
            let message = match frame {
                Ok(Frame::Message(message)) => Some(message),
                Ok(Frame::Rejected(rejection)) => {
                    warn!(code = rejection.code.0, "Rejected inbound line: {}", rejection.error);
                    if rejections
                        .unbounded_send(rejection.to_response().to_string())
                        .is_err()
                    {
                        debug!("Writer closed before rejection could be sent");
                    }
                    None
                }
                Err(_) => None,
            };
            ready(message)
        });

    let outbound = tx.with(|message: TxJsonRpcMessage<RoleServer>| {
        ready(serde_json::to_string(&message).map_err(BiolinkMcpError::from))
    });

    (outbound, inbound)
}

async fn write_lines<W: AsyncWrite>(mut rx: UnboundedReceiver<String>, writer: W) {
    let mut out = std::pin::pin!(FramedWrite::new(writer, LinesCodec::new()));
    while let Some(line) = rx.next().await {
        if let Err(err) = out.send(line).await {
            warn!("Failed to write to stdout: {err}");
            break;
        }
    }
}
