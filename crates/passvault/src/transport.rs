//! The transport seam between the protocol engine and the physical card.

use std::time::Duration;

use thiserror::Error;
use tracing::trace;

use crate::apdu::{CommandApdu, ResponseApdu};

/// Failures raised by the underlying card connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection to the card was lost mid-exchange.
    #[error("card connection lost")]
    ConnectionLost,

    /// The card did not answer within the configured timeout.
    #[error("card did not answer within the configured timeout")]
    Timeout,

    /// The transport failed at the I/O layer.
    #[error("transport I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Any other transport-specific failure.
    #[error("{0}")]
    Other(String),
}

/// A synchronous connection to the card.
///
/// One request/response exchange at a time, no retransmission: the
/// implementation is expected to be reliable in delivery but not in timing.
/// Protocol operations take the transport by `&mut`, so two operations can
/// never interleave on one handle — the card-side session state (scratch
/// buffer, transaction key) would not survive it.
pub trait CardTransport {
    /// Send a command frame and block until the full response, trailer
    /// included, has arrived.
    fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Bound how long [`transceive`](Self::transceive) may block.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), TransportError>;

    /// Close the connection. The card treats this as an abrupt end of the
    /// session; no teardown message is sent.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Send a command and parse the response frame.
pub(crate) fn exchange<T>(transport: &mut T, command: &CommandApdu) -> crate::Result<ResponseApdu>
where
    T: CardTransport + ?Sized,
{
    trace!(
        ins = command.ins(),
        payload_len = command.data().len(),
        "sending command"
    );
    let raw = transport.transceive(&command.to_bytes())?;
    trace!(response_len = raw.len(), "response received");
    ResponseApdu::from_bytes(raw)
}
