//! Chunked writes into the card-side scratch buffer.
//!
//! The scratch area is the staging ground for anything too large for one
//! frame. It holds exactly the last written payload, is overwritten (not
//! appended) on every call, and must be fully written before the command
//! that consumes it is sent.

use tracing::{debug, trace};

use crate::apdu::{CommandApdu, write_u16_be};
use crate::constants::{MAX_CHUNK_SIZE, ins};
use crate::error::{Error, Result};
use crate::transport::{CardTransport, exchange};

/// Write `data` into the card's scratch buffer, starting at offset zero.
///
/// The buffer is streamed in chunks of at most [`MAX_CHUNK_SIZE`] bytes,
/// each prefixed with its big-endian 16-bit offset. The first chunk the
/// card rejects fails the whole write; nothing is retried.
pub fn write_scratch<T>(transport: &mut T, data: &[u8]) -> Result<()>
where
    T: CardTransport + ?Sized,
{
    if data.len() > usize::from(u16::MAX) {
        return Err(Error::PayloadTooLarge(data.len()));
    }

    debug!(len = data.len(), "writing to scratch area");
    for (index, chunk) in data.chunks(MAX_CHUNK_SIZE).enumerate() {
        let offset = index * MAX_CHUNK_SIZE;
        let mut payload = vec![0u8; 2 + chunk.len()];
        write_u16_be(&mut payload, 0, offset as u16);
        payload[2..].copy_from_slice(chunk);

        let command = CommandApdu::applet_with_data(ins::WRITE_TO_SCRATCH, payload)?;
        let response = exchange(transport, &command)?;
        if !response.is_success() {
            return Err(Error::ScratchWriteFailed { offset });
        }
        trace!(offset, len = chunk.len(), "scratch chunk written");
    }
    Ok(())
}
