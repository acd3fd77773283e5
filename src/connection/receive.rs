//! Receive state machine for agent messages.
//!
//! A receive either scans a new header one byte at a time or, while an
//! earlier attachment is still owed, continues copying that attachment.
//! The only state carried between calls is the pending attachment count.

use std::{fmt, io};

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::Instrument;

use super::{
    Connection,
    spans::{emit_timing_event, receive_span, start_timer},
    transport::Transport,
};
use crate::{
    error::{CommError, Result},
    frame::find_marker,
};

/// Outcome of a successful [`Connection::receive`] call.
///
/// Offsets and lengths refer to the buffer passed to `receive`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Received {
    /// The message, or the rest of a pending attachment, fits in the buffer.
    ///
    /// For a new message `len` counts the header including its terminator
    /// plus any attachment, and `attachment` is the offset of the first
    /// attachment byte. When draining a pending attachment `len` is the
    /// number of attachment bytes delivered and `attachment` is `Some(0)`.
    Complete {
        /// Bytes written to the buffer.
        len: usize,
        /// Offset of the attachment, if the message carries one.
        attachment: Option<usize>,
    },
    /// The buffer was filled and attachment bytes are still owed.
    ///
    /// For a new message `total` is the header length plus the announced
    /// attachment length. When draining, `total` is the number of
    /// attachment bytes that were owed before this call.
    AttachmentPending {
        /// Eventual size used to size the next buffer.
        total: usize,
        /// Offset of the first attachment byte in this buffer.
        attachment: usize,
    },
    /// The header did not fit in the buffer; its bytes are lost.
    BufferTooSmall,
}

impl fmt::Display for Received {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete { .. } => f.write_str("complete"),
            Self::AttachmentPending { .. } => f.write_str("attachment_pending"),
            Self::BufferTooSmall => f.write_str("buffer_too_small"),
        }
    }
}

impl<T: Transport> Connection<T> {
    /// Receive the next message, or the next chunk of a pending attachment,
    /// into `buf`.
    ///
    /// Header bytes are read one at a time until a NUL or newline. A
    /// newline is stored as NUL and a carriage return right before it
    /// becomes a space. A trailing `attach <count>` marker is stripped from
    /// the header and `<count>` attachment bytes are read after it.
    ///
    /// An empty `buf` yields [`Received::BufferTooSmall`] without touching
    /// the socket.
    ///
    /// # Errors
    ///
    /// Returns [`CommError::PeerClosed`] if the peer closes the connection
    /// mid-read and [`CommError::Io`] for any other read failure.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use agentwire::{Connection, Received};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> agentwire::Result<()> {
    /// let mut conn = Connection::connect("127.0.0.1", "5000").await?;
    /// let mut buf = vec![0; 4096];
    /// if let Received::Complete { len, attachment } = conn.receive(&mut buf).await? {
    ///     let header_end = attachment.unwrap_or(len);
    ///     println!("{}", String::from_utf8_lossy(&buf[..header_end]));
    /// }
    /// # conn.close()
    /// # }
    /// ```
    pub async fn receive(&mut self, buf: &mut [u8]) -> Result<Received> {
        let span = receive_span(&self.config.tracing, buf.len(), self.pending_attachment_bytes);
        let start = start_timer(self.config.tracing.receive_timing);
        let result = self.receive_inner(buf).instrument(span.clone()).await;
        match &result {
            Ok(received) => span.record("result", tracing::field::display(received)),
            Err(_) => span.record("result", "err"),
        };
        span.in_scope(|| emit_timing_event(start));
        result
    }

    async fn receive_inner(&mut self, buf: &mut [u8]) -> Result<Received> {
        if buf.is_empty() {
            return Ok(Received::BufferTooSmall);
        }
        if self.pending_attachment_bytes > 0 {
            return self.continue_attachment(buf).await;
        }
        let Some(header_len) = scan_header(&mut self.transport, buf).await? else {
            return Ok(Received::BufferTooSmall);
        };
        self.finish_header(buf, header_len).await
    }

    async fn continue_attachment(&mut self, buf: &mut [u8]) -> Result<Received> {
        let owed = self.pending_attachment_bytes;
        if owed <= buf.len() {
            self.pending_attachment_bytes = 0;
            read_exact(&mut self.transport, &mut buf[..owed]).await?;
            return Ok(Received::Complete {
                len: owed,
                attachment: Some(0),
            });
        }

        read_exact(&mut self.transport, buf).await?;
        self.pending_attachment_bytes -= buf.len();
        tracing::debug!(
            remaining = self.pending_attachment_bytes,
            "attachment still pending"
        );
        Ok(Received::AttachmentPending {
            total: owed,
            attachment: 0,
        })
    }

    async fn finish_header(&mut self, buf: &mut [u8], header_len: usize) -> Result<Received> {
        let Some(marker) = find_marker(&mut buf[..header_len]) else {
            return Ok(Received::Complete {
                len: header_len,
                attachment: None,
            });
        };

        let room = buf.len() - header_len;
        if marker.len <= room {
            read_exact(
                &mut self.transport,
                &mut buf[header_len..header_len + marker.len],
            )
            .await?;
            return Ok(Received::Complete {
                len: header_len + marker.len,
                attachment: Some(header_len),
            });
        }

        read_exact(&mut self.transport, &mut buf[header_len..]).await?;
        self.pending_attachment_bytes = marker.len - room;
        tracing::debug!(
            announced = marker.len,
            remaining = self.pending_attachment_bytes,
            "attachment exceeds buffer"
        );
        Ok(Received::AttachmentPending {
            total: header_len.saturating_add(marker.len),
            attachment: header_len,
        })
    }
}

/// Read header bytes until a terminator, returning the header length
/// including the terminator, or `None` if `buf` filled up first.
async fn scan_header<R>(reader: &mut R, buf: &mut [u8]) -> Result<Option<usize>>
where
    R: AsyncRead + Unpin,
{
    let mut len = 0;
    while len < buf.len() {
        match reader.read(&mut buf[len..=len]).await {
            Ok(0) => return Err(CommError::PeerClosed),
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(CommError::Io(err)),
        }
        len += 1;
        match buf[len - 1] {
            0 => return Ok(Some(len)),
            b'\n' => {
                buf[len - 1] = 0;
                if len >= 2 && buf[len - 2] == b'\r' {
                    buf[len - 2] = b' ';
                }
                return Ok(Some(len));
            }
            _ => {}
        }
    }
    Ok(None)
}

/// Fill `buf` completely, treating end of stream as the peer closing.
async fn read_exact<R>(reader: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut read = 0;
    while read < buf.len() {
        match reader.read(&mut buf[read..]).await {
            Ok(0) => return Err(CommError::PeerClosed),
            Ok(n) => read += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(CommError::Io(err)),
        }
    }
    Ok(())
}
