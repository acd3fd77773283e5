//! Bounded-retry transmission over a non-blocking socket.

use std::io;

use log::{debug, warn};

use super::transport::Transport;
use crate::{
    config::TransmitRetry,
    error::{CommError, Result},
};

/// Write all of `data`, sleeping between would-block retries.
///
/// The retry count resets whenever at least one byte is written, so a slow
/// reader only fails the call once it stops draining altogether.
pub(crate) async fn transmit<T: Transport>(
    transport: &mut T,
    data: &[u8],
    retry: TransmitRetry,
) -> Result<()> {
    let mut offset = 0;
    let mut stalled = 0u32;

    while offset < data.len() {
        match transport.try_send(&data[offset..]) {
            Ok(0) => return Err(CommError::Io(io::ErrorKind::WriteZero.into())),
            Ok(written) => {
                offset += written;
                stalled = 0;
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                stalled += 1;
                if stalled >= retry.max_tries {
                    let remaining = data.len() - offset;
                    warn!(
                        "transmit gave up after {stalled} blocked writes: {remaining} of {} bytes \
                         unsent",
                        data.len()
                    );
                    return Err(CommError::TransmitExhausted {
                        total: data.len(),
                        remaining,
                        source: err,
                    });
                }
                debug!("write would block ({stalled} of {}), retrying", retry.max_tries);
                tokio::time::sleep(retry.delay).await;
            }
            Err(err) => return Err(CommError::Io(err)),
        }
    }
    Ok(())
}
