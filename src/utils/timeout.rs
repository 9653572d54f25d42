//! Timeout helpers.
//!
//! Every network wait in the relay is bounded. A receiver that stops reading
//! must not be able to stall the sender's caller, and a peer that never
//! closes must not hold the receiver's single processing slot forever.

use crate::error::{RelayError, Result};
use std::future::Future;
use std::time::Duration;

/// Default time allowed to establish an outbound connection
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed to write and close one frame
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Default idle time allowed between reads on an inbound connection
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a transient accept failure before accepting again
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Await `fut`, failing with [`RelayError::Timeout`] after `duration`.
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| RelayError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_in_time() {
        let value = with_timeout_error(async { Ok(7u8) }, Duration::from_secs(1)).await;
        assert!(matches!(value, Ok(7)));
    }

    #[tokio::test]
    async fn test_elapsed_maps_to_timeout() {
        let value: Result<()> = with_timeout_error(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(value, Err(RelayError::Timeout)));
    }
}
