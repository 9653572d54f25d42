//! Raw TCP plumbing for the relay.
//!
//! One frame per connection. The sender connects, writes the frame, and
//! closes; the receiver treats end-of-stream as end-of-frame, so there is no
//! length prefix and the inbound buffer grows until the peer closes.

use crate::error::{RelayError, Result};
use crate::utils::timeout::with_timeout_error;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, instrument};

/// Bytes reserved ahead of each read
const READ_CHUNK: usize = 4096;

/// Bind a listener with an explicit backlog.
#[instrument(level = "debug")]
pub fn bind_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    #[cfg(unix)]
    socket.set_reuseaddr(true)?;

    socket.bind(addr)?;
    let listener = socket.listen(backlog)?;
    debug!(local = ?listener.local_addr().ok(), backlog, "Listener bound");
    Ok(listener)
}

/// Read from `stream` until the peer closes its side.
///
/// `idle_timeout` bounds each individual read, not the whole transfer.
pub async fn read_until_closed(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    idle_timeout: Duration,
) -> Result<usize> {
    let start = buf.len();
    loop {
        buf.reserve(READ_CHUNK);
        let n = with_timeout_error(
            async { stream.read_buf(buf).await.map_err(RelayError::from) },
            idle_timeout,
        )
        .await?;
        if n == 0 {
            break;
        }
    }
    Ok(buf.len() - start)
}

/// Open a fresh connection, write `frame`, and close it.
#[instrument(skip(frame), fields(frame_len = frame.len()))]
pub async fn send_once(
    host: &str,
    port: u16,
    frame: &[u8],
    connect_timeout: Duration,
    send_timeout: Duration,
) -> Result<usize> {
    let mut stream = with_timeout_error(
        async {
            TcpStream::connect((host, port))
                .await
                .map_err(|e| RelayError::TransportError(format!("connect to {host}:{port}: {e}")))
        },
        connect_timeout,
    )
    .await?;

    with_timeout_error(
        async {
            stream
                .write_all(frame)
                .await
                .map_err(|e| RelayError::TransportError(format!("send: {e}")))?;
            stream
                .shutdown()
                .await
                .map_err(|e| RelayError::TransportError(format!("close: {e}")))
        },
        send_timeout,
    )
    .await?;

    debug!(bytes = frame.len(), "Frame written and connection closed");
    Ok(frame.len())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[tokio::test]
    async fn test_send_and_read_until_closed() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 5).unwrap();
        let port = listener.local_addr().unwrap().port();

        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();

        let reader = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = BytesMut::new();
            read_until_closed(&mut stream, &mut buf, Duration::from_secs(5))
                .await
                .unwrap();
            buf
        });

        let sent = send_once(
            "127.0.0.1",
            port,
            &payload,
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(sent, payload.len());

        let received = reader.await.unwrap();
        assert_eq!(&received[..], &expected[..]);
    }

    #[tokio::test]
    async fn test_idle_peer_times_out() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 5).unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut buf = BytesMut::new();
        let result = read_until_closed(&mut stream, &mut buf, Duration::from_millis(50)).await;
        assert!(matches!(result, Err(RelayError::Timeout)));
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        // Grab a free port, then release it so nothing is listening
        let port = {
            let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 1).unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = send_once(
            "127.0.0.1",
            port,
            b"frame",
            Duration::from_secs(2),
            Duration::from_secs(2),
        )
        .await;
        assert!(matches!(result, Err(RelayError::TransportError(_))));
    }
}
