//! Handles the queue can hold and close.

use std::net::Shutdown;

use crate::error::CloseError;

/// A connection handle owned by the queue while it waits for a worker
///
/// The queue closes a handle when it evicts or drains it. Dropping a handle
/// must also release it, so `close` only needs to report failures the drop
/// would hide.
pub trait Connection: Send + 'static {
    /// Close the handle, reporting any failure
    fn close(self) -> Result<(), CloseError>;
}

impl Connection for std::net::TcpStream {
    fn close(self) -> Result<(), CloseError> {
        self.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

impl Connection for tokio::net::TcpStream {
    fn close(self) -> Result<(), CloseError> {
        let stream = self.into_std()?;
        stream.shutdown(Shutdown::Both)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};

    #[test]
    fn test_std_stream_close_reaches_peer() {
        use std::io::Read;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        client.close().unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(server.read(&mut buf).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tokio_stream_close_reaches_peer() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (mut server, _) = listener.accept().await.unwrap();

        client.close().unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
    }
}
