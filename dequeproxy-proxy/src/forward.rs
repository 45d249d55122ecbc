//! Forwarding of delivered connections to the upstream.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::error::ProxyError;

/// Connects delivered clients to the upstream and relays bytes both ways
#[derive(Debug, Clone)]
pub struct Forwarder {
    upstream: String,
    connect_timeout: Duration,
}

impl Forwarder {
    pub fn new(upstream: impl Into<String>, connect_timeout: Duration) -> Self {
        Self { upstream: upstream.into(), connect_timeout }
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Relay `client` to the upstream until either side closes
    ///
    /// Returns the bytes copied client to upstream and upstream to client.
    #[instrument(skip(self, client), fields(upstream = %self.upstream))]
    pub async fn forward(&self, mut client: TcpStream) -> Result<(u64, u64), ProxyError> {
        let mut upstream = self.connect().await?;
        let (sent, received) = tokio::io::copy_bidirectional(&mut client, &mut upstream).await?;
        debug!(sent, received, "Connection relayed");
        Ok((sent, received))
    }

    async fn connect(&self) -> Result<TcpStream, ProxyError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.upstream)).await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => {
                Err(ProxyError::UpstreamConnection { upstream: self.upstream.clone(), source })
            }
            Err(_) => Err(ProxyError::UpstreamTimeout {
                upstream: self.upstream.clone(),
                timeout: self.connect_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn echo_upstream() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = stream.split();
            let _ = tokio::io::copy(&mut reader, &mut writer).await;
        });
        addr
    }

    async fn client_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).await.unwrap();
        let (accepted, _) = listener.accept().await.unwrap();
        (client, accepted)
    }

    #[tokio::test]
    async fn test_forward_relays_both_ways() {
        let upstream = echo_upstream().await;
        let forwarder = Forwarder::new(upstream, Duration::from_secs(1));
        let (mut client, accepted) = client_pair().await;

        let relay = tokio::spawn(async move { forwarder.forward(accepted).await });

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        client.shutdown().await.unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let (sent, received) = relay.await.unwrap().unwrap();
        assert_eq!(sent, 4);
        assert_eq!(received, 4);
    }

    #[tokio::test]
    async fn test_unreachable_upstream() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let forwarder = Forwarder::new(addr, Duration::from_secs(1));
        let (_client, accepted) = client_pair().await;

        let err = forwarder.forward(accepted).await.unwrap_err();
        assert!(err.is_upstream_unavailable(), "unexpected error: {err}");
    }
}
