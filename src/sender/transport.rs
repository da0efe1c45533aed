use super::ack::AckCode;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::debug;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Error talking to server: {0}")]
    Connect(String),
    #[error("Error talking to server: {0}")]
    Send(String),
    #[error("Error talking to server: {0}")]
    Read(String),
}

impl TransportError {
    pub fn code(&self) -> AckCode {
        match self {
            TransportError::Connect(_) | TransportError::Send(_) => AckCode::ConnectFailed,
            TransportError::Read(_) => AckCode::ReadFailed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub server: String,
    pub port: u16,
    pub timeout: Duration,
    /// Local address to bind before connecting.
    pub source_address: Option<IpAddr>,
}

impl TransportConfig {
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
            source_address: None,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

/// Opens single-use TCP connections to the trapper.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    config: TransportConfig,
}

impl TcpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub async fn connect(&self) -> Result<TrapperConnection<TcpStream>, TransportError> {
        let endpoint = self.config.endpoint();
        debug!("Connecting to trapper at {}", endpoint);

        let stream = timeout(self.config.timeout, self.open_stream())
            .await
            .map_err(|_| {
                TransportError::Connect(format!(
                    "connection to {endpoint} timed out after {:?}",
                    self.config.timeout
                ))
            })?
            .map_err(|e| TransportError::Connect(format!("{endpoint}: {e}")))?;

        Ok(TrapperConnection::new(stream, self.config.timeout))
    }

    async fn open_stream(&self) -> io::Result<TcpStream> {
        let target = (self.config.server.as_str(), self.config.port);
        let Some(source) = self.config.source_address else {
            return TcpStream::connect(target).await;
        };

        let mut last_error = None;
        for addr in tokio::net::lookup_host(target).await? {
            if addr.is_ipv4() != source.is_ipv4() {
                continue;
            }
            match connect_from(source, addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no address of the same family as source {source}"),
            )
        }))
    }
}

async fn connect_from(source: IpAddr, addr: SocketAddr) -> io::Result<TcpStream> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.bind(SocketAddr::new(source, 0))?;
    socket.connect(addr).await
}

/// One request/response exchange with the trapper. Every write and read is
/// bounded by the connection timeout.
#[derive(Debug)]
pub struct TrapperConnection<S> {
    stream: S,
    timeout: Duration,
}

impl<S> TrapperConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self { stream, timeout }
    }

    pub async fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let write = async {
            self.stream.write_all(frame).await?;
            self.stream.flush().await?;
            Ok::<(), io::Error>(())
        };

        timeout(self.timeout, write)
            .await
            .map_err(|_| TransportError::Send(format!("write timed out after {:?}", self.timeout)))?
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    /// Read exactly `n` bytes; a peer that closes early is a protocol
    /// violation.
    pub async fn recv_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; n];

        timeout(self.timeout, self.stream.read_exact(&mut buf))
            .await
            .map_err(|_| TransportError::Read(format!("read timed out after {:?}", self.timeout)))?
            .map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => {
                    TransportError::Read(format!("short read, expected {n} bytes"))
                }
                _ => TransportError::Read(e.to_string()),
            })?;

        Ok(buf)
    }

    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Ignoring error while closing trapper connection: {}", e);
        }
    }
}
