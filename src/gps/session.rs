//! # Positioning Daemon Session
//!
//! Trait abstraction over the positioning daemon, plus the gpsd
//! implementation (JSON watch mode over TCP).

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::report::{parse_report, PositionReport};
use crate::error::{DashboardError, Result};

/// Command that puts gpsd into JSON streaming mode
pub const GPSD_WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// Source of discriminated positioning reports
#[async_trait]
pub trait PositioningSession: Send {
    /// Wait for the next report
    ///
    /// # Errors
    ///
    /// `StreamClosed` / `ConnectFailed` when the session is gone (the next call
    /// may reopen it); any other error concerns a single report.
    async fn next_report(&mut self) -> Result<PositionReport>;
}

/// gpsd client session
///
/// Connects on first use and again after the daemon closes the socket.
pub struct GpsdSession {
    addr: String,
    reader: Option<BufReader<TcpStream>>,
    line: String,
}

impl std::fmt::Debug for GpsdSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpsdSession")
            .field("addr", &self.addr)
            .field("connected", &self.reader.is_some())
            .finish_non_exhaustive()
    }
}

impl GpsdSession {
    /// Create a session for the gpsd socket at `addr` (`host:port`)
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            reader: None,
            line: String::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.addr
    }

    async fn open(&self) -> Result<BufReader<TcpStream>> {
        let mut stream = TcpStream::connect(&self.addr).await.map_err(|e| {
            DashboardError::ConnectFailed {
                addr: self.addr.clone(),
                reason: e.to_string(),
            }
        })?;

        stream.write_all(GPSD_WATCH_COMMAND).await?;
        stream.flush().await?;

        info!("Watching gpsd at {}", self.addr);
        Ok(BufReader::new(stream))
    }
}

#[async_trait]
impl PositioningSession for GpsdSession {
    async fn next_report(&mut self) -> Result<PositionReport> {
        if self.reader.is_none() {
            self.reader = Some(self.open().await?);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Err(DashboardError::StreamClosed);
        };

        self.line.clear();
        let read = match reader.read_line(&mut self.line).await {
            Ok(read) => read,
            Err(e) => {
                self.reader = None;
                return Err(e.into());
            }
        };

        if read == 0 {
            debug!("gpsd at {} closed the session", self.addr);
            self.reader = None;
            return Err(DashboardError::StreamClosed);
        }

        parse_report(&self.line)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::report::SkyReport;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_session_sends_watch_and_reads_reports() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut command = vec![0u8; GPSD_WATCH_COMMAND.len()];
            socket.read_exact(&mut command).await.unwrap();
            socket
                .write_all(b"{\"class\":\"VERSION\",\"release\":\"3.22\"}\n{\"class\":\"SKY\",\"uSat\":6}\n")
                .await
                .unwrap();
            command
        });

        let mut session = GpsdSession::new(addr);
        assert_eq!(session.next_report().await.unwrap(), PositionReport::Other);
        assert_eq!(
            session.next_report().await.unwrap(),
            PositionReport::Sky(SkyReport { used_satellites: 6 })
        );

        let command = server.await.unwrap();
        assert_eq!(command, GPSD_WATCH_COMMAND);

        // Server task dropped the socket
        assert!(matches!(
            session.next_report().await,
            Err(DashboardError::StreamClosed)
        ));
    }

    #[tokio::test]
    async fn test_session_keeps_stream_after_daemon_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut command = vec![0u8; GPSD_WATCH_COMMAND.len()];
            socket.read_exact(&mut command).await.unwrap();
            socket
                .write_all(b"{\"class\":\"ERROR\",\"message\":\"Unrecognized request\"}\n{\"class\":\"SKY\",\"uSat\":4}\n")
                .await
                .unwrap();
        });

        let mut session = GpsdSession::new(addr);
        match session.next_report().await {
            Err(e @ DashboardError::Session(_)) => {
                assert_eq!(e.disposition(), crate::error::Disposition::Retry)
            }
            other => panic!("Expected session error, got: {:?}", other),
        }
        assert_eq!(
            session.next_report().await.unwrap(),
            PositionReport::Sky(SkyReport { used_satellites: 4 }),
            "Same stream continues after an ERROR report"
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_session_connect_refused() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut session = GpsdSession::new(addr);
        match session.next_report().await {
            Err(DashboardError::ConnectFailed { .. }) => {}
            other => panic!("Expected ConnectFailed, got: {:?}", other),
        }
    }
}
