//! # KISS Listener
//!
//! Keeps a TCP client connection to a KISS server (Direwolf, a TNC bridge,
//! ...) alive for the life of the process and publishes the most recent
//! decoded frame, or a connection failure, into the live state cache.
//!
//! ## State machine
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected   (peer closed / read error)
//!                     |
//!                     '-> Failed -> (fixed backoff) -> Disconnected
//! ```
//!
//! There is no retry cap and no exponential backoff. Errors inside a session
//! are routed by [`DashboardError::disposition`]: a read timeout is retried on
//! the same stream and only bounds how long a stop request can go unnoticed,
//! a rejected frame is dropped, and a lost stream ends the session.

use async_trait::async_trait;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::assembler::FrameAssembler;
use super::decoder::decode_frame;
use super::protocol::{ConnectionState, LatestFrameStatus, KISS_KEEPALIVE_FRAME};
use crate::cache::FramePublisher;
use crate::config::Config;
use crate::error::{DashboardError, Disposition, Result};
use crate::handle::ListenerHandle;

/// Bytes requested per socket read
const READ_CHUNK_SIZE: usize = 1024;

/// Opens the byte stream to the KISS server
///
/// Seam for tests: production uses [`TcpConnector`], tests hand out in-memory
/// streams.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new stream
    ///
    /// # Errors
    ///
    /// Returns `ConnectFailed` if the server cannot be reached in time
    async fn connect(&self) -> Result<Self::Stream>;

    /// Human-readable peer address for logs
    fn address(&self) -> &str;
}

/// TCP connector with a connect timeout
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<TcpStream> {
        let failed = |reason: String| DashboardError::ConnectFailed {
            addr: self.addr.clone(),
            reason,
        };

        match timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(failed(e.to_string())),
            Err(_) => Err(failed(format!(
                "timed out after {} ms",
                self.connect_timeout.as_millis()
            ))),
        }
    }

    fn address(&self) -> &str {
        &self.addr
    }
}

/// Listener tuning
#[derive(Debug, Clone)]
pub struct KissSettings {
    /// Own callsign, substring-matched against decoded sources
    pub station_callsign: String,
    pub read_timeout: Duration,
    pub reconnect_interval: Duration,
    /// `None` disables the keep-alive frame
    pub keepalive_interval: Option<Duration>,
}

impl KissSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            station_callsign: config.station.callsign.clone(),
            read_timeout: config.kiss.read_timeout(),
            reconnect_interval: config.kiss.reconnect_interval(),
            keepalive_interval: config.kiss.keepalive_interval(),
        }
    }
}

/// Background task owning the KISS connection
pub struct KissListener<C> {
    connector: C,
    settings: KissSettings,
    publisher: FramePublisher,
    state: ConnectionState,
    cancel: CancellationToken,
}

impl KissListener<TcpConnector> {
    /// Listener for the KISS server named in the configuration
    pub fn from_config(config: &Config, publisher: FramePublisher) -> Self {
        let connector = TcpConnector::new(config.kiss.address(), config.kiss.connect_timeout());
        Self::new(connector, KissSettings::from_config(config), publisher)
    }
}

impl<C: Connector> KissListener<C> {
    pub fn new(connector: C, settings: KissSettings, publisher: FramePublisher) -> Self {
        Self {
            connector,
            settings,
            publisher,
            state: ConnectionState::Disconnected,
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Token that stops this listener when cancelled
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run on the tokio runtime
    pub fn spawn(self) -> ListenerHandle {
        let cancel = self.cancel.clone();
        let task = tokio::spawn(self.run());
        ListenerHandle::new(cancel, task)
    }

    /// Reconnect loop, returns only once stopped
    pub async fn run(mut self) {
        info!("KISS listener started for {}", self.connector.address());

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.transition(ConnectionState::Connecting);

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.connector.connect() => result,
            };

            match connected {
                Ok(stream) => {
                    self.transition(ConnectionState::Connected);
                    match self.read_frames(stream).await {
                        Ok(()) => debug!("KISS session ended by stop request"),
                        Err(e) => info!("KISS connection to {} ended: {}", self.connector.address(), e),
                    }
                    self.transition(ConnectionState::Disconnected);
                }
                Err(e) => {
                    warn!("{}", e);
                    let reason = match &e {
                        DashboardError::ConnectFailed { reason, .. } => reason.clone(),
                        other => other.to_string(),
                    };
                    self.transition(ConnectionState::Failed(reason.clone()));
                    self.publisher.publish(LatestFrameStatus::ConnectionFailed { reason });

                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.reconnect_interval) => {}
                    }
                    self.transition(ConnectionState::Disconnected);
                }
            }
        }

        self.transition(ConnectionState::Disconnected);
        info!("KISS listener stopped");
    }

    /// Read and decode until the stream ends or a stop is requested
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Stop requested
    /// * `Err(_)` - Stream closed or failed; the caller reconnects
    async fn read_frames(&self, mut stream: C::Stream) -> Result<()> {
        let mut assembler = FrameAssembler::new();
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut last_keepalive = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            if let Some(interval) = self.settings.keepalive_interval {
                if last_keepalive.elapsed() >= interval {
                    self.send_keepalive(&mut stream).await?;
                    last_keepalive = Instant::now();
                }
            }

            let read = match self.read_chunk(&mut stream, &mut chunk).await {
                Ok(read) => read,
                Err(e) if e.disposition() == Disposition::Retry => {
                    trace!("{}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let candidates = assembler.ingest(&chunk[..read])?;
            trace!(
                "Read {} bytes, {} candidate frames, {} bytes pending",
                read,
                candidates.len(),
                assembler.pending().len()
            );

            for candidate in candidates {
                match decode_frame(&candidate, &self.settings.station_callsign) {
                    Ok(frame) => {
                        debug!("Decoded frame: {}", frame);
                        self.publisher.publish(LatestFrameStatus::Frame(frame));
                    }
                    // Back-to-back delimiters yield empty candidates, not worth a log line
                    Err(e) if e.disposition() == Disposition::Placeholder => {
                        if !candidate.is_empty() {
                            debug!("Dropping frame ({} bytes): {}", candidate.len(), e);
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    /// One read bounded by the read timeout
    ///
    /// # Errors
    ///
    /// * `ReadTimeout` - Nothing arrived in time
    /// * `Io` - Socket failed
    async fn read_chunk(&self, stream: &mut C::Stream, chunk: &mut [u8]) -> Result<usize> {
        match timeout(self.settings.read_timeout, stream.read(chunk)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DashboardError::ReadTimeout),
        }
    }

    /// Write the empty keep-alive frame, bounded by the read timeout
    ///
    /// A peer that stops draining the socket would otherwise block the loop
    /// and with it any stop request.
    async fn send_keepalive(&self, stream: &mut C::Stream) -> Result<()> {
        let write = async {
            stream.write_all(&KISS_KEEPALIVE_FRAME).await?;
            stream.flush().await
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Ok(()),
            result = timeout(self.settings.read_timeout, write) => match result {
                Ok(written) => {
                    written?;
                    trace!("Sent KISS keep-alive");
                    Ok(())
                }
                Err(_) => Err(DashboardError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "keep-alive write timed out",
                ))),
            },
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!("KISS connection: {} -> {}", self.state, next);
            self.state = next;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::ScriptedConnector;
    use super::*;
    use crate::cache::LiveState;
    use crate::kiss::decoder::encode_frame;
    use crate::kiss::protocol::{DecodedFrame, KISS_FEND};
    use std::sync::atomic::Ordering;
    use tokio::io::{duplex, DuplexStream};

    fn settings() -> KissSettings {
        KissSettings {
            station_callsign: "OE5ITH".to_string(),
            read_timeout: Duration::from_secs(2),
            reconnect_interval: Duration::from_secs(5),
            keepalive_interval: None,
        }
    }

    fn kiss_wrap(body: &[u8]) -> Vec<u8> {
        let mut framed = vec![KISS_FEND];
        framed.extend_from_slice(body);
        framed.push(KISS_FEND);
        framed
    }

    #[test]
    fn test_new_listener_starts_disconnected() {
        let (_state, frames, _position) = LiveState::new();
        let connector = ScriptedConnector::<DuplexStream>::new(vec![]);
        let listener = KissListener::new(connector, settings(), frames);
        assert_eq!(listener.state(), &ConnectionState::Disconnected);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.station.callsign = "OE5ITH".to_string();
        config.kiss.keepalive_interval_ms = 5000;

        let settings = KissSettings::from_config(&config);
        assert_eq!(settings.station_callsign, "OE5ITH");
        assert_eq!(settings.read_timeout, Duration::from_secs(2));
        assert_eq!(settings.reconnect_interval, Duration::from_secs(5));
        assert_eq!(settings.keepalive_interval, Some(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_retries_every_interval() {
        let (state, frames, _position) = LiveState::new();
        let connector = ScriptedConnector::<DuplexStream>::new(vec![]);
        let attempts = connector.attempts();

        let handle = KissListener::new(connector, settings(), frames).spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(state.latest_frame().to_string(), "APRS: Connection failed");

        tokio::time::sleep(Duration::from_millis(12_400)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3, "One attempt every 5 seconds");
        assert!(!handle.is_finished(), "Listener must keep retrying");

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_decodes_frames_split_across_reads() {
        let (state, frames, _position) = LiveState::new();
        let (client, mut server) = duplex(4096);
        let connector = ScriptedConnector::new(vec![client]);

        let handle = KissListener::new(connector, settings(), frames).spawn();

        let wire = kiss_wrap(&encode_frame("OE5ITH", "APRS", b"!4814.00N/01418.00E>hi"));
        let (head, tail) = wire.split_at(10);
        server.write_all(head).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(state.latest_frame(), LatestFrameStatus::NoFrame, "Half a frame decodes nothing");

        server.write_all(tail).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            state.latest_frame().to_string(),
            "OE5ITH > APRS | !4814.00N/01418.00E>hi"
        );

        server
            .write_all(&kiss_wrap(&encode_frame("OE3ABC", "APRS", b">hello")))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(state.latest_frame().to_string(), "OE3ABC RX");

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frames_leave_status_untouched() {
        let (state, frames, _position) = LiveState::new();
        let (client, mut server) = duplex(4096);
        let connector = ScriptedConnector::new(vec![client]);
        let handle = KissListener::new(connector, settings(), frames).spawn();

        let good = DecodedFrame::new("OE3ABC", "APRS", ">hello", "OE5ITH");
        server
            .write_all(&kiss_wrap(&encode_frame("OE3ABC", "APRS", b">hello")))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(state.latest_frame(), LatestFrameStatus::Frame(good.clone()));

        // Too short, then wrong type byte
        server.write_all(&kiss_wrap(&[0x00, 0x82, 0x84])).await.unwrap();
        let mut command = encode_frame("OE5ITH", "APRS", b"x");
        command[0] = 0x01;
        server.write_all(&kiss_wrap(&command)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(state.latest_frame(), LatestFrameStatus::Frame(good));
        assert!(!handle.is_finished());
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_header_only_frame_leaves_status_untouched() {
        let (state, frames, _position) = LiveState::new();
        let (client, mut server) = duplex(4096);
        let connector = ScriptedConnector::new(vec![client]);
        let handle = KissListener::new(connector, settings(), frames).spawn();

        // Type byte, 16-byte header, trailer, no info field: 19 bytes
        let header_only = encode_frame("OE3ABC", "APRS", b"");
        assert_eq!(header_only.len(), 19);
        server.write_all(&kiss_wrap(&header_only)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(state.latest_frame(), LatestFrameStatus::NoFrame);

        server
            .write_all(&kiss_wrap(&encode_frame("OE3ABC", "APRS", b">")))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(state.latest_frame().to_string(), "OE3ABC RX");

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_close_reconnects() {
        let (state, frames, _position) = LiveState::new();
        let wire = kiss_wrap(&encode_frame("OE5ITH", "APRS", b"bye"));
        let mock = tokio_test::io::Builder::new().read(&wire).build();
        let connector = ScriptedConnector::new(vec![mock]);
        let attempts = connector.attempts();

        let handle = KissListener::new(connector, settings(), frames).spawn();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Frame decoded, stream hit EOF, immediate reconnect was refused
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(state.latest_frame().to_string(), "APRS: Connection failed");
        assert!(!handle.is_finished());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_connected_and_idle() {
        let (_state, frames, _position) = LiveState::new();
        let (client, _server) = duplex(4096);
        let connector = ScriptedConnector::new(vec![client]);

        let listener = KissListener::new(connector, settings(), frames);
        let token = listener.stop_token();
        let task = tokio::spawn(listener.run());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!task.is_finished(), "Read timeouts must not end the session");

        token.cancel();
        tokio::time::timeout(Duration::from_secs(3), task)
            .await
            .expect("Stop should be noticed within one read timeout")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_frames_are_sent() {
        let (_state, frames, _position) = LiveState::new();
        let (client, mut server) = duplex(4096);
        let connector = ScriptedConnector::new(vec![client]);

        let handle = KissListener::new(connector, keepalive_settings(), frames).spawn();

        let mut received = [0u8; 3];
        tokio::time::timeout(Duration::from_secs(10), server.read_exact(&mut received))
            .await
            .expect("Keep-alive should arrive within two read timeouts of the interval")
            .unwrap();
        assert_eq!(received, KISS_KEEPALIVE_FRAME);

        handle.shutdown().await;
    }

    fn keepalive_settings() -> KissSettings {
        let mut settings = settings();
        settings.keepalive_interval = Some(Duration::from_secs(5));
        settings
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_keepalive_write_ends_session() {
        let (state, frames, _position) = LiveState::new();
        // Room for two bytes; the peer never reads, so the 3-byte frame blocks
        let (client, _server) = duplex(2);
        let connector = ScriptedConnector::new(vec![client]);
        let attempts = connector.attempts();

        let handle = KissListener::new(connector, keepalive_settings(), frames).spawn();

        // Keep-alive due at the 6 s read boundary, write gives up 2 s later
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1, "Still blocked in the write");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2, "Session dropped and reconnected");
        assert_eq!(state.latest_frame().to_string(), "APRS: Connection failed");

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_blocked_keepalive_write() {
        let (_state, frames, _position) = LiveState::new();
        let (client, _server) = duplex(2);
        let connector = ScriptedConnector::new(vec![client]);

        let listener = KissListener::new(connector, keepalive_settings(), frames);
        let token = listener.stop_token();
        let task = tokio::spawn(listener.run());

        tokio::time::sleep(Duration::from_millis(6_500)).await;
        assert!(!task.is_finished());

        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), task)
            .await
            .expect("Stop should interrupt a blocked keep-alive write")
            .unwrap();
    }
}
