//! # Positioning Session Listener
//!
//! Drains the positioning daemon session and publishes every fix and sky
//! report into the live state cache, replacing the previous one.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::report::PositionReport;
use super::session::PositioningSession;
use crate::cache::PositionPublisher;
use crate::error::Disposition;
use crate::handle::ListenerHandle;

/// Background task owning one positioning session
pub struct PositionListener<S> {
    session: S,
    publisher: PositionPublisher,
    reconnect_interval: Duration,
    cancel: CancellationToken,
}

impl<S> PositionListener<S>
where
    S: PositioningSession + 'static,
{
    /// Create a listener
    ///
    /// # Arguments
    ///
    /// * `session` - Positioning daemon session, owned for the listener's lifetime
    /// * `publisher` - Writer for the fix and sky slots
    /// * `reconnect_interval` - Pause after the session itself is lost
    pub fn new(session: S, publisher: PositionPublisher, reconnect_interval: Duration) -> Self {
        Self {
            session,
            publisher,
            reconnect_interval,
            cancel: CancellationToken::new(),
        }
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

    /// Main loop, returns only once stopped
    ///
    /// Errors are routed by [`DashboardError::disposition`]: unreadable
    /// reports are skipped, daemon complaints are logged and the next report
    /// is awaited right away. Only a lost session (refused connect, closed or
    /// reset socket) waits `reconnect_interval` before the session reopens.
    ///
    /// [`DashboardError::disposition`]: crate::error::DashboardError::disposition
    pub async fn run(mut self) {
        info!("Positioning listener started");
        let mut reports: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.session.next_report() => result,
            };

            match result {
                Ok(PositionReport::Fix(fix)) => {
                    reports += 1;
                    trace!("Fix report #{}: {:?}", reports, fix);
                    self.publisher.publish_fix(fix);
                }
                Ok(PositionReport::Sky(sky)) => {
                    reports += 1;
                    trace!("Sky report #{}: {:?}", reports, sky);
                    self.publisher.publish_sky(sky);
                }
                Ok(PositionReport::Other) => {}
                Err(e) => match e.disposition() {
                    Disposition::Reconnect => {
                        warn!("Positioning session lost: {}", e);
                        tokio::select! {
                            _ = self.cancel.cancelled() => break,
                            _ = tokio::time::sleep(self.reconnect_interval) => {}
                        }
                    }
                    Disposition::Retry => warn!("{}", e),
                    Disposition::Placeholder => debug!("Skipping positioning report: {}", e),
                },
            }
        }

        info!("Positioning listener stopped after {} reports", reports);
    }
}
