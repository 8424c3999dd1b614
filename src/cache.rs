//! # Live State Cache
//!
//! Last-known-good values published by the background listeners and read by
//! the render loop.
//!
//! Each slot is a `tokio::sync::watch` channel holding the whole value. A
//! publish swaps the complete value under the channel lock, so a reader sees
//! either the old report or the new one, never a mix of fields. Every slot is
//! seeded with a placeholder and never reads as empty.
//!
//! Exactly one publisher exists per slot: [`LiveState::new`] hands out the
//! [`FramePublisher`] (KISS listener) and the [`PositionPublisher`]
//! (positioning listener) once.

use std::sync::Arc;
use tokio::sync::watch;

use crate::gps::report::{FixReport, SkyReport};
use crate::kiss::protocol::LatestFrameStatus;

/// Shared slot storage
#[derive(Debug)]
struct Slots {
    frame: watch::Sender<LatestFrameStatus>,
    fix: watch::Sender<FixReport>,
    sky: watch::Sender<SkyReport>,
}

/// Read handle on the live state
///
/// Cheap to clone. Reads never block on the listeners.
#[derive(Debug, Clone)]
pub struct LiveState {
    slots: Arc<Slots>,
}

/// Sole writer of the latest-frame slot
#[derive(Debug)]
pub struct FramePublisher {
    slots: Arc<Slots>,
}

/// Sole writer of the fix and sky slots
#[derive(Debug)]
pub struct PositionPublisher {
    slots: Arc<Slots>,
}

impl LiveState {
    /// Create the cache with placeholder values in every slot
    ///
    /// # Returns
    ///
    /// The read handle plus the two single-writer publishers.
    pub fn new() -> (LiveState, FramePublisher, PositionPublisher) {
        let (frame, _) = watch::channel(LatestFrameStatus::default());
        let (fix, _) = watch::channel(FixReport::default());
        let (sky, _) = watch::channel(SkyReport::default());

        let slots = Arc::new(Slots { frame, fix, sky });

        (
            LiveState { slots: Arc::clone(&slots) },
            FramePublisher { slots: Arc::clone(&slots) },
            PositionPublisher { slots },
        )
    }

    /// Current KISS listener status
    pub fn latest_frame(&self) -> LatestFrameStatus {
        self.slots.frame.borrow().clone()
    }

    /// Current position fix
    pub fn fix(&self) -> FixReport {
        *self.slots.fix.borrow()
    }

    /// Current satellite view
    pub fn sky(&self) -> SkyReport {
        *self.slots.sky.borrow()
    }
}

impl FramePublisher {
    /// Replace the latest-frame status
    pub fn publish(&self, status: LatestFrameStatus) {
        self.slots.frame.send_replace(status);
    }
}

impl PositionPublisher {
    /// Replace the fix report wholesale
    pub fn publish_fix(&self, fix: FixReport) {
        self.slots.fix.send_replace(fix);
    }

    /// Replace the sky report wholesale
    pub fn publish_sky(&self, sky: SkyReport) {
        self.slots.sky.send_replace(sky);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kiss::protocol::DecodedFrame;

    #[test]
    fn test_default_state() {
        let (state, _frames, _position) = LiveState::new();

        let fix = state.fix();
        assert!(!fix.has_position, "No fix before any report");
        assert_eq!(fix.latitude, 0.0);
        assert_eq!(fix.longitude, 0.0);
        assert_eq!(fix.altitude, 0.0);
        assert_eq!(state.sky().used_satellites, 0);
        assert_eq!(state.latest_frame(), LatestFrameStatus::NoFrame);
        assert_eq!(state.latest_frame().to_string(), "APRS: No Frame");
    }

    #[test]
    fn test_last_write_wins() {
        let (state, frames, position) = LiveState::new();

        frames.publish(LatestFrameStatus::ConnectionFailed { reason: "refused".into() });
        let frame = DecodedFrame::new("OE3ABC", "APRS", "x", "OE5ITH");
        frames.publish(LatestFrameStatus::Frame(frame.clone()));
        assert_eq!(state.latest_frame(), LatestFrameStatus::Frame(frame));

        position.publish_sky(SkyReport { used_satellites: 4 });
        position.publish_sky(SkyReport { used_satellites: 9 });
        assert_eq!(state.sky().used_satellites, 9);
    }

    #[test]
    fn test_publish_without_subscribers_is_kept() {
        let (state, _frames, position) = LiveState::new();
        position.publish_fix(FixReport::with_position(48.2, 14.3, 300.0));
        assert!(state.fix().has_position);
    }

    #[test]
    fn test_clones_share_slots() {
        let (state, frames, _position) = LiveState::new();
        let other = state.clone();
        frames.publish(LatestFrameStatus::ConnectionFailed { reason: "x".into() });
        assert_eq!(other.latest_frame().to_string(), "APRS: Connection failed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_snapshots_are_never_torn() {
        let (state, _frames, position) = LiveState::new();

        // Every published fix has lat == lon == alt; a torn read would break that
        let writer = tokio::spawn(async move {
            for i in 1..=5_000u32 {
                let v = i as f64;
                position.publish_fix(FixReport::with_position(v, v, v));
                position.publish_sky(SkyReport { used_satellites: i });
                if i % 64 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        });

        let reader_state = state.clone();
        let reader = tokio::spawn(async move {
            for _ in 0..5_000 {
                let fix = reader_state.fix();
                assert_eq!(fix.latitude, fix.longitude, "Mixed fields in {:?}", fix);
                assert_eq!(fix.latitude, fix.altitude, "Mixed fields in {:?}", fix);
                if fix.latitude > 0.0 {
                    assert!(fix.has_position);
                }
                tokio::task::yield_now().await;
            }
        });

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(state.fix().latitude, 5_000.0);
        assert_eq!(state.sky().used_satellites, 5_000);
    }
}
