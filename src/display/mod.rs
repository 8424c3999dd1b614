//! # Display Module
//!
//! The render loop: once per refresh interval it snapshots the live state
//! cache, runs the status queries and draws a page.
//!
//! The loop only reads. It never waits on the listeners and never sees an
//! error; every missing value arrives as a placeholder.

pub mod pages;

use chrono::{DateTime, Utc};
use std::io::Write;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::LiveState;
use crate::config::{BatteryConfig, Config, DisplayMode};
use crate::gps::report::{FixReport, SkyReport};
use crate::kiss::protocol::LatestFrameStatus;
use crate::status::battery::{BatteryStatus, FuelGauge};
use crate::status::ntp::{query_ntp, NtpStatus};
use crate::status::system::{SystemProbe, SystemStatus};

/// ANSI clear screen + cursor home
const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// Everything one page render needs, taken at one instant
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub frame: LatestFrameStatus,
    pub fix: FixReport,
    pub sky: SkyReport,
    pub battery: BatteryStatus,
    pub system: SystemStatus,
    pub ntp: NtpStatus,
    pub utc: DateTime<Utc>,
}

/// Render loop state
pub struct Dashboard {
    state: LiveState,
    gauge: Box<dyn FuelGauge>,
    battery: BatteryConfig,
    system: SystemProbe,
    mode: DisplayMode,
    line_width: usize,
    refresh: Duration,
    page: usize,
}

impl Dashboard {
    pub fn new(state: LiveState, gauge: Box<dyn FuelGauge>, config: &Config) -> Self {
        Self {
            state,
            gauge,
            battery: config.battery.clone(),
            system: SystemProbe::default(),
            mode: config.display.mode,
            line_width: config.display.line_width,
            refresh: config.display.refresh_interval(),
            page: 0,
        }
    }

    /// Replace the host probe (tests point it at fixture files)
    pub fn with_system_probe(mut self, probe: SystemProbe) -> Self {
        self.system = probe;
        self
    }

    /// Read the cache and run every status query
    pub async fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            frame: self.state.latest_frame(),
            fix: self.state.fix(),
            sky: self.state.sky(),
            battery: BatteryStatus::query(self.gauge.as_ref(), &self.battery),
            system: self.system.query(),
            ntp: query_ntp().await,
            utc: Utc::now(),
        }
    }

    /// Text for one cycle of the configured surface
    ///
    /// The compact surface shows the next page of the rotation on every call.
    pub fn render(&mut self, snapshot: &DashboardSnapshot) -> String {
        let lines = match self.mode {
            DisplayMode::Console => pages::console_pages(snapshot),
            DisplayMode::Compact => {
                let lines = pages::compact_page(snapshot, self.page, self.line_width);
                self.page = (self.page + 1) % pages::PAGE_COUNT;
                lines
            }
        };

        let mut text = String::from(CLEAR_SCREEN);
        for line in lines {
            text.push_str(&line);
            text.push('\n');
        }
        text
    }

    /// Take a snapshot, render it and write it to `out`
    pub async fn draw<W: Write>(&mut self, out: &mut W) -> std::io::Result<()> {
        let snapshot = self.snapshot().await;
        let text = self.render(&snapshot);
        out.write_all(text.as_bytes())?;
        out.flush()
    }

    /// Redraw every refresh interval until `cancel` fires
    pub async fn run<W: Write>(mut self, mut out: W, cancel: CancellationToken) {
        info!("Rendering {:?} dashboard every {}s", self.mode, self.refresh.as_secs());

        let mut ticker = interval(self.refresh);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.draw(&mut out).await {
                        warn!("Failed to draw dashboard: {}", e);
                    }
                }
            }
        }

        debug!("Render loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::report::FixReport;
    use crate::status::battery::{BatteryReading, MockFuelGauge};

    fn gauge() -> Box<dyn FuelGauge> {
        let mut gauge = MockFuelGauge::new();
        gauge
            .expect_read()
            .returning(|| Ok(BatteryReading { voltage: 3.6, current_ma: 50.0 }));
        Box::new(gauge)
    }

    fn fixture_probe(dir: &std::path::Path) -> SystemProbe {
        std::fs::write(dir.join("temp"), "51000\n").unwrap();
        std::fs::write(dir.join("uptime"), "60.0 10.0\n").unwrap();
        SystemProbe::new(dir.join("temp"), dir)
    }

    #[tokio::test]
    async fn test_snapshot_reads_live_state() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _frames, position) = LiveState::new();
        position.publish_fix(FixReport::with_position(48.0, 14.0, 300.0));

        let dashboard = Dashboard::new(state, gauge(), &Config::default())
            .with_system_probe(fixture_probe(dir.path()));
        let snapshot = dashboard.snapshot().await;

        assert!(snapshot.fix.has_position);
        assert_eq!(snapshot.frame, LatestFrameStatus::NoFrame);
        assert_eq!(snapshot.battery.state.to_string(), "CHG");
        assert!((snapshot.battery.percent - 50.0).abs() < 1e-9);
        assert_eq!(snapshot.system.cpu_temp, "51.0'C");
    }

    #[tokio::test]
    async fn test_console_render_shows_all_pages() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _frames, _position) = LiveState::new();
        let mut dashboard = Dashboard::new(state, gauge(), &Config::default())
            .with_system_probe(fixture_probe(dir.path()));

        let mut out = Vec::new();
        dashboard.draw(&mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with(CLEAR_SCREEN));
        assert!(text.contains("=== Page 1: System & Status ==="));
        assert!(text.contains("=== Page 4: Time & Source ==="));
        assert!(text.contains("APRS: No Frame"));
        assert!(text.contains("GPS: No Fix | Sats: 0"));
    }

    #[tokio::test]
    async fn test_compact_render_rotates_pages() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _frames, _position) = LiveState::new();
        let mut config = Config::default();
        config.display.mode = DisplayMode::Compact;

        let mut dashboard =
            Dashboard::new(state, gauge(), &config).with_system_probe(fixture_probe(dir.path()));
        let snapshot = dashboard.snapshot().await;

        let first = dashboard.render(&snapshot);
        let second = dashboard.render(&snapshot);
        assert!(first.contains("GPS:No Fix Sats:0"));
        assert!(second.contains("Lat:0.00000"));

        dashboard.render(&snapshot);
        dashboard.render(&snapshot);
        assert_eq!(dashboard.render(&snapshot), first, "Rotation wraps after four pages");
    }
}
