//! # NTP Source Inspection
//!
//! Asks the local ntpd which peer it is synchronised to (`ntpq -p`).

use tokio::process::Command;
use tracing::debug;

/// Tally codes of peers that take part in time selection
const SELECTED_TALLY: [char; 5] = ['*', '+', '#', 'x', 'o'];

/// Time source summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtpStatus {
    /// Peer name with its tally code, e.g. `*SHM(0)`
    pub source: String,
    pub refid: String,
    /// Offset in ms, as printed by ntpq
    pub offset: String,
    /// Jitter in ms, as printed by ntpq
    pub jitter: String,
}

impl NtpStatus {
    fn new(source: &str, refid: &str, offset: &str, jitter: &str) -> Self {
        Self {
            source: source.to_string(),
            refid: refid.to_string(),
            offset: offset.to_string(),
            jitter: jitter.to_string(),
        }
    }

    /// ntpq ran but no peer is selected
    pub fn no_sync() -> Self {
        Self::new("NoSync", "-", "-", "-")
    }

    /// ntpq could not be run
    pub fn unavailable() -> Self {
        Self::new("NTP", "?", "?", "?")
    }
}

/// Pick the first selected peer from `ntpq -p` output
///
/// Columns: remote refid st t when poll reach delay offset jitter
pub fn parse_ntpq_peers(output: &str) -> NtpStatus {
    for line in output.lines() {
        if !line.starts_with(&SELECTED_TALLY[..]) {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 10 {
            return NtpStatus::new(parts[0], parts[1], parts[8], parts[9]);
        }
        if parts.len() >= 2 {
            return NtpStatus::new(parts[0], parts[1], "?", "?");
        }
    }

    NtpStatus::no_sync()
}

/// Run `ntpq -p` and summarise the selected peer
///
/// Never fails: a missing binary or non-zero exit yields
/// [`NtpStatus::unavailable`].
pub async fn query_ntp() -> NtpStatus {
    match Command::new("ntpq").arg("-p").output().await {
        Ok(output) if output.status.success() => {
            parse_ntpq_peers(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            debug!("ntpq exited with {}", output.status);
            NtpStatus::unavailable()
        }
        Err(e) => {
            debug!("ntpq could not be run: {}", e);
            NtpStatus::unavailable()
        }
    }
}
