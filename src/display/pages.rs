//! # Page Layouts
//!
//! Pure text layouts of the four dashboard pages. The console surface prints
//! every page with a header; the compact surface shows one page at a time,
//! cut to the width of a small display.

use super::DashboardSnapshot;

/// Number of pages in the rotation
pub const PAGE_COUNT: usize = 4;

/// Width of the separator printed after each console page
const RULE_WIDTH: usize = 50;

/// Cells in the battery gauge bar (5 % each)
const BAR_CELLS: usize = 20;

/// `OK` with a position, `No Fix` otherwise
pub fn gps_status(snapshot: &DashboardSnapshot) -> &'static str {
    if snapshot.fix.has_position {
        "OK"
    } else {
        "No Fix"
    }
}

/// Battery gauge bar, e.g. `██████..............`
pub fn battery_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 5.0).floor() as usize).min(BAR_CELLS);
    format!("{}{}", "█".repeat(filled), ".".repeat(BAR_CELLS - filled))
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", precision, v),
        None => "--".to_string(),
    }
}

/// All four pages for the console surface, each ending in a rule
pub fn console_pages(snapshot: &DashboardSnapshot) -> Vec<String> {
    let s = snapshot;
    let gps = gps_status(s);
    let sats = s.sky.used_satellites;
    let frame = s.frame.to_string();
    let rule = "-".repeat(RULE_WIDTH);

    let mut lines = vec![
        "=== Page 1: System & Status ===".to_string(),
        format!("Temp: {} | Load: {}", s.system.cpu_temp, fmt_opt(s.system.load_average, 2)),
        format!("RAM: {}%", fmt_opt(s.system.memory_percent, 0)),
        format!("GPS: {} | Sats: {}", gps, sats),
        format!(
            "Bat: {:.0}% | {:.2}V {}",
            s.battery.percent, s.battery.voltage, s.battery.state
        ),
        frame.clone(),
        format!("Uptime: {}", s.system.uptime_text()),
        rule.clone(),
    ];

    lines.extend([
        "=== Page 2: GPS & Battery ===".to_string(),
        format!("Lat: {:.5} Lon: {:.5}", s.fix.latitude, s.fix.longitude),
        format!("Alt: {:.0}m | Sats: {}", s.fix.altitude, sats),
        format!("Last: {}", frame.trim()),
        format!("Bat: {:.2}V  {:.0}mA", s.battery.voltage, s.battery.current_ma),
        rule.clone(),
    ]);

    lines.extend([
        "=== Page 3: Battery ===".to_string(),
        format!("Charge: {:.0}% [{}]", s.battery.percent, battery_bar(s.battery.percent)),
        rule.clone(),
    ]);

    lines.extend([
        "=== Page 4: Time & Source ===".to_string(),
        format!("Time src: {} {}", s.ntp.source, s.ntp.refid),
        format!("Offset: {} ms | Jitter: {} ms", s.ntp.offset, s.ntp.jitter),
        format!("SysTime: {} UTC", s.utc.format("%H:%M:%S")),
        format!("GPS: {} | Sats: {}", gps, sats),
        rule,
    ]);

    lines
}

/// One page for the compact surface, every line cut to `width` characters
pub fn compact_page(snapshot: &DashboardSnapshot, page: usize, width: usize) -> Vec<String> {
    let s = snapshot;
    let sats = s.sky.used_satellites;
    let frame = s.frame.to_string();

    let lines = match page % PAGE_COUNT {
        0 => vec![
            format!("T:{} L:{}", s.system.cpu_temp, fmt_opt(s.system.load_average, 1)),
            format!("RAM:{}%", fmt_opt(s.system.memory_percent, 0)),
            format!("GPS:{} Sats:{}", gps_status(s), sats),
            format!("BAT:{:.0}% {:.2}V", s.battery.percent, s.battery.voltage),
            frame,
            format!("Uptime:{}", s.system.uptime_text()),
        ],
        1 => vec![
            format!("Lat:{:.5}", s.fix.latitude),
            format!("Lon:{:.5}", s.fix.longitude),
            format!("Alt:{:.0}m Sats:{}", s.fix.altitude, sats),
            frame,
        ],
        2 => vec![
            "Battery:".to_string(),
            String::new(),
            format!("[{}]", battery_bar(s.battery.percent)),
        ],
        _ => vec![
            format!("SRC:{} REF:{}", s.ntp.source, s.ntp.refid),
            format!("Off:{} Jit:{}", s.ntp.offset, s.ntp.jitter),
            format!("UTC:{}", s.utc.format("%H:%M:%S")),
        ],
    };

    lines
        .into_iter()
        .map(|line| line.chars().take(width).collect())
        .collect()
}
