use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10;
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(5_000);

/// Long tasks shorter than this are not reported.
pub const LONG_TASK_THRESHOLD_MS: f64 = 100.0;
/// Delay between the `load` event and the paint report, letting LCP settle.
pub const PAINT_REPORT_DELAY: Duration = Duration::from_millis(3_000);

pub const WHITE_SCREEN_SAMPLES: u32 = 9;
pub const WRAPPER_SELECTORS: &[&str] = &["html", "body", "#root"];

/// Pixel URLs beyond this length are likely cut by the browser or an intermediary.
pub const MAX_PIXEL_URL_LENGTH: usize = 8192;

pub const INTERACTION_EVENTS: &[&str] = &["click", "touchstart", "mousedown", "keydown", "mouseover"];

pub const DISABLE_TRANSPORT_ENV: &str = "PAGE_MONITOR_DISABLE_TRANSPORT";
