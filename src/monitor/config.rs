use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::monitor::constants::{DEFAULT_MAX_QUEUE_SIZE, DEFAULT_SEND_INTERVAL, DEFAULT_TIMEOUT};
use crate::monitor::error::{invalid_argument, MonitorResult};

/// Construction-time settings for a [`Monitor`](crate::monitor::Monitor).
///
/// The configuration is fixed for the lifetime of the monitor; build a new monitor to
/// change it.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorConfig {
    report_url: String,
    monitor_gif: Option<String>,
    timeout: Duration,
    max_queue_size: usize,
    send_interval: Duration,
    app_id: Option<String>,
    user_id: Option<String>,
}

impl MonitorConfig {
    pub fn new(report_url: impl Into<String>) -> Self {
        Self {
            report_url: report_url.into(),
            monitor_gif: None,
            timeout: DEFAULT_TIMEOUT,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            send_interval: DEFAULT_SEND_INTERVAL,
            app_id: None,
            user_id: None,
        }
    }

    /// Parses a JSON object using the camelCase keys of the browser API
    /// (`reportUrl`, `monitorGif`, `timeoutDuration`, `maxQueueSize`, `sendInterval`).
    pub fn from_json(raw: &str) -> MonitorResult<Self> {
        let parsed: RawConfig = serde_json::from_str(raw)
            .map_err(|err| invalid_argument(format!("invalid monitor config: {err}")))?;
        Self::from_raw(parsed)
    }

    pub fn from_value(value: serde_json::Value) -> MonitorResult<Self> {
        let parsed: RawConfig = serde_json::from_value(value)
            .map_err(|err| invalid_argument(format!("invalid monitor config: {err}")))?;
        Self::from_raw(parsed)
    }

    fn from_raw(raw: RawConfig) -> MonitorResult<Self> {
        let mut config = MonitorConfig::new(raw.report_url);
        config.monitor_gif = raw.monitor_gif;
        config.app_id = raw.app_id;
        config.user_id = raw.user_id;
        if let Some(ms) = raw.timeout_duration {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        if let Some(size) = raw.max_queue_size {
            config = config.with_max_queue_size(size);
        }
        if let Some(ms) = raw.send_interval {
            config = config.with_send_interval(Duration::from_millis(ms));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_monitor_gif(mut self, url: impl Into<String>) -> Self {
        self.monitor_gif = Some(url.into());
        self
    }

    /// A zero timeout falls back to [`DEFAULT_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() { DEFAULT_TIMEOUT } else { timeout };
        self
    }

    /// A zero size falls back to [`DEFAULT_MAX_QUEUE_SIZE`].
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = if size == 0 { DEFAULT_MAX_QUEUE_SIZE } else { size };
        self
    }

    /// A zero interval falls back to [`DEFAULT_SEND_INTERVAL`].
    pub fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = if interval.is_zero() {
            DEFAULT_SEND_INTERVAL
        } else {
            interval
        };
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Checks the invariants the dispatcher relies on.
    pub fn validate(&self) -> MonitorResult<()> {
        if self.report_url.trim().is_empty() {
            return Err(invalid_argument("reportUrl must not be empty"));
        }
        Url::parse(&self.report_url)
            .map_err(|err| invalid_argument(format!("reportUrl is not a valid URL: {err}")))?;
        if let Some(gif) = &self.monitor_gif {
            Url::parse(gif)
                .map_err(|err| invalid_argument(format!("monitorGif is not a valid URL: {err}")))?;
        }
        Ok(())
    }

    pub fn report_url(&self) -> &str {
        &self.report_url
    }

    pub fn monitor_gif(&self) -> Option<&str> {
        self.monitor_gif.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    pub fn send_interval(&self) -> Duration {
        self.send_interval
    }

    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    report_url: String,
    #[serde(default)]
    monitor_gif: Option<String>,
    #[serde(default)]
    timeout_duration: Option<u64>,
    #[serde(default)]
    max_queue_size: Option<usize>,
    #[serde(default)]
    send_interval: Option<u64>,
    #[serde(default)]
    app_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}
