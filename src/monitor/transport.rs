use std::env;
use std::sync::{Arc, LazyLock};

use serde::Serialize;

use crate::logger::Logger;
use crate::monitor::config::MonitorConfig;
use crate::monitor::constants::{DISABLE_TRANSPORT_ENV, MAX_PIXEL_URL_LENGTH};
use crate::monitor::error::{internal_error, transport_error, MonitorResult};
use crate::monitor::queue::QueueCategory;
use crate::monitor::record::{BaseLog, LogRecord};
use crate::platform::runtime;
use crate::util::query::append_query;

static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("@page-monitor/transport"));

/// Outbound envelope: the base log plus either a batch of queued records or one metric.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub base_log: BaseLog,
    #[serde(flatten)]
    pub body: ReportBody,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportBody {
    Batch {
        #[serde(rename = "type")]
        kind: &'static str,
        logs: Vec<LogRecord>,
    },
    Single(LogRecord),
}

impl ReportPayload {
    pub fn batch(base_log: BaseLog, category: QueueCategory, logs: Vec<LogRecord>) -> Self {
        Self {
            base_log,
            body: ReportBody::Batch {
                kind: category.batch_type(),
                logs,
            },
        }
    }

    pub fn single(base_log: BaseLog, record: LogRecord) -> Self {
        Self {
            base_log,
            body: ReportBody::Single(record),
        }
    }

    /// Number of records carried.
    pub fn len(&self) -> usize {
        match &self.body {
            ReportBody::Batch { logs, .. } => logs.len(),
            ReportBody::Single(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> &[LogRecord] {
        match &self.body {
            ReportBody::Batch { logs, .. } => logs,
            ReportBody::Single(record) => std::slice::from_ref(record),
        }
    }

    pub fn to_json(&self) -> MonitorResult<String> {
        serde_json::to_string(self).map_err(|err| internal_error(err.to_string()))
    }
}

/// Fire-and-forget delivery of report payloads.
///
/// Implementations must return without waiting for the network. An `Err` only signals a
/// local failure; the dispatcher logs it and drops the payload.
pub trait Transport: Send + Sync {
    fn send(&self, endpoint: &str, payload: &ReportPayload) -> MonitorResult<()>;
}

/// One-way POST that the host keeps alive across page unload.
pub trait BeaconChannel: Send + Sync {
    fn is_available(&self) -> bool;

    /// Returns `Ok(false)` when the host refused to enqueue the payload.
    fn send_beacon(&self, url: &str, body: &str) -> MonitorResult<bool>;
}

/// GET request for a one-pixel image; works cross-origin without a CORS preflight.
pub trait PixelChannel: Send + Sync {
    fn request_pixel(&self, url: &str) -> MonitorResult<()>;
}

/// Beacon-first transport with a pixel fallback.
pub struct BeaconTransport {
    beacon: Option<Arc<dyn BeaconChannel>>,
    pixel: Arc<dyn PixelChannel>,
    pixel_url: Option<String>,
}

impl BeaconTransport {
    pub fn new(beacon: Option<Arc<dyn BeaconChannel>>, pixel: Arc<dyn PixelChannel>) -> Self {
        Self {
            beacon,
            pixel,
            pixel_url: None,
        }
    }

    /// Sends pixel fallbacks to `url` (the `monitorGif`) instead of the report endpoint.
    pub fn with_pixel_url(mut self, url: Option<String>) -> Self {
        self.pixel_url = url;
        self
    }

    fn try_beacon(&self, endpoint: &str, body: &str) -> bool {
        let Some(beacon) = self.beacon.as_ref().filter(|beacon| beacon.is_available()) else {
            return false;
        };
        match beacon.send_beacon(endpoint, body) {
            Ok(true) => true,
            Ok(false) => {
                LOGGER.debug("beacon refused the payload; falling back to pixel request");
                false
            }
            Err(err) => {
                LOGGER.debug(format!("beacon send failed: {err}"));
                false
            }
        }
    }
}

impl Transport for BeaconTransport {
    fn send(&self, endpoint: &str, payload: &ReportPayload) -> MonitorResult<()> {
        if env::var(DISABLE_TRANSPORT_ENV).is_ok() {
            return Ok(());
        }
        let body = payload.to_json()?;
        if self.try_beacon(endpoint, &body) {
            return Ok(());
        }
        let base = self.pixel_url.as_deref().unwrap_or(endpoint);
        let url = pixel_url(base, &body, runtime::now_ms())?;
        if url.len() > MAX_PIXEL_URL_LENGTH {
            LOGGER.warn(format!(
                "pixel report of {} bytes exceeds {MAX_PIXEL_URL_LENGTH}; it may be truncated",
                url.len()
            ));
        }
        self.pixel.request_pixel(&url)
    }
}

/// `base?data=<encoded json>&t=<ms>`; the timestamp defeats caching of the pixel.
pub fn pixel_url(base: &str, body: &str, timestamp: i64) -> MonitorResult<String> {
    append_query(base, &[("data", body), ("t", &timestamp.to_string())])
        .map_err(|err| transport_error(format!("invalid pixel URL {base}: {err}")))
}

/// Transport for the current host: `navigator.sendBeacon` with an `Image` fallback in the
/// browser, detached `reqwest` calls elsewhere.
pub fn default_transport(config: &MonitorConfig) -> MonitorResult<Arc<dyn Transport>> {
    let pixel_url = config.monitor_gif().map(str::to_string);

    #[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
    {
        let transport = BeaconTransport::new(
            Some(Arc::new(browser::NavigatorBeacon)),
            Arc::new(browser::ImagePixel),
        )
        .with_pixel_url(pixel_url);
        return Ok(Arc::new(transport));
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| internal_error(format!("failed to build HTTP client: {err}")))?;
        let transport = BeaconTransport::new(
            Some(Arc::new(native::HttpBeacon::new(client.clone()))),
            Arc::new(native::HttpPixel::new(client)),
        )
        .with_pixel_url(pixel_url);
        return Ok(Arc::new(transport));
    }

    #[allow(unreachable_code)]
    Err(crate::monitor::error::unsupported(
        "no transport available for this target",
    ))
}

#[cfg(not(target_arch = "wasm32"))]
pub mod native {
    use reqwest::header::CONTENT_TYPE;
    use reqwest::Client;

    use super::{BeaconChannel, PixelChannel};
    use crate::monitor::error::MonitorResult;
    use crate::platform::runtime;

    // Same content type the browser uses for string beacons; keeps requests "simple".
    const BEACON_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

    /// Detached POST on the background runtime.
    #[derive(Clone, Debug)]
    pub struct HttpBeacon {
        client: Client,
    }

    impl HttpBeacon {
        pub fn new(client: Client) -> Self {
            Self { client }
        }
    }

    impl BeaconChannel for HttpBeacon {
        fn is_available(&self) -> bool {
            true
        }

        fn send_beacon(&self, url: &str, body: &str) -> MonitorResult<bool> {
            let request = self
                .client
                .post(url)
                .header(CONTENT_TYPE, BEACON_CONTENT_TYPE)
                .body(body.to_string());
            runtime::spawn_detached(async move {
                match request.send().await {
                    Ok(response) if !response.status().is_success() => {
                        log::debug!("report endpoint responded with {}", response.status());
                    }
                    Ok(_) => {}
                    Err(err) => log::debug!("report beacon failed: {err}"),
                }
            });
            Ok(true)
        }
    }

    /// Detached GET on the background runtime.
    #[derive(Clone, Debug)]
    pub struct HttpPixel {
        client: Client,
    }

    impl HttpPixel {
        pub fn new(client: Client) -> Self {
            Self { client }
        }
    }

    impl PixelChannel for HttpPixel {
        fn request_pixel(&self, url: &str) -> MonitorResult<()> {
            let request = self.client.get(url);
            runtime::spawn_detached(async move {
                if let Err(err) = request.send().await {
                    log::debug!("report pixel failed: {err}");
                }
            });
            Ok(())
        }
    }
}

#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
pub mod browser {
    use wasm_bindgen::JsValue;
    use web_sys::HtmlImageElement;

    use super::{BeaconChannel, PixelChannel};
    use crate::monitor::error::{transport_error, unsupported, MonitorResult};
    use crate::platform::browser::window;

    /// `navigator.sendBeacon` with a string body.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct NavigatorBeacon;

    impl BeaconChannel for NavigatorBeacon {
        fn is_available(&self) -> bool {
            window()
                .map(|window| {
                    let navigator: JsValue = window.navigator().into();
                    js_sys::Reflect::get(&navigator, &JsValue::from_str("sendBeacon"))
                        .map(|value| value.is_function())
                        .unwrap_or(false)
                })
                .unwrap_or(false)
        }

        fn send_beacon(&self, url: &str, body: &str) -> MonitorResult<bool> {
            let window = window().ok_or_else(|| unsupported("window unavailable"))?;
            window
                .navigator()
                .send_beacon_with_opt_str(url, Some(body))
                .map_err(|err| transport_error(format!("sendBeacon threw: {err:?}")))
        }
    }

    /// `new Image().src = url`.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct ImagePixel;

    impl PixelChannel for ImagePixel {
        fn request_pixel(&self, url: &str) -> MonitorResult<()> {
            let image = HtmlImageElement::new()
                .map_err(|err| transport_error(format!("Image() failed: {err:?}")))?;
            image.set_src(url);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::record::{ErrorLog, PaintMetric, PromiseError};
    use crate::test_support::{RecordingBeacon, RecordingPixel};
    use crate::util::query::parse_query_string;

    fn promise_error(message: &str) -> LogRecord {
        LogRecord::Error(ErrorLog::PromiseError(PromiseError {
            message: message.into(),
            filename: None,
            line: None,
            column: None,
            stack: String::new(),
            selector: String::new(),
            timestamp: 1,
        }))
    }

    fn base_log() -> BaseLog {
        BaseLog {
            title: "Shop".into(),
            url: "https://shop.example.com/".into(),
            ..Default::default()
        }
    }

    #[test]
    fn batch_payload_shape() {
        let payload = ReportPayload::batch(
            base_log(),
            QueueCategory::Errors,
            vec![promise_error("a"), promise_error("b")],
        );
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["baseLog"]["title"], "Shop");
        assert_eq!(value["logs"].as_array().unwrap().len(), 2);
        assert_eq!(value["logs"][0]["errorType"], "promiseError");
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn single_payload_flattens_metric_fields() {
        let payload = ReportPayload::single(
            base_log(),
            LogRecord::Paint(PaintMetric {
                first_paint: Some(1.0),
                ..Default::default()
            }),
        );
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "paint");
        assert_eq!(value["FP"], 1.0);
        assert!(value.get("logs").is_none());
    }

    #[test]
    fn beacon_is_preferred_when_available() {
        let beacon = Arc::new(RecordingBeacon::new(true, true));
        let pixel = Arc::new(RecordingPixel::default());
        let transport = BeaconTransport::new(Some(beacon.clone()), pixel.clone());
        let payload = ReportPayload::single(base_log(), promise_error("x"));

        transport.send("https://c.example.com/report", &payload).unwrap();

        let sent = beacon.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://c.example.com/report");
        assert!(sent[0].1.contains("\"promiseError\""));
        assert!(pixel.requested().is_empty());
    }

    #[test]
    fn pixel_fallback_when_beacon_missing_or_refused() {
        let pixel = Arc::new(RecordingPixel::default());
        let transport = BeaconTransport::new(None, pixel.clone())
            .with_pixel_url(Some("https://c.example.com/m.gif".into()));
        let payload = ReportPayload::single(base_log(), promise_error("x"));
        transport.send("https://c.example.com/report", &payload).unwrap();

        let refused = Arc::new(RecordingBeacon::new(true, false));
        let transport = BeaconTransport::new(Some(refused), pixel.clone());
        transport.send("https://c.example.com/report", &payload).unwrap();

        let requested = pixel.requested();
        assert_eq!(requested.len(), 2);
        assert!(requested[0].starts_with("https://c.example.com/m.gif?data="));
        assert!(requested[1].starts_with("https://c.example.com/report?data="));

        let params = parse_query_string(&requested[0]);
        assert_eq!(params[0].0, "data");
        let decoded: serde_json::Value = serde_json::from_str(&params[0].1).unwrap();
        assert_eq!(decoded["message"], "x");
        assert_eq!(params[1].0, "t");
    }

    #[test]
    fn pixel_keeps_payload_when_gif_url_has_fragment() {
        let pixel = Arc::new(RecordingPixel::default());
        let transport = BeaconTransport::new(None, pixel.clone())
            .with_pixel_url(Some("https://c.example.com/m.gif#v2".into()));
        let payload = ReportPayload::single(base_log(), promise_error("kept"));
        transport.send("https://c.example.com/report", &payload).unwrap();

        let requested = pixel.requested();
        assert!(requested[0].starts_with("https://c.example.com/m.gif?data="));
        assert!(requested[0].ends_with("#v2"));
        let params = parse_query_string(&requested[0]);
        let decoded: serde_json::Value = serde_json::from_str(&params[0].1).unwrap();
        assert_eq!(decoded["message"], "kept");
    }

    #[test]
    fn invalid_pixel_base_is_a_transport_error() {
        let pixel = Arc::new(RecordingPixel::default());
        let transport = BeaconTransport::new(None, pixel.clone())
            .with_pixel_url(Some("m.gif".into()));
        let payload = ReportPayload::single(base_log(), promise_error("x"));

        let err = transport
            .send("https://c.example.com/report", &payload)
            .unwrap_err();
        assert_eq!(err.code_str(), "monitor/transport");
        assert!(pixel.requested().is_empty());
    }

    #[test]
    fn unavailable_beacon_is_not_called() {
        let beacon = Arc::new(RecordingBeacon::new(false, true));
        let pixel = Arc::new(RecordingPixel::default());
        let transport = BeaconTransport::new(Some(beacon.clone()), pixel.clone());
        let payload = ReportPayload::single(base_log(), promise_error("x"));
        transport.send("https://c.example.com/report", &payload).unwrap();
        assert!(beacon.sent().is_empty());
        assert_eq!(pixel.requested().len(), 1);
    }
}
