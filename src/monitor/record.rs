use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::monitor::config::MonitorConfig;
use crate::monitor::error::{invalid_argument, MonitorResult};
use crate::monitor::queue::QueueCategory;
use crate::platform::page::PageContext;
use crate::util::user_agent::UserAgentInfo;

/// A normalized telemetry record.
///
/// Records are immutable once built; the `type` tag and the nested `errorType` tag make up
/// the wire discriminators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LogRecord {
    Error(ErrorLog),
    Request(RequestRecord),
    Paint(PaintMetric),
    Timing(TimingMetric),
    LongTask(LongTaskMetric),
    PageView(PageViewMetric),
}

impl LogRecord {
    /// Queue the record belongs to, or `None` for metrics that are reported immediately.
    pub fn category(&self) -> Option<QueueCategory> {
        match self {
            LogRecord::Error(_) => Some(QueueCategory::Errors),
            LogRecord::Request(_) => Some(QueueCategory::Requests),
            LogRecord::Paint(_)
            | LogRecord::Timing(_)
            | LogRecord::LongTask(_)
            | LogRecord::PageView(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            LogRecord::Error(_) => "error",
            LogRecord::Request(_) => "request",
            LogRecord::Paint(_) => "paint",
            LogRecord::Timing(_) => "timing",
            LogRecord::LongTask(_) => "longTask",
            LogRecord::PageView(_) => "pageView",
        }
    }

    pub fn validate(&self) -> MonitorResult<()> {
        match self {
            LogRecord::Error(error) => error.validate(),
            LogRecord::Request(request) => request.validate(),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "errorType", rename_all = "camelCase")]
pub enum ErrorLog {
    JsError(JsError),
    PromiseError(PromiseError),
    #[serde(rename = "loadResourceError")]
    ResourceError(ResourceError),
    RequestError(RequestError),
}

impl ErrorLog {
    pub fn message(&self) -> &str {
        match self {
            ErrorLog::JsError(error) => &error.message,
            ErrorLog::PromiseError(error) => &error.message,
            ErrorLog::ResourceError(error) => &error.message,
            ErrorLog::RequestError(error) => &error.message,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ErrorLog::JsError(_) => "jsError",
            ErrorLog::PromiseError(_) => "promiseError",
            ErrorLog::ResourceError(_) => "loadResourceError",
            ErrorLog::RequestError(_) => "requestError",
        }
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if self.message().trim().is_empty() {
            return Err(invalid_argument(format!(
                "{} record requires a message",
                self.error_type()
            )));
        }
        match self {
            ErrorLog::ResourceError(error) if error.filename.is_empty() => Err(invalid_argument(
                "loadResourceError record requires a filename",
            )),
            ErrorLog::RequestError(error) if error.url.is_empty() => {
                Err(invalid_argument("requestError record requires a url"))
            }
            _ => Ok(()),
        }
    }
}

impl From<ErrorLog> for LogRecord {
    fn from(error: ErrorLog) -> Self {
        LogRecord::Error(error)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsError {
    pub message: String,
    pub filename: String,
    /// `line:column` of the throw site.
    pub position: String,
    pub stack: String,
    pub selector: String,
    pub is_white_screen: bool,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromiseError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    pub stack: String,
    pub selector: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceError {
    pub message: String,
    pub filename: String,
    pub tag_name: String,
    pub selector: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestError {
    pub message: String,
    pub source: RequestSource,
    pub url: String,
    pub method: String,
    pub status: u16,
    pub timestamp: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestSource {
    Xhr,
    Fetch,
    Custom,
}

impl RequestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestSource::Xhr => "xhr",
            RequestSource::Fetch => "fetch",
            RequestSource::Custom => "custom",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub source: RequestSource,
    pub url: String,
    pub method: String,
    /// Milliseconds between `send` and completion.
    pub duration: u64,
    /// `0` when the request failed before a status was received.
    pub status: u16,
    pub success: bool,
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RequestRecord {
    fn validate(&self) -> MonitorResult<()> {
        if self.url.is_empty() {
            return Err(invalid_argument("request record requires a url"));
        }
        if self.method.is_empty() {
            return Err(invalid_argument("request record requires a method"));
        }
        Ok(())
    }
}

/// Partially populated request observation, as produced by interceptors or host glue.
///
/// [`RequestDraft::into_record`] enforces the required fields.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDraft {
    #[serde(rename = "type")]
    pub source: Option<RequestSource>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub duration: Option<u64>,
    pub status: Option<u16>,
    pub success: Option<bool>,
    pub start_time: Option<i64>,
    pub message: Option<String>,
}

impl RequestDraft {
    pub fn new(source: RequestSource) -> Self {
        Self {
            source: Some(source),
            ..Default::default()
        }
    }

    pub fn into_record(self) -> MonitorResult<RequestRecord> {
        let source = self
            .source
            .ok_or_else(|| invalid_argument("request record requires a type"))?;
        let url = self
            .url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| invalid_argument("request record is missing field `url`"))?;
        let method = self
            .method
            .filter(|method| !method.is_empty())
            .map(|method| method.to_ascii_uppercase())
            .unwrap_or_else(|| "GET".to_string());
        let duration = self
            .duration
            .ok_or_else(|| invalid_argument("request record is missing field `duration`"))?;
        let status = self
            .status
            .ok_or_else(|| invalid_argument("request record is missing field `status`"))?;
        let success = self
            .success
            .ok_or_else(|| invalid_argument("request record is missing field `success`"))?;
        let start_time = self
            .start_time
            .ok_or_else(|| invalid_argument("request record is missing field `startTime`"))?;
        Ok(RequestRecord {
            source,
            url,
            method,
            duration,
            status,
            success,
            start_time,
            message: self.message,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaintMetric {
    #[serde(rename = "FP", default, skip_serializing_if = "Option::is_none")]
    pub first_paint: Option<f64>,
    #[serde(rename = "FCP", default, skip_serializing_if = "Option::is_none")]
    pub first_contentful_paint: Option<f64>,
    #[serde(rename = "FMP", default, skip_serializing_if = "Option::is_none")]
    pub first_meaningful_paint: Option<f64>,
    #[serde(rename = "LCP", default, skip_serializing_if = "Option::is_none")]
    pub largest_contentful_paint: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingMetric {
    #[serde(rename = "DOMContentLoadedTime")]
    pub dom_content_loaded_time: f64,
    pub load_time: f64,
    pub dns_time: f64,
    pub tcp_time: f64,
    pub request_time: f64,
    pub response_time: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongTaskMetric {
    pub start_time: f64,
    pub duration: f64,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

/// One page view: the visitor's screen, language and referrer plus navigation spans.
///
/// Title, url, user agent and app/user ids travel in the [`BaseLog`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewMetric {
    pub referrer: String,
    pub screen_width: f64,
    pub screen_height: f64,
    pub language: String,
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_ready_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_time: Option<f64>,
    /// Host-supplied fields, reported alongside the collected ones.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageViewMetric {
    /// Wire names of the collected fields, plus the record tag.
    pub const FIELDS: &'static [&'static str] = &[
        "type",
        "referrer",
        "screenWidth",
        "screenHeight",
        "language",
        "time",
        "dnsTime",
        "tcpTime",
        "sslTime",
        "requestTime",
        "responseTime",
        "domReadyTime",
        "loadTime",
    ];
}

/// Page and device context attached to every outbound payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseLog {
    pub title: String,
    pub url: String,
    pub user_agent: String,
    pub browser: String,
    pub device: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl BaseLog {
    pub fn collect(page: &dyn PageContext, config: &MonitorConfig) -> Self {
        let user_agent = page.user_agent();
        let parsed = UserAgentInfo::parse(&user_agent);
        Self {
            title: page.title(),
            url: page.url(),
            browser: parsed.browser_label(),
            device: parsed.device_label(),
            os: parsed.os_label(),
            user_agent,
            app_id: config.app_id().map(str::to_string),
            user_id: config.user_id().map(str::to_string),
        }
    }
}
