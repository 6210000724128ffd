//! Turns raw browser event shapes into [`LogRecord`](crate::monitor::LogRecord)s.
//!
//! Everything here is host independent: the browser interceptors translate `web-sys`
//! objects into the plain structs below before calling in.

use crate::monitor::constants::{WHITE_SCREEN_SAMPLES, WRAPPER_SELECTORS};
use crate::monitor::interaction::Interaction;
use crate::monitor::record::{
    ErrorLog, JsError, PromiseError, RequestDraft, RequestError, RequestSource, ResourceError,
};
use crate::platform::page::{ElementInfo, PageContext};
use crate::util::stack::{first_frame_location, format_stack};

const FALLBACK_SCRIPT_MESSAGE: &str = "Script error.";
const FALLBACK_PROMISE_MESSAGE: &str = "Promise Error";

/// Payload of a global `error` event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorEventInfo {
    pub message: String,
    pub filename: String,
    pub line: u32,
    pub column: u32,
    /// `event.error.stack`, when an `Error` object was thrown.
    pub stack: Option<String>,
    /// The event target and its ancestors, innermost first. Empty when the target is
    /// the window.
    pub target_path: Vec<ElementInfo>,
}

/// `event.reason` of an `unhandledrejection` event.
#[derive(Clone, Debug, PartialEq)]
pub enum RejectionReason {
    Text(String),
    Object {
        message: Option<String>,
        stack: Option<String>,
    },
    /// Numbers, `undefined` and other primitives.
    Other,
}

/// Classifies a global `error` event as a resource-load failure or a script error.
pub fn normalize_error_event(
    event: &ErrorEventInfo,
    last_interaction: Option<&Interaction>,
    page: &dyn PageContext,
    timestamp: i64,
) -> ErrorLog {
    if let Some(target) = event.target_path.first() {
        if let Some(filename) = target.resource_url() {
            return ErrorLog::ResourceError(ResourceError {
                message: format!("{filename} resource loading fail."),
                filename: filename.to_string(),
                tag_name: target.tag_name.clone(),
                selector: selector_from_path(&event.target_path),
                timestamp,
            });
        }
    }

    let message = if event.message.is_empty() {
        FALLBACK_SCRIPT_MESSAGE.to_string()
    } else {
        event.message.clone()
    };
    ErrorLog::JsError(JsError {
        message,
        filename: event.filename.clone(),
        position: format!("{}:{}", event.line, event.column),
        stack: event.stack.as_deref().map(format_stack).unwrap_or_default(),
        selector: interaction_selector(last_interaction),
        is_white_screen: is_white_screen(page),
        timestamp,
    })
}

pub fn normalize_rejection(
    reason: &RejectionReason,
    last_interaction: Option<&Interaction>,
    timestamp: i64,
) -> ErrorLog {
    let mut error = PromiseError {
        message: FALLBACK_PROMISE_MESSAGE.to_string(),
        filename: None,
        line: None,
        column: None,
        stack: String::new(),
        selector: interaction_selector(last_interaction),
        timestamp,
    };
    match reason {
        RejectionReason::Text(text) => {
            if !text.is_empty() {
                error.message = text.clone();
            }
        }
        RejectionReason::Object { message, stack } => {
            if let Some(message) = message.as_ref().filter(|message| !message.is_empty()) {
                error.message = message.clone();
            }
            if let Some(stack) = stack {
                if let Some(location) = first_frame_location(stack) {
                    error.filename = Some(location.filename);
                    error.line = Some(location.line);
                    error.column = Some(location.column);
                }
                error.stack = format_stack(stack);
            }
        }
        RejectionReason::Other => {}
    }
    ErrorLog::PromiseError(error)
}

fn interaction_selector(interaction: Option<&Interaction>) -> String {
    interaction
        .map(|interaction| selector_from_path(&interaction.path))
        .unwrap_or_default()
}

/// Builds a descendant selector from an innermost-first element path, e.g.
/// `html body div#app button.primary.large`.
pub fn selector_from_path(path: &[ElementInfo]) -> String {
    path.iter()
        .rev()
        .map(path_segment)
        .collect::<Vec<_>>()
        .join(" ")
}

fn path_segment(element: &ElementInfo) -> String {
    let tag = element.lower_tag();
    if !element.id.is_empty() {
        return format!("{tag}#{}", element.id);
    }
    let classes: Vec<&str> = element.classes().collect();
    if classes.is_empty() {
        tag
    } else {
        format!("{tag}.{}", classes.join("."))
    }
}

/// `#id`, else the `.`-joined class list, else the lower-case tag name.
pub fn wrapper_selector(element: &ElementInfo) -> String {
    if !element.id.is_empty() {
        return format!("#{}", element.id);
    }
    let classes: Vec<&str> = element.classes().collect();
    if classes.is_empty() {
        element.lower_tag()
    } else {
        format!(".{}", classes.join("."))
    }
}

/// Samples a horizontal and a vertical line through the viewport centre and reports a
/// blank page when every hit is a bare wrapper (`html`, `body`, `#root`).
///
/// A sample point with no element counts as empty. Hosts without hit-testing never
/// report a white screen.
pub fn is_white_screen(page: &dyn PageContext) -> bool {
    let Some(viewport) = page.viewport() else {
        return false;
    };
    let divisions = f64::from(WHITE_SCREEN_SAMPLES + 1);
    let mut empty_points = 0;
    for i in 1..=WHITE_SCREEN_SAMPLES {
        let step = f64::from(i);
        let horizontal =
            page.element_from_point(viewport.width / divisions * step, viewport.height / 2.0);
        let vertical =
            page.element_from_point(viewport.width / 2.0, viewport.height / divisions * step);
        for hit in [horizontal, vertical] {
            let is_wrapper = hit
                .map(|element| WRAPPER_SELECTORS.contains(&wrapper_selector(&element).as_str()))
                .unwrap_or(true);
            if is_wrapper {
                empty_points += 1;
            }
        }
    }
    empty_points == WHITE_SCREEN_SAMPLES * 2
}

/// Bookkeeping for one in-flight network request.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpan {
    source: RequestSource,
    method: String,
    url: String,
    start_time: i64,
}

/// Records produced when a request completes.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestOutcome {
    pub request: RequestDraft,
    pub error: Option<ErrorLog>,
}

impl RequestSpan {
    pub fn start(
        source: RequestSource,
        method: Option<&str>,
        url: impl Into<String>,
        start_time: i64,
    ) -> Self {
        let method = method
            .filter(|method| !method.is_empty())
            .unwrap_or("GET")
            .to_ascii_uppercase();
        Self {
            source,
            method,
            url: url.into(),
            start_time,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    /// The request produced an HTTP status. Non-2xx statuses also yield a request error.
    pub fn complete(self, status: u16, end_time: i64) -> RequestOutcome {
        let success = (200..300).contains(&status);
        let message = (!success).then(|| {
            if status == 0 {
                format!("request failed: {}", self.url)
            } else {
                format!("request failed with status {status}: {}", self.url)
            }
        });
        self.outcome(status, success, message, end_time)
    }

    /// The request failed before a status was received.
    pub fn fail(self, reason: impl Into<String>, end_time: i64) -> RequestOutcome {
        let reason = reason.into();
        let message = if reason.is_empty() {
            format!("request failed: {}", self.url)
        } else {
            reason
        };
        self.outcome(0, false, Some(message), end_time)
    }

    pub fn time_out(self, end_time: i64) -> RequestOutcome {
        let message = format!("request timed out: {}", self.url);
        self.outcome(0, false, Some(message), end_time)
    }

    fn outcome(
        self,
        status: u16,
        success: bool,
        message: Option<String>,
        end_time: i64,
    ) -> RequestOutcome {
        let duration = end_time.saturating_sub(self.start_time).max(0) as u64;
        let error = message.clone().map(|message| {
            ErrorLog::RequestError(RequestError {
                message,
                source: self.source,
                url: self.url.clone(),
                method: self.method.clone(),
                status,
                timestamp: end_time,
            })
        });
        RequestOutcome {
            request: RequestDraft {
                source: Some(self.source),
                url: Some(self.url),
                method: Some(self.method),
                duration: Some(duration),
                status: Some(status),
                success: Some(success),
                start_time: Some(self.start_time),
                message,
            },
            error,
        }
    }
}
