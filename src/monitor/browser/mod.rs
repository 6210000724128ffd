//! Browser interceptors, built on `web-sys`.

mod events;
mod fetch;
mod performance;
mod xhr;

use js_sys::{Function, Object, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Event, EventTarget};

use crate::monitor::error::{internal_error, MonitorError, MonitorResult};
use crate::monitor::interceptor::BoxedInterceptor;

pub use events::{ErrorEventInterceptor, InteractionInterceptor, RejectionInterceptor};
pub use fetch::FetchInterceptor;
pub use performance::{LongTaskInterceptor, PaintInterceptor, TimingInterceptor};
pub use xhr::XhrInterceptor;

/// Every browser capability, in install order.
pub fn default_interceptors() -> Vec<BoxedInterceptor> {
    vec![
        Box::new(InteractionInterceptor::default()),
        Box::new(ErrorEventInterceptor::default()),
        Box::new(RejectionInterceptor::default()),
        Box::new(XhrInterceptor::default()),
        Box::new(FetchInterceptor::default()),
        Box::new(PaintInterceptor::default()),
        Box::new(TimingInterceptor::default()),
        Box::new(LongTaskInterceptor::default()),
    ]
}

pub(crate) fn js_error(context: &str, err: JsValue) -> MonitorError {
    internal_error(format!("{context}: {}", describe_js_value(&err)))
}

pub(crate) fn describe_js_value(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(message) = string_field(value, "message") {
        return message;
    }
    if value.is_object() {
        if let Some(text) = value.unchecked_ref::<Object>().to_string().as_string() {
            return text;
        }
    }
    format!("{value:?}")
}

pub(crate) fn string_field(target: &JsValue, name: &str) -> Option<String> {
    if !target.is_object() {
        return None;
    }
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.as_string())
}

pub(crate) fn number_field(target: &JsValue, name: &str) -> f64 {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.as_f64())
        .unwrap_or(0.0)
}

/// `String(value)` for strings and objects with a `toString` (URL, Request).
pub(crate) fn js_to_string(value: &JsValue) -> Option<String> {
    if let Some(text) = value.as_string() {
        return Some(text);
    }
    if value.is_object() {
        return value.unchecked_ref::<Object>().to_string().as_string();
    }
    None
}

/// Looks up a callable global property, e.g. `fetch` on `window`.
pub(crate) fn function_property(target: &JsValue, name: &str) -> Option<Function> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
}

/// An attached DOM event listener; detached on drop.
pub(crate) struct ListenerHandle {
    target: EventTarget,
    event: String,
    capture: bool,
    callback: Closure<dyn FnMut(Event)>,
}

impl ListenerHandle {
    pub(crate) fn attach(
        target: EventTarget,
        event: &str,
        capture: bool,
        callback: Closure<dyn FnMut(Event)>,
    ) -> MonitorResult<Self> {
        target
            .add_event_listener_with_callback_and_bool(
                event,
                callback.as_ref().unchecked_ref(),
                capture,
            )
            .map_err(|err| js_error("addEventListener", err))?;
        Ok(Self {
            target,
            event: event.to_string(),
            capture,
            callback,
        })
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Err(err) = self.target.remove_event_listener_with_callback_and_bool(
            &self.event,
            self.callback.as_ref().unchecked_ref(),
            self.capture,
        ) {
            log::debug!("removeEventListener({}) failed: {err:?}", self.event);
        }
    }
}
