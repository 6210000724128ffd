use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, ErrorEvent, Event, PromiseRejectionEvent};

use super::{string_field, ListenerHandle};
use crate::monitor::api::CaptureSink;
use crate::monitor::constants::INTERACTION_EVENTS;
use crate::monitor::error::MonitorResult;
use crate::monitor::interaction::Interaction;
use crate::monitor::interceptor::{Capability, Interceptor};
use crate::monitor::normalizer::{ErrorEventInfo, RejectionReason};
use crate::platform::browser::{element_path, event_path, window};

/// Capture-phase `error` listener on `window`: script errors and, since resource load
/// failures do not bubble, failed `<img>`/`<script>`/`<link>` loads.
#[derive(Default)]
pub struct ErrorEventInterceptor {
    listener: Option<ListenerHandle>,
}

impl Interceptor for ErrorEventInterceptor {
    fn capability(&self) -> Capability {
        Capability::ErrorEvent
    }

    fn install(&mut self, sink: CaptureSink) -> MonitorResult<bool> {
        let Some(window) = window() else {
            return Ok(false);
        };
        let callback = Closure::wrap(Box::new(move |event: Event| {
            sink.capture_error_event(&error_event_info(&event));
        }) as Box<dyn FnMut(Event)>);
        self.listener = Some(ListenerHandle::attach(window.into(), "error", true, callback)?);
        Ok(true)
    }

    fn restore(&mut self) {
        self.listener.take();
    }
}

fn error_event_info(event: &Event) -> ErrorEventInfo {
    let target_path = event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
        .map(|element| element_path(&element))
        .unwrap_or_default();
    match event.dyn_ref::<ErrorEvent>() {
        Some(error) => ErrorEventInfo {
            message: error.message(),
            filename: error.filename(),
            line: error.lineno(),
            column: error.colno(),
            stack: string_field(&error.error(), "stack"),
            target_path,
        },
        None => ErrorEventInfo {
            target_path,
            ..Default::default()
        },
    }
}

#[derive(Default)]
pub struct RejectionInterceptor {
    listener: Option<ListenerHandle>,
}

impl Interceptor for RejectionInterceptor {
    fn capability(&self) -> Capability {
        Capability::UnhandledRejection
    }

    fn install(&mut self, sink: CaptureSink) -> MonitorResult<bool> {
        let Some(window) = window() else {
            return Ok(false);
        };
        let callback = Closure::wrap(Box::new(move |event: Event| {
            let reason = event
                .dyn_ref::<PromiseRejectionEvent>()
                .map(|event| rejection_reason(&event.reason()))
                .unwrap_or(RejectionReason::Other);
            sink.capture_rejection(&reason);
        }) as Box<dyn FnMut(Event)>);
        self.listener = Some(ListenerHandle::attach(
            window.into(),
            "unhandledrejection",
            true,
            callback,
        )?);
        Ok(true)
    }

    fn restore(&mut self) {
        self.listener.take();
    }
}

fn rejection_reason(reason: &JsValue) -> RejectionReason {
    if let Some(text) = reason.as_string() {
        return RejectionReason::Text(text);
    }
    if reason.is_object() {
        return RejectionReason::Object {
            message: string_field(reason, "message"),
            stack: string_field(reason, "stack"),
        };
    }
    RejectionReason::Other
}

/// Remembers the latest user interaction so later errors can name their element.
#[derive(Default)]
pub struct InteractionInterceptor {
    listeners: Vec<ListenerHandle>,
}

impl Interceptor for InteractionInterceptor {
    fn capability(&self) -> Capability {
        Capability::Interaction
    }

    fn install(&mut self, sink: CaptureSink) -> MonitorResult<bool> {
        let Some(document) = window().and_then(|window| window.document()) else {
            return Ok(false);
        };
        for event_type in INTERACTION_EVENTS {
            let sink = sink.clone();
            let callback = Closure::wrap(Box::new(move |event: Event| {
                sink.record_interaction(Interaction {
                    event_type: event.type_(),
                    path: event_path(&event),
                });
            }) as Box<dyn FnMut(Event)>);
            match ListenerHandle::attach(document.clone().into(), event_type, true, callback) {
                Ok(listener) => self.listeners.push(listener),
                Err(err) => {
                    self.listeners.clear();
                    return Err(err);
                }
            }
        }
        Ok(true)
    }

    fn restore(&mut self) {
        self.listeners.clear();
    }
}
