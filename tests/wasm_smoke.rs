#![cfg(all(target_arch = "wasm32", feature = "wasm-web"))]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gloo_timers::future::TimeoutFuture;
use js_sys::{Object, Promise, Reflect};
use page_monitor::monitor::{
    is_claimed, Capability, ErrorLog, LogRecord, Monitor, MonitorConfig, MonitorResult,
    ReportPayload, RequestError, RequestRecord, Transport,
};
use page_monitor::platform::browser::BrowserPage;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::{HtmlImageElement, XmlHttpRequest};

wasm_bindgen_test_configure!(run_in_browser);

#[derive(Default)]
struct CollectingTransport {
    payloads: Mutex<Vec<ReportPayload>>,
}

impl CollectingTransport {
    fn records(&self) -> Vec<LogRecord> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .flat_map(|payload| payload.records().to_vec())
            .collect()
    }

    fn requests_to(&self, fragment: &str) -> Vec<RequestRecord> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                LogRecord::Request(request) if request.url.contains(fragment) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn request_errors_to(&self, fragment: &str) -> Vec<RequestError> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                LogRecord::Error(ErrorLog::RequestError(error)) if error.url.contains(fragment) => {
                    Some(error)
                }
                _ => None,
            })
            .collect()
    }
}

impl Transport for CollectingTransport {
    fn send(&self, _endpoint: &str, payload: &ReportPayload) -> MonitorResult<()> {
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

fn monitor() -> (Monitor, Arc<CollectingTransport>) {
    let transport = Arc::new(CollectingTransport::default());
    let config = MonitorConfig::new("https://collect.example.com/report")
        .with_send_interval(Duration::from_secs(3600));
    let monitor = Monitor::with_parts(config, transport.clone(), Arc::new(BrowserPage)).unwrap();
    for interceptor in page_monitor::monitor::default_interceptors() {
        monitor.add_interceptor(interceptor);
    }
    (monitor, transport)
}

#[wasm_bindgen_test]
fn destroy_restores_fetch() {
    let window = web_sys::window().unwrap();
    let original = js_sys::Reflect::get(&window, &JsValue::from_str("fetch")).unwrap();

    let (monitor, _transport) = monitor();
    monitor.init().unwrap();
    assert!(is_claimed(Capability::Fetch));
    let installed = monitor.installed_capabilities();
    assert!(installed.contains(&Capability::Paint));
    assert!(installed.contains(&Capability::Timing));
    let patched = js_sys::Reflect::get(&window, &JsValue::from_str("fetch")).unwrap();
    assert!(!js_sys::Object::is(&original, &patched));

    monitor.destroy();
    monitor.destroy();
    let restored = js_sys::Reflect::get(&window, &JsValue::from_str("fetch")).unwrap();
    assert!(js_sys::Object::is(&original, &restored));
    assert!(!is_claimed(Capability::Fetch));
}

#[wasm_bindgen_test(async)]
async fn failed_fetch_is_recorded_and_rejected() {
    let (monitor, transport) = monitor();
    monitor.init().unwrap();

    let window = web_sys::window().unwrap();
    let promise = window.fetch_with_str("http://127.0.0.1:9/unreachable");
    assert!(JsFuture::from(promise).await.is_err());

    monitor.flush();
    let failed_requests = transport
        .records()
        .into_iter()
        .filter(|record| {
            matches!(record, LogRecord::Error(ErrorLog::RequestError(error))
                if error.url.contains("/unreachable"))
        })
        .count();
    assert_eq!(failed_requests, 1);
    monitor.destroy();
}

#[wasm_bindgen_test]
fn dispatched_error_event_is_captured() {
    let (monitor, transport) = monitor();
    monitor.init().unwrap();

    let window = web_sys::window().unwrap();
    let event = web_sys::ErrorEvent::new("error").unwrap();
    window.dispatch_event(&event).unwrap();

    monitor.flush();
    let messages: Vec<_> = transport
        .records()
        .into_iter()
        .filter_map(|record| match record {
            LogRecord::Error(ErrorLog::JsError(error)) => Some(error.message),
            _ => None,
        })
        .collect();
    assert_eq!(messages, ["Script error."]);
    monitor.destroy();
}

fn xhr_prototype_method(name: &str) -> JsValue {
    let constructor = Reflect::get(&js_sys::global(), &JsValue::from_str("XMLHttpRequest")).unwrap();
    let prototype = Reflect::get(&constructor, &JsValue::from_str("prototype")).unwrap();
    Reflect::get(&prototype, &JsValue::from_str(name)).unwrap()
}

/// Sends a GET and waits for `loadend`. The handler is attached after `send`, so it
/// runs after the monitor's own listener.
async fn xhr_get(url: &str) -> XmlHttpRequest {
    let xhr = XmlHttpRequest::new().unwrap();
    xhr.open("GET", url).unwrap();
    xhr.send().unwrap();
    let done = Promise::new(&mut |resolve, _reject| {
        xhr.set_onloadend(Some(&resolve));
    });
    JsFuture::from(done).await.unwrap();
    xhr
}

#[wasm_bindgen_test]
fn destroy_restores_xhr_methods() {
    let open = xhr_prototype_method("open");
    let send = xhr_prototype_method("send");

    let (monitor, _transport) = monitor();
    monitor.init().unwrap();
    assert!(is_claimed(Capability::Xhr));
    assert!(!Object::is(&open, &xhr_prototype_method("open")));
    assert!(!Object::is(&send, &xhr_prototype_method("send")));

    monitor.destroy();
    assert!(Object::is(&open, &xhr_prototype_method("open")));
    assert!(Object::is(&send, &xhr_prototype_method("send")));
    assert!(!is_claimed(Capability::Xhr));
}

#[wasm_bindgen_test(async)]
async fn failed_xhr_is_recorded_with_status_zero() {
    let (monitor, transport) = monitor();
    monitor.init().unwrap();

    let xhr = xhr_get("http://127.0.0.1:9/unreachable-xhr").await;
    assert_eq!(xhr.status().unwrap(), 0);

    monitor.flush();
    let requests = transport.requests_to("/unreachable-xhr");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].status, 0);
    assert!(!requests[0].success);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(transport.request_errors_to("/unreachable-xhr").len(), 1);
    monitor.destroy();
}

#[wasm_bindgen_test(async)]
async fn non_success_xhr_status_is_recorded() {
    let (monitor, transport) = monitor();
    monitor.init().unwrap();

    let xhr = xhr_get("/__page_monitor_missing__").await;
    let status = xhr.status().unwrap();
    assert!(status >= 400, "unexpected status {status}");

    monitor.flush();
    let requests = transport.requests_to("/__page_monitor_missing__");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].status, status);
    assert!(!requests[0].success);
    let errors = transport.request_errors_to("/__page_monitor_missing__");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].status, status);
    monitor.destroy();
}

#[wasm_bindgen_test(async)]
async fn failed_image_load_is_a_resource_error() {
    let (monitor, transport) = monitor();
    monitor.init().unwrap();

    let document = web_sys::window().unwrap().document().unwrap();
    let image: HtmlImageElement = document.create_element("img").unwrap().unchecked_into();
    let failed = Promise::new(&mut |resolve, _reject| {
        image.set_onerror(Some(&resolve));
    });
    image.set_src("http://127.0.0.1:9/missing.png");
    document.body().unwrap().append_child(&image).unwrap();
    JsFuture::from(failed).await.unwrap();
    image.remove();

    monitor.flush();
    let resources: Vec<_> = transport
        .records()
        .into_iter()
        .filter_map(|record| match record {
            LogRecord::Error(ErrorLog::ResourceError(error)) => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].tag_name, "IMG");
    assert_eq!(resources[0].filename, "http://127.0.0.1:9/missing.png");
    assert_eq!(
        resources[0].message,
        "http://127.0.0.1:9/missing.png resource loading fail."
    );
    monitor.destroy();
}

#[wasm_bindgen_test(async)]
async fn unhandled_rejection_is_a_promise_error() {
    let (monitor, transport) = monitor();
    monitor.init().unwrap();

    let reason: JsValue = js_sys::Error::new("checkout failed").into();
    let _rejected = Promise::reject(&reason);
    TimeoutFuture::new(50).await;

    monitor.flush();
    let messages: Vec<_> = transport
        .records()
        .into_iter()
        .filter_map(|record| match record {
            LogRecord::Error(ErrorLog::PromiseError(error)) => Some(error.message),
            _ => None,
        })
        .collect();
    assert_eq!(messages, ["checkout failed"]);
    monitor.destroy();
}
