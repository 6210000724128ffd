use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::{future_to_promise, JsFuture};

use super::{describe_js_value, function_property, js_error, js_to_string, number_field, string_field};
use crate::monitor::api::CaptureSink;
use crate::monitor::error::MonitorResult;
use crate::monitor::interceptor::{Capability, Interceptor};
use crate::monitor::normalizer::RequestSpan;
use crate::monitor::record::RequestSource;
use crate::platform::browser::window;
use crate::platform::runtime;

type FetchWrapper = Closure<dyn FnMut(JsValue, JsValue) -> JsValue>;

/// Replaces `window.fetch` with a wrapper resolving or rejecting exactly like the
/// original.
#[derive(Default)]
pub struct FetchInterceptor {
    original: Option<Function>,
    wrapper: Option<FetchWrapper>,
}

impl Interceptor for FetchInterceptor {
    fn capability(&self) -> Capability {
        Capability::Fetch
    }

    fn install(&mut self, sink: CaptureSink) -> MonitorResult<bool> {
        let Some(window) = window() else {
            return Ok(false);
        };
        let Some(original) = function_property(&window, "fetch") else {
            return Ok(false);
        };

        let target: JsValue = window.clone().into();
        let delegate = original.clone();
        let wrapper = Closure::wrap(Box::new(move |input: JsValue, init: JsValue| -> JsValue {
            let (method, url) = request_target(&input, &init);
            let span = RequestSpan::start(
                RequestSource::Fetch,
                method.as_deref(),
                url,
                runtime::now_ms(),
            );
            let promise = match delegate.call2(&target, &input, &init) {
                Ok(value) => value.unchecked_into::<Promise>(),
                Err(err) => {
                    sink.capture_outcome(span.fail(describe_js_value(&err), runtime::now_ms()));
                    wasm_bindgen::throw_val(err)
                }
            };
            let sink = sink.clone();
            let pending = JsFuture::from(promise);
            future_to_promise(async move {
                match pending.await {
                    Ok(response) => {
                        let status = number_field(&response, "status") as u16;
                        sink.capture_outcome(span.complete(status, runtime::now_ms()));
                        Ok(response)
                    }
                    Err(err) => {
                        let reason = describe_js_value(&err);
                        sink.capture_outcome(span.fail(reason, runtime::now_ms()));
                        Err(err)
                    }
                }
            })
            .into()
        }) as Box<dyn FnMut(JsValue, JsValue) -> JsValue>);

        Reflect::set(&window, &JsValue::from_str("fetch"), wrapper.as_ref())
            .map_err(|err| js_error("replace fetch", err))?;
        self.original = Some(original);
        self.wrapper = Some(wrapper);
        Ok(true)
    }

    fn restore(&mut self) {
        let Some(original) = self.original.take() else {
            return;
        };
        if let Some(window) = window() {
            if let Err(err) = Reflect::set(&window, &JsValue::from_str("fetch"), &original) {
                log::debug!("failed to restore fetch: {err:?}");
            }
        }
        // Pages may have kept a reference to the wrapper; it must stay callable.
        if let Some(wrapper) = self.wrapper.take() {
            wrapper.forget();
        }
    }
}

/// Method and url of a `fetch(input, init)` call. `input` is a url string, a `URL` or a
/// `Request`; `init.method` wins over the request's own method.
fn request_target(input: &JsValue, init: &JsValue) -> (Option<String>, String) {
    let request_url = string_field(input, "url");
    let url = request_url
        .or_else(|| js_to_string(input))
        .unwrap_or_default();
    let method = string_field(init, "method").or_else(|| string_field(input, "method"));
    (method, url)
}
