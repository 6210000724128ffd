use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::prelude::*;
use web_sys::{AddEventListenerOptions, Event, XmlHttpRequest};

use super::{function_property, js_error, js_to_string, string_field};
use crate::monitor::api::CaptureSink;
use crate::monitor::error::{internal_error, MonitorResult};
use crate::monitor::interceptor::{Capability, Interceptor};
use crate::monitor::normalizer::RequestSpan;
use crate::monitor::record::RequestSource;
use crate::platform::runtime;

#[wasm_bindgen(module = "/src/monitor/browser/wrap_method.js")]
extern "C" {
    fn wrap_method(original: &Function, hook: &JsValue) -> Function;
}

const METHOD_KEY: &str = "__pageMonitorMethod";
const URL_KEY: &str = "__pageMonitorUrl";

type MethodHook = Closure<dyn FnMut(JsValue, Array)>;

struct PatchedMethod {
    name: &'static str,
    original: Function,
    hook: MethodHook,
}

/// Patches `XMLHttpRequest.prototype.open` and `send`.
///
/// `open` stashes the method and url on the instance; `send` starts the clock and
/// registers a one-shot `loadend` listener that records the request.
#[derive(Default)]
pub struct XhrInterceptor {
    prototype: Option<Object>,
    patched: Vec<PatchedMethod>,
}

impl Interceptor for XhrInterceptor {
    fn capability(&self) -> Capability {
        Capability::Xhr
    }

    fn install(&mut self, sink: CaptureSink) -> MonitorResult<bool> {
        let Some(constructor) = function_property(&js_sys::global(), "XMLHttpRequest") else {
            return Ok(false);
        };
        let prototype: Object = Reflect::get(&constructor, &JsValue::from_str("prototype"))
            .map_err(|err| js_error("XMLHttpRequest.prototype", err))?
            .unchecked_into();

        let open_hook = Closure::wrap(Box::new(|xhr: JsValue, args: Array| {
            let method = args.get(0);
            let url = js_to_string(&args.get(1)).unwrap_or_default();
            let _ = Reflect::set(&xhr, &JsValue::from_str(METHOD_KEY), &method);
            let _ = Reflect::set(&xhr, &JsValue::from_str(URL_KEY), &JsValue::from_str(&url));
        }) as Box<dyn FnMut(JsValue, Array)>);

        let send_hook = Closure::wrap(Box::new(move |xhr: JsValue, _args: Array| {
            track_send(&sink, xhr);
        }) as Box<dyn FnMut(JsValue, Array)>);

        self.patch(&prototype, "open", open_hook)?;
        if let Err(err) = self.patch(&prototype, "send", send_hook) {
            self.prototype = Some(prototype);
            self.restore();
            return Err(err);
        }
        self.prototype = Some(prototype);
        Ok(true)
    }

    fn restore(&mut self) {
        let Some(prototype) = self.prototype.take() else {
            return;
        };
        for patched in self.patched.drain(..).rev() {
            if let Err(err) = Reflect::set(
                &prototype,
                &JsValue::from_str(patched.name),
                &patched.original,
            ) {
                log::debug!("failed to restore XMLHttpRequest.{}: {err:?}", patched.name);
            }
            // Requests opened before the restore still call into the hook.
            patched.hook.forget();
        }
    }
}

impl XhrInterceptor {
    fn patch(
        &mut self,
        prototype: &Object,
        name: &'static str,
        hook: MethodHook,
    ) -> MonitorResult<()> {
        let original = function_property(prototype, name)
            .ok_or_else(|| internal_error(format!("XMLHttpRequest.{name} is not a function")))?;
        let wrapped = wrap_method(&original, hook.as_ref());
        Reflect::set(prototype, &JsValue::from_str(name), &wrapped)
            .map_err(|err| js_error("patch XMLHttpRequest", err))?;
        self.patched.push(PatchedMethod {
            name,
            original,
            hook,
        });
        Ok(())
    }
}

fn track_send(sink: &CaptureSink, xhr: JsValue) {
    let Ok(request) = xhr.dyn_into::<XmlHttpRequest>() else {
        return;
    };
    let method = string_field(&request, METHOD_KEY);
    let url = string_field(&request, URL_KEY).unwrap_or_default();
    let span = RequestSpan::start(RequestSource::Xhr, method.as_deref(), url, runtime::now_ms());
    let timeout_ms = sink.timeout().map(|timeout| timeout.as_millis() as i64);

    let sink = sink.clone();
    let target = request.clone();
    let on_loadend = Closure::once_into_js(move |_event: Event| {
        let end = runtime::now_ms();
        let status = target.status().unwrap_or(0);
        let elapsed = end - span.start_time();
        let outcome = if status != 0 {
            span.complete(status, end)
        } else if timeout_ms.is_some_and(|timeout| timeout > 0 && elapsed >= timeout) {
            span.time_out(end)
        } else {
            span.fail(String::new(), end)
        };
        sink.capture_outcome(outcome);
    });

    let options: AddEventListenerOptions = once_options().unchecked_into();
    if let Err(err) = request.add_event_listener_with_callback_and_add_event_listener_options(
        "loadend",
        on_loadend.unchecked_ref(),
        &options,
    ) {
        log::debug!("failed to observe XMLHttpRequest completion: {err:?}");
    }
}

fn once_options() -> Object {
    let options = Object::new();
    let _ = Reflect::set(&options, &JsValue::from_str("once"), &JsValue::TRUE);
    options
}
