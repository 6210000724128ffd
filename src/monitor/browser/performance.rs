use std::cell::{Cell, RefCell};
use std::rc::Rc;

use js_sys::{Array, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Event, PerformanceEntry, PerformanceObserver, PerformanceObserverEntryList,
    PerformanceObserverInit,
};

use super::{function_property, js_error, ListenerHandle};
use crate::monitor::api::CaptureSink;
use crate::monitor::constants::PAINT_REPORT_DELAY;
use crate::monitor::error::MonitorResult;
use crate::monitor::interceptor::{Capability, Interceptor};
use crate::monitor::metrics::{long_task_metric, ObserverControl, PaintTimings};
use crate::monitor::record::LogRecord;
use crate::platform::browser::{has_global, navigation_timing, window};
use crate::platform::runtime;

type EntryCallback = Closure<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>;

/// A connected `PerformanceObserver` and the callback it invokes.
struct ObserverHandle {
    observer: PerformanceObserver,
    _callback: EntryCallback,
}

impl ObserverHandle {
    /// Observes `entry_type` with buffered entries replayed. `on_entry` decides whether
    /// the observer stays connected.
    fn observe<F>(entry_type: &str, mut on_entry: F) -> MonitorResult<Self>
    where
        F: FnMut(&PerformanceEntry) -> ObserverControl + 'static,
    {
        let callback = Closure::wrap(Box::new(
            move |list: PerformanceObserverEntryList, observer: PerformanceObserver| {
                let entries = list.get_entries();
                for idx in 0..entries.length() {
                    let Ok(entry) = entries.get(idx).dyn_into::<PerformanceEntry>() else {
                        continue;
                    };
                    if on_entry(&entry) == ObserverControl::Disconnect {
                        observer.disconnect();
                        return;
                    }
                }
            },
        )
            as Box<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>);

        let observer = PerformanceObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|err| js_error("PerformanceObserver", err))?;
        let init = PerformanceObserverInit::new();
        init.set_type(entry_type);
        init.set_buffered(true);
        observer.observe(&init);
        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// Runs `task` once the page has loaded: right away when it already has, otherwise
/// from a `load` listener kept in `slot`.
fn after_load(
    slot: &mut Option<ListenerHandle>,
    task: impl FnOnce() + 'static,
) -> MonitorResult<()> {
    let Some(window) = window() else {
        return Ok(());
    };
    let loaded = window
        .document()
        .map(|document| document.ready_state() == "complete")
        .unwrap_or(false);
    if loaded {
        task();
        return Ok(());
    }
    let mut task = Some(task);
    let callback = Closure::wrap(Box::new(move |_event: Event| {
        if let Some(task) = task.take() {
            task();
        }
    }) as Box<dyn FnMut(Event)>);
    *slot = Some(ListenerHandle::attach(window.into(), "load", false, callback)?);
    Ok(())
}

/// FP, FCP, FMP (first `element` timing entry) and LCP, reported shortly after load.
#[derive(Default)]
pub struct PaintInterceptor {
    observers: Vec<ObserverHandle>,
    on_load: Option<ListenerHandle>,
    cancelled: Option<Rc<Cell<bool>>>,
}

impl Interceptor for PaintInterceptor {
    fn capability(&self) -> Capability {
        Capability::Paint
    }

    fn install(&mut self, sink: CaptureSink) -> MonitorResult<bool> {
        if !has_global("PerformanceObserver") {
            return Ok(false);
        }
        let timings = Rc::new(RefCell::new(PaintTimings::default()));
        let mut observers = Vec::new();

        let paint = Rc::clone(&timings);
        observers.push(ObserverHandle::observe("paint", move |entry| {
            paint
                .borrow_mut()
                .observe_paint(&entry.name(), entry.start_time())
        })?);
        // Element and LCP entries are not emitted by every engine.
        if supports_entry_type("element") {
            let element = Rc::clone(&timings);
            observers.push(ObserverHandle::observe("element", move |entry| {
                element.borrow_mut().observe_element(entry.start_time())
            })?);
        } else {
            log::debug!("element timing unavailable");
        }
        if supports_entry_type("largest-contentful-paint") {
            let largest = Rc::clone(&timings);
            observers.push(ObserverHandle::observe(
                "largest-contentful-paint",
                move |entry| {
                    largest
                        .borrow_mut()
                        .observe_largest_contentful_paint(entry.start_time())
                },
            )?);
        } else {
            log::debug!("largest contentful paint unavailable");
        }

        let cancelled = Rc::new(Cell::new(false));
        let guard = Rc::clone(&cancelled);
        after_load(&mut self.on_load, move || {
            runtime::spawn_detached(async move {
                runtime::sleep(PAINT_REPORT_DELAY).await;
                if !guard.get() {
                    sink.capture(LogRecord::Paint(timings.borrow().to_metric()));
                }
            });
        })?;
        self.observers = observers;
        self.cancelled = Some(cancelled);
        Ok(true)
    }

    fn restore(&mut self) {
        if let Some(cancelled) = self.cancelled.take() {
            cancelled.set(true);
        }
        self.on_load.take();
        self.observers.clear();
    }
}

/// Navigation timing spans, read from the `navigation` entry once the page has loaded.
#[derive(Default)]
pub struct TimingInterceptor {
    on_load: Option<ListenerHandle>,
}

impl Interceptor for TimingInterceptor {
    fn capability(&self) -> Capability {
        Capability::Timing
    }

    fn install(&mut self, sink: CaptureSink) -> MonitorResult<bool> {
        if window().and_then(|window| window.performance()).is_none() {
            return Ok(false);
        }
        after_load(&mut self.on_load, move || match navigation_timing() {
            Some(timing) => sink.capture(LogRecord::Timing(timing.to_metric())),
            None => log::debug!("no navigation timing entry"),
        })?;
        Ok(true)
    }

    fn restore(&mut self) {
        self.on_load.take();
    }
}

/// Main-thread tasks over 100 ms, attributed to the last user interaction.
#[derive(Default)]
pub struct LongTaskInterceptor {
    observer: Option<ObserverHandle>,
}

impl Interceptor for LongTaskInterceptor {
    fn capability(&self) -> Capability {
        Capability::LongTask
    }

    fn install(&mut self, sink: CaptureSink) -> MonitorResult<bool> {
        if !has_global("PerformanceObserver") || !supports_entry_type("longtask") {
            return Ok(false);
        }
        let observer = ObserverHandle::observe("longtask", move |entry| {
            let last = sink.last_interaction();
            if let Some(metric) = long_task_metric(entry.start_time(), entry.duration(), last.as_ref())
            {
                sink.capture(LogRecord::LongTask(metric));
            }
            ObserverControl::Continue
        })?;
        self.observer = Some(observer);
        Ok(true)
    }

    fn restore(&mut self) {
        self.observer.take();
    }
}

/// `PerformanceObserver.supportedEntryTypes` contains `entry_type`. Engines without the
/// list are assumed to support it.
fn supports_entry_type(entry_type: &str) -> bool {
    let Some(constructor) = function_property(&js_sys::global(), "PerformanceObserver") else {
        return false;
    };
    match Reflect::get(&constructor, &JsValue::from_str("supportedEntryTypes")) {
        Ok(types) if Array::is_array(&types) => types
            .unchecked_into::<Array>()
            .includes(&JsValue::from_str(entry_type), 0),
        _ => true,
    }
}
