//! `web-sys` glue shared by the browser interceptors.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, Event, Window};

use crate::monitor::NavigationTiming;
use crate::platform::page::{ElementInfo, PageContext, Viewport};

pub fn window() -> Option<Window> {
    web_sys::window()
}

/// Whether `name` is defined on the global object, e.g. `PerformanceObserver`.
pub fn has_global(name: &str) -> bool {
    js_sys::Reflect::has(&js_sys::global(), &JsValue::from_str(name)).unwrap_or(false)
        && !js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str(name))
            .map(|value| value.is_undefined() || value.is_null())
            .unwrap_or(true)
}

pub fn string_property(target: &JsValue, name: &str) -> Option<String> {
    js_sys::Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.as_string())
}

/// Numeric property of `target`; missing or non-numeric values read as `0`.
pub fn number_property(target: &JsValue, name: &str) -> f64 {
    js_sys::Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.as_f64())
        .unwrap_or_default()
}

/// The `navigation` entry of the performance timeline, once the browser has recorded it.
pub fn navigation_timing() -> Option<NavigationTiming> {
    let entries = window()?
        .performance()?
        .get_entries_by_type("navigation");
    if entries.length() == 0 {
        return None;
    }
    let entry = entries.get(0);
    Some(NavigationTiming {
        start_time: number_property(&entry, "startTime"),
        fetch_start: number_property(&entry, "fetchStart"),
        domain_lookup_start: number_property(&entry, "domainLookupStart"),
        domain_lookup_end: number_property(&entry, "domainLookupEnd"),
        connect_start: number_property(&entry, "connectStart"),
        secure_connection_start: number_property(&entry, "secureConnectionStart"),
        connect_end: number_property(&entry, "connectEnd"),
        request_start: number_property(&entry, "requestStart"),
        response_start: number_property(&entry, "responseStart"),
        response_end: number_property(&entry, "responseEnd"),
        dom_content_loaded_event_start: number_property(&entry, "domContentLoadedEventStart"),
        dom_content_loaded_event_end: number_property(&entry, "domContentLoadedEventEnd"),
        load_event_start: number_property(&entry, "loadEventStart"),
        load_event_end: number_property(&entry, "loadEventEnd"),
    })
}

pub fn element_info(element: &Element) -> ElementInfo {
    ElementInfo {
        tag_name: element.tag_name(),
        id: element.id(),
        class_name: element.class_name(),
        src: string_property(element.as_ref(), "src"),
        href: string_property(element.as_ref(), "href"),
    }
}

/// The element and its ancestors, innermost first.
pub fn element_path(element: &Element) -> Vec<ElementInfo> {
    let mut path = vec![element_info(element)];
    let mut current = element.parent_element();
    while let Some(parent) = current {
        path.push(element_info(&parent));
        current = parent.parent_element();
    }
    path
}

/// Elements along the event's composed path, innermost first. Non-element targets
/// (document, window, shadow roots) are skipped.
pub fn event_path(event: &Event) -> Vec<ElementInfo> {
    let composed = event.composed_path();
    let mut path = Vec::with_capacity(composed.length() as usize);
    for idx in 0..composed.length() {
        if let Ok(element) = composed.get(idx).dyn_into::<Element>() {
            path.push(element_info(&element));
        }
    }
    if path.is_empty() {
        if let Some(element) = event.target().and_then(|target| target.dyn_into::<Element>().ok())
        {
            return element_path(&element);
        }
    }
    path
}

/// The live page behind `window`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserPage;

impl PageContext for BrowserPage {
    fn title(&self) -> String {
        window()
            .and_then(|window| window.document())
            .map(|document| document.title())
            .unwrap_or_default()
    }

    fn url(&self) -> String {
        window()
            .and_then(|window| window.location().href().ok())
            .unwrap_or_default()
    }

    fn user_agent(&self) -> String {
        window()
            .and_then(|window| window.navigator().user_agent().ok())
            .unwrap_or_default()
    }

    fn viewport(&self) -> Option<Viewport> {
        let window = window()?;
        let width = window.inner_width().ok()?.as_f64()?;
        let height = window.inner_height().ok()?.as_f64()?;
        Some(Viewport { width, height })
    }

    fn referrer(&self) -> String {
        window()
            .and_then(|window| window.document())
            .map(|document| document.referrer())
            .unwrap_or_default()
    }

    fn language(&self) -> String {
        window()
            .and_then(|window| window.navigator().language())
            .unwrap_or_default()
    }

    fn screen(&self) -> Option<Viewport> {
        let screen = window()?.screen().ok()?;
        Some(Viewport {
            width: f64::from(screen.width().ok()?),
            height: f64::from(screen.height().ok()?),
        })
    }

    fn navigation_timing(&self) -> Option<NavigationTiming> {
        navigation_timing()
    }

    fn element_from_point(&self, x: f64, y: f64) -> Option<ElementInfo> {
        let document = window()?.document()?;
        document
            .element_from_point(x as f32, y as f32)
            .map(|element| element_info(&element))
    }
}
