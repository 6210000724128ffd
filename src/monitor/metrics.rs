//! Paint, navigation, page-view and long-task metric assembly.

use serde_json::{Map, Value};

use crate::monitor::constants::LONG_TASK_THRESHOLD_MS;
use crate::monitor::interaction::Interaction;
use crate::monitor::normalizer::selector_from_path;
use crate::monitor::record::{LongTaskMetric, PageViewMetric, PaintMetric, TimingMetric};
use crate::platform::page::PageContext;

/// Whether an observer should keep listening after an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverControl {
    Continue,
    Disconnect,
}

/// Accumulates paint entries until the page is ready to report them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaintTimings {
    first_paint: Option<f64>,
    first_contentful_paint: Option<f64>,
    first_meaningful_paint: Option<f64>,
    largest_contentful_paint: Option<f64>,
}

impl PaintTimings {
    /// Handles a `paint` entry. FCP is the last paint entry of interest.
    pub fn observe_paint(&mut self, name: &str, start_time: f64) -> ObserverControl {
        match name {
            "first-paint" => {
                self.first_paint = Some(start_time);
                ObserverControl::Continue
            }
            "first-contentful-paint" => {
                self.first_contentful_paint = Some(start_time);
                ObserverControl::Disconnect
            }
            _ => ObserverControl::Continue,
        }
    }

    /// Handles an `element` timing entry; the first one is the first meaningful paint.
    pub fn observe_element(&mut self, start_time: f64) -> ObserverControl {
        if self.first_meaningful_paint.is_none() {
            self.first_meaningful_paint = Some(start_time);
        }
        ObserverControl::Disconnect
    }

    /// Handles a `largest-contentful-paint` entry. Later candidates replace earlier ones.
    pub fn observe_largest_contentful_paint(&mut self, start_time: f64) -> ObserverControl {
        self.largest_contentful_paint = Some(start_time);
        ObserverControl::Continue
    }

    pub fn to_metric(&self) -> PaintMetric {
        PaintMetric {
            first_paint: self.first_paint,
            first_contentful_paint: self.first_contentful_paint,
            first_meaningful_paint: self.first_meaningful_paint,
            largest_contentful_paint: self.largest_contentful_paint,
        }
    }
}

/// The subset of `PerformanceNavigationTiming` the timing and page-view reports need, in
/// milliseconds relative to the time origin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NavigationTiming {
    pub start_time: f64,
    pub fetch_start: f64,
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub connect_start: f64,
    /// `0` for plain-HTTP navigations.
    pub secure_connection_start: f64,
    pub connect_end: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub response_end: f64,
    pub dom_content_loaded_event_start: f64,
    pub dom_content_loaded_event_end: f64,
    pub load_event_start: f64,
    pub load_event_end: f64,
}

impl NavigationTiming {
    pub fn to_metric(&self) -> TimingMetric {
        TimingMetric {
            dom_content_loaded_time: span(self.fetch_start, self.dom_content_loaded_event_start),
            load_time: span(self.fetch_start, self.load_event_start),
            dns_time: span(self.domain_lookup_start, self.domain_lookup_end),
            tcp_time: span(self.connect_start, self.connect_end),
            request_time: span(self.request_start, self.response_start),
            response_time: span(self.response_start, self.response_end),
        }
    }
}

/// Builds a page-view report from the page's current state. Keys in `extra` that name a
/// collected field are ignored.
pub fn page_view_metric(
    page: &dyn PageContext,
    mut extra: Map<String, Value>,
    time: i64,
) -> PageViewMetric {
    for key in PageViewMetric::FIELDS {
        if extra.remove(*key).is_some() {
            log::debug!("page view field `{key}` cannot be overridden");
        }
    }
    let screen = page.screen();
    let mut metric = PageViewMetric {
        referrer: page.referrer(),
        screen_width: screen.map(|screen| screen.width).unwrap_or_default(),
        screen_height: screen.map(|screen| screen.height).unwrap_or_default(),
        language: page.language(),
        time,
        extra,
        ..Default::default()
    };
    if let Some(timing) = page.navigation_timing() {
        metric.dns_time = Some(span(timing.domain_lookup_start, timing.domain_lookup_end));
        metric.tcp_time = Some(span(timing.connect_start, timing.connect_end));
        metric.ssl_time = Some(if timing.secure_connection_start > 0.0 {
            span(timing.secure_connection_start, timing.connect_end)
        } else {
            0.0
        });
        metric.request_time = Some(span(timing.request_start, timing.response_start));
        metric.response_time = Some(span(timing.response_start, timing.response_end));
        metric.dom_ready_time = Some(span(
            timing.dom_content_loaded_event_start,
            timing.dom_content_loaded_event_end,
        ));
        metric.load_time = Some(span(timing.start_time, timing.load_event_end));
    }
    metric
}

// Unset marks are reported as 0 by the browser; never report negative spans.
fn span(start: f64, end: f64) -> f64 {
    (end - start).max(0.0)
}

/// Builds a long-task report for entries longer than the reporting threshold.
pub fn long_task_metric(
    start_time: f64,
    duration: f64,
    last_interaction: Option<&Interaction>,
) -> Option<LongTaskMetric> {
    if duration <= LONG_TASK_THRESHOLD_MS {
        return None;
    }
    Some(LongTaskMetric {
        start_time,
        duration,
        selector: last_interaction
            .map(|interaction| selector_from_path(&interaction.path))
            .unwrap_or_default(),
        event_type: last_interaction.map(|interaction| interaction.event_type.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::record::LogRecord;
    use crate::platform::page::{ElementInfo, StaticPage, Viewport};
    use serde_json::json;

    #[test]
    fn paint_observer_disconnects_after_fcp() {
        let mut timings = PaintTimings::default();
        assert_eq!(
            timings.observe_paint("first-paint", 120.0),
            ObserverControl::Continue
        );
        assert_eq!(
            timings.observe_paint("first-contentful-paint", 140.0),
            ObserverControl::Disconnect
        );
        timings.observe_element(300.0);
        timings.observe_element(900.0);
        timings.observe_largest_contentful_paint(400.0);
        timings.observe_largest_contentful_paint(650.0);

        let metric = timings.to_metric();
        assert_eq!(metric.first_paint, Some(120.0));
        assert_eq!(metric.first_contentful_paint, Some(140.0));
        assert_eq!(metric.first_meaningful_paint, Some(300.0));
        assert_eq!(metric.largest_contentful_paint, Some(650.0));
    }

    #[test]
    fn navigation_timing_spans_are_relative_to_fetch_start() {
        let timing = NavigationTiming {
            fetch_start: 10.0,
            domain_lookup_start: 12.0,
            domain_lookup_end: 20.0,
            connect_start: 20.0,
            connect_end: 45.0,
            request_start: 46.0,
            response_start: 90.0,
            response_end: 110.0,
            dom_content_loaded_event_start: 310.0,
            load_event_start: 0.0,
            ..Default::default()
        };
        let metric = timing.to_metric();
        assert_eq!(metric.dom_content_loaded_time, 300.0);
        assert_eq!(metric.load_time, 0.0);
        assert_eq!(metric.dns_time, 8.0);
        assert_eq!(metric.tcp_time, 25.0);
        assert_eq!(metric.request_time, 44.0);
        assert_eq!(metric.response_time, 20.0);
    }

    #[test]
    fn page_view_collects_page_state_and_navigation_spans() {
        let page = StaticPage::new("Orders", "https://shop.example.com/orders", "agent")
            .with_referrer("https://search.example.com/")
            .with_language("en-US")
            .with_screen(Viewport {
                width: 1440.0,
                height: 900.0,
            })
            .with_navigation_timing(NavigationTiming {
                domain_lookup_start: 5.0,
                domain_lookup_end: 9.0,
                connect_start: 9.0,
                secure_connection_start: 15.0,
                connect_end: 30.0,
                request_start: 31.0,
                response_start: 80.0,
                response_end: 95.0,
                dom_content_loaded_event_start: 200.0,
                dom_content_loaded_event_end: 212.0,
                load_event_end: 480.0,
                ..Default::default()
            });
        let mut extra = Map::new();
        extra.insert("campaign".into(), json!("spring"));
        extra.insert("referrer".into(), json!("spoofed"));

        let metric = page_view_metric(&page, extra, 1_700_000_000_000);
        assert_eq!(metric.referrer, "https://search.example.com/");
        assert_eq!(metric.language, "en-US");
        assert_eq!(metric.screen_width, 1440.0);
        assert_eq!(metric.dns_time, Some(4.0));
        assert_eq!(metric.tcp_time, Some(21.0));
        assert_eq!(metric.ssl_time, Some(15.0));
        assert_eq!(metric.request_time, Some(49.0));
        assert_eq!(metric.response_time, Some(15.0));
        assert_eq!(metric.dom_ready_time, Some(12.0));
        assert_eq!(metric.load_time, Some(480.0));

        let value = serde_json::to_value(LogRecord::PageView(metric)).unwrap();
        assert_eq!(value["type"], "pageView");
        assert_eq!(value["campaign"], "spring");
        assert_eq!(value["referrer"], "https://search.example.com/");
        assert_eq!(value["screenHeight"], 900.0);
    }

    #[test]
    fn page_view_without_navigation_entry_omits_spans() {
        let page = StaticPage::new("Docs", "https://docs.example.com/", "agent");
        let metric = page_view_metric(&page, Map::new(), 1);
        assert!(metric.dns_time.is_none());
        assert_eq!(metric.screen_width, 0.0);

        let value = serde_json::to_value(&metric).unwrap();
        assert!(value.get("loadTime").is_none());
        assert_eq!(value["time"], 1);
    }

    #[test]
    fn short_tasks_are_ignored() {
        assert!(long_task_metric(5.0, 100.0, None).is_none());
        let interaction = Interaction {
            event_type: "click".into(),
            path: vec![ElementInfo::new("BUTTON").with_id("buy")],
        };
        let metric = long_task_metric(5.0, 180.0, Some(&interaction)).unwrap();
        assert_eq!(metric.selector, "button#buy");
        assert_eq!(metric.event_type.as_deref(), Some("click"));
    }
}
