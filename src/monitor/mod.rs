#![doc = include_str!("README.md")]
pub(crate) mod api;
#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
pub(crate) mod browser;
#[cfg(not(target_arch = "wasm32"))]
pub(crate) mod client;
pub(crate) mod config;
pub(crate) mod constants;
pub(crate) mod error;
pub(crate) mod interaction;
pub(crate) mod interceptor;
pub(crate) mod metrics;
pub(crate) mod normalizer;
pub(crate) mod queue;
pub(crate) mod record;
pub(crate) mod transport;

#[doc(inline)]
pub use api::{CaptureSink, Monitor, MonitorState};

#[doc(inline)]
pub use config::MonitorConfig;

#[doc(inline)]
pub use constants::{
    DEFAULT_MAX_QUEUE_SIZE, DEFAULT_SEND_INTERVAL, DEFAULT_TIMEOUT, DISABLE_TRANSPORT_ENV,
    INTERACTION_EVENTS, LONG_TASK_THRESHOLD_MS, MAX_PIXEL_URL_LENGTH, PAINT_REPORT_DELAY,
};

#[doc(inline)]
pub use error::{
    internal_error, invalid_argument, transport_error, unsupported, MonitorError,
    MonitorErrorCode, MonitorResult,
};

#[doc(inline)]
pub use interaction::{Interaction, LastEventTracker};

#[doc(inline)]
pub use interceptor::{is_claimed, BoxedInterceptor, Capability, Interceptor, InterceptorRegistry};

#[cfg(not(target_arch = "wasm32"))]
#[doc(inline)]
pub use interceptor::PanicHookInterceptor;

#[cfg(not(target_arch = "wasm32"))]
#[doc(inline)]
pub use client::MonitoredClient;

#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
#[doc(inline)]
pub use browser::{
    default_interceptors, ErrorEventInterceptor, FetchInterceptor, InteractionInterceptor,
    LongTaskInterceptor, PaintInterceptor, RejectionInterceptor, TimingInterceptor,
    XhrInterceptor,
};

#[doc(inline)]
pub use metrics::{
    long_task_metric, page_view_metric, NavigationTiming, ObserverControl, PaintTimings,
};

#[doc(inline)]
pub use normalizer::{
    is_white_screen, normalize_error_event, normalize_rejection, selector_from_path,
    wrapper_selector, ErrorEventInfo, RejectionReason, RequestOutcome, RequestSpan,
};

#[doc(inline)]
pub use queue::{BoundedQueue, PushOutcome, QueueCategory};

#[doc(inline)]
pub use record::{
    BaseLog, ErrorLog, JsError, LogRecord, LongTaskMetric, PageViewMetric, PaintMetric,
    PromiseError,
    RequestDraft, RequestError, RequestRecord, RequestSource, ResourceError, TimingMetric,
};

#[doc(inline)]
pub use transport::{
    default_transport, pixel_url, BeaconChannel, BeaconTransport, PixelChannel, ReportBody,
    ReportPayload, Transport,
};
