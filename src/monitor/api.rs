use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::{Map, Value};

use crate::logger::Logger;
use crate::monitor::config::MonitorConfig;
use crate::monitor::error::{invalid_argument, MonitorResult};
use crate::monitor::interaction::{Interaction, LastEventTracker};
use crate::monitor::interceptor::{BoxedInterceptor, Capability, InterceptorRegistry};
use crate::monitor::metrics::page_view_metric;
use crate::monitor::normalizer::{
    normalize_error_event, normalize_rejection, ErrorEventInfo, RejectionReason, RequestOutcome,
};
use crate::monitor::queue::{BoundedQueue, PushOutcome, QueueCategory};
use crate::monitor::record::{BaseLog, ErrorLog, LogRecord, RequestDraft};
use crate::monitor::transport::{default_transport, ReportPayload, Transport};
use crate::platform::page::{default_page_context, PageContext};
use crate::platform::runtime;

static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("@page-monitor/monitor"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    Created,
    Running,
    Destroyed,
}

/// Captures page telemetry and ships it in batches.
///
/// A monitor starts idle: records may be captured right away but host hooks are only
/// installed, and the periodic flush only started, by [`Monitor::init`].
/// [`Monitor::destroy`] flushes what is left, restores every hook and is final.
pub struct Monitor {
    inner: Arc<MonitorInner>,
    interceptors: Mutex<InterceptorRegistry>,
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("report_url", &self.inner.config.report_url())
            .field("state", &self.state())
            .finish()
    }
}

pub(crate) struct MonitorInner {
    config: MonitorConfig,
    errors: Mutex<BoundedQueue>,
    requests: Mutex<BoundedQueue>,
    transport: Arc<dyn Transport>,
    page: Arc<dyn PageContext>,
    last_event: LastEventTracker,
    state: Mutex<MonitorState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Monitor {
    /// Creates a monitor reporting through the host's default transport, with the
    /// default interceptors for the target registered.
    pub fn new(config: MonitorConfig) -> MonitorResult<Self> {
        config.validate()?;
        let transport = default_transport(&config)?;
        let monitor = Self::with_parts(config, transport, default_page_context())?;
        for interceptor in default_interceptors() {
            monitor.add_interceptor(interceptor);
        }
        Ok(monitor)
    }

    /// Creates a monitor over explicit collaborators. No interceptors are registered.
    pub fn with_parts(
        config: MonitorConfig,
        transport: Arc<dyn Transport>,
        page: Arc<dyn PageContext>,
    ) -> MonitorResult<Self> {
        config.validate()?;
        let capacity = config.max_queue_size();
        let inner = MonitorInner {
            errors: Mutex::new(BoundedQueue::new(QueueCategory::Errors, capacity)),
            requests: Mutex::new(BoundedQueue::new(QueueCategory::Requests, capacity)),
            config,
            transport,
            page,
            last_event: LastEventTracker::default(),
            state: Mutex::new(MonitorState::Created),
        };
        Ok(Self {
            inner: Arc::new(inner),
            interceptors: Mutex::new(InterceptorRegistry::new()),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn state(&self) -> MonitorState {
        self.inner.state()
    }

    /// Registers an interceptor; it is installed at once when the monitor is running.
    pub fn add_interceptor(&self, interceptor: BoxedInterceptor) {
        let mut registry = lock(&self.interceptors);
        registry.register(interceptor);
        if self.state() == MonitorState::Running {
            registry.install_all(&self.sink());
        }
    }

    pub fn installed_capabilities(&self) -> Vec<Capability> {
        lock(&self.interceptors).installed()
    }

    /// Handle through which interceptors and host glue feed the monitor.
    pub fn sink(&self) -> CaptureSink {
        CaptureSink {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Installs the registered interceptors and starts the periodic flush.
    ///
    /// Calling `init` on a running monitor does nothing; a destroyed monitor cannot be
    /// restarted.
    pub fn init(&self) -> MonitorResult<()> {
        {
            let mut state = lock(&self.inner.state);
            match *state {
                MonitorState::Running => {
                    LOGGER.debug("monitor already initialized");
                    return Ok(());
                }
                MonitorState::Destroyed => {
                    return Err(invalid_argument("monitor has been destroyed"));
                }
                MonitorState::Created => *state = MonitorState::Running,
            }
        }
        lock(&self.interceptors).install_all(&self.sink());
        start_flush_timer(&self.inner);
        LOGGER.debug(format!(
            "monitor reporting to {} every {:?}",
            self.inner.config.report_url(),
            self.inner.config.send_interval()
        ));
        Ok(())
    }

    /// Queues an error record. Malformed records are logged and rejected.
    pub fn capture_error(&self, error: ErrorLog) -> MonitorResult<()> {
        self.inner.capture(LogRecord::Error(error))
    }

    /// Completes `draft` into a request record and queues it.
    pub fn capture_request(&self, draft: RequestDraft) -> MonitorResult<()> {
        let record = draft.into_record().inspect_err(|err| {
            LOGGER.warn(format!("dropping request record: {err}"));
        })?;
        self.inner.capture(LogRecord::Request(record))
    }

    /// Parses an error record from its JSON form (`errorType` tagged) and queues it.
    pub fn capture_error_value(&self, value: Value) -> MonitorResult<()> {
        let error: ErrorLog = serde_json::from_value(value).map_err(|err| {
            LOGGER.warn(format!("dropping unrecognized error record: {err}"));
            invalid_argument(format!("invalid error record: {err}"))
        })?;
        self.capture_error(error)
    }

    /// Parses a request draft from its JSON form and queues it.
    pub fn capture_request_value(&self, value: Value) -> MonitorResult<()> {
        let draft: RequestDraft = serde_json::from_value(value).map_err(|err| {
            LOGGER.warn(format!("dropping unrecognized request record: {err}"));
            invalid_argument(format!("invalid request record: {err}"))
        })?;
        self.capture_request(draft)
    }

    /// Delivers a record now. Metrics go out as single-record payloads; errors and
    /// requests are routed through their queue.
    pub fn report(&self, record: LogRecord) -> MonitorResult<()> {
        self.inner.capture(record)
    }

    /// Reports a page view right away: referrer, screen, language and navigation spans,
    /// plus the host's `extra` fields.
    pub fn report_page(&self, extra: Map<String, Value>) -> MonitorResult<()> {
        let metric = page_view_metric(self.inner.page.as_ref(), extra, runtime::now_ms());
        self.inner.capture(LogRecord::PageView(metric))
    }

    /// Number of records waiting in `category`.
    pub fn queued(&self, category: QueueCategory) -> usize {
        lock(self.inner.queue(category)).len()
    }

    /// Sends every non-empty queue as one batch each.
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Flushes, restores every installed hook and stops the periodic flush. Later calls
    /// do nothing.
    pub fn destroy(&self) {
        {
            let mut state = lock(&self.inner.state);
            if *state == MonitorState::Destroyed {
                return;
            }
            *state = MonitorState::Destroyed;
        }
        self.inner.flush();
        lock(&self.interceptors).restore_all();
        for category in QueueCategory::ALL {
            lock(self.inner.queue(category)).clear();
        }
        self.inner.last_event.clear();
        LOGGER.debug("monitor destroyed");
    }

    /// An HTTP client whose requests are recorded as `fetch` requests.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn http_client(&self) -> MonitorResult<crate::monitor::client::MonitoredClient> {
        crate::monitor::client::MonitoredClient::with_timeout(
            self.sink(),
            self.inner.config.timeout(),
        )
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl MonitorInner {
    fn state(&self) -> MonitorState {
        *lock(&self.state)
    }

    fn queue(&self, category: QueueCategory) -> &Mutex<BoundedQueue> {
        match category {
            QueueCategory::Errors => &self.errors,
            QueueCategory::Requests => &self.requests,
        }
    }

    fn capture(&self, record: LogRecord) -> MonitorResult<()> {
        if self.state() == MonitorState::Destroyed {
            LOGGER.debug(format!(
                "monitor destroyed; dropping {} record",
                record.type_name()
            ));
            return Ok(());
        }
        record.validate().inspect_err(|err| {
            LOGGER.warn(format!("dropping malformed {} record: {err}", record.type_name()));
        })?;

        let Some(category) = record.category() else {
            self.send(ReportPayload::single(self.base_log(), record));
            return Ok(());
        };
        let outcome = lock(self.queue(category)).push(record);
        if let PushOutcome::Full(batch) = outcome {
            self.send_batch(category, batch);
        }
        Ok(())
    }

    fn flush(&self) {
        for category in QueueCategory::ALL {
            let batch = lock(self.queue(category)).drain();
            if !batch.is_empty() {
                self.send_batch(category, batch);
            }
        }
    }

    fn send_batch(&self, category: QueueCategory, batch: Vec<LogRecord>) {
        LOGGER.debug(format!(
            "flushing {} {} record(s)",
            batch.len(),
            category.as_str()
        ));
        self.send(ReportPayload::batch(self.base_log(), category, batch));
    }

    fn send(&self, payload: ReportPayload) {
        if let Err(err) = self.transport.send(self.config.report_url(), &payload) {
            LOGGER.debug(format!(
                "dropping {} record(s) after transport failure: {err}",
                payload.len()
            ));
        }
    }

    fn base_log(&self) -> BaseLog {
        BaseLog::collect(self.page.as_ref(), &self.config)
    }
}

fn start_flush_timer(inner: &Arc<MonitorInner>) {
    let weak = Arc::downgrade(inner);
    let interval = inner.config.send_interval();
    runtime::spawn_detached(async move {
        loop {
            runtime::sleep(interval).await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            if inner.state() != MonitorState::Running {
                break;
            }
            inner.flush();
        }
    });
}

#[cfg(not(target_arch = "wasm32"))]
fn default_interceptors() -> Vec<BoxedInterceptor> {
    vec![Box::new(crate::monitor::interceptor::PanicHookInterceptor::new())]
}

#[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
fn default_interceptors() -> Vec<BoxedInterceptor> {
    crate::monitor::browser::default_interceptors()
}

#[cfg(all(not(feature = "wasm-web"), target_arch = "wasm32"))]
fn default_interceptors() -> Vec<BoxedInterceptor> {
    Vec::new()
}

/// Weak handle to a monitor, handed to interceptors.
///
/// Every method is a no-op once the monitor is gone, so hooks that outlive their monitor
/// stay harmless.
#[derive(Clone)]
pub struct CaptureSink {
    inner: Weak<MonitorInner>,
}

impl fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSink")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl CaptureSink {
    /// A sink connected to nothing.
    pub fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    pub fn is_attached(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.state() != MonitorState::Destroyed)
    }

    pub fn capture_error(&self, error: ErrorLog) {
        self.capture(LogRecord::Error(error));
    }

    pub fn capture_request(&self, draft: RequestDraft) {
        match draft.into_record() {
            Ok(record) => self.capture(LogRecord::Request(record)),
            Err(err) => LOGGER.warn(format!("dropping request record: {err}")),
        }
    }

    /// Records a finished request and, when it failed, the matching request error.
    pub fn capture_outcome(&self, outcome: RequestOutcome) {
        self.capture_request(outcome.request);
        if let Some(error) = outcome.error {
            self.capture_error(error);
        }
    }

    /// Classifies and records a global `error` event.
    pub fn capture_error_event(&self, event: &ErrorEventInfo) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let last = inner.last_event.last();
        let error = normalize_error_event(event, last.as_ref(), inner.page.as_ref(), runtime::now_ms());
        let _ = inner.capture(LogRecord::Error(error));
    }

    pub fn capture_rejection(&self, reason: &RejectionReason) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let last = inner.last_event.last();
        let error = normalize_rejection(reason, last.as_ref(), runtime::now_ms());
        let _ = inner.capture(LogRecord::Error(error));
    }

    /// Queues or sends `record` depending on its category.
    pub fn capture(&self, record: LogRecord) {
        if let Some(inner) = self.inner.upgrade() {
            let _ = inner.capture(record);
        }
    }

    pub fn record_interaction(&self, interaction: Interaction) {
        if let Some(inner) = self.inner.upgrade() {
            inner.last_event.record(interaction);
        }
    }

    pub fn last_interaction(&self) -> Option<Interaction> {
        self.inner
            .upgrade()
            .and_then(|inner| inner.last_event.last())
    }

    /// The configured request timeout, while the monitor is alive.
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.upgrade().map(|inner| inner.config.timeout())
    }
}
