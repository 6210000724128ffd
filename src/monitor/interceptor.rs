//! Explicit registry of patched host hooks.
//!
//! Every capability the monitor observes is an [`Interceptor`] that swaps a host binding
//! for a recording wrapper on [`install`](Interceptor::install) and puts the original back
//! on [`restore`](Interceptor::restore). A process-wide claim table makes sure a capability
//! is wrapped at most once, whichever monitor asks first.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{LazyLock, Mutex, PoisonError};

use crate::logger::Logger;
use crate::monitor::api::CaptureSink;
use crate::monitor::error::MonitorResult;

static LOGGER: LazyLock<Logger> = LazyLock::new(|| Logger::new("@page-monitor/interceptor"));

static ACTIVE: LazyLock<Mutex<BTreeSet<Capability>>> =
    LazyLock::new(|| Mutex::new(BTreeSet::new()));

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Xhr,
    Fetch,
    ErrorEvent,
    UnhandledRejection,
    Interaction,
    Paint,
    Timing,
    LongTask,
    Panic,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Xhr => "xhr",
            Capability::Fetch => "fetch",
            Capability::ErrorEvent => "error",
            Capability::UnhandledRejection => "unhandledrejection",
            Capability::Interaction => "interaction",
            Capability::Paint => "paint",
            Capability::Timing => "timing",
            Capability::LongTask => "longtask",
            Capability::Panic => "panic",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A patch over one host capability.
pub trait Interceptor {
    fn capability(&self) -> Capability;

    /// Wraps the host binding so captured events reach `sink`.
    ///
    /// Returns `Ok(false)` when the host lacks the API; the capability then stays off.
    fn install(&mut self, sink: CaptureSink) -> MonitorResult<bool>;

    /// Puts the original binding back. Only called after a successful install.
    fn restore(&mut self);
}

#[cfg(not(target_arch = "wasm32"))]
pub type BoxedInterceptor = Box<dyn Interceptor + Send>;
#[cfg(target_arch = "wasm32")]
pub type BoxedInterceptor = Box<dyn Interceptor>;

struct Slot {
    interceptor: BoxedInterceptor,
    installed: bool,
}

/// The interceptors owned by one monitor.
#[derive(Default)]
pub struct InterceptorRegistry {
    slots: Vec<Slot>,
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.slots
                    .iter()
                    .map(|slot| (slot.interceptor.capability(), slot.installed)),
            )
            .finish()
    }
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an interceptor. A second interceptor for a capability already present is
    /// ignored.
    pub fn register(&mut self, interceptor: BoxedInterceptor) {
        let capability = interceptor.capability();
        if self.contains(capability) {
            LOGGER.debug(format!("{capability} interceptor already registered"));
            return;
        }
        self.slots.push(Slot {
            interceptor,
            installed: false,
        });
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.interceptor.capability() == capability)
    }

    pub fn is_installed(&self, capability: Capability) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.installed && slot.interceptor.capability() == capability)
    }

    pub fn installed(&self) -> Vec<Capability> {
        self.slots
            .iter()
            .filter(|slot| slot.installed)
            .map(|slot| slot.interceptor.capability())
            .collect()
    }

    /// Installs every registered interceptor not yet installed. Capabilities claimed by
    /// another monitor, unsupported by the host, or failing to install are skipped.
    pub fn install_all(&mut self, sink: &CaptureSink) {
        for slot in self.slots.iter_mut().filter(|slot| !slot.installed) {
            let capability = slot.interceptor.capability();
            if !claim(capability) {
                LOGGER.debug(format!(
                    "{capability} is already intercepted in this process; skipping"
                ));
                continue;
            }
            match slot.interceptor.install(sink.clone()) {
                Ok(true) => slot.installed = true,
                Ok(false) => {
                    LOGGER.debug(format!("{capability} is not supported by the host"));
                    release(capability);
                }
                Err(err) => {
                    LOGGER.debug(format!("failed to install {capability} interceptor: {err}"));
                    release(capability);
                }
            }
        }
    }

    /// Restores installed interceptors in reverse install order. Safe to call repeatedly.
    pub fn restore_all(&mut self) {
        for slot in self.slots.iter_mut().rev().filter(|slot| slot.installed) {
            slot.interceptor.restore();
            slot.installed = false;
            release(slot.interceptor.capability());
        }
    }
}

impl Drop for InterceptorRegistry {
    fn drop(&mut self) {
        self.restore_all();
    }
}

fn claim(capability: Capability) -> bool {
    ACTIVE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(capability)
}

fn release(capability: Capability) {
    ACTIVE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&capability);
}

/// Whether any monitor in the process currently intercepts `capability`.
pub fn is_claimed(capability: Capability) -> bool {
    ACTIVE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&capability)
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::PanicHookInterceptor;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::backtrace::{Backtrace, BacktraceStatus};
    use std::panic::{self, PanicHookInfo};
    use std::sync::Arc;

    use super::{Capability, Interceptor};
    use crate::monitor::api::CaptureSink;
    use crate::monitor::error::MonitorResult;
    use crate::monitor::record::{ErrorLog, JsError};
    use crate::platform::runtime;

    type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

    /// Reports panics as script errors, then hands them to the previous hook.
    #[derive(Default)]
    pub struct PanicHookInterceptor {
        original: Option<Arc<PanicHook>>,
    }

    impl PanicHookInterceptor {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Interceptor for PanicHookInterceptor {
        fn capability(&self) -> Capability {
            Capability::Panic
        }

        fn install(&mut self, sink: CaptureSink) -> MonitorResult<bool> {
            let original: Arc<PanicHook> = Arc::new(panic::take_hook());
            let delegate = Arc::clone(&original);
            panic::set_hook(Box::new(move |info| {
                sink.capture_error(panic_record(info));
                delegate(info);
            }));
            self.original = Some(original);
            Ok(true)
        }

        fn restore(&mut self) {
            let Some(original) = self.original.take() else {
                return;
            };
            // Dropping our wrapper releases its handle on the previous hook.
            drop(panic::take_hook());
            match Arc::try_unwrap(original) {
                Ok(hook) => panic::set_hook(hook),
                Err(shared) => panic::set_hook(Box::new(move |info| shared(info))),
            }
        }
    }

    fn panic_record(info: &PanicHookInfo<'_>) -> ErrorLog {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| "panic".to_string());
        let (filename, position) = info
            .location()
            .map(|location| {
                (
                    location.file().to_string(),
                    format!("{}:{}", location.line(), location.column()),
                )
            })
            .unwrap_or_else(|| (String::new(), "0:0".to_string()));
        let backtrace = Backtrace::capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => backtrace.to_string(),
            _ => String::new(),
        };
        ErrorLog::JsError(JsError {
            message,
            filename,
            position,
            stack,
            selector: String::new(),
            is_white_screen: false,
            timestamp: runtime::now_ms(),
        })
    }
}
