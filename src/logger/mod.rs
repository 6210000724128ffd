//! Developer-facing diagnostics for the monitor itself.
//!
//! Each module owns a named [`Logger`]. Messages below the logger's level are dropped;
//! the rest go to the logger's handler (by default the [`log`] facade, with the logger
//! name as target) and to an optional user callback installed via
//! [`set_user_log_handler`]. Nothing logged here is ever reported to the collection
//! endpoint.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError, RwLock, Weak};

use chrono::{SecondsFormat, Utc};

static GLOBAL_LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);
static INSTANCES: LazyLock<Mutex<Vec<Weak<LoggerInner>>>> =
    LazyLock::new(|| Mutex::new(Vec::new()));

type SharedLogHandler = Arc<dyn Fn(&Logger, LogLevel, &str) + Send + Sync + 'static>;

#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.inner.name)
            .field("level", &self.log_level())
            .finish()
    }
}

impl Logger {
    pub fn new(name: impl Into<String>) -> Self {
        let inner = Arc::new(LoggerInner::new(name.into()));
        track_instance(&inner);
        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_u8(self.inner.log_level.load(Ordering::SeqCst))
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.inner.log_level.store(level as u8, Ordering::SeqCst);
    }

    pub fn set_log_handler<F>(&self, handler: F)
    where
        F: Fn(&Logger, LogLevel, &str) + Send + Sync + 'static,
    {
        *write(&self.inner.log_handler) = Arc::new(handler);
    }

    pub fn reset_log_handler(&self) {
        *write(&self.inner.log_handler) = Arc::new(default_log_handler);
    }

    fn set_user_log_handler(&self, handler: Option<SharedLogHandler>) {
        *write(&self.inner.user_log_handler) = handler;
    }

    pub fn has_user_log_handler(&self) -> bool {
        read(&self.inner.user_log_handler).is_some()
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.dispatch(LogLevel::Debug, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.dispatch(LogLevel::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.dispatch(LogLevel::Warn, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.dispatch(LogLevel::Error, message.into());
    }

    fn dispatch(&self, level: LogLevel, message: String) {
        if level < self.log_level() || level == LogLevel::Silent {
            return;
        }
        let user_handler = read(&self.inner.user_log_handler).clone();
        if let Some(handler) = user_handler {
            handler(self, level, &message);
        }
        let handler = read(&self.inner.log_handler).clone();
        handler(self, level, &message);
    }
}

struct LoggerInner {
    name: String,
    log_level: AtomicU8,
    log_handler: RwLock<SharedLogHandler>,
    user_log_handler: RwLock<Option<SharedLogHandler>>,
}

impl LoggerInner {
    fn new(name: String) -> Self {
        Self {
            name,
            log_level: AtomicU8::new(GLOBAL_LOG_LEVEL.load(Ordering::SeqCst)),
            log_handler: RwLock::new(Arc::new(default_log_handler)),
            user_log_handler: RwLock::new(None),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn track_instance(inner: &Arc<LoggerInner>) {
    INSTANCES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(Arc::downgrade(inner));
}

fn default_log_handler(logger: &Logger, level: LogLevel, message: &str) {
    let target = logger.name();
    match level {
        LogLevel::Debug => log::debug!(target: target, "{message}"),
        LogLevel::Info => log::info!(target: target, "{message}"),
        LogLevel::Warn => log::warn!(target: target, "{message}"),
        LogLevel::Error => log::error!(target: target, "{message}"),
        LogLevel::Silent => {}
    }
}

fn with_instances<F>(mut f: F)
where
    F: FnMut(Logger),
{
    let mut instances = INSTANCES.lock().unwrap_or_else(PoisonError::into_inner);
    instances.retain(|weak| match weak.upgrade() {
        Some(inner) => {
            f(Logger { inner });
            true
        }
        None => false,
    });
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
    Silent = 4,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Silent => "silent",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            3 => LogLevel::Error,
            _ => LogLevel::Silent,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

impl FromStr for LogLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "verbose" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "silent" => Ok(LogLevel::Silent),
            other => Err(LogError::InvalidLogLevel(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    InvalidLogLevel(String),
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::InvalidLogLevel(level) => {
                write!(f, "Invalid value \"{level}\" assigned to `logLevel`")
            }
        }
    }
}

impl std::error::Error for LogError {}

/// What a user log callback receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCallbackParams {
    pub level: LogLevel,
    pub message: String,
    pub logger_name: String,
    /// RFC 3339 timestamp with millisecond precision.
    pub timestamp: String,
}

pub type LogCallback = Arc<dyn Fn(LogCallbackParams) + Send + Sync + 'static>;

/// Sets the level of every live logger and of loggers created afterwards.
pub fn set_log_level(level: LogLevel) {
    GLOBAL_LOG_LEVEL.store(level as u8, Ordering::SeqCst);
    with_instances(|logger| logger.set_log_level(level));
}

/// Parses `level` (`debug`, `info`, `warn`, `error`, `silent`) and applies it globally.
pub fn set_log_level_str(level: &str) -> Result<(), LogError> {
    set_log_level(level.parse()?);
    Ok(())
}

/// Installs (or with `None`, removes) a callback receiving every emitted diagnostic.
pub fn set_user_log_handler(callback: Option<LogCallback>) {
    with_instances(|logger| {
        let handler = callback.clone().map(|cb| {
            Arc::new(move |instance: &Logger, level: LogLevel, message: &str| {
                cb(LogCallbackParams {
                    level,
                    message: message.to_string(),
                    logger_name: instance.name().to_string(),
                    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                });
            }) as SharedLogHandler
        });
        logger.set_user_log_handler(handler);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static TEST_GUARD: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    fn reset_logging() {
        set_log_level(LogLevel::Warn);
        set_user_log_handler(None);
    }

    fn capture(logger: &Logger) -> Arc<Mutex<Vec<(LogLevel, String)>>> {
        let records = Arc::new(Mutex::new(Vec::new()));
        let handler_records = Arc::clone(&records);
        logger.set_log_handler(move |_, level, message| {
            handler_records
                .lock()
                .unwrap()
                .push((level, message.to_string()));
        });
        records
    }

    #[test]
    fn messages_below_level_are_dropped() {
        let _guard = TEST_GUARD.lock().unwrap();
        reset_logging();
        let logger = Logger::new("@page-monitor/logger-level-test");
        let records = capture(&logger);

        logger.debug("debug message");
        logger.info("info message");
        logger.warn("warn message");
        logger.error("error message");

        let stored = records.lock().unwrap();
        let levels: Vec<_> = stored.iter().map(|(level, _)| *level).collect();
        assert_eq!(levels, [LogLevel::Warn, LogLevel::Error]);
        assert_eq!(stored[0].1, "warn message");
    }

    #[test]
    fn global_level_reaches_existing_loggers() {
        let _guard = TEST_GUARD.lock().unwrap();
        reset_logging();
        let logger = Logger::new("@page-monitor/logger-global-test");
        let records = capture(&logger);

        set_log_level_str("debug").unwrap();
        logger.debug("now visible");
        assert_eq!(records.lock().unwrap().len(), 1);

        assert!(set_log_level_str("loud").is_err());
        reset_logging();
    }

    #[test]
    fn user_handler_receives_logger_name() {
        let _guard = TEST_GUARD.lock().unwrap();
        reset_logging();
        let logger = Logger::new("@page-monitor/logger-user-test");
        let name = logger.name().to_string();

        let captured = Arc::new(Mutex::new(Vec::new()));
        let captured_cb = Arc::clone(&captured);
        set_user_log_handler(Some(Arc::new(move |params: LogCallbackParams| {
            if params.logger_name == name {
                captured_cb.lock().unwrap().push(params);
            }
        })));
        assert!(logger.has_user_log_handler());

        logger.error("dropped record");
        logger.info("below level");

        let records = captured.lock().unwrap().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::Error);
        assert_eq!(records[0].message, "dropped record");
        assert!(records[0].timestamp.ends_with('Z'));
        drop(records);
        reset_logging();
        assert!(!logger.has_user_log_handler());
    }
}
