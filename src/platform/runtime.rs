use std::future::Future;
use std::time::Duration;

/// Platform-independent helper to spawn an async task that runs in the background.
#[cfg(target_arch = "wasm32")]
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}

/// Platform-independent helper to spawn an async task that runs in the background.
///
/// Inside a Tokio context the task joins the caller's runtime; otherwise it runs on a
/// dedicated single-threaded runtime driven by its own thread.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    use tokio::runtime::Handle;

    if let Ok(handle) = Handle::try_current() {
        handle.spawn(future);
    } else if let Some(handle) = background_handle() {
        handle.spawn(future);
    } else {
        log::debug!("background runtime unavailable; dropping detached task");
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn background_handle() -> Option<&'static tokio::runtime::Handle> {
    use std::sync::LazyLock;
    use tokio::runtime::{Builder, Handle};

    static BACKGROUND_RUNTIME: LazyLock<Option<Handle>> = LazyLock::new(|| {
        let runtime = match Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                log::debug!("failed to build background tokio runtime: {err}");
                return None;
            }
        };
        let handle = runtime.handle().clone();
        let spawned = std::thread::Builder::new()
            .name("page-monitor-background".into())
            .spawn(move || runtime.block_on(std::future::pending::<()>()));
        match spawned {
            Ok(_) => Some(handle),
            Err(err) => {
                log::debug!("failed to start background runtime thread: {err}");
                None
            }
        }
    });

    BACKGROUND_RUNTIME.as_ref()
}

/// Asynchronously waits for the provided duration in a platform-compatible way.
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }

    sleep_impl(duration).await;
}

#[cfg(target_arch = "wasm32")]
async fn sleep_impl(duration: Duration) {
    use gloo_timers::future::sleep;
    sleep(duration).await;
}

#[cfg(not(target_arch = "wasm32"))]
async fn sleep_impl(duration: Duration) {
    use tokio::time::sleep;
    sleep(duration).await;
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
