//! Reports panics from worker threads to a collection endpoint.
//!
//! Run with `PAGE_MONITOR_DISABLE_TRANSPORT=1` to exercise the capture path offline, or
//! point `REPORT_URL` at a collector:
//!
//! ```text
//! REPORT_URL=http://localhost:8080/report cargo run --example capture_panics
//! ```

use std::error::Error;
use std::thread;
use std::time::Duration;

use page_monitor::logger::{set_log_level, LogLevel};
use page_monitor::monitor::{Monitor, MonitorConfig};

fn main() -> Result<(), Box<dyn Error>> {
    set_log_level(LogLevel::Debug);

    let report_url =
        std::env::var("REPORT_URL").unwrap_or_else(|_| "http://localhost:8080/report".into());
    let monitor = Monitor::new(
        MonitorConfig::new(report_url)
            .with_app_id("capture-panics-demo")
            .with_send_interval(Duration::from_secs(2)),
    )?;
    monitor.init()?;
    println!("intercepting: {:?}", monitor.installed_capabilities());

    let workers: Vec<_> = (0..3)
        .map(|idx| {
            thread::Builder::new()
                .name(format!("worker-{idx}"))
                .spawn(move || {
                    if idx == 1 {
                        panic!("worker {idx} lost its database connection");
                    }
                })
        })
        .collect::<Result<_, _>>()?;
    for worker in workers {
        let _ = worker.join();
    }

    monitor.destroy();
    // Give the detached beacon a moment before the process exits.
    thread::sleep(Duration::from_millis(500));
    Ok(())
}
