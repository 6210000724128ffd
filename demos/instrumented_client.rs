//! Records outgoing HTTP requests made through the monitored `reqwest` client.
//!
//! ```text
//! REPORT_URL=http://localhost:8080/report cargo run --example instrumented_client
//! ```

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use page_monitor::monitor::{default_transport, Monitor, MonitorConfig, QueueCategory};
use page_monitor::platform::page::StaticPage;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let report_url =
        std::env::var("REPORT_URL").unwrap_or_else(|_| "http://localhost:8080/report".into());
    let config = MonitorConfig::new(report_url)
        .with_timeout(Duration::from_secs(5))
        .with_max_queue_size(5);
    let transport = default_transport(&config)?;
    let page = Arc::new(StaticPage::new(
        "instrumented client demo",
        "app://instrumented-client",
        "page-monitor-demo/0.3",
    ));
    let monitor = Monitor::with_parts(config, transport, page)?;
    monitor.init()?;

    let client = monitor.http_client()?;
    for url in [
        "https://www.rust-lang.org/",
        "https://www.rust-lang.org/this-page-does-not-exist",
        "http://127.0.0.1:9/refused",
    ] {
        match client.send(client.get(url)).await {
            Ok(response) => println!("{url} -> {}", response.status()),
            Err(err) => println!("{url} failed: {err}"),
        }
    }

    println!(
        "queued: {} request(s), {} error(s)",
        monitor.queued(QueueCategory::Requests),
        monitor.queued(QueueCategory::Errors)
    );
    monitor.destroy();
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
