use std::time::Duration;

use reqwest::{Client, IntoUrl, Method, Request, RequestBuilder, Response};

use crate::monitor::api::CaptureSink;
use crate::monitor::error::{internal_error, MonitorResult};
use crate::monitor::normalizer::RequestSpan;
use crate::monitor::record::RequestSource;
use crate::platform::runtime;

/// `reqwest::Client` wrapper that records every request it executes.
///
/// Responses and errors are handed back untouched; only a `fetch` request record (and a
/// request error for failures and non-2xx statuses) is captured on the side.
#[derive(Clone, Debug)]
pub struct MonitoredClient {
    client: Client,
    sink: CaptureSink,
}

impl MonitoredClient {
    pub fn new(sink: CaptureSink, client: Client) -> Self {
        Self { client, sink }
    }

    /// Builds a client with a per-request `timeout`. A zero timeout means none.
    pub fn with_timeout(sink: CaptureSink, timeout: Duration) -> MonitorResult<Self> {
        let mut builder = Client::builder();
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| internal_error(format!("failed to build HTTP client: {err}")))?;
        Ok(Self::new(sink, client))
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RequestBuilder {
        self.client.request(method, url)
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Builds and executes `builder`. Build failures are returned without being recorded.
    pub async fn send(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
        let request = builder.build()?;
        self.execute(request).await
    }

    pub async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        let span = RequestSpan::start(
            RequestSource::Fetch,
            Some(request.method().as_str()),
            request.url().as_str(),
            runtime::now_ms(),
        );
        let result = self.client.execute(request).await;
        let end = runtime::now_ms();
        let outcome = match &result {
            Ok(response) => span.complete(response.status().as_u16(), end),
            Err(err) if err.is_timeout() => span.time_out(end),
            Err(err) => span.fail(err.to_string(), end),
        };
        self.sink.capture_outcome(outcome);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use httpmock::prelude::*;

    use crate::monitor::api::Monitor;
    use crate::monitor::config::MonitorConfig;
    use crate::monitor::record::{ErrorLog, LogRecord};
    use crate::platform::page::StaticPage;
    use crate::test_support::{start_mock_server, RecordingTransport};

    fn monitor() -> (Monitor, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let monitor = Monitor::with_parts(
            MonitorConfig::new("https://collect.example.com/report")
                .with_timeout(Duration::from_millis(200)),
            transport.clone(),
            Arc::new(StaticPage::default()),
        )
        .unwrap();
        (monitor, transport)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn records_successful_requests() {
        let server = start_mock_server();
        server.mock(|when, then| {
            when.method(POST).path("/items");
            then.status(201).body("created");
        });
        let (monitor, transport) = monitor();
        let client = monitor.http_client().unwrap();

        let response = client
            .send(client.post(server.url("/items")).body("{}"))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        assert_eq!(response.text().await.unwrap(), "created");

        monitor.flush();
        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 1);
        match &payloads[0].records()[0] {
            LogRecord::Request(request) => {
                assert_eq!(request.source, RequestSource::Fetch);
                assert_eq!(request.method, "POST");
                assert_eq!(request.status, 201);
                assert!(request.success);
                assert!(request.url.ends_with("/items"));
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn server_errors_also_produce_request_errors() {
        let server = start_mock_server();
        server.mock(|when, then| {
            when.method(GET).path("/broken");
            then.status(503);
        });
        let (monitor, transport) = monitor();
        let client = monitor.http_client().unwrap();

        let response = client.send(client.get(server.url("/broken"))).await.unwrap();
        assert_eq!(response.status().as_u16(), 503);

        monitor.flush();
        let errors: Vec<_> = transport
            .payloads()
            .iter()
            .flat_map(|payload| payload.records().to_vec())
            .filter_map(|record| match record {
                LogRecord::Error(ErrorLog::RequestError(error)) => Some(error),
                _ => None,
            })
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].status, 503);
        assert_eq!(errors[0].method, "GET");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn connection_failures_are_returned_unchanged() {
        let (monitor, transport) = monitor();
        let client = monitor.http_client().unwrap();

        let err = client
            .send(client.get("http://127.0.0.1:9/unreachable"))
            .await
            .unwrap_err();
        assert!(err.is_connect() || err.is_timeout());

        monitor.flush();
        let requests: Vec<_> = transport
            .payloads()
            .iter()
            .flat_map(|payload| payload.records().to_vec())
            .filter_map(|record| match record {
                LogRecord::Request(request) => Some(request),
                _ => None,
            })
            .collect();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].status, 0);
        assert!(!requests[0].success);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn zero_timeout_config_does_not_time_out_requests() {
        let server = start_mock_server();
        server.mock(|when, then| {
            when.method(GET).path("/ok");
            then.status(200);
        });
        let config = MonitorConfig::from_json(&format!(
            r#"{{"reportUrl":"{}","timeoutDuration":0}}"#,
            server.url("/report")
        ))
        .unwrap();
        let monitor = Monitor::with_parts(
            config,
            Arc::new(RecordingTransport::default()),
            Arc::new(StaticPage::default()),
        )
        .unwrap();
        let client = monitor.http_client().unwrap();

        let response = client.send(client.get(server.url("/ok"))).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }
}
