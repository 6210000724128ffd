use std::sync::Mutex;

use crate::monitor::error::MonitorResult;
use crate::monitor::transport::{BeaconChannel, PixelChannel, ReportPayload, Transport};

/// Beacon that stores what it was handed instead of sending it.
pub struct RecordingBeacon {
    available: bool,
    accept: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingBeacon {
    pub fn new(available: bool, accept: bool) -> Self {
        Self {
            available,
            accept,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl BeaconChannel for RecordingBeacon {
    fn is_available(&self) -> bool {
        self.available
    }

    fn send_beacon(&self, url: &str, body: &str) -> MonitorResult<bool> {
        if self.accept {
            self.sent
                .lock()
                .unwrap()
                .push((url.to_string(), body.to_string()));
        }
        Ok(self.accept)
    }
}

#[derive(Default)]
pub struct RecordingPixel {
    requested: Mutex<Vec<String>>,
}

impl RecordingPixel {
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl PixelChannel for RecordingPixel {
    fn request_pixel(&self, url: &str) -> MonitorResult<()> {
        self.requested.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Transport keeping every payload, in send order.
#[derive(Default)]
pub struct RecordingTransport {
    payloads: Mutex<Vec<(String, ReportPayload)>>,
}

impl RecordingTransport {
    pub fn payloads(&self) -> Vec<ReportPayload> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(|(endpoint, _)| endpoint.clone())
            .collect()
    }

    pub fn send_count(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, endpoint: &str, payload: &ReportPayload) -> MonitorResult<()> {
        self.payloads
            .lock()
            .unwrap()
            .push((endpoint.to_string(), payload.clone()));
        Ok(())
    }
}
