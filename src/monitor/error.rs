use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorErrorCode {
    InvalidArgument,
    Unsupported,
    Transport,
    Internal,
}

impl MonitorErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorErrorCode::InvalidArgument => "monitor/invalid-argument",
            MonitorErrorCode::Unsupported => "monitor/unsupported",
            MonitorErrorCode::Transport => "monitor/transport",
            MonitorErrorCode::Internal => "monitor/internal",
        }
    }
}

#[derive(Clone, Debug)]
pub struct MonitorError {
    pub code: MonitorErrorCode,
    message: String,
}

impl MonitorError {
    pub fn new(code: MonitorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for MonitorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for MonitorError {}

pub type MonitorResult<T> = Result<T, MonitorError>;

pub fn invalid_argument(message: impl Into<String>) -> MonitorError {
    MonitorError::new(MonitorErrorCode::InvalidArgument, message)
}

pub fn unsupported(message: impl Into<String>) -> MonitorError {
    MonitorError::new(MonitorErrorCode::Unsupported, message)
}

pub fn transport_error(message: impl Into<String>) -> MonitorError {
    MonitorError::new(MonitorErrorCode::Transport, message)
}

pub fn internal_error(message: impl Into<String>) -> MonitorError {
    MonitorError::new(MonitorErrorCode::Internal, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let err = invalid_argument("request url is required");
        assert_eq!(
            err.to_string(),
            "request url is required (monitor/invalid-argument)"
        );
        assert_eq!(err.code, MonitorErrorCode::InvalidArgument);
    }

    #[test]
    fn helpers_map_to_codes() {
        let cases = [
            (unsupported("no sendBeacon"), "monitor/unsupported"),
            (transport_error("pixel failed"), "monitor/transport"),
            (internal_error("serialize"), "monitor/internal"),
        ];
        for (err, code) in cases {
            assert_eq!(err.code_str(), code);
            assert!(err.to_string().ends_with(&format!("({code})")));
        }
        assert_eq!(unsupported("no sendBeacon").message(), "no sendBeacon");
    }
}
