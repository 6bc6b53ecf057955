#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Timeout,
    Transport,
    DependencyDown,
    RateLimit,
    LookupFailed,
    BadPayload,
    UnknownJobType,
    Unknown,
}

impl ErrorCode {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "TIMEOUT" => Self::Timeout,
            "TRANSPORT" => Self::Transport,
            "DEPENDENCY_DOWN" => Self::DependencyDown,
            "RATE_LIMIT" => Self::RateLimit,
            "LOOKUP_FAILED" => Self::LookupFailed,
            "BAD_PAYLOAD" => Self::BadPayload,
            "UNKNOWN_JOB_TYPE" => Self::UnknownJobType,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::Transport => "TRANSPORT",
            Self::DependencyDown => "DEPENDENCY_DOWN",
            Self::RateLimit => "RATE_LIMIT",
            Self::LookupFailed => "LOOKUP_FAILED",
            Self::BadPayload => "BAD_PAYLOAD",
            Self::UnknownJobType => "UNKNOWN_JOB_TYPE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

pub fn suggested_action(code: &str) -> &'static str {
    match ErrorCode::from_str(code) {
        ErrorCode::Timeout => {
            "Increase handler timeout OR check provider latency. Retry is OK."
        }
        ErrorCode::Transport => {
            "Retry is OK. Check messaging-provider status and credentials."
        }
        ErrorCode::DependencyDown => {
            "Retry later. Check dependency health, circuit-break, fallback path."
        }
        ErrorCode::RateLimit => {
            "Back off. Respect Retry-After, lower worker concurrency."
        }
        ErrorCode::LookupFailed => {
            "Retry is OK if the record store was unreachable. If the booking id is simply wrong, fix the producer."
        }
        ErrorCode::BadPayload => {
            "Non-retryable. Validate payload schema/fields. Fix producer or add transform step."
        }
        ErrorCode::UnknownJobType => {
            "Non-retryable. Register a handler for this job_type or stop enqueuing it."
        }
        ErrorCode::Unknown => {
            "Inspect error_message + logs. Decide if retryable; add mapping once understood."
        }
    }
}
