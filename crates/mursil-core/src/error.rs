//! Error types for Mursil

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Ingress errors
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    // Egress errors
    #[error("Target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("Target rejected trigger: {0}")]
    TargetRejected(String),

    #[error("Target misconfigured: {0}")]
    TargetMisconfigured(String),

    // Invariant violations
    #[error("No dispatch targets configured")]
    NoTargets,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Short machine-readable code used in JSON error responses
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unauthorized => "unauthorized",
            Error::MalformedPayload(_) => "malformed_payload",
            Error::TargetUnreachable(_) => "target_unreachable",
            Error::TargetRejected(_) => "target_rejected",
            Error::TargetMisconfigured(_) => "target_misconfigured",
            Error::NoTargets => "no_targets",
            Error::InvalidConfig(_) => "invalid_config",
            Error::Internal(_) | Error::Io(_) | Error::Other(_) => "internal_error",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Error::Unauthorized => 401,
            Error::MalformedPayload(_) => 400,
            Error::TargetUnreachable(_) | Error::TargetRejected(_) => 502,
            Error::TargetMisconfigured(_) | Error::NoTargets | Error::InvalidConfig(_) => 500,
            Error::Internal(_) | Error::Io(_) | Error::Other(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(Error::Unauthorized.http_status(), 401);
        assert_eq!(Error::MalformedPayload("bad json".into()).http_status(), 400);
        assert_eq!(Error::NoTargets.http_status(), 500);
        assert_eq!(Error::TargetUnreachable("timeout".into()).http_status(), 502);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Unauthorized.code(), "unauthorized");
        assert_eq!(Error::MalformedPayload("x".into()).code(), "malformed_payload");
        assert_eq!(Error::NoTargets.code(), "no_targets");
    }
}
