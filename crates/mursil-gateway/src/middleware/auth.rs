//! Shared-secret authentication for the ingest endpoint
//!
//! When no secret is configured the gateway runs open (explicit
//! opt-in for trusted-network deployments). With a secret configured,
//! the caller must present exactly `Bearer <secret>`. The check runs
//! before any body parsing; an unauthenticated batch is never
//! partially processed.

/// Check a presented `Authorization` header against the configured
/// shared secret.
pub fn authenticate(presented: Option<&str>, secret: Option<&str>) -> bool {
    let secret = match secret {
        Some(s) if !s.is_empty() => s,
        _ => return true,
    };

    match presented {
        Some(header) => header == format!("Bearer {}", secret),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode_accepts_everything() {
        assert!(authenticate(None, None));
        assert!(authenticate(Some("Bearer anything"), None));
        assert!(authenticate(Some("garbage"), Some("")));
    }

    #[test]
    fn test_configured_secret_requires_exact_bearer() {
        let secret = Some("hunter2");
        assert!(authenticate(Some("Bearer hunter2"), secret));

        assert!(!authenticate(None, secret));
        assert!(!authenticate(Some("Bearer wrong"), secret));
        assert!(!authenticate(Some("hunter2"), secret));
        assert!(!authenticate(Some("bearer hunter2"), secret));
        assert!(!authenticate(Some("Bearer hunter2 "), secret));
        assert!(!authenticate(Some("Basic aHVudGVyMg=="), secret));
    }
}
