//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use these types for
//! every credential the coordinator handles, most importantly the bearer
//! secret checked by the front door.
//!
//! `SecretBox<T>` and `SecretString` implement `Debug` with redaction, so a
//! struct that derives `Debug` while holding a secret still logs safely, and
//! `tracing` fields recorded with `?` never leak the value. Secrets are
//! zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct FrontDoorCredentials {
//!     operator: String,
//!     bearer: SecretString,
//! }
//!
//! let creds = FrontDoorCredentials {
//!     operator: "metering".to_string(),
//!     bearer: SecretString::from("s3cr3t-bearer"),
//! };
//!
//! // Safe: the bearer is printed as [REDACTED]
//! println!("{:?}", creds);
//!
//! // Access requires an explicit call
//! let bearer: &str = creds.bearer.expose_secret();
//! assert_eq!(bearer, "s3cr3t-bearer");
//! ```
//!
//! # Usage Guidelines
//!
//! Use `SecretString` for:
//! - The front-door bearer credential (`COORDINATOR_AUTH_SECRET`)
//! - Operator secrets passed through to administrative callers
//!
//! Use `SecretBox<T>` for binary key material.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("bearer-value");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("bearer-value"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("password123");
        assert_eq!(secret.expose_secret(), "password123");
    }

    #[test]
    fn test_deserialize_keeps_value_out_of_debug() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct OperatorCredentials {
            operator: String,
            secret: SecretString,
        }

        let json = r#"{"operator": "admin-reset", "secret": "op-secret-value"}"#;
        let creds: OperatorCredentials = serde_json::from_str(json).expect("deserialize");

        assert_eq!(creds.secret.expose_secret(), "op-secret-value");

        let debug = format!("{creds:?}");
        assert!(debug.contains("admin-reset"));
        assert!(!debug.contains("op-secret-value"));
    }

    #[test]
    fn test_clone_works() {
        let secret = SecretString::from("cloneable");
        let cloned = secret.clone();
        assert_eq!(cloned.expose_secret(), "cloneable");
    }
}
