//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Fresh time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

id_type!(
    /// Tenant (gated facility operator) identifier.
    OrganizationId
);
id_type!(
    /// Account identifier (checkpoint operators included).
    UserId
);
id_type!(
    /// Visit request identifier (owned by the visit-request workflow).
    VisitRequestId
);
id_type!(
    /// Access code identifier.
    AccessCodeId
);
id_type!(
    /// Scan log entry identifier.
    ScanLogId
);
id_type!(
    /// Visitor authorization identifier.
    AuthorizationId
);
id_type!(
    /// Access event identifier.
    AccessEventId
);
id_type!(
    /// Row identifier of a tenant signing key.
    CryptoKeyId
);
id_type!(
    /// Enrollment token identifier.
    EnrollmentTokenId
);
id_type!(
    /// Enrollment audit entry identifier.
    EnrollmentAuditId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_roundtrips_through_from_str() {
        let id = AuthorizationId::new();
        let parsed: AuthorizationId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<OrganizationId>().is_err());
    }
}
