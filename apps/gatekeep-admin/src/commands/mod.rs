pub mod enrollment;
pub mod keys;
pub mod revocation;
pub mod verify;

pub use enrollment::{cmd_enrollment_issue, cmd_enrollment_preview};
pub use keys::{cmd_keys_show, cmd_sign_qr};
pub use revocation::cmd_revoked_since;
pub use verify::cmd_verify_offline;

/// Parse a UUID argument into one of the typed ids.
pub(crate) fn parse_id<T>(what: &str, value: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("invalid {what} '{value}': {e}").into())
}
