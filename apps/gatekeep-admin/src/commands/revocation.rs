//! Revocation feed command

use chrono::{DateTime, Utc};
use gatekeep_core::Gatekeeper;
use gatekeep_storage::OrganizationId;

use super::parse_id;

pub async fn cmd_revoked_since(
    gate: &Gatekeeper,
    organization_id: &str,
    since: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let organization_id: OrganizationId = parse_id("organization id", organization_id)?;
    let since = since
        .map(|s| DateTime::parse_from_rfc3339(s.trim()).map(|dt| dt.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| format!("invalid --since: {e}"))?;

    let delta = gate.revocations.revoked_since(&organization_id, since).await?;
    println!("{}", serde_json::to_string_pretty(&delta)?);

    Ok(())
}
