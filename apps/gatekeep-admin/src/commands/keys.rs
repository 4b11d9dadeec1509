//! Organization key commands

use gatekeep_core::Gatekeeper;
use gatekeep_storage::{AuthorizationId, OrganizationId};

use super::parse_id;

pub async fn cmd_keys_show(
    gate: &Gatekeeper,
    organization_id: &str,
    create: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let organization_id: OrganizationId = parse_id("organization id", organization_id)?;
    if create {
        gate.keys.get_or_create(&organization_id).await?;
    }
    let (key_id, jwk) = gate.keys.active_public_key(&organization_id).await?;

    println!("Key ID: {}", key_id);
    println!("{}", serde_json::to_string_pretty(&jwk)?);

    Ok(())
}

pub async fn cmd_sign_qr(
    gate: &Gatekeeper,
    authorization_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let authorization_id: AuthorizationId = parse_id("authorization id", authorization_id)?;
    let qr = gate.authorizations.issue_qr(&authorization_id).await?;
    println!("{}", qr);
    Ok(())
}
