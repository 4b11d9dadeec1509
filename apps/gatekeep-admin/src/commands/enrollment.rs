//! Enrollment commands: issue, regenerate, preview

use std::env;
use std::io::{self, BufRead};

use gatekeep_core::{Gatekeeper, RequestMeta};
use gatekeep_storage::UserId;

use super::parse_id;

/// Raw tokens never go on the command line.
const TOKEN_ENV: &str = "GATEKEEP_ENROLLMENT_TOKEN";

pub async fn cmd_enrollment_issue(
    gate: &Gatekeeper,
    user_id: &str,
    actor: Option<&str>,
    regenerate: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let user_id: UserId = parse_id("user id", user_id)?;
    let actor = actor
        .map(|a| parse_id::<UserId>("actor id", a))
        .transpose()?;
    let meta = RequestMeta {
        ip_address: None,
        user_agent: Some(format!("gatekeep-admin/{}", env!("CARGO_PKG_VERSION"))),
    };

    let issued = if regenerate {
        gate.enrollment.regenerate(&user_id, actor, &meta).await?
    } else {
        gate.enrollment.issue(&user_id, actor, &meta).await?
    };

    println!("Token ID:   {}", issued.token_id);
    println!("Expires at: {}", issued.expires_at.to_rfc3339());
    if issued.superseded > 0 {
        println!("Revoked:    {} pending token(s)", issued.superseded);
    }
    println!("URL:        {}", issued.url);

    Ok(())
}

pub async fn cmd_enrollment_preview(gate: &Gatekeeper) -> Result<(), Box<dyn std::error::Error>> {
    let token = read_token(env::var(TOKEN_ENV).ok(), io::stdin().lock())?;
    let preview = gate.enrollment.validate_only(&token).await?;

    println!("Operator:     {}", preview.operator_name);
    println!("Organization: {}", preview.organization_name);
    println!("Expires at:   {}", preview.expires_at.to_rfc3339());

    Ok(())
}

/// Token from the environment, else the first line of `input`.
fn read_token(from_env: Option<String>, mut input: impl BufRead) -> io::Result<String> {
    if let Some(token) = from_env.filter(|t| !t.trim().is_empty()) {
        return Ok(token.trim().to_string());
    }
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}
