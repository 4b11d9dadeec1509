//! Offline verification, as an enrolled device would do it

use std::fs;
use std::path::Path;

use chrono::Utc;
use gatekeep_core::{Denylist, EnrollmentBundle, OfflineVerifier};

pub fn cmd_verify_offline(
    qr: &str,
    bundle_path: &Path,
    denylist_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let bundle: EnrollmentBundle = serde_json::from_str(&fs::read_to_string(bundle_path)?)
        .map_err(|e| format!("invalid bundle {}: {e}", bundle_path.display()))?;

    let mut verifier = OfflineVerifier::new(bundle)?;
    if let Some(path) = denylist_path {
        let denylist: Denylist = serde_json::from_str(&fs::read_to_string(path)?)
            .map_err(|e| format!("invalid denylist {}: {e}", path.display()))?;
        verifier = verifier.with_denylist(denylist);
    }

    let decision = verifier.verify(qr, Utc::now());
    println!("{}", serde_json::to_string_pretty(&decision)?);

    Ok(())
}
