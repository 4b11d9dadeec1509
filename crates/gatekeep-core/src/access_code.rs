//! Hashed, limited-use access codes.
//!
//! Status checks run in a fixed order (REVOKED, USED, EXPIRED, window,
//! entry budget) and every attempt leaves exactly one scan log entry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gatekeep_crypto::hash_token;
use gatekeep_storage::{
    AccessCode, AccessCodeStatus, AccessScanLog, CreateScanLogParams, ScanResult, Store,
    StoreError,
};
use tracing::{info, instrument, warn};

use crate::{Checkpoint, GateError};

/// Compare-and-swap attempts before a scan gives up with `Conflict`.
const MAX_ENTRY_ATTEMPTS: usize = 3;

/// Stored hash of a raw access code. Issuance and scanning both go through
/// here; surrounding whitespace (scanner newlines, padding) is not part of
/// the code.
pub fn access_code_hash(raw_code: &str) -> String {
    hash_token(raw_code.trim())
}

#[derive(Clone, Debug)]
pub struct ScanOutcome {
    pub result: ScanResult,
    pub note: String,
    /// Code state after the scan.
    pub access_code: AccessCode,
    pub log: AccessScanLog,
}

#[derive(Clone)]
pub struct AccessCodeValidator {
    store: Arc<dyn Store>,
}

impl AccessCodeValidator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate a scanned raw code and count the entry when admitted.
    ///
    /// An unknown code is logged as INVALID and then reported as `NotFound`.
    #[instrument(skip_all, fields(operator = %checkpoint.operator_id, device = %checkpoint.device_id))]
    pub async fn validate(
        &self,
        raw_code: &str,
        checkpoint: &Checkpoint,
    ) -> Result<ScanOutcome, GateError> {
        let code_hash = access_code_hash(raw_code);
        let code = match self.store.get_access_code_by_hash(&code_hash).await {
            Ok(code) => code,
            Err(StoreError::NotFound) => {
                warn!("unknown access code");
                self.log(None, ScanResult::Invalid, "Access code not found", checkpoint)
                    .await?;
                return Err(GateError::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let (result, note, code) = match self.decide(code.clone(), Utc::now()).await {
            Ok(decision) => decision,
            Err(GateError::Conflict) => {
                warn!(code = %code.id, "gave up on contended access code");
                self.log(
                    Some(&code),
                    ScanResult::Invalid,
                    "Concurrent scan in progress, try again",
                    checkpoint,
                )
                .await?;
                return Err(GateError::Conflict);
            }
            Err(e) => return Err(e),
        };
        if result.admits() {
            info!(code = %code.id, entries = code.entries_used, "access code admitted");
        } else {
            warn!(code = %code.id, result = %result, "access code denied");
        }

        let log = self.log(Some(&code), result, &note, checkpoint).await?;
        Ok(ScanOutcome {
            result,
            note,
            access_code: code,
            log,
        })
    }

    async fn decide(
        &self,
        mut code: AccessCode,
        now: DateTime<Utc>,
    ) -> Result<(ScanResult, String, AccessCode), GateError> {
        for _ in 0..MAX_ENTRY_ATTEMPTS {
            match code.status {
                AccessCodeStatus::Revoked => {
                    return Ok((ScanResult::Revoked, "Access code revoked".into(), code))
                }
                AccessCodeStatus::Used => {
                    return Ok((ScanResult::AlreadyUsed, "Entry limit reached".into(), code))
                }
                AccessCodeStatus::Expired => {
                    return Ok((ScanResult::Expired, "Access code expired".into(), code))
                }
                AccessCodeStatus::Active => {}
            }

            if now < code.valid_from || now > code.valid_until {
                self.store
                    .set_access_code_status(&code.id, AccessCodeStatus::Expired, now)
                    .await?;
                code.status = AccessCodeStatus::Expired;
                return Ok((
                    ScanResult::Expired,
                    "Access code outside its validity window".into(),
                    code,
                ));
            }

            let visit = self.store.get_visit_request(&code.visit_request_id).await?;
            if code.entries_used >= visit.max_entries {
                return Ok((ScanResult::AlreadyUsed, "Entry limit reached".into(), code));
            }

            match self
                .store
                .record_code_entry(&code.id, code.entries_used, visit.max_entries, now)
                .await
            {
                Ok(updated) => {
                    let note = format!("Entry {} of {}", updated.entries_used, visit.max_entries);
                    return Ok((ScanResult::Valid, note, updated));
                }
                Err(StoreError::Conflict) => {
                    // Another scan moved the counter; evaluate again from the fresh row.
                    warn!(code = %code.id, "entry counter changed concurrently, retrying");
                    code = self.store.get_access_code(&code.id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(GateError::Conflict)
    }

    async fn log(
        &self,
        code: Option<&AccessCode>,
        result: ScanResult,
        note: &str,
        checkpoint: &Checkpoint,
    ) -> Result<AccessScanLog, GateError> {
        Ok(self
            .store
            .insert_scan_log(&CreateScanLogParams {
                access_code_id: code.map(|c| c.id),
                result,
                operator_id: checkpoint.operator_id,
                location: checkpoint.location.clone(),
                device: Some(checkpoint.device_id.clone()),
                note: note.to_string(),
            })
            .await?)
    }
}
