//! SQLite implementation of the gatekeep [`Store`].
//!
//! Every race-prone transition is a single conditional statement so that
//! concurrent callers observe either success or [`StoreError::Conflict`]:
//! the entry counter, token consumption and the one-active-key-per-tenant
//! rule (a partial unique index).

use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use gatekeep_storage::*;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Private in-memory database, one connection kept alive for the pool lifetime.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(backend)?;
        Self::migrate(pool).await
    }

    /// Open (creating if missing) the database at `url`, e.g. `sqlite://gatekeep.db`.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        if url.contains(":memory:") {
            return Self::open_in_memory().await;
        }
        let url = if url.contains('?') {
            url.to_string()
        } else {
            format!("{url}?mode=rwc")
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .map_err(backend)?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, StoreError> {
        MIGRATOR.run(&pool).await.map_err(backend)?;
        Ok(Self { pool })
    }

    async fn exists(&self, table: &'static str, id: &str) -> Result<bool, StoreError> {
        let sql = format!("SELECT 1 FROM {table} WHERE id=?");
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        Ok(row.is_some())
    }

    async fn get_enrollment_token(
        &self,
        id: &EnrollmentTokenId,
    ) -> Result<EnrollmentToken, StoreError> {
        sqlx::query_as::<_, EnrollmentTokenRow>("SELECT * FROM enrollment_tokens WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }
}

// ───────────────────────────── Conversions ─────────────────────────────

fn backend(e: impl Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn insert_error(e: sqlx::Error) -> StoreError {
    let s = e.to_string();
    if s.contains("UNIQUE") {
        StoreError::AlreadyExists
    } else {
        StoreError::Backend(s)
    }
}

fn millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Backend(format!("timestamp out of range: {ms}")))
}

fn from_millis_opt(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, StoreError> {
    ms.map(from_millis).transpose()
}

fn parse<T>(s: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: Display,
{
    s.parse().map_err(backend)
}

fn parse_opt<T>(s: Option<String>) -> Result<Option<T>, StoreError>
where
    T: FromStr,
    T::Err: Display,
{
    s.as_deref().map(parse).transpose()
}

#[derive(sqlx::FromRow)]
struct OrganizationRow {
    id: String,
    name: String,
    created_at: i64,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = StoreError;

    fn try_from(r: OrganizationRow) -> Result<Self, StoreError> {
        Ok(Organization {
            id: parse(&r.id)?,
            name: r.name,
            created_at: from_millis(r.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    organization_id: String,
    display_name: String,
    status: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, StoreError> {
        Ok(User {
            id: parse(&r.id)?,
            organization_id: parse(&r.organization_id)?,
            display_name: r.display_name,
            status: parse(&r.status)?,
            created_at: from_millis(r.created_at)?,
            updated_at: from_millis(r.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VisitRequestRow {
    id: String,
    organization_id: String,
    max_entries: i32,
    created_at: i64,
}

impl TryFrom<VisitRequestRow> for VisitRequest {
    type Error = StoreError;

    fn try_from(r: VisitRequestRow) -> Result<Self, StoreError> {
        Ok(VisitRequest {
            id: parse(&r.id)?,
            organization_id: parse(&r.organization_id)?,
            max_entries: r.max_entries,
            created_at: from_millis(r.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AccessCodeRow {
    id: String,
    organization_id: String,
    visit_request_id: String,
    code_hash: String,
    status: String,
    valid_from: i64,
    valid_until: i64,
    entries_used: i32,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<AccessCodeRow> for AccessCode {
    type Error = StoreError;

    fn try_from(r: AccessCodeRow) -> Result<Self, StoreError> {
        Ok(AccessCode {
            id: parse(&r.id)?,
            organization_id: parse(&r.organization_id)?,
            visit_request_id: parse(&r.visit_request_id)?,
            code_hash: r.code_hash,
            status: parse(&r.status)?,
            valid_from: from_millis(r.valid_from)?,
            valid_until: from_millis(r.valid_until)?,
            entries_used: r.entries_used,
            created_at: from_millis(r.created_at)?,
            updated_at: from_millis(r.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScanLogRow {
    id: String,
    access_code_id: Option<String>,
    result: String,
    operator_id: String,
    location: Option<String>,
    device: Option<String>,
    note: String,
    created_at: i64,
}

impl TryFrom<ScanLogRow> for AccessScanLog {
    type Error = StoreError;

    fn try_from(r: ScanLogRow) -> Result<Self, StoreError> {
        Ok(AccessScanLog {
            id: parse(&r.id)?,
            access_code_id: parse_opt(r.access_code_id)?,
            result: parse(&r.result)?,
            operator_id: parse(&r.operator_id)?,
            location: r.location,
            device: r.device,
            note: r.note,
            created_at: from_millis(r.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuthorizationRow {
    id: String,
    organization_id: String,
    status: String,
    valid_from: i64,
    valid_to: i64,
    person_name: String,
    person_document: String,
    vehicle_plate: Option<String>,
    vehicle_model: Option<String>,
    vehicle_color: Option<String>,
    revoked_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<AuthorizationRow> for VisitorAuthorization {
    type Error = StoreError;

    fn try_from(r: AuthorizationRow) -> Result<Self, StoreError> {
        Ok(VisitorAuthorization {
            id: parse(&r.id)?,
            organization_id: parse(&r.organization_id)?,
            status: parse(&r.status)?,
            valid_from: from_millis(r.valid_from)?,
            valid_to: from_millis(r.valid_to)?,
            person_name: r.person_name,
            person_document: r.person_document,
            vehicle_plate: r.vehicle_plate,
            vehicle_model: r.vehicle_model,
            vehicle_color: r.vehicle_color,
            revoked_at: from_millis_opt(r.revoked_at)?,
            created_at: from_millis(r.created_at)?,
            updated_at: from_millis(r.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AccessEventRow {
    id: String,
    organization_id: String,
    authorization_id: Option<String>,
    action: String,
    scan_result: String,
    person_name: Option<String>,
    person_document: Option<String>,
    vehicle_plate: Option<String>,
    operator_id: String,
    device_id: String,
    offline_validated: bool,
    note: Option<String>,
    client_event_id: Option<String>,
    created_at: i64,
    synced_at: Option<i64>,
}

impl TryFrom<AccessEventRow> for AccessEvent {
    type Error = StoreError;

    fn try_from(r: AccessEventRow) -> Result<Self, StoreError> {
        Ok(AccessEvent {
            id: parse(&r.id)?,
            organization_id: parse(&r.organization_id)?,
            authorization_id: parse_opt(r.authorization_id)?,
            action: parse(&r.action)?,
            scan_result: parse(&r.scan_result)?,
            person_name: r.person_name,
            person_document: r.person_document,
            vehicle_plate: r.vehicle_plate,
            operator_id: parse(&r.operator_id)?,
            device_id: r.device_id,
            offline_validated: r.offline_validated,
            note: r.note,
            client_event_id: r.client_event_id,
            created_at: from_millis(r.created_at)?,
            synced_at: from_millis_opt(r.synced_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CryptoKeyRow {
    id: String,
    organization_id: String,
    key_id: String,
    algorithm: String,
    public_jwk: String,
    private_key_nonce: Vec<u8>,
    private_key_ciphertext: Vec<u8>,
    is_active: bool,
    created_at: i64,
}

impl TryFrom<CryptoKeyRow> for OrganizationCryptoKey {
    type Error = StoreError;

    fn try_from(r: CryptoKeyRow) -> Result<Self, StoreError> {
        Ok(OrganizationCryptoKey {
            id: parse(&r.id)?,
            organization_id: parse(&r.organization_id)?,
            key_id: r.key_id,
            algorithm: r.algorithm,
            public_jwk: r.public_jwk,
            private_key_nonce: r.private_key_nonce,
            private_key_ciphertext: r.private_key_ciphertext,
            is_active: r.is_active,
            created_at: from_millis(r.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EnrollmentTokenRow {
    id: String,
    organization_id: String,
    user_id: String,
    token_hash: String,
    status: String,
    expires_at: i64,
    consumed_at: Option<i64>,
    created_by: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<EnrollmentTokenRow> for EnrollmentToken {
    type Error = StoreError;

    fn try_from(r: EnrollmentTokenRow) -> Result<Self, StoreError> {
        Ok(EnrollmentToken {
            id: parse(&r.id)?,
            organization_id: parse(&r.organization_id)?,
            user_id: parse(&r.user_id)?,
            token_hash: r.token_hash,
            status: parse(&r.status)?,
            expires_at: from_millis(r.expires_at)?,
            consumed_at: from_millis_opt(r.consumed_at)?,
            created_by: parse_opt(r.created_by)?,
            created_at: from_millis(r.created_at)?,
            updated_at: from_millis(r.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EnrollmentAuditRow {
    id: String,
    organization_id: String,
    user_id: String,
    token_id: Option<String>,
    action: String,
    actor_id: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    device_platform: Option<String>,
    device_model: Option<String>,
    app_version: Option<String>,
    created_at: i64,
}

impl TryFrom<EnrollmentAuditRow> for EnrollmentAuditEntry {
    type Error = StoreError;

    fn try_from(r: EnrollmentAuditRow) -> Result<Self, StoreError> {
        Ok(EnrollmentAuditEntry {
            id: parse(&r.id)?,
            organization_id: parse(&r.organization_id)?,
            user_id: parse(&r.user_id)?,
            token_id: parse_opt(r.token_id)?,
            action: parse(&r.action)?,
            actor_id: parse_opt(r.actor_id)?,
            ip_address: r.ip_address,
            user_agent: r.user_agent,
            device_platform: r.device_platform,
            device_model: r.device_model,
            app_version: r.app_version,
            created_at: from_millis(r.created_at)?,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Organizations & users ─────────────────────────────

    async fn create_organization(
        &self,
        params: &CreateOrganizationParams,
    ) -> Result<Organization, StoreError> {
        let id = OrganizationId::new();
        sqlx::query("INSERT INTO organizations(id,name,created_at) VALUES(?,?,?)")
            .bind(id.to_string())
            .bind(&params.name)
            .bind(millis(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(insert_error)?;
        self.get_organization(&id).await
    }

    async fn get_organization(&self, id: &OrganizationId) -> Result<Organization, StoreError> {
        sqlx::query_as::<_, OrganizationRow>("SELECT * FROM organizations WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn create_user(&self, params: &CreateUserParams) -> Result<User, StoreError> {
        let id = UserId::new();
        let now = millis(Utc::now());
        sqlx::query(
            "INSERT INTO users(id,organization_id,display_name,status,created_at,updated_at)
             VALUES(?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(params.organization_id.to_string())
        .bind(&params.display_name)
        .bind(params.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(insert_error)?;
        self.get_user(&id).await
    }

    async fn get_user(&self, id: &UserId) -> Result<User, StoreError> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn activate_user(&self, id: &UserId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let res = sqlx::query(
            "UPDATE users SET status='ACTIVE', updated_at=? WHERE id=? AND status<>'ACTIVE'",
        )
        .bind(millis(at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if res.rows_affected() == 1 {
            return Ok(true);
        }
        if self.exists("users", &id.to_string()).await? {
            Ok(false)
        } else {
            Err(StoreError::NotFound)
        }
    }

    // ───────────────────────────── Visit requests & access codes ─────────────────────

    async fn create_visit_request(
        &self,
        params: &CreateVisitRequestParams,
    ) -> Result<VisitRequest, StoreError> {
        let id = VisitRequestId::new();
        sqlx::query(
            "INSERT INTO visit_requests(id,organization_id,max_entries,created_at) VALUES(?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(params.organization_id.to_string())
        .bind(params.max_entries)
        .bind(millis(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(insert_error)?;
        self.get_visit_request(&id).await
    }

    async fn get_visit_request(&self, id: &VisitRequestId) -> Result<VisitRequest, StoreError> {
        sqlx::query_as::<_, VisitRequestRow>("SELECT * FROM visit_requests WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn create_access_code(
        &self,
        params: &CreateAccessCodeParams,
    ) -> Result<AccessCode, StoreError> {
        let id = AccessCodeId::new();
        let now = millis(Utc::now());
        sqlx::query(
            "INSERT INTO access_codes(id,organization_id,visit_request_id,code_hash,status,
                                      valid_from,valid_until,entries_used,created_at,updated_at)
             VALUES(?,?,?,?,'ACTIVE',?,?,0,?,?)",
        )
        .bind(id.to_string())
        .bind(params.organization_id.to_string())
        .bind(params.visit_request_id.to_string())
        .bind(&params.code_hash)
        .bind(millis(params.valid_from))
        .bind(millis(params.valid_until))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(insert_error)?;
        self.get_access_code(&id).await
    }

    async fn get_access_code(&self, id: &AccessCodeId) -> Result<AccessCode, StoreError> {
        sqlx::query_as::<_, AccessCodeRow>("SELECT * FROM access_codes WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn get_access_code_by_hash(&self, code_hash: &str) -> Result<AccessCode, StoreError> {
        sqlx::query_as::<_, AccessCodeRow>("SELECT * FROM access_codes WHERE code_hash=?")
            .bind(code_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn set_access_code_status(
        &self,
        id: &AccessCodeId,
        status: AccessCodeStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE access_codes SET status=?, updated_at=? WHERE id=?")
            .bind(status.as_str())
            .bind(millis(at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn record_code_entry(
        &self,
        id: &AccessCodeId,
        expected_entries: i32,
        max_entries: i32,
        at: DateTime<Utc>,
    ) -> Result<AccessCode, StoreError> {
        // Right-hand sides see the pre-update row.
        let res = sqlx::query(
            "UPDATE access_codes
             SET entries_used = entries_used + 1,
                 status = CASE WHEN entries_used + 1 >= ? THEN 'USED' ELSE status END,
                 updated_at = ?
             WHERE id=? AND status='ACTIVE' AND entries_used=?",
        )
        .bind(max_entries)
        .bind(millis(at))
        .bind(id.to_string())
        .bind(expected_entries)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if res.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        self.get_access_code(id).await
    }

    async fn insert_scan_log(
        &self,
        params: &CreateScanLogParams,
    ) -> Result<AccessScanLog, StoreError> {
        let id = ScanLogId::new();
        sqlx::query(
            "INSERT INTO access_scan_logs(id,access_code_id,result,operator_id,location,device,note,created_at)
             VALUES(?,?,?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(params.access_code_id.map(|c| c.to_string()))
        .bind(params.result.as_str())
        .bind(params.operator_id.to_string())
        .bind(params.location.as_deref())
        .bind(params.device.as_deref())
        .bind(&params.note)
        .bind(millis(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(insert_error)?;

        sqlx::query_as::<_, ScanLogRow>("SELECT * FROM access_scan_logs WHERE id=?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?
            .try_into()
    }

    async fn list_scan_logs(
        &self,
        access_code_id: Option<AccessCodeId>,
    ) -> Result<Vec<AccessScanLog>, StoreError> {
        let rows = match access_code_id {
            Some(code) => {
                sqlx::query_as::<_, ScanLogRow>(
                    "SELECT * FROM access_scan_logs WHERE access_code_id=? ORDER BY rowid",
                )
                .bind(code.to_string())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, ScanLogRow>("SELECT * FROM access_scan_logs ORDER BY rowid")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(backend)?;
        convert_all(rows)
    }

    // ───────────────────────────── Authorizations ─────────────────────────────

    async fn create_authorization(
        &self,
        params: &CreateAuthorizationParams,
    ) -> Result<VisitorAuthorization, StoreError> {
        let id = AuthorizationId::new();
        let now = millis(Utc::now());
        sqlx::query(
            "INSERT INTO visitor_authorizations(id,organization_id,status,valid_from,valid_to,
                 person_name,person_document,vehicle_plate,vehicle_model,vehicle_color,
                 created_at,updated_at)
             VALUES(?,?,'ACTIVE',?,?,?,?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(params.organization_id.to_string())
        .bind(millis(params.valid_from))
        .bind(millis(params.valid_to))
        .bind(&params.person_name)
        .bind(&params.person_document)
        .bind(params.vehicle_plate.as_deref())
        .bind(params.vehicle_model.as_deref())
        .bind(params.vehicle_color.as_deref())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(insert_error)?;
        self.get_authorization(&id).await
    }

    async fn get_authorization(
        &self,
        id: &AuthorizationId,
    ) -> Result<VisitorAuthorization, StoreError> {
        sqlx::query_as::<_, AuthorizationRow>("SELECT * FROM visitor_authorizations WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?
            .try_into()
    }

    async fn list_authorizations_by_document(
        &self,
        organization_id: &OrganizationId,
        person_document: &str,
    ) -> Result<Vec<VisitorAuthorization>, StoreError> {
        let rows = sqlx::query_as::<_, AuthorizationRow>(
            "SELECT * FROM visitor_authorizations
             WHERE organization_id=? AND person_document=?
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(organization_id.to_string())
        .bind(person_document)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    async fn revoke_authorization(&self, id: &AuthorizationId) -> Result<(), StoreError> {
        let now = millis(Utc::now());
        let res = sqlx::query(
            "UPDATE visitor_authorizations SET status='REVOKED', revoked_at=?, updated_at=?
             WHERE id=? AND status<>'REVOKED'",
        )
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        // Re-revoking keeps the original revoked_at.
        if res.rows_affected() == 0
            && !self
                .exists("visitor_authorizations", &id.to_string())
                .await?
        {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_revoked_authorizations(
        &self,
        organization_id: &OrganizationId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuthorizationId>, StoreError> {
        let since = since.map(millis);
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT id FROM visitor_authorizations
             WHERE organization_id=? AND status='REVOKED'
               AND (? IS NULL OR revoked_at >= ?)
             ORDER BY revoked_at, rowid",
        )
        .bind(organization_id.to_string())
        .bind(since)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(|(id,)| parse(&id)).collect()
    }

    // ───────────────────────────── Access events ─────────────────────────────

    async fn insert_access_event(
        &self,
        event: &NewAccessEvent,
    ) -> Result<AccessEvent, StoreError> {
        self.insert_access_events(std::slice::from_ref(event))
            .await?
            .pop()
            .ok_or_else(|| StoreError::Backend("event insert returned no row".into()))
    }

    async fn insert_access_events(
        &self,
        events: &[NewAccessEvent],
    ) -> Result<Vec<AccessEvent>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut ids = Vec::with_capacity(events.len());

        for e in events {
            let id = AccessEventId::new();
            let res = sqlx::query(
                "INSERT INTO access_events(id,organization_id,authorization_id,action,scan_result,
                     person_name,person_document,vehicle_plate,operator_id,device_id,
                     offline_validated,note,client_event_id,created_at,synced_at)
                 VALUES(?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)
                 ON CONFLICT DO NOTHING",
            )
            .bind(id.to_string())
            .bind(e.organization_id.to_string())
            .bind(e.authorization_id.map(|a| a.to_string()))
            .bind(e.action.as_str())
            .bind(e.scan_result.as_str())
            .bind(e.person_name.as_deref())
            .bind(e.person_document.as_deref())
            .bind(e.vehicle_plate.as_deref())
            .bind(e.operator_id.to_string())
            .bind(&e.device_id)
            .bind(e.offline_validated)
            .bind(e.note.as_deref())
            .bind(e.client_event_id.as_deref())
            .bind(millis(e.created_at))
            .bind(e.synced_at.map(millis))
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

            if res.rows_affected() == 1 {
                ids.push(id.to_string());
                continue;
            }

            // Replay of an event the device already delivered.
            let (existing,): (String,) = sqlx::query_as(
                "SELECT id FROM access_events WHERE device_id=? AND client_event_id=?",
            )
            .bind(&e.device_id)
            .bind(e.client_event_id.as_deref())
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .ok_or(StoreError::Conflict)?;
            ids.push(existing);
        }

        tx.commit().await.map_err(backend)?;

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query_as::<_, AccessEventRow>("SELECT * FROM access_events WHERE id=?")
                .bind(&id)
                .fetch_one(&self.pool)
                .await
                .map_err(backend)?;
            out.push(row.try_into()?);
        }
        Ok(out)
    }

    async fn list_access_events(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<AccessEvent>, StoreError> {
        let rows = sqlx::query_as::<_, AccessEventRow>(
            "SELECT * FROM access_events WHERE organization_id=? ORDER BY rowid",
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    // ───────────────────────────── Signing keys ─────────────────────────────

    async fn get_active_crypto_key(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationCryptoKey, StoreError> {
        sqlx::query_as::<_, CryptoKeyRow>(
            "SELECT * FROM organization_crypto_keys WHERE organization_id=? AND is_active=1",
        )
        .bind(organization_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?
        .try_into()
    }

    async fn insert_crypto_key_if_absent(
        &self,
        params: &CreateCryptoKeyParams,
    ) -> Result<(OrganizationCryptoKey, bool), StoreError> {
        let id = CryptoKeyId::new();
        // Losers of a concurrent first creation hit the partial unique index.
        let res = sqlx::query(
            "INSERT INTO organization_crypto_keys(id,organization_id,key_id,algorithm,public_jwk,
                 private_key_nonce,private_key_ciphertext,is_active,created_at)
             VALUES(?,?,?,?,?,?,?,1,?)
             ON CONFLICT DO NOTHING",
        )
        .bind(id.to_string())
        .bind(params.organization_id.to_string())
        .bind(&params.key_id)
        .bind(&params.algorithm)
        .bind(&params.public_jwk)
        .bind(&params.private_key_nonce)
        .bind(&params.private_key_ciphertext)
        .bind(millis(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        let created = res.rows_affected() == 1;
        let active = self.get_active_crypto_key(&params.organization_id).await?;
        Ok((active, created))
    }

    async fn list_crypto_keys(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<OrganizationCryptoKey>, StoreError> {
        let rows = sqlx::query_as::<_, CryptoKeyRow>(
            "SELECT * FROM organization_crypto_keys WHERE organization_id=? ORDER BY rowid",
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    // ───────────────────────────── Enrollment ─────────────────────────────

    async fn create_enrollment_token(
        &self,
        params: &CreateEnrollmentTokenParams,
    ) -> Result<(EnrollmentToken, u64), StoreError> {
        let id = EnrollmentTokenId::new();
        let now = millis(Utc::now());
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let revoked = sqlx::query(
            "UPDATE enrollment_tokens SET status='REVOKED', updated_at=?
             WHERE user_id=? AND status='PENDING'",
        )
        .bind(now)
        .bind(params.user_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(backend)?
        .rows_affected();

        sqlx::query(
            "INSERT INTO enrollment_tokens(id,organization_id,user_id,token_hash,status,expires_at,
                 created_by,created_at,updated_at)
             VALUES(?,?,?,?,'PENDING',?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(params.organization_id.to_string())
        .bind(params.user_id.to_string())
        .bind(&params.token_hash)
        .bind(millis(params.expires_at))
        .bind(params.created_by.map(|u| u.to_string()))
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(insert_error)?;

        tx.commit().await.map_err(backend)?;

        let token = self.get_enrollment_token(&id).await?;
        Ok((token, revoked))
    }

    async fn get_enrollment_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<EnrollmentToken, StoreError> {
        sqlx::query_as::<_, EnrollmentTokenRow>(
            "SELECT * FROM enrollment_tokens WHERE token_hash=?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?
        .try_into()
    }

    async fn list_enrollment_tokens(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<EnrollmentToken>, StoreError> {
        let rows = sqlx::query_as::<_, EnrollmentTokenRow>(
            "SELECT * FROM enrollment_tokens WHERE user_id=? ORDER BY rowid",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }

    async fn consume_enrollment_token(
        &self,
        id: &EnrollmentTokenId,
        at: DateTime<Utc>,
    ) -> Result<EnrollmentToken, StoreError> {
        let res = sqlx::query(
            "UPDATE enrollment_tokens SET status='CONSUMED', consumed_at=?, updated_at=?
             WHERE id=? AND status='PENDING'",
        )
        .bind(millis(at))
        .bind(millis(at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if res.rows_affected() == 0 {
            return Err(if self.exists("enrollment_tokens", &id.to_string()).await? {
                StoreError::Conflict
            } else {
                StoreError::NotFound
            });
        }
        self.get_enrollment_token(id).await
    }

    async fn expire_enrollment_token(
        &self,
        id: &EnrollmentTokenId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE enrollment_tokens SET status='EXPIRED', updated_at=?
             WHERE id=? AND status='PENDING'",
        )
        .bind(millis(at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn insert_enrollment_audit(
        &self,
        params: &CreateEnrollmentAuditParams,
    ) -> Result<EnrollmentAuditEntry, StoreError> {
        let id = EnrollmentAuditId::new();
        sqlx::query(
            "INSERT INTO enrollment_audit_log(id,organization_id,user_id,token_id,action,actor_id,
                 ip_address,user_agent,device_platform,device_model,app_version,created_at)
             VALUES(?,?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(params.organization_id.to_string())
        .bind(params.user_id.to_string())
        .bind(params.token_id.map(|t| t.to_string()))
        .bind(params.action.as_str())
        .bind(params.actor_id.map(|a| a.to_string()))
        .bind(params.ip_address.as_deref())
        .bind(params.user_agent.as_deref())
        .bind(params.device_platform.as_deref())
        .bind(params.device_model.as_deref())
        .bind(params.app_version.as_deref())
        .bind(millis(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(insert_error)?;

        sqlx::query_as::<_, EnrollmentAuditRow>("SELECT * FROM enrollment_audit_log WHERE id=?")
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?
            .try_into()
    }

    async fn list_enrollment_audit(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<EnrollmentAuditEntry>, StoreError> {
        let rows = sqlx::query_as::<_, EnrollmentAuditRow>(
            "SELECT * FROM enrollment_audit_log WHERE user_id=? ORDER BY rowid",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        convert_all(rows)
    }
}
