//! Revocation delta feed and the device-side denylist it maintains.
//!
//! A device stores the feed's `server_time`, never its own clock, as the
//! next `since`, so clock drift cannot hide a revocation.
//!
//! `server_time` trails the query by [`REVOCATION_FEED_OVERLAP_SECONDS`]. A
//! revocation stamped just before a query but committed after it is then
//! still at or after the next `since`. Consecutive deltas overlap; the
//! denylist is a set, so repeats are harmless.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use gatekeep_storage::{AuthorizationId, OrganizationId, Store};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::GateError;

/// Upper bound on the gap between a revocation's stamp and its commit.
pub const REVOCATION_FEED_OVERLAP_SECONDS: i64 = 30;

/// Feed response: ids revoked since the requested instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationDelta {
    pub revoked: Vec<AuthorizationId>,
    /// Server clock when the query ran, less the overlap; the caller's next `since`.
    pub server_time: DateTime<Utc>,
    /// Full resync (no `since`): the list replaces the denylist.
    pub full: bool,
}

#[derive(Clone)]
pub struct RevocationFeed {
    store: Arc<dyn Store>,
}

impl RevocationFeed {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Authorizations of the organization revoked at or after `since`, or
    /// every revoked one when `since` is absent.
    #[instrument(skip(self), fields(org = %organization_id))]
    pub async fn revoked_since(
        &self,
        organization_id: &OrganizationId,
        since: Option<DateTime<Utc>>,
    ) -> Result<RevocationDelta, GateError> {
        let server_time = Utc::now() - Duration::seconds(REVOCATION_FEED_OVERLAP_SECONDS);
        let revoked = self
            .store
            .list_revoked_authorizations(organization_id, since)
            .await?;
        debug!(count = revoked.len(), "revocation delta");
        Ok(RevocationDelta {
            revoked,
            server_time,
            full: since.is_none(),
        })
    }
}

/// Locally cached set of revoked authorization ids.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Denylist {
    revoked: HashSet<AuthorizationId>,
    next_since: Option<DateTime<Utc>>,
}

impl Denylist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, delta: &RevocationDelta) {
        if delta.full {
            self.revoked.clear();
        }
        self.revoked.extend(delta.revoked.iter().copied());
        self.next_since = Some(delta.server_time);
    }

    pub fn is_revoked(&self, id: &AuthorizationId) -> bool {
        self.revoked.contains(id)
    }

    /// `since` for the next feed request; `None` asks for a full resync.
    pub fn next_since(&self) -> Option<DateTime<Utc>> {
        self.next_since
    }

    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}
