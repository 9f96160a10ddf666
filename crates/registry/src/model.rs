use cdp_adapter::PageHandle;
use chrono::{DateTime, Utc};
use soulpilot_core_types::{PageId, SessionId};
use tokio::sync::OwnedSemaphorePermit;

/// Live state of one session, owned by the manager.
pub struct SessionContext {
    pub id: SessionId,
    pub page: PageHandle,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    /// Page slot held for as long as the page lives.
    pub(crate) _permit: OwnedSemaphorePermit,
}

impl SessionContext {
    pub(crate) fn new(id: SessionId, page: PageHandle, permit: OwnedSemaphorePermit) -> Self {
        let now = Utc::now();
        Self {
            id,
            page,
            created_at: now,
            last_used_at: now,
            _permit: permit,
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            page_id: self.page.id().clone(),
            created_at: self.created_at,
            last_used_at: self.last_used_at,
        }
    }
}

/// Read-only view of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SessionInfo {
    pub id: SessionId,
    pub page_id: PageId,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}
