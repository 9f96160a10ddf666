use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{Page, PageFactory, PageHandle};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use soulpilot_core_types::SessionId;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tracing::{debug, info, warn};

use crate::{
    errors::RegistryError,
    metrics,
    model::{SessionContext, SessionInfo},
};

#[derive(Clone, Debug)]
pub struct SessionManagerConfig {
    /// Upper bound on live pages across all sessions.
    pub max_pages: usize,
    /// How long `acquire` waits for a free page slot.
    pub acquire_timeout: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_pages: 8,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// One keyed entry. The gate serializes every call on the session; `info`
/// mirrors the context so it can be read without waiting for the gate.
struct SessionSlot {
    gate: Arc<Mutex<Option<SessionContext>>>,
    info: RwLock<Option<SessionInfo>>,
    retired: AtomicBool,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            gate: Arc::new(Mutex::new(None)),
            info: RwLock::new(None),
            retired: AtomicBool::new(false),
        }
    }
}

/// Exclusive borrow of a session's page for one call. Other callers on the
/// same session wait until the lease is dropped.
pub struct SessionLease {
    id: SessionId,
    page: PageHandle,
    _guard: OwnedMutexGuard<Option<SessionContext>>,
}

impl SessionLease {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn page(&self) -> &dyn Page {
        self.page.as_ref()
    }

    pub fn page_handle(&self) -> PageHandle {
        Arc::clone(&self.page)
    }
}

/// Sole owner of `session id → page`. Pages are created lazily through the
/// injected factory and capped by a semaphore.
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<SessionSlot>>,
    factory: Arc<dyn PageFactory>,
    pages: Arc<Semaphore>,
    config: SessionManagerConfig,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn PageFactory>, config: SessionManagerConfig) -> Self {
        let max_pages = config.max_pages.max(1);
        Self {
            sessions: DashMap::new(),
            factory,
            pages: Arc::new(Semaphore::new(max_pages)),
            config: SessionManagerConfig {
                max_pages,
                ..config
            },
        }
    }

    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }

    /// Lease the session's page, creating the session or replacing a closed
    /// page as needed. A closed page is never handed out.
    ///
    /// Dropping the returned lease releases the session gate; calling
    /// `dispose` for the same id while holding it waits forever.
    pub async fn acquire(&self, id: &SessionId) -> Result<SessionLease, RegistryError> {
        loop {
            let slot = self
                .sessions
                .entry(id.clone())
                .or_insert_with(|| Arc::new(SessionSlot::new()))
                .clone();
            let mut guard = Arc::clone(&slot.gate).lock_owned().await;
            if slot.retired.load(Ordering::Acquire) {
                // Disposed while we waited; start over with a fresh slot.
                continue;
            }

            if guard.as_ref().map(|ctx| ctx.page.is_closed()).unwrap_or(false) {
                warn!(session = %id, "Evicting closed page");
                *guard = None;
                *slot.info.write() = None;
                metrics::record_page_evicted();
            }

            let created = guard.is_none();
            if created {
                match self.open(id).await {
                    Ok(ctx) => *guard = Some(ctx),
                    Err(err) => {
                        slot.retired.store(true, Ordering::Release);
                        self.sessions
                            .remove_if(id, |_, current| Arc::ptr_eq(current, &slot));
                        *slot.info.write() = None;
                        drop(guard);
                        self.publish_count();
                        return Err(err);
                    }
                }
            }

            let Some(ctx) = guard.as_mut() else {
                return Err(RegistryError::NotFound(id.to_string()));
            };
            ctx.last_used_at = Utc::now();
            *slot.info.write() = Some(ctx.info());
            let page = Arc::clone(&ctx.page);
            if created {
                self.publish_count();
            }

            debug!(session = %id, page = %page.id(), "Session leased");
            return Ok(SessionLease {
                id: id.clone(),
                page,
                _guard: guard,
            });
        }
    }

    async fn open(&self, id: &SessionId) -> Result<SessionContext, RegistryError> {
        let permit = match tokio::time::timeout(
            self.config.acquire_timeout,
            Arc::clone(&self.pages).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(RegistryError::Closed),
            Err(_) => {
                warn!(session = %id, max_pages = self.config.max_pages, "Page limit reached");
                return Err(RegistryError::LimitReached {
                    max_pages: self.config.max_pages,
                });
            }
        };

        let page = self
            .factory
            .create_page()
            .await
            .map_err(|err| RegistryError::PageCreation(err.to_string()))?;
        metrics::record_page_created();
        info!(session = %id, page = %page.id(), "Session page created");
        Ok(SessionContext::new(id.clone(), page, permit))
    }

    /// Close the session's page and forget the session. Waits for an
    /// outstanding lease to be dropped.
    pub async fn dispose(&self, id: &SessionId) -> Result<(), RegistryError> {
        let Some((_, slot)) = self.sessions.remove(id) else {
            return Err(RegistryError::NotFound(id.to_string()));
        };
        slot.retired.store(true, Ordering::Release);
        let context = slot.gate.lock().await.take();
        *slot.info.write() = None;
        self.publish_count();

        if let Some(context) = context {
            if !context.page.is_closed() {
                if let Err(err) = context.page.close().await {
                    warn!(session = %id, ?err, "Failed to close session page");
                }
            }
            info!(session = %id, "Session disposed");
        }
        Ok(())
    }

    pub async fn dispose_all(&self) {
        let ids: Vec<SessionId> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            match self.dispose(&id).await {
                Ok(()) | Err(RegistryError::NotFound(_)) => {}
                Err(err) => warn!(session = %id, %err, "Failed to dispose session"),
            }
        }
    }

    /// Evict closed pages from idle sessions. Returns how many were evicted.
    pub fn reap_closed(&self) -> usize {
        let mut evicted = 0;
        for entry in self.sessions.iter() {
            let slot = entry.value();
            let Ok(mut guard) = slot.gate.try_lock() else {
                continue;
            };
            if guard.as_ref().map(|ctx| ctx.page.is_closed()).unwrap_or(false) {
                *guard = None;
                *slot.info.write() = None;
                metrics::record_page_evicted();
                evicted += 1;
                debug!(session = %entry.key(), "Reaped closed page");
            }
        }
        if evicted > 0 {
            self.publish_count();
        }
        evicted
    }

    pub fn info(&self, id: &SessionId) -> Option<SessionInfo> {
        let slot = self.sessions.get(id)?;
        let info = slot.info.read().clone();
        info
    }

    /// Sessions currently holding a page.
    pub fn len(&self) -> usize {
        self.sessions
            .iter()
            .filter(|slot| slot.info.read().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish_count(&self) {
        metrics::set_session_count(self.len());
    }
}
