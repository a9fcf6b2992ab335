//! Catalog lease guarding a run mode against concurrent runners.

use crate::error::{AuditError, AuditResult};
use std::sync::Arc;
use stowage_catalog::CatalogStore;
use stowage_catalog::models::LeaseAcquire;
use stowage_catalog::repos::LeaseRepo;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// A held run lease. Renew it at every flush; release it in finalize.
pub struct RunLease {
    catalog: Arc<dyn CatalogStore>,
    name: String,
    owner: String,
    ttl: Duration,
}

impl RunLease {
    /// Take the lease for `name`, or fail with `LeaseHeld` if another owner
    /// holds it unexpired. An expired lease is taken over.
    pub async fn acquire(
        catalog: Arc<dyn CatalogStore>,
        name: &str,
        ttl: Duration,
    ) -> AuditResult<Self> {
        let owner = format!("{}-{}", std::process::id(), Uuid::new_v4());
        let now = OffsetDateTime::now_utc();

        match catalog.try_acquire_lease(name, &owner, now, now + ttl).await? {
            LeaseAcquire::Acquired(_) => {
                tracing::info!(lease = %name, owner = %owner, "Acquired run lease");
                Ok(Self {
                    catalog,
                    name: name.to_string(),
                    owner,
                    ttl,
                })
            }
            LeaseAcquire::Held(current) => Err(AuditError::LeaseHeld {
                name: name.to_string(),
                owner: current.owner,
                expires_at: current.expires_at.to_string(),
            }),
        }
    }

    pub async fn renew(&self) -> AuditResult<()> {
        let expires_at = OffsetDateTime::now_utc() + self.ttl;
        if self
            .catalog
            .renew_lease(&self.name, &self.owner, expires_at)
            .await?
        {
            Ok(())
        } else {
            Err(AuditError::LeaseLost(self.name.clone()))
        }
    }

    pub async fn release(self) -> AuditResult<()> {
        if !self.catalog.release_lease(&self.name, &self.owner).await? {
            tracing::warn!(lease = %self.name, "Run lease was already gone at release");
        }
        Ok(())
    }
}
