//! Escalating recovery for a list that has gone stale or disappeared.
//!
//! The ladder is: re-locate the container (with transient retries), then
//! reload the page and re-locate (bounded), and for authentication walls,
//! re-authenticate (bounded per incident) before reloading.

use crate::config::CollectorConfig;
use crate::detector::StopReason;
use crate::error::{CollectError, FailureClass};
use crate::retry::RetryPolicy;
use crate::surface::{ScrollSurface, SessionGuard};

#[derive(Debug, Clone)]
pub struct RecoveryController {
    retry: RetryPolicy,
    max_page_refreshes: u32,
    max_reauth_attempts: u32,
    relocations: u32,
    page_refreshes: u32,
    reauthentications: u32,
}

impl RecoveryController {
    #[must_use]
    pub fn new(config: &CollectorConfig) -> Self {
        Self {
            retry: config.retry.clone(),
            max_page_refreshes: config.max_page_refreshes,
            max_reauth_attempts: config.max_reauth_attempts,
            relocations: 0,
            page_refreshes: 0,
            reauthentications: 0,
        }
    }

    #[must_use]
    pub fn relocations(&self) -> u32 {
        self.relocations
    }

    #[must_use]
    pub fn page_refreshes(&self) -> u32 {
        self.page_refreshes
    }

    #[must_use]
    pub fn reauthentications(&self) -> u32 {
        self.reauthentications
    }

    /// First container lookup of a run. Clears any login wall first.
    ///
    /// # Errors
    ///
    /// The stop reason to report when no container can be obtained.
    pub async fn acquire<S>(&mut self, site: &mut S) -> Result<S::Container, StopReason>
    where
        S: ScrollSurface + SessionGuard,
    {
        if site.is_interstitial_present().await || !site.is_authenticated().await {
            self.reauthenticate(site).await?;
        }
        match self.locate(site).await {
            Ok(container) => Ok(container),
            Err(err) if err.class() == FailureClass::Fatal => {
                Err(StopReason::Fatal(err.to_string()))
            }
            Err(err) => {
                tracing::warn!(error = %err, "follower list not found on first attempt");
                self.refresh(site).await
            }
        }
    }

    /// Re-locates the container, escalating to a page refresh when it is gone.
    ///
    /// # Errors
    ///
    /// The stop reason to report when recovery is exhausted.
    pub async fn restore<S>(&mut self, site: &mut S) -> Result<S::Container, StopReason>
    where
        S: ScrollSurface + SessionGuard,
    {
        self.relocations += 1;
        match self.locate(site).await {
            Ok(container) => {
                tracing::debug!(relocations = self.relocations, "list container re-located");
                Ok(container)
            }
            Err(err) if err.class() == FailureClass::Fatal => {
                Err(StopReason::Fatal(err.to_string()))
            }
            Err(err) => {
                tracing::warn!(error = %err, "re-locate failed, escalating to page refresh");
                self.refresh(site).await
            }
        }
    }

    /// Reloads the page and re-locates, up to the refresh budget for the run.
    ///
    /// # Errors
    ///
    /// [`StopReason::ContainerLost`] once the budget is spent.
    pub async fn refresh<S>(&mut self, site: &mut S) -> Result<S::Container, StopReason>
    where
        S: ScrollSurface + SessionGuard,
    {
        while self.page_refreshes < self.max_page_refreshes {
            self.page_refreshes += 1;
            tracing::warn!(
                attempt = self.page_refreshes,
                max = self.max_page_refreshes,
                "refreshing page to recover follower list"
            );

            if let Err(err) = self
                .retry
                .run("reload page", site, |s| s.reload(), CollectError::is_transient)
                .await
            {
                if err.class() == FailureClass::Fatal {
                    return Err(StopReason::Fatal(err.to_string()));
                }
                tracing::warn!(error = %err, "page reload failed");
                continue;
            }

            if site.is_interstitial_present().await || !site.is_authenticated().await {
                self.reauthenticate(site).await?;
            }

            match self.locate(site).await {
                Ok(container) => return Ok(container),
                Err(err) => tracing::warn!(error = %err, "follower list missing after refresh"),
            }
        }
        Err(StopReason::ContainerLost)
    }

    /// Handles an interstitial or expired session: re-authenticate, then reload.
    ///
    /// # Errors
    ///
    /// [`StopReason::RecoveryFailed`] when re-authentication does not stick,
    /// or the refresh outcome otherwise.
    pub async fn recover_session<S>(&mut self, site: &mut S) -> Result<S::Container, StopReason>
    where
        S: ScrollSurface + SessionGuard,
    {
        self.reauthenticate(site).await?;
        self.refresh(site).await
    }

    /// Up to `max_reauth_attempts` login attempts with back-off between them.
    ///
    /// # Errors
    ///
    /// [`StopReason::RecoveryFailed`] when every attempt fails.
    pub async fn reauthenticate<S: SessionGuard>(&mut self, site: &mut S) -> Result<(), StopReason> {
        for attempt in 1..=self.max_reauth_attempts {
            self.reauthentications += 1;
            match site.reauthenticate().await {
                Ok(()) if !site.is_interstitial_present().await => {
                    tracing::info!(attempt, "re-authenticated");
                    return Ok(());
                }
                Ok(()) => {
                    tracing::warn!(attempt, "interstitial still present after re-authentication");
                }
                Err(err) => tracing::warn!(attempt, error = %err, "re-authentication failed"),
            }
            tokio::time::sleep(self.retry.backoff(attempt)).await;
        }
        tracing::error!(
            attempts = self.max_reauth_attempts,
            "giving up on re-authentication"
        );
        Err(StopReason::RecoveryFailed)
    }

    async fn locate<S: ScrollSurface>(&self, site: &mut S) -> Result<S::Container, CollectError> {
        self.retry
            .run("locate container", site, |s| s.locate(), CollectError::is_transient)
            .await
    }
}
