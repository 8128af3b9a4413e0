//! Capabilities the collection loop needs from a live page.
//!
//! The engine never talks to a browser directly. A site adapter implements
//! these traits over whatever automation backend is in use; tests implement
//! them over an in-memory list. All methods take `&mut self` because a
//! browser session is a single, stateful resource.

use async_trait::async_trait;
use ghostwatch_core::{ProfileDetails, Record};

use crate::error::CollectError;

/// Scroll geometry of the list container, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Largest reachable `scroll_top`.
    #[must_use]
    pub fn max_scroll_top(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }

    #[must_use]
    pub fn distance_to_end(&self) -> f64 {
        (self.max_scroll_top() - self.scroll_top).max(0.0)
    }

    #[must_use]
    pub fn is_at_end(&self, epsilon: f64) -> bool {
        self.distance_to_end() <= epsilon
    }
}

/// Finds the scrollable region that holds the follower list.
#[async_trait]
pub trait ContainerLocator: Send {
    type Container: Send + Sync;

    /// # Errors
    ///
    /// [`CollectError::ContainerLost`] when no candidate region matches.
    async fn locate(&mut self) -> Result<Self::Container, CollectError>;
}

/// Reads rows out of a located container.
#[async_trait]
pub trait ItemExtractor: ContainerLocator {
    type Item: Send + Sync;

    /// Rows currently rendered, in display order.
    async fn visible_items(
        &mut self,
        container: &Self::Container,
    ) -> Result<Vec<Self::Item>, CollectError>;

    /// Turns one row into a record.
    ///
    /// Rows that cannot be read should fail with
    /// [`CollectError::ExtractionFailed`]; the loop skips them.
    async fn extract(&mut self, item: &Self::Item) -> Result<Record, CollectError>;
}

/// Scrolling and list-state probes.
#[async_trait]
pub trait ScrollSurface: ItemExtractor {
    async fn metrics(&mut self, container: &Self::Container) -> Result<ScrollMetrics, CollectError>;

    async fn scroll_to(&mut self, container: &Self::Container, top: f64)
        -> Result<(), CollectError>;

    /// Clicks or focuses a row, used to nudge lazy loaders.
    async fn activate(&mut self, item: &Self::Item) -> Result<(), CollectError>;

    /// An explicit "no more results" marker is shown.
    async fn end_marker_visible(&mut self, container: &Self::Container)
        -> Result<bool, CollectError>;

    /// A spinner or placeholder rows are shown.
    async fn loading_indicator_active(
        &mut self,
        container: &Self::Container,
    ) -> Result<bool, CollectError>;

    /// Follower count the page advertises, when it can be read.
    async fn expected_total(&mut self) -> Option<u64> {
        None
    }

    /// Reloads the page and navigates back to the follower list.
    async fn reload(&mut self) -> Result<(), CollectError>;
}

/// Authentication state of the browsing session.
#[async_trait]
pub trait SessionGuard: Send {
    async fn is_authenticated(&mut self) -> bool;

    /// # Errors
    ///
    /// [`CollectError::ReauthFailed`] when the login flow does not complete.
    async fn reauthenticate(&mut self) -> Result<(), CollectError>;

    /// A challenge, captcha, or rate-limit wall covers the page.
    async fn is_interstitial_present(&mut self) -> bool;
}

/// Opens a profile page and reads its counters.
#[async_trait]
pub trait ProfileInspector: Send {
    async fn inspect(&mut self, username: &str) -> Result<ProfileDetails, CollectError>;
}
