//! Scroll techniques and the driver that performs them.
//!
//! Lazy-loading lists react differently to different scroll patterns, so the
//! engine rotates through a fixed cycle of techniques whenever the list stops
//! growing and drops back to [`ScrollTechnique::Normal`] once it grows again.

use std::fmt;
use std::time::Duration;

use rand::Rng;

use crate::error::CollectError;
use crate::surface::{ScrollMetrics, ScrollSurface};

/// Smallest viewport the driver assumes, so a collapsed container still moves.
const MIN_VIEWPORT_PX: f64 = 100.0;
const MICRO_STEPS: u32 = 5;
const HEIGHT_CHANGE_EPSILON: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScrollTechnique {
    /// Most of one viewport down.
    #[default]
    Normal,
    /// Viewport steps that grow while the technique stays active.
    Progressive,
    /// Three viewports at once, short settle.
    Aggressive,
    /// Straight to the current scroll extent.
    BottomJump,
    /// Back up half a viewport, then jump to the extent.
    Reset,
    /// Activate the last rendered row before scrolling.
    ClickLastVisible,
    /// Normal distance with a long settle.
    Paced,
    /// Several fifth-of-a-viewport steps with short pauses.
    MicroSteps,
}

impl ScrollTechnique {
    pub const ROTATION: [ScrollTechnique; 8] = [
        ScrollTechnique::Normal,
        ScrollTechnique::Progressive,
        ScrollTechnique::Aggressive,
        ScrollTechnique::BottomJump,
        ScrollTechnique::Reset,
        ScrollTechnique::ClickLastVisible,
        ScrollTechnique::Paced,
        ScrollTechnique::MicroSteps,
    ];

    /// Next technique in the rotation, wrapping around.
    #[must_use]
    pub fn next(self) -> Self {
        let idx = Self::ROTATION
            .iter()
            .position(|t| *t == self)
            .unwrap_or(0);
        Self::ROTATION[(idx + 1) % Self::ROTATION.len()]
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScrollTechnique::Normal => "normal",
            ScrollTechnique::Progressive => "progressive",
            ScrollTechnique::Aggressive => "aggressive",
            ScrollTechnique::BottomJump => "bottom_jump",
            ScrollTechnique::Reset => "reset",
            ScrollTechnique::ClickLastVisible => "click_last_visible",
            ScrollTechnique::Paced => "paced",
            ScrollTechnique::MicroSteps => "micro_steps",
        }
    }

    /// Multiplier applied to the base settle time after the scroll.
    #[must_use]
    pub fn settle_multiplier(self) -> f64 {
        match self {
            ScrollTechnique::Aggressive | ScrollTechnique::MicroSteps => 0.5,
            ScrollTechnique::Paced => 4.0,
            _ => 1.0,
        }
    }
}

impl fmt::Display for ScrollTechnique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry before and after one scroll action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvanceReport {
    pub technique: ScrollTechnique,
    pub before: ScrollMetrics,
    pub after: ScrollMetrics,
}

impl AdvanceReport {
    #[must_use]
    pub fn height_changed(&self) -> bool {
        (self.after.scroll_height - self.before.scroll_height).abs() > HEIGHT_CHANGE_EPSILON
    }

    #[must_use]
    pub fn moved(&self) -> bool {
        (self.after.scroll_top - self.before.scroll_top).abs() > HEIGHT_CHANGE_EPSILON
    }
}

#[derive(Debug, Clone)]
pub struct ScrollDriver {
    pause: Duration,
    jitter: bool,
}

impl ScrollDriver {
    #[must_use]
    pub fn new(pause: Duration, jitter: bool) -> Self {
        Self { pause, jitter }
    }

    /// Performs one scroll action with `technique`, then waits for content.
    ///
    /// `escalation` counts how many consecutive iterations the technique has
    /// been active; only [`ScrollTechnique::Progressive`] uses it.
    ///
    /// # Errors
    ///
    /// Propagates any capability failure; the caller decides how to recover.
    pub async fn advance<S: ScrollSurface>(
        &self,
        site: &mut S,
        container: &S::Container,
        technique: ScrollTechnique,
        escalation: u32,
        before: ScrollMetrics,
    ) -> Result<AdvanceReport, CollectError> {
        let viewport = before.client_height.max(MIN_VIEWPORT_PX);
        let top = before.scroll_top;

        match technique {
            ScrollTechnique::Normal | ScrollTechnique::Paced => {
                site.scroll_to(container, top + viewport * 0.9).await?;
            }
            ScrollTechnique::Progressive => {
                let factor = 1.0 + 0.5 * f64::from(escalation.min(8));
                site.scroll_to(container, top + viewport * factor).await?;
            }
            ScrollTechnique::Aggressive => {
                site.scroll_to(container, top + viewport * 3.0).await?;
            }
            ScrollTechnique::BottomJump => {
                site.scroll_to(container, before.scroll_height).await?;
            }
            ScrollTechnique::Reset => {
                site.scroll_to(container, (top - viewport * 0.5).max(0.0))
                    .await?;
                self.sleep(self.pause / 4).await;
                site.scroll_to(container, before.scroll_height).await?;
            }
            ScrollTechnique::ClickLastVisible => {
                let items = site.visible_items(container).await?;
                if let Some(last) = items.last() {
                    site.activate(last).await?;
                }
                site.scroll_to(container, top + viewport * 0.9).await?;
            }
            ScrollTechnique::MicroSteps => {
                for step in 1..=MICRO_STEPS {
                    let target = top + viewport * 0.2 * f64::from(step);
                    site.scroll_to(container, target).await?;
                    self.sleep(self.pause / 4).await;
                }
            }
        }

        self.sleep(self.pause.mul_f64(technique.settle_multiplier()))
            .await;

        let after = site.metrics(container).await?;
        tracing::trace!(
            technique = %technique,
            from = before.scroll_top,
            to = after.scroll_top,
            height = after.scroll_height,
            "scroll advanced"
        );
        Ok(AdvanceReport {
            technique,
            before,
            after,
        })
    }

    async fn sleep(&self, base: Duration) {
        if base.is_zero() {
            return;
        }
        let delay = if self.jitter {
            base.mul_f64(rand::rng().random_range(0.75..=1.25))
        } else {
            base
        };
        tokio::time::sleep(delay).await;
    }
}
