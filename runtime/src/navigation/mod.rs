//! Section navigation: bringing each dashboard section into view.
//!
//! The first section is the landing view and is never clicked. For the
//! others, every label variant is tried against every locator in order and
//! the first successful click wins. A section nothing matches is logged and
//! reported, never fatal.

pub mod locator;

use crate::renderer::RenderContext;
use dashtap::{Section, Timeouts};
use locator::{default_locators, LabelLocator};
use std::time::Duration;

/// What happened when a section was visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The landing view; already on screen after the initial load.
    Landing,
    Clicked {
        label: String,
        locator: &'static str,
    },
    /// No control matched; the page stays on the previous view.
    Missed { labels_tried: Vec<String> },
}

pub struct Navigator {
    locators: Vec<Box<dyn LabelLocator>>,
    click_timeout_ms: u64,
    settle: Duration,
}

impl Navigator {
    pub fn new(timeouts: &Timeouts) -> Self {
        Self {
            locators: default_locators(),
            click_timeout_ms: timeouts.click_ms,
            settle: timeouts.settle(),
        }
    }

    /// Replace the locator list.
    pub fn with_locators(mut self, locators: Vec<Box<dyn LabelLocator>>) -> Self {
        self.locators = locators;
        self
    }

    /// Bring `section` into view, then wait out the settle delay.
    pub async fn visit(
        &self,
        ctx: &mut dyn RenderContext,
        index: usize,
        section: &Section,
    ) -> NavigationOutcome {
        let outcome = if index == 0 {
            NavigationOutcome::Landing
        } else {
            self.open(ctx, section).await
        };
        tokio::time::sleep(self.settle).await;
        outcome
    }

    async fn open(&self, ctx: &mut dyn RenderContext, section: &Section) -> NavigationOutcome {
        let labels = section.label_variants();
        for &label in &labels {
            for locator in &self.locators {
                match ctx
                    .click_xpath(&locator.xpath(label), self.click_timeout_ms)
                    .await
                {
                    Ok(true) => {
                        tracing::info!(section = %section.name, label, strategy = locator.name(), "opened section");
                        return NavigationOutcome::Clicked {
                            label: label.to_string(),
                            locator: locator.name(),
                        };
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::debug!(section = %section.name, label, strategy = locator.name(), "click failed: {e:#}");
                    }
                }
            }
        }

        tracing::warn!(
            section = %section.name,
            "no control matched any label variant, staying on the current view"
        );
        NavigationOutcome::Missed {
            labels_tried: labels.iter().map(|l| l.to_string()).collect(),
        }
    }
}
