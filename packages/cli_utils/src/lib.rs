#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing shared by the climate map binaries.
//!
//! [`init_logger`] routes `log` records through an `indicatif`
//! [`MultiProgress`], so log lines print above live bars instead of
//! through them. [`IndicatifProgress`] renders a geocoding batch or any
//! other [`ProgressCallback`] user.

use std::sync::Arc;
use std::time::Duration;

use climate_map_events::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

const TICK: Duration = Duration::from_millis(100);

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

/// [`ProgressCallback`] backed by a [`ProgressBar`].
///
/// Spins until the total is known, then shows a bar.
pub struct IndicatifProgress {
    bar: ProgressBar,
    counted: ProgressStyle,
}

impl IndicatifProgress {
    fn new(bar: ProgressBar, message: &str, color: &str) -> Self {
        bar.set_style(style(
            &format!("{{spinner:.{color}}} {{msg}}"),
            ProgressStyle::default_spinner,
        ));
        bar.set_message(message.to_string());
        bar.enable_steady_tick(TICK);

        let counted = style(
            &format!("  {{msg}} {{wide_bar:.{color}/dim}} {{pos}}/{{len}} {{percent}}% [{{eta}}]"),
            ProgressStyle::default_bar,
        )
        .progress_chars("##-");

        Self { bar, counted }
    }

    /// Bar for a batch whose size is reported later through
    /// [`ProgressCallback::set_total`].
    #[must_use]
    pub fn batch_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::new(multi.add(ProgressBar::new_spinner()), message, "yellow"))
    }

    /// Bar for a fixed number of steps, such as one per region.
    #[must_use]
    pub fn steps_bar(multi: &MultiProgress, message: &str, total: u64) -> Arc<dyn ProgressCallback> {
        let progress = Self::new(multi.add(ProgressBar::new_spinner()), message, "green");
        progress.set_total(total);
        Arc::new(progress)
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_style(self.counted.clone());
        self.bar.set_length(total);
        self.bar.reset();
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Cyan spinner for a single wait, e.g. a network fetch. The caller
/// clears it.
#[must_use]
pub fn spinner(multi: &MultiProgress, message: &str) -> ProgressBar {
    let bar = multi.add(ProgressBar::new_spinner());
    bar.set_style(style("{spinner:.cyan} {msg}", ProgressStyle::default_spinner));
    bar.set_message(message.to_string());
    bar.enable_steady_tick(TICK);
    bar
}

/// Installs `pretty_env_logger` (configured by `RUST_LOG`) behind an
/// `indicatif-log-bridge` wrapper and returns the [`MultiProgress`] every
/// bar must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();
    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let max_level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(max_level);
    }

    multi
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    fn hidden(message: &str) -> IndicatifProgress {
        IndicatifProgress::new(
            ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden()),
            message,
            "yellow",
        )
    }

    #[test]
    fn counts_after_total_is_known() {
        let progress = hidden("Geocoding");
        progress.set_total(4);
        progress.inc(1);
        progress.inc(2);

        assert_eq!(progress.bar.length(), Some(4));
        assert_eq!(progress.bar.position(), 3);

        progress.finish("done".to_string());
        assert!(progress.bar.is_finished());
        assert_eq!(progress.bar.message(), "done");
    }

    #[test]
    fn setting_total_restarts_the_count() {
        let progress = hidden("Geocoding");
        progress.inc(5);
        progress.set_total(2);
        assert_eq!(progress.bar.position(), 0);
    }
}
