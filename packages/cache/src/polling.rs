//! Periodic background jobs bound to an owner's lifetime.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A job re-run on a fixed interval until stopped.
///
/// The first run happens immediately. Dropping the task stops it, so a
/// view that owns one cannot leak its timer.
pub struct PollingTask {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl PollingTask {
    /// Spawns `tick` every `period` on the current Tokio runtime. A slow
    /// tick delays the next one rather than bunching runs together.
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let period = period.max(MIN_PERIOD);
        log::debug!("Starting polling task {name} every {period:?}");

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick().await;
            }
        });

        Self {
            name,
            handle: Some(handle),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancels the job. A tick in progress is aborted at its next await.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log::debug!("Stopped polling task {}", self.name);
        }
    }
}

impl Drop for PollingTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const PERIOD: Duration = Duration::from_secs(300);

    fn counting_task(count: &Arc<AtomicUsize>) -> PollingTask {
        let count = Arc::clone(count);
        PollingTask::spawn("test", PERIOD, move || {
            let count = Arc::clone(&count);
            async move {
                count.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let task = counting_task(&count);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(2 * PERIOD).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(task.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_future_ticks() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut task = counting_task(&count);

        tokio::time::sleep(Duration::from_secs(1)).await;
        task.stop();
        assert!(!task.is_running());

        tokio::time::sleep(3 * PERIOD).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_task_stops_it() {
        let count = Arc::new(AtomicUsize::new(0));
        drop(counting_task(&count));

        tokio::time::sleep(3 * PERIOD).await;
        assert!(count.load(Ordering::SeqCst) <= 1);
    }
}
