//! Timer scheduling behind a trait so the coordinator can run against a real
//! runtime or a fake clock.

use crate::error::{Result, SessionError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::warn;

pub type Task = Box<dyn FnOnce() + Send + 'static>;
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    /// Monotonic time elapsed since the scheduler was created.
    fn now(&self) -> Duration;

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;

    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> TimerHandle;
}

/// Cancel token for a scheduled task. Once `cancel` returns the task never runs.
#[derive(Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    fn new(cancelled: Arc<AtomicBool>, abort: Option<AbortHandle>) -> Self {
        Self { cancelled, abort }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scheduler backed by tokio timers. Honours a paused tokio clock.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
    origin: Instant,
}

impl TokioScheduler {
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            origin: Instant::now(),
        }
    }

    /// # Errors
    ///
    /// Returns an error when called outside of a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SessionError::Runtime(e.to_string()))
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Duration {
        Instant::now().saturating_duration_since(self.origin)
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                task();
            }
        });
        TimerHandle::new(cancelled, Some(join.abort_handle()))
    }

    fn schedule_repeating(&self, interval: Duration, mut task: RepeatingTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let period = interval.max(Duration::from_millis(1));
        let Some(start) = Instant::now().checked_add(period) else {
            warn!(interval = ?period, "Repeating interval is out of range; task will never run");
            return TimerHandle::new(cancelled, None);
        };
        let join = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                task();
            }
        });
        TimerHandle::new(cancelled, Some(join.abort_handle()))
    }
}

enum Job {
    Once(Task),
    Repeating(RepeatingTask, Duration),
}

struct Entry {
    due: Duration,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    job: Job,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_seq: u64,
    entries: Vec<Entry>,
}

impl ManualState {
    fn push(&mut self, due: Duration, cancelled: Arc<AtomicBool>, job: Job) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry {
            due,
            seq,
            cancelled,
            job,
        });
    }

    fn take_next_due(&mut self, target: Duration) -> Option<Entry> {
        self.entries.retain(|entry| !entry.cancelled.load(Ordering::SeqCst));
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.due <= target)
            .min_by_key(|(_, entry)| (entry.due, entry.seq))
            .map(|(index, _)| index)?;
        Some(self.entries.swap_remove(index))
    }
}

/// Deterministic fake clock. Time only moves when `advance` is called.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the clock forward, running every task that falls due on the way
    /// in deadline order. Tasks run without the scheduler lock held, so they
    /// may schedule or cancel other tasks.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now.saturating_add(by);
        loop {
            let Some(entry) = ({
                let mut state = self.lock();
                let entry = state.take_next_due(target);
                if let Some(entry) = &entry {
                    state.now = entry.due;
                }
                entry
            }) else {
                break;
            };

            match entry.job {
                Job::Once(task) => task(),
                Job::Repeating(mut task, interval) => {
                    task();
                    if !entry.cancelled.load(Ordering::SeqCst) {
                        self.lock()
                            .push(entry.due.saturating_add(interval), entry.cancelled, Job::Repeating(task, interval));
                    }
                }
            }
        }
        self.lock().now = target;
    }

    /// Number of timers that are still scheduled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|entry| !entry.cancelled.load(Ordering::SeqCst))
            .count()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Duration {
        self.lock().now
    }

    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.lock();
        let due = state.now.saturating_add(delay);
        state.push(due, Arc::clone(&cancelled), Job::Once(task));
        TimerHandle::new(cancelled, None)
    }

    fn schedule_repeating(&self, interval: Duration, task: RepeatingTask) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let period = interval.max(Duration::from_millis(1));
        let mut state = self.lock();
        let due = state.now.saturating_add(period);
        state.push(due, Arc::clone(&cancelled), Job::Repeating(task, period));
        TimerHandle::new(cancelled, None)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |label: &'static str| -> Task {
            let sink = Arc::clone(&sink);
            Box::new(move || sink.lock().unwrap().push(label))
        };
        (log, make)
    }

    #[test]
    fn test_manual_runs_tasks_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        scheduler.schedule(Duration::from_millis(300), task("late"));
        scheduler.schedule(Duration::from_millis(100), task("early"));
        scheduler.schedule(Duration::from_millis(100), task("early-second"));

        scheduler.advance(Duration::from_millis(99));
        assert!(log.lock().unwrap().is_empty());

        scheduler.advance(Duration::from_millis(250));
        assert_eq!(*log.lock().unwrap(), vec!["early", "early-second", "late"]);
        assert_eq!(scheduler.now(), Duration::from_millis(349));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_manual_cancelled_task_never_runs() {
        let scheduler = ManualScheduler::new();
        let (log, task) = recorder();

        let handle = scheduler.schedule(Duration::from_millis(10), task("cancelled"));
        handle.cancel();
        assert!(handle.is_cancelled());

        scheduler.advance(Duration::from_secs(1));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_manual_repeating_task_fires_each_interval() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let handle = scheduler.schedule_repeating(
            Duration::from_millis(100),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        scheduler.advance(Duration::from_millis(350));
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.cancel();
        scheduler.advance(Duration::from_secs(10));
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_manual_task_can_schedule_follow_up_within_same_advance() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (log, task) = recorder();
        let inner = Arc::clone(&scheduler);
        let follow_up = task("follow-up");

        scheduler.schedule(
            Duration::from_millis(50),
            Box::new(move || {
                inner.schedule(Duration::from_millis(50), follow_up);
            }),
        );

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(*log.lock().unwrap(), vec!["follow-up"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_fires_after_delay() {
        let scheduler = TokioScheduler::current().unwrap();
        let (log, task) = recorder();

        scheduler.schedule(Duration::from_millis(500), task("fired"));

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(log.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*log.lock().unwrap(), vec!["fired"]);
        assert!(scheduler.now() >= Duration::from_millis(501));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_cancel_suppresses_task() {
        let scheduler = TokioScheduler::current().unwrap();
        let (log, task) = recorder();

        let handle = scheduler.schedule(Duration::from_millis(100), task("never"));
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_repeating() {
        let scheduler = TokioScheduler::current().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let handle = scheduler.schedule_repeating(
            Duration::from_millis(100),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_out_of_range_interval_never_fires() {
        let scheduler = TokioScheduler::current().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let handle = scheduler.schedule_repeating(
            Duration::MAX,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_manual_huge_delays_do_not_overflow() {
        let scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        scheduler.schedule_repeating(
            Duration::MAX,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        scheduler.schedule(Duration::MAX, Box::new(|| {}));

        scheduler.advance(Duration::from_secs(60));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(), 2);
    }

    #[test]
    fn test_tokio_scheduler_requires_runtime() {
        assert!(matches!(TokioScheduler::current(), Err(SessionError::Runtime(_))));
    }
}
