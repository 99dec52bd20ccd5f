use std::collections::BTreeMap;
use std::time::Duration;

use imgproxy_core::SiteCategory;
use rand::Rng;

use crate::page::{ObserverId, Page, TimerId};

/// What a registered timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    GeneralScan,
    LazyScan,
    IframeScan,
    InlineStyleScan,
    CategoryScan(SiteCategory),
    StylesheetSweep,
    DomReadyFallback,
    ViewportDebounce,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    task: Task,
    repeating: bool,
}

/// Every timer and observer the engine has registered. Nothing is cancelled
/// individually; [`Registry::clear`] releases everything at teardown.
#[derive(Debug, Default)]
pub struct Registry {
    timers: BTreeMap<TimerId, Entry>,
    observers: Vec<ObserverId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn every(&mut self, page: &mut dyn Page, period: Duration, task: Task) -> TimerId {
        let timer = page.set_interval(period);
        self.timers.insert(timer, Entry { task, repeating: true });
        timer
    }

    pub fn once(&mut self, page: &mut dyn Page, delay: Duration, task: Task) -> TimerId {
        let timer = page.set_timeout(delay);
        self.timers.insert(timer, Entry { task, repeating: false });
        timer
    }

    /// The task behind a fired timer. One-shot timers leave the registry here.
    pub fn fired(&mut self, timer: TimerId) -> Option<Task> {
        let entry = *self.timers.get(&timer)?;
        if !entry.repeating {
            self.timers.remove(&timer);
        }
        Some(entry.task)
    }

    pub fn add_observer(&mut self, observer: ObserverId) {
        self.observers.push(observer);
    }

    pub fn has_observer(&self, observer: ObserverId) -> bool {
        self.observers.contains(&observer)
    }

    pub fn timers(&self) -> impl Iterator<Item = (TimerId, Task)> + '_ {
        self.timers.iter().map(|(id, entry)| (*id, entry.task))
    }

    pub fn observers(&self) -> &[ObserverId] {
        &self.observers
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty() && self.observers.is_empty()
    }

    pub fn clear(&mut self, page: &mut dyn Page) {
        for timer in std::mem::take(&mut self.timers).into_keys() {
            page.clear_timer(timer);
        }
        for observer in self.observers.drain(..) {
            page.disconnect_observer(observer);
        }
    }
}

/// `base + uniform(0, jitter)`, scaled by `factor`.
pub fn jittered(base: Duration, jitter: Duration, factor: f64) -> Duration {
    let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    let extra = if jitter_ms == 0 {
        0
    } else {
        rand::rng().random_range(0..=jitter_ms)
    };
    (base + Duration::from_millis(extra)).mul_f64(factor)
}

/// Trailing-edge debounce for scroll and resize. The platform cannot cancel
/// a single timer on our behalf, so the pending timer re-arms itself until
/// the quiet period has elapsed.
#[derive(Debug, Default)]
pub struct Debounce {
    pending: Option<TimerId>,
    last_trigger: Duration,
}

impl Debounce {
    /// Records a trigger. Returns the delay for a new timer when none is armed.
    pub fn trigger(&mut self, now: Duration, quiet: Duration) -> Option<Duration> {
        self.last_trigger = now;
        match self.pending {
            Some(_) => None,
            None => Some(quiet),
        }
    }

    pub fn armed(&mut self, timer: TimerId) {
        self.pending = Some(timer);
    }

    /// Called when the armed timer fires. `Ok` means run now, `Err` carries
    /// the remaining delay before the next check.
    pub fn elapsed(&mut self, now: Duration, quiet: Duration) -> Result<(), Duration> {
        self.pending = None;
        let since = now.saturating_sub(self.last_trigger);
        if since >= quiet {
            Ok(())
        } else {
            Err(quiet - since)
        }
    }

    pub fn reset(&mut self) {
        self.pending = None;
    }
}
