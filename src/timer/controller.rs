use std::{
    f64::consts::PI,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use anyhow::Result;
use serde::Serialize;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{self, Instant},
};

use crate::clock::Clock;
use crate::dom::{Element, ElementCache};
use crate::state::StateStore;
use crate::{log_info, log_warn};

use super::{streak, TimerState, TimerStatus};

const ENABLE_LOGS: bool = true;

pub const RING_RADIUS: f64 = 130.0;
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub status: TimerStatus,
    pub duration: u64,
    pub current: u64,
    pub offset: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimerEvent {
    Tick(TimerSnapshot),
    #[serde(rename_all = "camelCase")]
    Finished { duration_seconds: u64 },
}

/// `MM:SS`; minutes keep counting past an hour.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Stroke offset of the progress ring: empty at the start of a run, the full
/// circumference once the countdown reaches zero.
pub fn ring_offset(current: u64, duration: u64) -> f64 {
    let circumference = 2.0 * PI * RING_RADIUS;
    if duration == 0 {
        return 0.0;
    }
    let remaining = (current as f64 / duration as f64).clamp(0.0, 1.0);
    circumference * (1.0 - remaining)
}

#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<TimerState>>,
    store: Arc<StateStore>,
    cache: Arc<ElementCache>,
    clock: Arc<dyn Clock>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    events: broadcast::Sender<TimerEvent>,
    tick_interval: Duration,
}

impl TimerController {
    pub fn new(store: Arc<StateStore>, cache: Arc<ElementCache>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(TimerState::new())),
            store,
            cache,
            clock,
            ticker: Arc::new(Mutex::new(None)),
            events,
            tick_interval: Duration::from_secs(1),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, TimerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_ticker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.ticker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> TimerStatus {
        self.lock_state().status
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let duration = self.store.timer_duration();
        let current = self.store.current_timer();
        TimerSnapshot {
            status: self.status(),
            duration,
            current,
            offset: ring_offset(current, duration),
        }
    }

    pub fn start(&self) -> Result<TimerStatus> {
        let (run, restarted) = {
            let mut state = self.lock_state();
            if !state.can_start() {
                return Ok(state.status);
            }
            let restarted = state.status == TimerStatus::Finished;
            (state.begin_run(), restarted)
        };
        if restarted {
            // A finished run restarts from the (possibly extended) duration.
            self.store.set_current_timer(self.store.timer_duration());
        }

        self.cache.set_hidden(Element::TimerIntro, true)?;
        self.cache.set_hidden(Element::TimerCircle, false)?;
        self.store.set_timer_running(true);
        self.spawn_ticker(run);
        self.publish();
        log_info!("Timer started with {}s remaining", self.store.current_timer());

        Ok(TimerStatus::Running)
    }

    pub fn pause(&self) -> TimerStatus {
        let paused = self.lock_state().pause();
        if paused {
            self.cancel_ticker();
            self.store.set_timer_running(false);
            self.publish();
        }
        self.status()
    }

    pub fn reset(&self) {
        self.cancel_ticker();
        self.lock_state().reset();
        self.store.set_current_timer(self.store.timer_duration());
        self.store.set_timer_running(false);
        self.publish();
    }

    /// Debug control: removes `minutes` from the countdown, stopping at zero.
    pub fn subtract_minutes(&self, minutes: u64) {
        let current = self
            .store
            .current_timer()
            .saturating_sub(minutes.saturating_mul(60));
        self.store.set_current_timer(current);
        self.publish();
        if current == 0 {
            self.finish(true);
        }
    }

    /// Streak update for a session completed on `today`.
    pub fn update_streak(&self, today: chrono::NaiveDate) -> Option<u64> {
        streak::apply_streak(&self.store, today)
    }

    fn spawn_ticker(&self, run: u64) {
        let mut ticker = self.lock_ticker();
        if let Some(handle) = ticker.take() {
            handle.abort();
        }

        let controller = self.clone();
        let tick_interval = self.tick_interval;
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
            loop {
                interval.tick().await;
                if !controller.tick(run) {
                    break;
                }
            }
        });

        *ticker = Some(handle);
    }

    fn cancel_ticker(&self) {
        if let Some(handle) = self.lock_ticker().take() {
            handle.abort();
        }
    }

    /// One countdown step. Returns `false` once the ticker should stop.
    fn tick(&self, run: u64) -> bool {
        {
            let state = self.lock_state();
            if state.status != TimerStatus::Running || state.run != run {
                return false;
            }
        }

        let current = self.store.current_timer().saturating_sub(1);
        self.store.set_current_timer(current);
        self.publish();

        if current == 0 {
            self.finish(false);
            return false;
        }
        true
    }

    fn finish(&self, abort_ticker: bool) {
        if !self.lock_state().finish() {
            return;
        }

        // The ticker finishing itself just lets its loop end.
        let handle = self.lock_ticker().take();
        if let (true, Some(handle)) = (abort_ticker, handle) {
            handle.abort();
        }

        let duration_seconds = self.store.timer_duration();
        self.store.set_timer_running(false);
        self.update_streak(self.clock.today());
        log_info!("Timer finished after {duration_seconds}s");

        self.publish();
        let _ = self.events.send(TimerEvent::Finished { duration_seconds });
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        if let Err(err) = self.render(&snapshot) {
            log_warn!("Timer view not updated: {err:#}");
        }
        let _ = self.events.send(TimerEvent::Tick(snapshot));
    }

    fn render(&self, snapshot: &TimerSnapshot) -> Result<()> {
        let text = format_clock(snapshot.current);
        self.cache.set_text(Element::TimerDisplay, &text)?;
        self.cache.set_text(Element::CircleDisplay, &text)?;
        self.cache.set_style(
            Element::ProgressRing,
            "stroke-dashoffset",
            Some(&format!("{:.2}", snapshot.offset)),
        )
    }
}
