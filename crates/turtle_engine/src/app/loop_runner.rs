use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::dispatcher::{CommandDispatcher, DispatchEvent};
use super::metrics::{MetricsAccumulator, MetricsHandle};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
        }
    }
}

/// Converts variable frame times into whole fixed-length dispatcher ticks.
#[derive(Debug)]
pub struct FixedTickDriver {
    fixed_dt: Duration,
    fixed_dt_seconds: f32,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
}

impl FixedTickDriver {
    pub fn new(config: &LoopConfig) -> Self {
        let target_tps = config.target_tps.max(1);
        let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
        Self {
            fixed_dt,
            fixed_dt_seconds: fixed_dt.as_secs_f32(),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
        }
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn fixed_dt_seconds(&self) -> f32 {
        self.fixed_dt_seconds
    }

    /// Accumulates `frame_dt` and runs as many fixed ticks as fit, up to the
    /// per-frame cap. Returns the number of ticks run.
    pub fn advance(&mut self, frame_dt: Duration, dispatcher: &mut CommandDispatcher) -> u32 {
        let clamped_frame_dt = clamp_frame_delta(frame_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            dispatcher.tick(self.fixed_dt_seconds);
        }
        self.accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }
        step_plan.ticks_to_run
    }
}

/// Drives `dispatcher` at the configured tick rate on the calling thread
/// until `keep_running` returns `false`. Effects are handed to `on_event` in
/// emission order. Returns the total number of ticks run.
pub fn run_headless<K, E>(
    config: &LoopConfig,
    dispatcher: &mut CommandDispatcher,
    metrics_handle: &MetricsHandle,
    mut keep_running: K,
    mut on_event: E,
) -> u64
where
    K: FnMut(&CommandDispatcher) -> bool,
    E: FnMut(DispatchEvent),
{
    let mut driver = FixedTickDriver::new(config);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut events = Vec::new();
    let mut total_ticks = 0u64;
    let mut last_frame_instant = Instant::now();

    info!(
        target_tps = config.target_tps.max(1),
        max_frame_delta_ms = driver.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = driver.max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        "loop_config"
    );

    while keep_running(dispatcher) {
        let elapsed = Instant::now().saturating_duration_since(last_frame_instant);
        let frame_sleep = compute_frame_sleep(elapsed, driver.fixed_dt());
        if frame_sleep > Duration::ZERO {
            thread::sleep(frame_sleep);
        }

        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        let ticks = driver.advance(raw_frame_dt, dispatcher);
        total_ticks = total_ticks.saturating_add(u64::from(ticks));
        metrics_accumulator.record_ticks(ticks);

        dispatcher.drain_events_into(&mut events);
        for event in events.drain(..) {
            on_event(event);
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(
            now,
            dispatcher.commands_completed(),
            dispatcher.pending_len(),
        ) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                commands_completed = snapshot.commands_completed,
                queue_depth = snapshot.queue_depth,
                busy = dispatcher.is_busy(),
                "loop_metrics"
            );
        }
    }

    info!(total_ticks, "shutdown");
    total_ticks
}

struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_frame_sleep(elapsed: Duration, target: Duration) -> Duration {
    target.saturating_sub(elapsed)
}
