//! Cycle thread
//!
//! One [`CycleWorker`] owns everything the thread touches: the source, the
//! dispatcher, the rate setpoint and the running flag. Two schedules:
//!
//! - rate-paced: `next = prev + period`, slept in [`FLAG_CHECK_PERIOD`] steps so a
//!   stop is seen within about a millisecond; wake-up lateness is recorded
//! - fixed-period: produce, then sleep the readout period whatever happened

use std::io;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::RunNumber;
use dispatcher::EventDispatcher;
use observability::metrics::record_wakeup_lateness_us;
use observability::RunningStats;
use parking_lot::Mutex;
use signal_source::{CycleSchedule, SignalSource, SourceError};
use tracing::{debug, error, info, trace};

use crate::rate::RateSetpoint;

/// Granularity of running-flag checks while sleeping
pub const FLAG_CHECK_PERIOD: Duration = Duration::from_millis(1);

/// Sleep between checks while the rate is paused
pub const PAUSED_IDLE: Duration = Duration::from_millis(250);

/// Why the cycle thread returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleExit {
    /// Running flag cleared
    Stopped,
    /// Stop requested before the first valid timestamp estimate
    Interrupted,
    /// Unrecoverable source or channel error
    Failed,
}

pub(crate) struct CycleWorker {
    pub(crate) name: String,
    pub(crate) source: Box<dyn SignalSource>,
    pub(crate) dispatcher: Arc<EventDispatcher>,
    pub(crate) rate: Arc<RateSetpoint>,
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) run_number: RunNumber,
    pub(crate) lateness: Arc<Mutex<RunningStats>>,
}

impl CycleWorker {
    pub(crate) fn run(mut self) -> CycleExit {
        debug!(module = %self.name, source = self.source.name(), "Cycle thread started");

        match self.source.prepare(&self.running) {
            Ok(()) => {}
            Err(SourceError::Interrupted) => return CycleExit::Interrupted,
            Err(e) => {
                error!(module = %self.name, error = %e, "Source failed to prepare");
                return CycleExit::Failed;
            }
        }

        let exit = match self.source.schedule() {
            CycleSchedule::RatePaced => self.run_rate_paced(),
            CycleSchedule::FixedPeriod(period) => self.run_fixed_period(period),
        };

        let stats = self.dispatcher.stats();
        info!(
            module = %self.name,
            run_number = self.run_number,
            produced = stats.produced(),
            sent = stats.sent(),
            failed_to_send = stats.failed_to_send(),
            exit = ?exit,
            "Exiting the cycle loop, generated {} events and successfully sent {} copies",
            stats.produced(),
            stats.sent()
        );
        exit
    }

    fn run_rate_paced(&mut self) -> CycleExit {
        let mut prev = Instant::now();
        loop {
            if !self.is_running() {
                return CycleExit::Stopped;
            }

            let Some(period) = self.rate.period() else {
                if !self.idle(PAUSED_IDLE) {
                    return CycleExit::Stopped;
                }
                // resume on the current time, not on a backlog of missed cycles
                prev = Instant::now();
                continue;
            };

            if let ControlFlow::Break(exit) = self.cycle() {
                return exit;
            }

            let next = prev + period;
            if !self.sleep_until_checked(prev, next) {
                debug!(module = %self.name, "Running flag cleared while waiting for the next cycle");
                return CycleExit::Stopped;
            }
            self.record_lateness(next);
            prev = next;
        }
    }

    fn run_fixed_period(&mut self, period: Duration) -> CycleExit {
        loop {
            if !self.is_running() {
                return CycleExit::Stopped;
            }
            if let ControlFlow::Break(exit) = self.cycle() {
                return exit;
            }
            if !self.idle(period) {
                return CycleExit::Stopped;
            }
        }
    }

    /// Produce once and dispatch every record
    fn cycle(&mut self) -> ControlFlow<CycleExit> {
        let records = match self.source.produce() {
            Ok(records) => records,
            Err(e) if e.is_recoverable() => {
                trace!(module = %self.name, error = %e, "Cycle skipped");
                return ControlFlow::Continue(());
            }
            Err(e) => {
                error!(module = %self.name, error = %e, "Signal source failed");
                return ControlFlow::Break(CycleExit::Failed);
            }
        };

        for record in records {
            let sent = self
                .dispatcher
                .send_event(record.to_event(self.run_number))
                .and_then(|()| self.dispatcher.send_raw_frame(record.frame));
            if let Err(e) = sent {
                error!(module = %self.name, error = %e, "Dispatch failed, leaving the cycle loop");
                return ControlFlow::Break(CycleExit::Failed);
            }
        }
        ControlFlow::Continue(())
    }

    /// Sleep until `next`, checking the flag every [`FLAG_CHECK_PERIOD`]
    ///
    /// The final stretch (at most two check periods) is slept in one go.
    fn sleep_until_checked(&self, prev: Instant, next: Instant) -> bool {
        let mut next_check = prev + FLAG_CHECK_PERIOD;
        while next > next_check + FLAG_CHECK_PERIOD {
            if !self.is_running() {
                return false;
            }
            sleep_until(next_check);
            next_check += FLAG_CHECK_PERIOD;
        }
        sleep_until(next);
        true
    }

    /// Sleep `duration` in flag-checked steps, false when stopped
    fn idle(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if !self.is_running() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(FLAG_CHECK_PERIOD));
        }
    }

    fn record_lateness(&self, scheduled: Instant) {
        let lateness_us = Instant::now()
            .saturating_duration_since(scheduled)
            .as_secs_f64()
            * 1.0e6;
        self.lateness.lock().push(lateness_us);
        record_wakeup_lateness_us(lateness_us);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if deadline > now {
        thread::sleep(deadline - now);
    }
}

/// Running cycle thread and its flag
pub(crate) struct CycleHandle {
    running: Arc<AtomicBool>,
    thread: JoinHandle<CycleExit>,
}

impl CycleHandle {
    pub(crate) fn spawn(worker: CycleWorker, thread_name: &str) -> io::Result<Self> {
        let running = Arc::clone(&worker.running);
        running.store(true, Ordering::Release);
        let thread = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || worker.run())?;
        Ok(Self { running, thread })
    }

    /// Clear the flag and join; `None` if the thread panicked
    pub(crate) fn stop(self) -> Option<CycleExit> {
        self.running.store(false, Ordering::Release);
        match self.thread.join() {
            Ok(exit) => Some(exit),
            Err(_) => {
                error!("Cycle thread panicked");
                None
            }
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FrameFormat, RunStatistics, SignalEvent, SyntheticConfig, TimestampEstimator};
    use crossbeam_channel::Receiver;
    use dispatcher::{CrossbeamChannel, EventDispatcherBuilder};
    use frame_codec::WireFrame;
    use signal_source::{ManualEstimator, SyntheticSource};

    struct Harness {
        worker: CycleWorker,
        events: Receiver<SignalEvent>,
        frames: Receiver<WireFrame>,
        stats: Arc<RunStatistics>,
    }

    fn harness(rate_hz: f64, estimator: Arc<dyn TimestampEstimator>) -> Harness {
        let stats = Arc::new(RunStatistics::new());
        let (event_channel, events) = CrossbeamChannel::<SignalEvent>::bounded("events", 1024);
        let (raw_channel, frames) = CrossbeamChannel::<WireFrame>::bounded("raw", 1024);
        let dispatcher = EventDispatcherBuilder::new(Arc::clone(&stats))
            .event_channel(Arc::new(event_channel))
            .raw_channel(Arc::new(raw_channel))
            .build();
        let source = SyntheticSource::new(
            "test-gen",
            SyntheticConfig {
                trigger_rate: rate_hz,
                enabled_signals: u32::MAX,
                ..Default::default()
            },
            FrameFormat::Current,
            estimator,
            Arc::clone(&stats),
        );
        let worker = CycleWorker {
            name: "test".to_string(),
            source: Box::new(source),
            dispatcher: Arc::new(dispatcher),
            rate: Arc::new(RateSetpoint::new(rate_hz)),
            running: Arc::new(AtomicBool::new(false)),
            run_number: 42,
            lateness: Arc::new(Mutex::new(RunningStats::default())),
        };
        Harness {
            worker,
            events,
            frames,
            stats,
        }
    }

    #[test]
    fn test_rate_paced_produces_and_stops() {
        let h = harness(100.0, Arc::new(ManualEstimator::valid_at(500)));
        let lateness = Arc::clone(&h.worker.lateness);
        let handle = CycleHandle::spawn(h.worker, "test-cycle").unwrap();
        thread::sleep(Duration::from_millis(105));
        assert_eq!(handle.stop(), Some(CycleExit::Stopped));

        let events: Vec<_> = h.events.try_iter().collect();
        assert!((8..=13).contains(&events.len()), "got {} events", events.len());
        assert!(events.iter().all(|e| e.run_number == 42 && e.timestamp == 500));
        assert_eq!(h.frames.try_iter().count(), events.len());
        // each event counts once per channel
        assert_eq!(h.stats.sent(), 2 * h.stats.produced());
        assert!(lateness.lock().count() > 0);
    }

    #[test]
    fn test_stop_latency_is_bounded() {
        // 1 Hz: a plain sleep would hold the thread for a second
        let h = harness(1.0, Arc::new(ManualEstimator::valid_at(1)));
        let handle = CycleHandle::spawn(h.worker, "test-cycle").unwrap();
        thread::sleep(Duration::from_millis(50));

        let begin = Instant::now();
        assert_eq!(handle.stop(), Some(CycleExit::Stopped));
        assert!(begin.elapsed() < Duration::from_millis(100), "{:?}", begin.elapsed());
        assert_eq!(h.stats.produced(), 1);
    }

    #[test]
    fn test_paused_rate_produces_nothing() {
        let h = harness(0.0, Arc::new(ManualEstimator::valid_at(1)));
        let handle = CycleHandle::spawn(h.worker, "test-cycle").unwrap();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(handle.stop(), Some(CycleExit::Stopped));
        assert_eq!(h.stats.produced(), 0);
        assert!(h.events.try_recv().is_err());
    }

    #[test]
    fn test_interrupted_before_valid_estimate() {
        let h = harness(100.0, Arc::new(ManualEstimator::invalid()));
        let handle = CycleHandle::spawn(h.worker, "test-cycle").unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());
        assert_eq!(handle.stop(), Some(CycleExit::Interrupted));
        assert_eq!(h.stats.produced(), 0);
    }

    #[test]
    fn test_disconnected_channel_fails_loop() {
        let h = harness(1000.0, Arc::new(ManualEstimator::valid_at(1)));
        drop(h.events);
        let handle = CycleHandle::spawn(h.worker, "test-cycle").unwrap();
        let begin = Instant::now();
        while !handle.is_finished() && begin.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(handle.stop(), Some(CycleExit::Failed));
    }
}
