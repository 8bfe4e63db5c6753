// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Look-ahead step scheduling.
//!
//! A polling task wakes up often and queues every step that falls inside the
//! next [`LOOK_AHEAD`] seconds at its exact device time. Polling jitter only
//! decides how early a note is queued, never when it sounds.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info, span, Instrument, Level};

use crate::catalog::{MAX_SWING, STEPS};
use crate::playsync::CancelHandle;

/// How far ahead of the device clock steps are queued, in seconds.
pub const LOOK_AHEAD: f64 = 0.200;

/// Delay between `play` and the first step, in seconds.
pub const START_LEAD: f64 = 0.005;

/// Default pause between polls. Far inside the look-ahead window.
pub const DEFAULT_GRANULARITY: Duration = Duration::from_millis(1);

/// A step the playhead has reached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepEvent {
    /// The column, 0..16.
    pub step: usize,
    /// Time since the run started, in seconds.
    pub time: f64,
}

/// Receives `Some` for each newly reached step and `None` once when playback stops.
/// Called with the transport locked, so it must not call back into the scheduler.
pub type OnStep = Arc<dyn Fn(Option<StepEvent>) + Send + Sync>;

/// The thing being played.
pub trait Sequence: Send + Sync {
    /// The device clock, in seconds.
    fn now(&self) -> f64;

    /// Seconds per beat and swing factor, read before every step advance.
    fn pace(&self) -> (f64, f64);

    /// Queues every instrument's cell for the step at device time `when`.
    fn trigger(&self, step: usize, when: f64);
}

/// The position of a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Timeline {
    /// Device time of step zero.
    start_time: f64,
    /// Time of the next step to queue, relative to `start_time`.
    note_time: f64,
    /// The next step to queue.
    rhythm_index: usize,
    /// The note time the step callback last fired for.
    last_draw_time: Option<f64>,
}

impl Timeline {
    pub(crate) fn start(now: f64) -> Timeline {
        Timeline {
            start_time: now + START_LEAD,
            note_time: 0.0,
            rhythm_index: 0,
            last_draw_time: None,
        }
    }

    /// Queues every step inside the look-ahead window.
    pub(crate) fn advance(
        &mut self,
        now: f64,
        sequence: &dyn Sequence,
        on_step: &dyn Fn(Option<StepEvent>),
    ) {
        let current_time = now - self.start_time;

        while self.note_time < current_time + LOOK_AHEAD {
            // The playhead trails the queued step by one.
            if self.last_draw_time != Some(self.note_time) {
                self.last_draw_time = Some(self.note_time);
                on_step(Some(StepEvent {
                    step: (self.rhythm_index + STEPS - 1) % STEPS,
                    time: self.note_time,
                }));
            }

            sequence.trigger(self.rhythm_index, self.note_time + self.start_time);

            let (seconds_per_beat, swing) = sequence.pace();
            self.rhythm_index = (self.rhythm_index + 1) % STEPS;
            let swing = MAX_SWING * swing * seconds_per_beat;
            let step = 0.25 * seconds_per_beat;
            if self.rhythm_index % 2 == 1 {
                self.note_time += step + swing;
            } else {
                self.note_time += step - swing;
            }
        }
    }

    pub(crate) fn rhythm_index(&self) -> usize {
        self.rhythm_index
    }

    pub(crate) fn note_time(&self) -> f64 {
        self.note_time
    }

    pub(crate) fn start_time(&self) -> f64 {
        self.start_time
    }
}

#[derive(Default)]
struct Transport {
    /// Present while playing.
    timeline: Option<Timeline>,
    /// Cancels the current run's polling task.
    cancel: Option<CancelHandle>,
}

/// The transport state machine: stopped or playing.
pub struct Scheduler {
    runtime: Handle,
    granularity: Duration,
    on_step: OnStep,
    transport: Arc<Mutex<Transport>>,
}

impl Scheduler {
    /// Creates a stopped scheduler whose polling tasks run on `runtime`, pausing
    /// `granularity` between polls. A zero granularity just yields.
    pub fn new(runtime: Handle, granularity: Duration, on_step: OnStep) -> Scheduler {
        Scheduler {
            runtime,
            granularity,
            on_step,
            transport: Arc::new(Mutex::new(Transport::default())),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.transport.lock().timeline.is_some()
    }

    /// The next step to be queued and its relative time, while playing.
    pub fn position(&self) -> Option<(usize, f64)> {
        self.transport
            .lock()
            .timeline
            .map(|timeline| (timeline.rhythm_index(), timeline.note_time()))
    }

    /// Device time of step zero of the current run.
    pub fn start_time(&self) -> Option<f64> {
        self.transport.lock().timeline.map(|t| t.start_time())
    }

    /// Starts a run of `sequence`. Returns false if already playing.
    pub fn play(&self, sequence: Arc<dyn Sequence>) -> bool {
        let mut transport = self.transport.lock();
        if transport.timeline.is_some() {
            return false;
        }

        let timeline = Timeline::start(sequence.now());
        let cancel = CancelHandle::new();
        transport.timeline = Some(timeline);
        transport.cancel = Some(cancel.clone());
        info!(start_time = timeline.start_time(), "Playback started");

        self.runtime.spawn(
            poll(
                self.transport.clone(),
                cancel,
                sequence,
                self.on_step.clone(),
                self.granularity,
            )
            .instrument(span!(Level::DEBUG, "scheduler")),
        );
        true
    }

    /// Stops the current run and fires the stopped signal. Returns false if already stopped.
    pub fn stop(&self) -> bool {
        let mut transport = self.transport.lock();
        if transport.timeline.take().is_none() {
            return false;
        }
        if let Some(cancel) = transport.cancel.take() {
            cancel.cancel();
        }
        (self.on_step)(None);
        info!("Playback stopped");
        true
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(cancel) = self.transport.lock().cancel.take() {
            cancel.cancel();
        }
    }
}

/// The polling loop of one run.
async fn poll(
    transport: Arc<Mutex<Transport>>,
    cancel: CancelHandle,
    sequence: Arc<dyn Sequence>,
    on_step: OnStep,
    granularity: Duration,
) {
    loop {
        {
            let mut transport = transport.lock();
            if cancel.is_cancelled() {
                break;
            }
            let Some(timeline) = transport.timeline.as_mut() else {
                break;
            };
            timeline.advance(sequence.now(), sequence.as_ref(), on_step.as_ref());
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = pause(granularity) => {}
        }
    }
    debug!("Scheduler loop finished");
}

async fn pause(granularity: Duration) {
    if granularity.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(granularity).await;
    }
}
