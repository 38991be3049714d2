use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::{
    effects::Effect,
    error::ApplyError,
    params::ResolvedParameterSet,
    pipeline::cache::CacheKey,
    video::FrameBuffer,
};

/// Run an effect with panic isolation and shape verification
pub fn execute(
    effect_id: &str,
    effect: &dyn Effect,
    input: &FrameBuffer,
    params: &ResolvedParameterSet,
    output: &mut FrameBuffer,
) -> Result<(), ApplyError> {
    let outcome = catch_unwind(AssertUnwindSafe(|| effect.apply(input, params, output)));

    match outcome {
        Ok(Ok(())) if output.shape() != input.shape() => Err(ApplyError::ShapeMismatch {
            effect: effect_id.to_string(),
            expected: input.shape().to_string(),
            actual: output.shape().to_string(),
        }),
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ApplyError::Panicked {
                effect: effect_id.to_string(),
                message,
            })
        }
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Work handed to an effect worker
pub struct Job {
    pub epoch: u64,
    pub effect_id: Arc<str>,
    pub effect: Arc<dyn Effect>,
    pub input: Arc<FrameBuffer>,
    pub params: ResolvedParameterSet,
    pub output: FrameBuffer,
    pub key: Option<CacheKey>,
}

/// A finished job, successful or not
pub struct JobResult {
    pub epoch: u64,
    pub input: Arc<FrameBuffer>,
    pub key: Option<CacheKey>,
    pub outcome: Result<FrameBuffer, ApplyError>,
    pub elapsed_ms: f64,
}

impl JobResult {
    pub fn sequence(&self) -> u64 {
        self.input.sequence()
    }
}

/// Why a blocking wait gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    TimedOut,
    Disconnected,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    sequence: u64,
    started: Instant,
}

#[derive(Default)]
struct SlotState {
    pending: Option<Job>,
    in_flight: Option<InFlight>,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<SlotState>,
    wake: Condvar,
}

/// A dedicated thread for one effect
///
/// Holds at most one job in flight plus a single pending cell. Submitting
/// while a job is pending replaces it, so a slow effect always works on the
/// newest frame.
pub struct WorkerSlot {
    effect_id: Arc<str>,
    generation: u64,
    shared: Arc<Shared>,
    results: Receiver<JobResult>,
    handle: Option<JoinHandle<()>>,
    last_used: u64,
}

impl WorkerSlot {
    pub fn spawn(effect_id: Arc<str>, generation: u64) -> std::io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let (tx, rx) = crossbeam_channel::unbounded();

        let handle = thread::Builder::new()
            .name(format!("effect-{}-{}", effect_id, generation))
            .spawn({
                let shared = Arc::clone(&shared);
                move || worker_loop(shared, tx)
            })?;

        debug!(effect = &*effect_id, generation, "Spawned effect worker");
        Ok(Self {
            effect_id,
            generation,
            shared,
            results: rx,
            handle: Some(handle),
            last_used: 0,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue a job. Returns the pending job it displaced, if any.
    pub fn submit(&self, job: Job) -> Option<Job> {
        let mut state = self.shared.state.lock();
        let displaced = state.pending.replace(job);
        self.shared.wake.notify_one();
        displaced
    }

    /// Results finished since the last call
    pub fn drain(&self) -> Vec<JobResult> {
        self.results.try_iter().collect()
    }

    /// Wait for the result of one specific job
    pub fn wait_for(&self, epoch: u64, sequence: u64, timeout: Duration) -> Result<JobResult, WaitError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(result) if result.epoch == epoch && result.sequence() == sequence => return Ok(result),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => return Err(WaitError::TimedOut),
                Err(RecvTimeoutError::Disconnected) => return Err(WaitError::Disconnected),
            }
        }
    }

    /// Sequence number of the in-flight job if it has run longer than `timeout`
    pub fn stuck(&self, timeout: Duration) -> Option<u64> {
        let state = self.shared.state.lock();
        state
            .in_flight
            .filter(|job| job.started.elapsed() > timeout)
            .map(|job| job.sequence)
    }

    pub fn is_busy(&self) -> bool {
        let state = self.shared.state.lock();
        state.in_flight.is_some() || state.pending.is_some()
    }

    /// True if the thread exited (it only does so on shutdown or a broken channel)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        let busy = {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            state.pending = None;
            state.in_flight.is_some()
        };
        self.shared.wake.notify_all();

        if let Some(handle) = self.handle.take() {
            if busy {
                // A stuck apply cannot be interrupted; the thread exits once it returns
                debug!(effect = &*self.effect_id, generation = self.generation, "Detaching busy worker");
            } else if handle.join().is_err() {
                warn!(effect = &*self.effect_id, "Effect worker exited abnormally");
            }
        }
    }
}

fn worker_loop(shared: Arc<Shared>, results: Sender<JobResult>) {
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(job) = state.pending.take() {
                    state.in_flight = Some(InFlight {
                        sequence: job.input.sequence(),
                        started: Instant::now(),
                    });
                    break job;
                }
                shared.wake.wait(&mut state);
            }
        };

        let Job {
            epoch,
            effect_id,
            effect,
            input,
            params,
            mut output,
            key,
        } = job;

        let started = Instant::now();
        let outcome = execute(&effect_id, effect.as_ref(), &input, &params, &mut output).map(|()| output);
        let elapsed_ms = elapsed_ms(started);

        shared.state.lock().in_flight = None;

        let result = JobResult {
            epoch,
            input,
            key,
            outcome,
            elapsed_ms,
        };
        if results.send(result).is_err() {
            return;
        }
    }
}

/// Bounded set of worker slots, one per effect id
///
/// When the pool is full the least recently used idle slot is retired to
/// make room; if every slot is busy the least recently used one goes.
pub struct WorkerPool {
    slots: HashMap<Arc<str>, WorkerSlot>,
    max_workers: usize,
    tick: u64,
    generation: u64,
    retired: u64,
}

impl WorkerPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            slots: HashMap::new(),
            max_workers: max_workers.max(1),
            tick: 0,
            generation: 0,
            retired: 0,
        }
    }

    /// The slot for an effect, spawning one if needed
    pub fn slot(&mut self, effect_id: &Arc<str>) -> Result<&mut WorkerSlot, ApplyError> {
        self.tick += 1;

        if self.slots.get(effect_id).map_or(false, |slot| slot.is_finished()) {
            warn!(effect = &**effect_id, "Effect worker died; replacing it");
            self.slots.remove(effect_id);
        }

        if !self.slots.contains_key(effect_id) {
            if self.slots.len() >= self.max_workers {
                self.evict_one();
            }
            self.generation += 1;
            let slot = WorkerSlot::spawn(Arc::clone(effect_id), self.generation).map_err(|e| {
                warn!(effect = &**effect_id, "Failed to spawn effect worker: {}", e);
                ApplyError::WorkerLost {
                    effect: effect_id.to_string(),
                }
            })?;
            self.slots.insert(Arc::clone(effect_id), slot);
        }

        let tick = self.tick;
        let slot = self.slots.get_mut(effect_id).ok_or_else(|| ApplyError::WorkerLost {
            effect: effect_id.to_string(),
        })?;
        slot.last_used = tick;
        Ok(slot)
    }

    /// Abandon an effect's worker; a replacement is spawned on next use
    pub fn retire(&mut self, effect_id: &str) {
        if self.slots.remove(effect_id).is_some() {
            self.retired += 1;
            warn!(effect = effect_id, "Retired effect worker");
        }
    }

    fn evict_one(&mut self) {
        let victim = self
            .slots
            .iter()
            .filter(|(_, slot)| !slot.is_busy())
            .min_by_key(|(_, slot)| slot.last_used)
            .or_else(|| self.slots.iter().min_by_key(|(_, slot)| slot.last_used))
            .map(|(id, _)| Arc::clone(id));

        if let Some(id) = victim {
            debug!(effect = &*id, "Worker pool full; retiring least recently used worker");
            self.slots.remove(&id);
            self.retired += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Workers retired so far, whether stuck or evicted
    pub fn retired(&self) -> u64 {
        self.retired
    }

    pub fn shutdown(&mut self) {
        self.slots.clear();
    }
}
