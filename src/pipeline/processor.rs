use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{
    config::{DispatchMode, PerformanceConfig, ProcessorConfig},
    effects::{Effect, EffectDescriptor, EffectRegistry},
    error::{ApplyError, EngineError, Result},
    params::{RawParameters, ResolvedParameterSet},
    performance::{PerformanceOptimizer, QualityTier, TierChange},
    pipeline::{
        cache::{CacheKey, FrameCache},
        health::HealthMonitor,
        scratch::ScratchPool,
        worker::{elapsed_ms, execute, Job, WaitError, WorkerPool},
    },
    video::{FrameBuffer, FrameFingerprint},
};

/// Spare scratch buffers kept per frame shape
const SCRATCH_POOL_SIZE: usize = 4;

/// Upper bound on a single transform, whatever the configured budgets
const MAX_HARD_TIMEOUT: Duration = Duration::from_secs(10);

/// The effect currently applied to frames
#[derive(Clone)]
pub struct Selection {
    pub effect_id: Arc<str>,
    pub raw_params: RawParameters,
    pub epoch: u64,
    descriptor: Arc<EffectDescriptor>,
    effect: Arc<dyn Effect>,
}

impl Selection {
    pub fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }
}

/// Processor state: pass-through or applying one effect
#[derive(Clone, Default)]
pub enum ProcessorState {
    #[default]
    Idle,
    Active(Selection),
}

/// What happened to one frame
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// Frame to hand to sinks
    pub output: Arc<FrameBuffer>,
    /// Output came from the cache
    pub cache_hit: bool,
    /// Time spent in `apply` (0 for hits and pass-through)
    pub elapsed_ms: f64,
    /// The effect failed and `output` is the untouched input
    pub faulted: bool,
    /// The selected effect has faulted repeatedly
    pub unhealthy: bool,
    /// Tier change triggered while handling this frame
    pub tier_change: Option<TierChange>,
    /// Sequence number of the frame `output` was produced from
    pub sequence: u64,
}

impl ProcessingResult {
    fn pass_through(input: Arc<FrameBuffer>) -> Self {
        Self {
            sequence: input.sequence(),
            output: input,
            cache_hit: false,
            elapsed_ms: 0.0,
            faulted: false,
            unhealthy: false,
            tier_change: None,
        }
    }
}

/// Running counters for status displays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessorStats {
    pub frames: u64,
    pub pass_through: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub faults: u64,
    pub timeouts: u64,
    /// Pending frames replaced by newer ones before a worker got to them
    pub dropped_frames: u64,
    /// Results discarded because the selection changed meanwhile
    pub stale_results: u64,
    pub evictions: u64,
    pub total_apply_ms: f64,
}

impl ProcessorStats {
    pub fn average_apply_ms(&self) -> f64 {
        let applied = self.cache_misses.saturating_sub(self.faults);
        if applied == 0 {
            0.0
        } else {
            self.total_apply_ms / applied as f64
        }
    }

    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}

/// Applies the selected effect to each captured frame
///
/// `process` is synchronous and always returns a frame: on any effect
/// failure the input passes through unchanged. Outputs are cached by
/// (effect, active parameter values, frame fingerprint) and processing time
/// feeds the performance optimizer, whose tier overrides are merged into the
/// parameters of the next frame.
pub struct FrameProcessor {
    registry: Arc<EffectRegistry>,
    config: ProcessorConfig,
    optimizer: PerformanceOptimizer,
    state: ProcessorState,
    epoch: u64,
    cache: FrameCache,
    scratch: ScratchPool,
    health: HealthMonitor,
    workers: WorkerPool,
    latest: Option<ProcessingResult>,
    disabled: BTreeSet<String>,
    stats: ProcessorStats,
}

impl FrameProcessor {
    pub fn new(registry: Arc<EffectRegistry>, config: ProcessorConfig, performance: PerformanceConfig) -> Self {
        info!(
            "Frame processor ready: dispatch {:?}, cache {} entries, target {} fps",
            config.dispatch, config.cache_capacity, performance.target_fps
        );
        Self {
            registry,
            cache: FrameCache::new(config.cache_capacity),
            scratch: ScratchPool::new(SCRATCH_POOL_SIZE),
            health: HealthMonitor::new(config.unhealthy_after, config.fault_log_len),
            workers: WorkerPool::new(config.max_workers),
            optimizer: PerformanceOptimizer::new(performance),
            config,
            state: ProcessorState::Idle,
            epoch: 0,
            latest: None,
            disabled: BTreeSet::new(),
            stats: ProcessorStats::default(),
        }
    }

    /// Select an effect. Takes effect on the very next frame.
    pub fn select(&mut self, effect_id: &str, raw_params: RawParameters) -> Result<()> {
        let entry = self
            .registry
            .get(effect_id)
            .ok_or_else(|| EngineError::UnknownEffect(effect_id.to_string()))?;

        let selection = Selection {
            effect_id: Arc::from(effect_id),
            raw_params,
            epoch: self.epoch + 1,
            descriptor: Arc::clone(&entry.descriptor),
            effect: Arc::clone(&entry.effect),
        };

        if let Some(previous) = self.selected_id() {
            if previous != effect_id {
                self.drop_effect(&previous);
            }
        }

        self.epoch += 1;
        self.latest = None;
        info!(effect = effect_id, epoch = self.epoch, "Selected effect");
        self.state = ProcessorState::Active(selection);
        Ok(())
    }

    /// Replace the raw parameters of the selected effect.
    /// Returns false when no effect is selected.
    pub fn update_parameters(&mut self, raw_params: RawParameters) -> bool {
        let ProcessorState::Active(selection) = &mut self.state else {
            return false;
        };
        self.epoch += 1;
        selection.raw_params = raw_params;
        selection.epoch = self.epoch;
        self.latest = None;
        debug!(effect = &*selection.effect_id, epoch = self.epoch, "Parameters updated");
        true
    }

    /// Return to pass-through
    pub fn clear_selection(&mut self) {
        if let Some(previous) = self.selected_id() {
            self.drop_effect(&previous);
            info!(effect = &*previous, "Effect cleared; passing frames through");
        }
        self.epoch += 1;
        self.latest = None;
        self.state = ProcessorState::Idle;
    }

    /// Swap in a rebuilt registry. The selection survives if its id still exists.
    pub fn set_registry(&mut self, registry: Arc<EffectRegistry>) {
        self.registry = registry;
        for output in self.cache.clear() {
            self.scratch.recycle(output);
        }
        self.workers.shutdown();

        if let ProcessorState::Active(selection) = &self.state {
            let id = selection.effect_id.to_string();
            let raw = selection.raw_params.clone();
            if self.select(&id, raw).is_err() {
                warn!(effect = &*id, "Selected effect disappeared after reload");
                self.clear_selection();
            }
        }
    }

    /// Switch an effect off without unregistering it. A disabled selection
    /// passes frames through until it is enabled again.
    pub fn disable(&mut self, effect_id: &str) -> bool {
        let newly = self.disabled.insert(effect_id.to_string());
        if newly {
            self.epoch += 1;
            self.latest = None;
            info!(effect = effect_id, "Effect disabled");
        }
        newly
    }

    pub fn enable(&mut self, effect_id: &str) -> bool {
        let was_disabled = self.disabled.remove(effect_id);
        if was_disabled {
            info!(effect = effect_id, "Effect enabled");
        }
        was_disabled
    }

    pub fn is_disabled(&self, effect_id: &str) -> bool {
        self.disabled.contains(effect_id)
    }

    fn drop_effect(&mut self, effect_id: &str) {
        for output in self.cache.invalidate_effect(effect_id) {
            self.scratch.recycle(output);
        }
        self.health.forget(effect_id);
    }

    /// Run one frame through the selected effect
    pub fn process(&mut self, frame: FrameBuffer) -> ProcessingResult {
        self.stats.frames += 1;
        let input = Arc::new(frame);

        let selection = match &self.state {
            ProcessorState::Idle => {
                self.stats.pass_through += 1;
                return ProcessingResult::pass_through(input);
            }
            ProcessorState::Active(selection) if self.disabled.contains(&*selection.effect_id) => {
                self.stats.pass_through += 1;
                return ProcessingResult::pass_through(input);
            }
            ProcessorState::Active(selection) => selection.clone(),
        };

        let mut raw = selection.raw_params.clone();
        raw.extend(self.optimizer.overrides_for(&selection.descriptor));
        let params = selection.descriptor.resolve(&raw);

        let key = self.cache.is_enabled().then(|| {
            let active = selection.descriptor.active_keys(&params);
            CacheKey::new(
                Arc::clone(&selection.effect_id),
                params.digest(&active),
                FrameFingerprint::of(&input, self.config.fingerprint_samples),
            )
        });

        if let Some(hit) = key.as_ref().and_then(|k| self.cache.get(k)) {
            return self.cache_hit(&selection, &input, hit);
        }

        match self.config.dispatch {
            DispatchMode::Inline => self.run_inline(&selection, input, params, key),
            DispatchMode::Blocking => self.run_blocking(&selection, input, params, key),
            DispatchMode::LatestWins => self.run_latest(&selection, input, params, key),
        }
    }

    fn cache_hit(&mut self, selection: &Selection, input: &FrameBuffer, hit: Arc<FrameBuffer>) -> ProcessingResult {
        self.stats.cache_hits += 1;
        let output = if hit.sequence() == input.sequence() {
            hit
        } else {
            Arc::new(hit.restamped(input.sequence(), input.timestamp()))
        };

        let result = ProcessingResult {
            sequence: input.sequence(),
            output,
            cache_hit: true,
            elapsed_ms: 0.0,
            faulted: false,
            unhealthy: self.health.is_unhealthy(&selection.effect_id),
            tier_change: None,
        };
        if self.config.dispatch == DispatchMode::LatestWins {
            self.latest = Some(result.clone());
        }
        result
    }

    fn run_inline(
        &mut self,
        selection: &Selection,
        input: Arc<FrameBuffer>,
        params: ResolvedParameterSet,
        key: Option<CacheKey>,
    ) -> ProcessingResult {
        let mut output = self.scratch.take(&input);
        let started = Instant::now();
        let outcome = execute(&selection.effect_id, selection.effect.as_ref(), &input, &params, &mut output);
        let elapsed = elapsed_ms(started);

        let outcome = match outcome {
            Ok(()) => Ok(output),
            Err(e) => {
                self.scratch.give_back(output);
                Err(e)
            }
        };
        self.finish(selection, input, key, outcome, elapsed)
    }

    fn run_blocking(
        &mut self,
        selection: &Selection,
        input: Arc<FrameBuffer>,
        params: ResolvedParameterSet,
        key: Option<CacheKey>,
    ) -> ProcessingResult {
        let timeout = self.hard_timeout();
        let sequence = input.sequence();
        let job = self.job(selection, Arc::clone(&input), params, key.clone());

        let slot = match self.workers.slot(&selection.effect_id) {
            Ok(slot) => slot,
            Err(e) => return self.finish(selection, input, key, Err(e), 0.0),
        };
        slot.submit(job);

        match slot.wait_for(selection.epoch, sequence, timeout) {
            Ok(result) => self.finish(selection, result.input, result.key, result.outcome, result.elapsed_ms),
            Err(reason) => {
                self.workers.retire(&selection.effect_id);
                let error = self.wait_error(selection, reason, timeout);
                self.finish(selection, input, key, Err(error), 0.0)
            }
        }
    }

    fn run_latest(
        &mut self,
        selection: &Selection,
        input: Arc<FrameBuffer>,
        params: ResolvedParameterSet,
        key: Option<CacheKey>,
    ) -> ProcessingResult {
        let timeout = self.hard_timeout();
        let job = self.job(selection, Arc::clone(&input), params, key);

        let (finished, stuck) = match self.workers.slot(&selection.effect_id) {
            Ok(slot) => (slot.drain(), slot.stuck(timeout)),
            Err(e) => return self.finish(selection, Arc::clone(&input), None, Err(e), 0.0),
        };

        let mut tier_change = None;
        for result in finished {
            if result.epoch != selection.epoch {
                self.stats.stale_results += 1;
                continue;
            }
            let done = self.finish(selection, result.input, result.key, result.outcome, result.elapsed_ms);
            tier_change = tier_change.or_else(|| done.tier_change.clone());
            self.latest = Some(done);
        }

        let mut timed_out = None;
        if let Some(stuck_sequence) = stuck {
            self.workers.retire(&selection.effect_id);
            let error = self.wait_error(selection, WaitError::TimedOut, timeout);
            warn!(effect = &*selection.effect_id, sequence = stuck_sequence, "Effect exceeded the hard timeout");
            timed_out = Some(self.finish(selection, Arc::clone(&input), None, Err(error), 0.0));
        }

        match self.workers.slot(&selection.effect_id) {
            Ok(slot) => {
                if let Some(displaced) = slot.submit(job) {
                    self.stats.dropped_frames += 1;
                    self.scratch.give_back(displaced.output);
                }
            }
            Err(e) => return self.finish(selection, input, None, Err(e), 0.0),
        }

        if let Some(result) = timed_out {
            return result;
        }

        match &self.latest {
            Some(latest) => ProcessingResult {
                cache_hit: false,
                tier_change,
                unhealthy: self.health.is_unhealthy(&selection.effect_id),
                ..latest.clone()
            },
            None => {
                self.stats.pass_through += 1;
                ProcessingResult::pass_through(input)
            }
        }
    }

    fn job(&mut self, selection: &Selection, input: Arc<FrameBuffer>, params: ResolvedParameterSet, key: Option<CacheKey>) -> Job {
        Job {
            epoch: selection.epoch,
            effect_id: Arc::clone(&selection.effect_id),
            effect: Arc::clone(&selection.effect),
            output: self.scratch.take(&input),
            input,
            params,
            key,
        }
    }

    fn wait_error(&mut self, selection: &Selection, reason: WaitError, timeout: Duration) -> ApplyError {
        match reason {
            WaitError::TimedOut => {
                self.stats.timeouts += 1;
                ApplyError::TimedOut {
                    effect: selection.effect_id.to_string(),
                    timeout_ms: timeout.as_secs_f64() * 1000.0,
                }
            }
            WaitError::Disconnected => ApplyError::WorkerLost {
                effect: selection.effect_id.to_string(),
            },
        }
    }

    /// Book-keeping shared by every dispatch mode
    fn finish(
        &mut self,
        selection: &Selection,
        input: Arc<FrameBuffer>,
        key: Option<CacheKey>,
        outcome: std::result::Result<FrameBuffer, ApplyError>,
        elapsed_ms: f64,
    ) -> ProcessingResult {
        let effect_id = &*selection.effect_id;
        self.stats.cache_misses += 1;

        match outcome {
            Ok(output) => {
                self.health.record_success(effect_id);
                self.stats.total_apply_ms += elapsed_ms;

                let output = Arc::new(output);
                if let Some(key) = key {
                    let before = self.cache.evictions();
                    for displaced in self.cache.insert(key, Arc::clone(&output)) {
                        self.scratch.recycle(displaced);
                    }
                    self.stats.evictions += self.cache.evictions() - before;
                }

                let tier_change = self.optimizer.record(elapsed_ms);
                ProcessingResult {
                    sequence: input.sequence(),
                    output,
                    cache_hit: false,
                    elapsed_ms,
                    faulted: false,
                    unhealthy: false,
                    tier_change,
                }
            }
            Err(error) => {
                self.stats.faults += 1;
                // A timed-out apply cost at least the timeout; cheaper tiers may rescue it
                let tier_change = match &error {
                    ApplyError::TimedOut { timeout_ms, .. } => self.optimizer.record(*timeout_ms),
                    _ => None,
                };
                let unhealthy = self.health.record_fault(effect_id, input.sequence(), error);
                ProcessingResult {
                    faulted: true,
                    unhealthy,
                    tier_change,
                    ..ProcessingResult::pass_through(input)
                }
            }
        }
    }

    fn hard_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.config.timeout_budgets * self.optimizer.budget_ms() / 1000.0)
            .unwrap_or(MAX_HARD_TIMEOUT)
            .min(MAX_HARD_TIMEOUT)
    }

    /// Drop every cached output
    pub fn clear_cache(&mut self) {
        for output in self.cache.clear() {
            self.scratch.recycle(output);
        }
        debug!("Frame cache cleared");
    }

    pub fn state(&self) -> &ProcessorState {
        &self.state
    }

    pub fn selected_id(&self) -> Option<String> {
        match &self.state {
            ProcessorState::Active(selection) => Some(selection.effect_id.to_string()),
            ProcessorState::Idle => None,
        }
    }

    /// Raw parameters of the current selection
    pub fn raw_parameters(&self) -> Option<&RawParameters> {
        match &self.state {
            ProcessorState::Active(selection) => Some(&selection.raw_params),
            ProcessorState::Idle => None,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn current_tier(&self) -> QualityTier {
        self.optimizer.current_tier()
    }

    pub fn optimizer(&self) -> &PerformanceOptimizer {
        &self.optimizer
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    pub fn cached_frames(&self) -> usize {
        self.cache.len()
    }

    pub fn registry(&self) -> &Arc<EffectRegistry> {
        &self.registry
    }
}

impl Drop for FrameProcessor {
    fn drop(&mut self) {
        self.workers.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::effects::EffectCatalog;
    use crate::params::{ParamValue, ParameterSpec};
    use crate::video::PixelLayout;

    struct Invert;

    impl Effect for Invert {
        fn describe(&self) -> EffectDescriptor {
            EffectDescriptor::new("invert", "Invert", "Test", "1.0.0")
        }

        fn apply(&self, _: &FrameBuffer, _: &ResolvedParameterSet, output: &mut FrameBuffer) -> std::result::Result<(), ApplyError> {
            output.data_mut().iter_mut().for_each(|v| *v = 255 - *v);
            Ok(())
        }
    }

    /// Fails on one sequence number, inverts otherwise
    struct FailsOn(u64);

    impl Effect for FailsOn {
        fn describe(&self) -> EffectDescriptor {
            EffectDescriptor::new("flaky", "Flaky", "Test", "1.0.0")
        }

        fn apply(&self, input: &FrameBuffer, params: &ResolvedParameterSet, output: &mut FrameBuffer) -> std::result::Result<(), ApplyError> {
            if input.sequence() == self.0 {
                return Err(ApplyError::failed("flaky", "bad frame"));
            }
            Invert.apply(input, params, output)
        }
    }

    struct AlwaysPanics;

    impl Effect for AlwaysPanics {
        fn describe(&self) -> EffectDescriptor {
            EffectDescriptor::new("panics", "Panics", "Test", "1.0.0")
        }

        fn apply(&self, _: &FrameBuffer, _: &ResolvedParameterSet, _: &mut FrameBuffer) -> std::result::Result<(), ApplyError> {
            panic!("effect bug")
        }
    }

    struct Sleeps(Duration);

    impl Effect for Sleeps {
        fn describe(&self) -> EffectDescriptor {
            EffectDescriptor::new("sleeps", "Sleeps", "Test", "1.0.0")
        }

        fn apply(&self, _: &FrameBuffer, _: &ResolvedParameterSet, _: &mut FrameBuffer) -> std::result::Result<(), ApplyError> {
            std::thread::sleep(self.0);
            Ok(())
        }
    }

    /// Sleeps `delay_ms`, which lower tiers cut to 1ms
    struct CostlyAtHigh;

    impl Effect for CostlyAtHigh {
        fn describe(&self) -> EffectDescriptor {
            EffectDescriptor::new("costly", "Costly", "Test", "1.0.0").with_parameter(
                ParameterSpec::integer("delay_ms", 400, 1, 500)
                    .with_tier_override(QualityTier::Balanced, 1)
                    .with_tier_override(QualityTier::Low, 1),
            )
        }

        fn apply(&self, _: &FrameBuffer, params: &ResolvedParameterSet, _: &mut FrameBuffer) -> std::result::Result<(), ApplyError> {
            std::thread::sleep(Duration::from_millis(params.get_i64_or("delay_ms", 400) as u64));
            Ok(())
        }
    }

    fn registry() -> Arc<EffectRegistry> {
        let mut registry = EffectRegistry::new(RegistryConfig::default(), EffectCatalog::builtin());
        for name in EffectCatalog::builtin().names() {
            let effect = EffectCatalog::builtin().create(name).unwrap();
            registry.register(effect, "builtin").unwrap();
        }
        registry.register(Arc::new(Invert), "test").unwrap();
        registry.register(Arc::new(FailsOn(42)), "test").unwrap();
        registry.register(Arc::new(AlwaysPanics), "test").unwrap();
        registry.register(Arc::new(Sleeps(Duration::from_millis(300))), "test").unwrap();
        registry.register(Arc::new(CostlyAtHigh), "test").unwrap();
        Arc::new(registry)
    }

    fn processor(dispatch: DispatchMode) -> FrameProcessor {
        let config = ProcessorConfig {
            dispatch,
            ..ProcessorConfig::default()
        };
        let performance = PerformanceConfig {
            adaptive: false,
            ..PerformanceConfig::default()
        };
        FrameProcessor::new(registry(), config, performance)
    }

    fn frame(sequence: u64) -> FrameBuffer {
        let shade = (sequence % 200) as u8;
        FrameBuffer::new_filled(16, 12, PixelLayout::Rgb8, [shade, 100, 200]).with_sequence(sequence)
    }

    fn raw(pairs: &[(&str, ParamValue)]) -> RawParameters {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_idle_passes_through() {
        let mut processor = processor(DispatchMode::Inline);
        let input = frame(1);
        let result = processor.process(input.clone());

        assert!(result.output.same_pixels(&input));
        assert!(!result.faulted && !result.cache_hit);
        assert_eq!(result.elapsed_ms, 0.0);
    }

    #[test]
    fn test_unknown_effect_is_rejected() {
        let mut processor = processor(DispatchMode::Inline);
        assert!(matches!(
            processor.select("nope", RawParameters::new()),
            Err(EngineError::UnknownEffect(_))
        ));
        assert!(processor.selected_id().is_none());
    }

    #[test]
    fn test_same_frame_twice_hits_cache() {
        let mut processor = processor(DispatchMode::Inline);
        processor.select("blur", RawParameters::new()).unwrap();

        let first = processor.process(frame(7));
        let second = processor.process(frame(7));

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(second.elapsed_ms, 0.0);
        assert!(second.output.same_pixels(&first.output));
        assert_eq!(processor.stats().cache_hits, 1);
    }

    #[test]
    fn test_hit_is_restamped_for_new_sequence() {
        let mut processor = processor(DispatchMode::Inline);
        processor.select("invert", RawParameters::new()).unwrap();

        processor.process(frame(3));
        let same_content = frame(3).with_sequence(4);
        let result = processor.process(same_content);

        assert!(result.cache_hit);
        assert_eq!(result.output.sequence(), 4);
        assert_eq!(result.sequence, 4);
    }

    #[test]
    fn test_switching_effect_leaves_no_stale_parameters() {
        let mut processor = processor(DispatchMode::Inline);
        processor
            .select("blur", raw(&[("radius", ParamValue::Integer(9))]))
            .unwrap();
        processor.process(frame(1));
        assert_eq!(processor.cached_frames(), 1);

        let brighter = raw(&[("brightness", ParamValue::Float(30.0))]);
        processor.select("brightness_contrast", brighter.clone()).unwrap();
        assert_eq!(processor.raw_parameters(), Some(&brighter));
        assert_eq!(processor.cached_frames(), 0);

        let input = frame(1);
        let result = processor.process(input.clone());
        assert!(!result.cache_hit);
        assert_eq!(result.output.pixel(0, 0), &[31, 130, 230]);

        // Blur's entries were invalidated when it was deselected
        processor.select("blur", RawParameters::new()).unwrap();
        assert!(!processor.process(input).cache_hit);
    }

    #[test]
    fn test_inactive_parameters_do_not_split_the_cache() {
        let mut processor = processor(DispatchMode::Inline);
        let params = |radius| {
            raw(&[
                ("blur_preprocessing", ParamValue::Bool(false)),
                ("blur_radius", ParamValue::Integer(radius)),
            ])
        };

        processor.select("edge_detection", params(2)).unwrap();
        processor.process(frame(5));
        processor.update_parameters(params(4));
        assert!(processor.process(frame(5)).cache_hit);

        processor.update_parameters(raw(&[("blur_radius", ParamValue::Integer(4))]));
        assert!(!processor.process(frame(5)).cache_hit);
    }

    #[test]
    fn test_fault_on_frame_42_recovers_on_43() {
        let mut processor = processor(DispatchMode::Inline);
        processor.select("flaky", RawParameters::new()).unwrap();

        let faulted = processor.process(frame(42));
        assert!(faulted.faulted);
        assert!(faulted.output.same_pixels(&frame(42)));
        assert_eq!(processor.health().last_fault().unwrap().sequence, 42);

        let recovered = processor.process(frame(43));
        assert!(!recovered.faulted);
        assert!(!recovered.output.same_pixels(&frame(43)));
        assert_eq!(recovered.output.pixel(0, 0), &[255 - 43, 155, 55]);
    }

    #[test]
    fn test_panics_are_contained_and_raise_unhealthy() {
        let mut processor = processor(DispatchMode::Inline);
        processor.select("panics", RawParameters::new()).unwrap();

        let results: Vec<ProcessingResult> = (1..=3).map(|seq| processor.process(frame(seq))).collect();
        assert!(results.iter().all(|r| r.faulted));
        assert!(!results[1].unhealthy);
        assert!(results[2].unhealthy);
        assert!(matches!(
            processor.health().last_fault().unwrap().error,
            ApplyError::Panicked { .. }
        ));
        // Faulted outputs are never cached
        assert_eq!(processor.cached_frames(), 0);
    }

    #[test]
    fn test_blocking_dispatch_runs_on_worker() {
        let mut processor = processor(DispatchMode::Blocking);
        processor.select("invert", RawParameters::new()).unwrap();

        let result = processor.process(frame(9));
        assert!(!result.faulted);
        assert_eq!(result.output.pixel(0, 0), &[255 - 9, 155, 55]);
    }

    #[test]
    fn test_blocking_timeout_passes_through() {
        let config = ProcessorConfig {
            dispatch: DispatchMode::Blocking,
            timeout_budgets: 2.0,
            ..ProcessorConfig::default()
        };
        let performance = PerformanceConfig {
            target_fps: 100.0,
            adaptive: false,
            ..PerformanceConfig::default()
        };
        let mut processor = FrameProcessor::new(registry(), config, performance);
        processor.select("sleeps", RawParameters::new()).unwrap();

        let input = frame(1);
        let result = processor.process(input.clone());

        assert!(result.faulted);
        assert!(result.output.same_pixels(&input));
        assert_eq!(processor.stats().timeouts, 1);
        assert!(matches!(
            processor.health().last_fault().unwrap().error,
            ApplyError::TimedOut { .. }
        ));
    }

    #[test]
    fn test_latest_wins_returns_newest_result() {
        let mut processor = processor(DispatchMode::LatestWins);
        processor.select("invert", RawParameters::new()).unwrap();

        let first = processor.process(frame(1));
        assert!(!first.faulted);
        assert!(first.output.same_pixels(&frame(1)));

        let mut inverted = None;
        for seq in 2..400 {
            let result = processor.process(frame(seq));
            if result.sequence < seq {
                inverted = Some(result);
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        let result = inverted.expect("worker never produced a result");
        let source = frame(result.sequence);
        assert_eq!(result.output.pixel(0, 0), &[255 - source.pixel(0, 0)[0], 155, 55]);
    }

    #[test]
    fn test_latest_wins_drops_results_after_parameter_change() {
        let mut processor = processor(DispatchMode::LatestWins);
        processor.select("brightness_contrast", RawParameters::new()).unwrap();
        processor.process(frame(1));
        std::thread::sleep(Duration::from_millis(50));

        processor.update_parameters(raw(&[("brightness", ParamValue::Float(10.0))]));
        let result = processor.process(frame(2));

        // The old-epoch result is discarded, nothing new has finished yet
        assert_eq!(result.sequence, 2);
        assert!(result.output.same_pixels(&frame(2)));
        assert_eq!(processor.stats().stale_results, 1);
    }

    #[test]
    fn test_clear_cache_and_selection() {
        let mut processor = processor(DispatchMode::Inline);
        processor.select("vhs", RawParameters::new()).unwrap();
        processor.process(frame(1));
        processor.clear_cache();
        assert_eq!(processor.cached_frames(), 0);

        processor.clear_selection();
        let input = frame(2);
        assert!(processor.process(input.clone()).output.same_pixels(&input));
        assert_eq!(processor.stats().pass_through, 1);
    }

    #[test]
    fn test_timeouts_push_the_tier_down() {
        let config = ProcessorConfig {
            dispatch: DispatchMode::Blocking,
            timeout_budgets: 2.0,
            ..ProcessorConfig::default()
        };
        let performance = PerformanceConfig {
            target_fps: 25.0,
            degrade_after: 2,
            ..PerformanceConfig::default()
        };
        let mut processor = FrameProcessor::new(registry(), config, performance);
        processor.select("costly", RawParameters::new()).unwrap();

        let results: Vec<ProcessingResult> = (1..=4).map(|seq| processor.process(frame(seq))).collect();

        assert!(results[0].faulted && results[1].faulted);
        assert_eq!(processor.stats().timeouts, 2);
        assert_eq!(results[1].tier_change.as_ref().map(|c| c.to), Some(QualityTier::Balanced));
        // The cheaper tier brings the effect back inside the timeout
        assert!(!results[2].faulted && !results[3].faulted);
        assert_ne!(processor.current_tier(), QualityTier::High);
    }

    #[test]
    fn test_latest_wins_drops_superseded_frames() {
        let config = ProcessorConfig {
            dispatch: DispatchMode::LatestWins,
            timeout_budgets: 100.0,
            ..ProcessorConfig::default()
        };
        let performance = PerformanceConfig {
            adaptive: false,
            ..PerformanceConfig::default()
        };
        let mut processor = FrameProcessor::new(registry(), config, performance);
        processor.select("sleeps", RawParameters::new()).unwrap();

        assert!(processor.process(frame(1)).output.same_pixels(&frame(1)));
        std::thread::sleep(Duration::from_millis(50));

        // Frame 1 is in flight; 2 waits in the pending cell until 3 replaces it
        processor.process(frame(2));
        assert_eq!(processor.stats().dropped_frames, 0);
        let result = processor.process(frame(3));

        assert_eq!(processor.stats().dropped_frames, 1);
        assert!(!result.faulted);
        assert_eq!(result.sequence, 3);
    }

    #[test]
    fn test_latest_wins_retires_stuck_worker() {
        let config = ProcessorConfig {
            dispatch: DispatchMode::LatestWins,
            timeout_budgets: 2.0,
            ..ProcessorConfig::default()
        };
        let performance = PerformanceConfig {
            target_fps: 100.0,
            adaptive: false,
            ..PerformanceConfig::default()
        };
        let mut processor = FrameProcessor::new(registry(), config, performance);
        processor.select("sleeps", RawParameters::new()).unwrap();

        processor.process(frame(1));
        std::thread::sleep(Duration::from_millis(80));

        let input = frame(2);
        let result = processor.process(input.clone());

        assert!(result.faulted);
        assert!(result.output.same_pixels(&input));
        assert_eq!(processor.stats().timeouts, 1);
        assert_eq!(processor.workers.retired(), 1);
        assert!(matches!(
            processor.health().last_fault().unwrap().error,
            ApplyError::TimedOut { .. }
        ));
    }

    #[test]
    fn test_hard_timeout_is_capped() {
        let config = ProcessorConfig {
            timeout_budgets: f64::INFINITY,
            ..ProcessorConfig::default()
        };
        let processor = FrameProcessor::new(registry(), config, PerformanceConfig::default());
        assert_eq!(processor.hard_timeout(), MAX_HARD_TIMEOUT);
    }

    #[test]
    fn test_disabled_effect_passes_through() {
        let mut processor = processor(DispatchMode::Inline);
        processor.select("invert", RawParameters::new()).unwrap();

        assert!(processor.disable("invert"));
        assert!(!processor.disable("invert"));
        let input = frame(5);
        let result = processor.process(input.clone());
        assert!(result.output.same_pixels(&input));
        assert!(!result.faulted);
        assert_eq!(processor.selected_id().as_deref(), Some("invert"));
        assert!(processor.registry().contains("invert"));

        assert!(processor.enable("invert"));
        assert!(!processor.is_disabled("invert"));
        let result = processor.process(frame(6));
        assert_eq!(result.output.pixel(0, 0), &[255 - 6, 155, 55]);
    }
}
