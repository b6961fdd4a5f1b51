//! Synthetic signal generator
//!
//! Emulates trigger signals at the module's rate setpoint and stamps them with the
//! timestamp estimator's "now" plus a fixed offset.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use contracts::{
    EmulationMode, FrameFields, FrameFormat, RunStatistics, SyntheticConfig, Timestamp,
    TimestampEstimator, WaitOutcome,
};
use observability::metrics::record_event_produced;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use tracing::{error, instrument, trace, warn};

use crate::source::{CycleSchedule, SignalRecord, SignalSource, SourceKind};
use crate::{Result, SourceError};

/// Signal map emulation for one [`EmulationMode`]
#[derive(Debug)]
pub struct SignalMapGenerator {
    mode: EmulationMode,
    poisson: Option<Poisson<f64>>,
    rng: StdRng,
}

impl SignalMapGenerator {
    /// Build a generator; `seed = None` seeds from the OS
    pub fn new(mode: EmulationMode, mean_multiplicity: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        // a non-positive mean can never yield a nonzero sample
        let poisson = if mean_multiplicity > 0.0 {
            match Poisson::new(mean_multiplicity) {
                Ok(poisson) => Some(poisson),
                Err(e) => {
                    warn!(mean_multiplicity, error = %e, "Unusable signal multiplicity, gate disabled");
                    None
                }
            }
        } else {
            None
        };
        Self { mode, poisson, rng }
    }

    pub fn mode(&self) -> EmulationMode {
        self.mode
    }

    /// Draw one raw (unmasked) signal map
    pub fn generate(&mut self) -> u32 {
        let map = match self.mode {
            EmulationMode::AllOnes => u32::MAX,
            EmulationMode::PoissonGate => match &self.poisson {
                // the sample is only a presence gate, its magnitude is discarded
                Some(poisson) => (0..32).fold(0u32, |map, bit| {
                    if poisson.sample(&mut self.rng) > 0.0 {
                        map | (1 << bit)
                    } else {
                        map
                    }
                }),
                None => 0,
            },
            EmulationMode::UniformRandom => self.rng.random::<u32>(),
        };
        trace!(raw_map = %format!("{map:#034b}"), "Generated signal map");
        map
    }
}

/// Rate-paced synthetic producer
pub struct SyntheticSource {
    name: String,
    config: SyntheticConfig,
    frame_format: FrameFormat,
    generator: SignalMapGenerator,
    estimator: Arc<dyn TimestampEstimator>,
    stats: Arc<RunStatistics>,
}

impl std::fmt::Debug for SyntheticSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntheticSource")
            .field("name", &self.name)
            .field("mode", &self.generator.mode())
            .field("enabled_signals", &format_args!("{:#010x}", self.config.enabled_signals))
            .finish()
    }
}

impl SyntheticSource {
    #[instrument(
        name = "synthetic_source_new",
        skip_all,
        fields(mode = ?config.signal_emulation_mode, device_id = config.device_id)
    )]
    pub fn new(
        name: impl Into<String>,
        config: SyntheticConfig,
        frame_format: FrameFormat,
        estimator: Arc<dyn TimestampEstimator>,
        stats: Arc<RunStatistics>,
    ) -> Self {
        let generator = SignalMapGenerator::new(
            config.signal_emulation_mode,
            config.mean_signal_multiplicity,
            config.random_seed,
        );
        Self {
            name: name.into(),
            config,
            frame_format,
            generator,
            estimator,
            stats,
        }
    }

    /// Estimator feeding this source
    pub fn estimator(&self) -> &Arc<dyn TimestampEstimator> {
        &self.estimator
    }

    fn stamp(&self) -> Timestamp {
        self.estimator
            .estimate()
            .saturating_add_signed(self.config.timestamp_offset)
    }
}

impl SignalSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    fn schedule(&self) -> CycleSchedule {
        CycleSchedule::RatePaced
    }

    fn prepare(&mut self, running: &AtomicBool) -> Result<()> {
        match self.estimator.wait_for_valid(running) {
            WaitOutcome::Ready => Ok(()),
            WaitOutcome::Interrupted => {
                error!(source = %self.name, "Failed to get a valid timestamp estimate");
                Err(SourceError::Interrupted)
            }
        }
    }

    fn produce(&mut self) -> Result<Vec<SignalRecord>> {
        let signal_map = self.generator.generate();
        let trigger_map = signal_map & self.config.enabled_signals;
        trace!(masked_map = %format!("{trigger_map:#034b}"), "Masked signal map");

        if trigger_map == 0 {
            return Ok(Vec::new());
        }

        let timestamp = self.stamp();
        let sequence = self.stats.inc_produced();
        self.stats.set_last_produced_timestamp(timestamp);
        record_event_produced(SourceKind::Synthetic.as_str());

        let fields = FrameFields::new(timestamp, signal_map, trigger_map, sequence as u32);
        let frame = frame_codec::encode(&fields, self.frame_format);

        Ok(vec![SignalRecord {
            device_id: self.config.device_id,
            signal_map: trigger_map,
            timestamp,
            sequence_counter: sequence,
            frame,
        }])
    }
}
