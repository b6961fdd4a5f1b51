//! HsiModule - lifecycle state machine
//!
//! Commands run on the caller's thread; production runs on the cycle thread
//! spawned by `start`. Fatal configuration errors are returned to the caller
//! and leave the state unchanged.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    ContractError, DeviceConnector, EstimatorFactory, HsiDevice, ModuleConfig, OutputChannel,
    RunNumber, RunStatistics, SignalEvent, SourceConfig, StatisticsSnapshot,
};
use dispatcher::{EventDispatcher, EventDispatcherBuilder, MetricsSnapshot};
use frame_codec::WireFrame;
use observability::metrics::{record_run_statistics, record_trigger_rate};
use observability::{hardware_filter_directive, OccupancyMonitor, RunningStats, StatsSummary};
use parking_lot::Mutex;
use signal_source::{
    beacon_estimator_factory, HardwareSource, SignalSource, SourceKind, SyntheticSource,
};
use tracing::{debug, info, instrument, warn};

use crate::command::{CommandKind, ModuleCommand, ModuleState, StartParams};
use crate::cycle::{CycleExit, CycleHandle, CycleWorker};
use crate::error::{ModuleError, Result};
use crate::rate::{Rate, RateSetpoint};
use crate::timesync::TimeSyncHandle;

/// Builder for creating an HsiModule
pub struct HsiModuleBuilder {
    name: String,
    event_channel: Option<Arc<dyn OutputChannel<SignalEvent>>>,
    raw_channel: Option<Arc<dyn OutputChannel<WireFrame>>>,
    estimator_factory: EstimatorFactory,
    connector: Option<Arc<dyn DeviceConnector>>,
}

impl HsiModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            event_channel: None,
            raw_channel: None,
            estimator_factory: beacon_estimator_factory(),
            connector: None,
        }
    }

    pub fn event_channel(mut self, channel: Arc<dyn OutputChannel<SignalEvent>>) -> Self {
        self.event_channel = Some(channel);
        self
    }

    pub fn raw_channel(mut self, channel: Arc<dyn OutputChannel<WireFrame>>) -> Self {
        self.raw_channel = Some(channel);
        self
    }

    /// Estimator built at every synthetic run start (default: beacon estimator)
    pub fn estimator_factory(mut self, factory: EstimatorFactory) -> Self {
        self.estimator_factory = factory;
        self
    }

    /// Device connector for the hardware source
    pub fn connector(mut self, connector: Arc<dyn DeviceConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn build(self) -> HsiModule {
        let stats = Arc::new(RunStatistics::new());
        HsiModule {
            timesync: TimeSyncHandle::new(Arc::clone(&stats)),
            name: self.name,
            state: ModuleState::Idle,
            event_channel: self.event_channel,
            raw_channel: self.raw_channel,
            estimator_factory: self.estimator_factory,
            connector: self.connector,
            config: None,
            device: None,
            dispatcher: None,
            stats,
            occupancy: Arc::new(OccupancyMonitor::new()),
            rate: Arc::new(RateSetpoint::default()),
            configured_rate: 0.0,
            run_number: 0,
            lateness: Arc::new(Mutex::new(RunningStats::default())),
            worker: None,
            last_exit: None,
        }
    }
}

/// Point-in-time view of a module, for reporting
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub name: String,
    pub state: ModuleState,
    pub source: Option<SourceKind>,
    pub run_number: RunNumber,
    /// Active trigger rate (synthetic only)
    pub trigger_rate: Option<f64>,
    /// Cycle period; `None` while the synthetic rate is paused
    pub period_us: Option<u64>,
    pub statistics: StatisticsSnapshot,
    pub event_channel: MetricsSnapshot,
    pub raw_channel: MetricsSnapshot,
    /// Mean of the recent hardware buffer occupancy samples
    pub average_occupancy: f64,
    /// Rate-paced wake-up lateness of the current or last run
    pub wakeup_lateness_us: StatsSummary,
    /// How the last cycle thread ended
    pub last_exit: Option<CycleExit>,
}

/// Signal-event module
pub struct HsiModule {
    name: String,
    state: ModuleState,
    event_channel: Option<Arc<dyn OutputChannel<SignalEvent>>>,
    raw_channel: Option<Arc<dyn OutputChannel<WireFrame>>>,
    estimator_factory: EstimatorFactory,
    connector: Option<Arc<dyn DeviceConnector>>,
    config: Option<ModuleConfig>,
    device: Option<Arc<dyn HsiDevice>>,
    dispatcher: Option<Arc<EventDispatcher>>,
    stats: Arc<RunStatistics>,
    occupancy: Arc<OccupancyMonitor>,
    rate: Arc<RateSetpoint>,
    configured_rate: f64,
    run_number: RunNumber,
    timesync: TimeSyncHandle,
    lateness: Arc<Mutex<RunningStats>>,
    worker: Option<CycleHandle>,
    last_exit: Option<CycleExit>,
}

impl std::fmt::Debug for HsiModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HsiModule")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("run_number", &self.run_number)
            .finish()
    }
}

impl HsiModule {
    pub fn builder(name: impl Into<String>) -> HsiModuleBuilder {
        HsiModuleBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    /// Counters of the current or last run
    pub fn stats(&self) -> &Arc<RunStatistics> {
        &self.stats
    }

    /// Entry point for time-sync beacons, valid for the module's lifetime
    pub fn timesync_handle(&self) -> TimeSyncHandle {
        self.timesync.clone()
    }

    /// Run one command
    pub fn execute(&mut self, command: ModuleCommand) -> Result<()> {
        match command {
            ModuleCommand::Configure(config) => self.configure(config),
            ModuleCommand::Start(params) => self.start(params),
            ModuleCommand::Stop => self.stop(),
            ModuleCommand::ChangeRate(rate) => self.change_rate(rate),
            ModuleCommand::Scrap => self.scrap(),
        }
    }

    /// Validate and store `config`, bind the channels and, for the hardware
    /// source, open the device
    ///
    /// # Errors
    /// - [`ContractError::InvalidTriggerRate`] for a rate <= 0
    /// - [`ContractError::ConfigValidation`] for other invalid options
    /// - [`ContractError::ChannelNotConfigured`] when an output channel is missing
    /// - [`ContractError::DeviceConnection`] when the device cannot be opened
    #[instrument(name = "hsi_module_configure", skip(self, config), fields(module = %self.name))]
    pub fn configure(&mut self, config: ModuleConfig) -> Result<()> {
        self.check(CommandKind::Configure)?;
        config_loader::validate(&config)?;

        let mut builder = EventDispatcherBuilder::new(Arc::clone(&self.stats))
            .send_timeout(Duration::from_millis(config.send_timeout_ms));
        if let Some(channel) = &self.event_channel {
            builder = builder.event_channel(Arc::clone(channel));
        }
        if let Some(channel) = &self.raw_channel {
            builder = builder.raw_channel(Arc::clone(channel));
        }
        let dispatcher = builder.build();
        dispatcher
            .ensure_configured()
            .map_err(ContractError::from)?;

        let device = match &config.source {
            SourceConfig::Synthetic(synthetic) => {
                self.rate.set(synthetic.trigger_rate)?;
                self.configured_rate = synthetic.trigger_rate;
                let rate = self.rate.get();
                info!(
                    trigger_rate = rate.rate_hz,
                    period_us = rate.period_us,
                    mode = ?synthetic.signal_emulation_mode,
                    enabled_signals = %format!("{:#010x}", synthetic.enabled_signals),
                    "Setting trigger rate, event period [us]"
                );
                None
            }
            SourceConfig::Hardware(hardware) => {
                let connector = self.connector.as_deref().ok_or_else(|| {
                    ContractError::device_connection(
                        hardware.hardware_device_name.as_str(),
                        "no device connector installed",
                    )
                })?;
                let device = HardwareSource::open_device(hardware, connector)?;
                info!(
                    device = device.name(),
                    readout_period_us = hardware.readout_period_us,
                    log_verbosity = %config.log_verbosity,
                    log_directive = %hardware_filter_directive(config.log_verbosity),
                    "Hardware readout configured"
                );
                Some(device)
            }
        };

        self.device = device;
        self.dispatcher = Some(Arc::new(dispatcher));
        self.config = Some(config);
        self.state = ModuleState::Configured;
        Ok(())
    }

    /// Reset the counters and start the cycle thread for `params.run_number`
    ///
    /// The synthetic source waits for its first valid timestamp estimate on
    /// the cycle thread, so a stop issued meanwhile still lands.
    ///
    /// # Errors
    /// - [`ModuleError::InvalidRate`] for a non-finite rate override
    /// - [`ModuleError::ThreadSpawn`] when the cycle thread cannot be created
    #[instrument(
        name = "hsi_module_start",
        skip(self, params),
        fields(module = %self.name, run_number = params.run_number)
    )]
    pub fn start(&mut self, params: StartParams) -> Result<()> {
        self.check(CommandKind::Start)?;
        let (Some(config), Some(dispatcher)) = (self.config.as_ref(), self.dispatcher.as_ref())
        else {
            return Err(ModuleError::invalid_transition(CommandKind::Start, self.state));
        };
        let dispatcher = Arc::clone(dispatcher);

        // nothing below may fail once the previous run's state is reset
        let mut rate_override = None;
        let mut estimator = None;
        let source: Box<dyn SignalSource> = match &config.source {
            SourceConfig::Synthetic(synthetic) => {
                rate_override = params.rate_override()?.map(Rate::from_hz);
                let built = (self.estimator_factory)(synthetic.clock_frequency_hz);
                estimator = Some((Arc::clone(&built), synthetic.clock_frequency_hz));
                Box::new(SyntheticSource::new(
                    self.name.as_str(),
                    synthetic.clone(),
                    config.frame_format,
                    built,
                    Arc::clone(&self.stats),
                ))
            }
            SourceConfig::Hardware(hardware) => {
                let device = self.device.as_ref().ok_or_else(|| {
                    ContractError::device_connection(
                        hardware.hardware_device_name.as_str(),
                        "device not opened",
                    )
                })?;
                Box::new(HardwareSource::new(
                    Arc::clone(device),
                    Duration::from_micros(hardware.readout_period_us),
                    config.frame_format,
                    Arc::clone(&self.stats),
                    Arc::clone(&self.occupancy),
                ))
            }
        };

        let previous_run = self.run_number;
        self.stats.reset();
        dispatcher.reset_metrics();
        self.occupancy.clear();
        self.lateness.lock().reset();
        self.last_exit = None;
        self.run_number = params.run_number;
        self.timesync.set_run_number(params.run_number);

        if let Some((estimator, clock_frequency_hz)) = estimator {
            self.timesync
                .install(estimator, params.run_number, clock_frequency_hz);
            let (rate, verb) = match rate_override {
                Some(rate) => {
                    self.rate.store(rate);
                    (rate, "Setting")
                }
                None => (self.rate.get(), "Using"),
            };
            info!(
                trigger_rate = rate.rate_hz,
                period_us = rate.period_us,
                "{} trigger rate, event period [us]",
                verb
            );
        }

        let thread_name = source.kind().thread_name();
        let worker = CycleWorker {
            name: self.name.clone(),
            source,
            dispatcher,
            rate: Arc::clone(&self.rate),
            running: Arc::new(AtomicBool::new(false)),
            run_number: params.run_number,
            lateness: Arc::clone(&self.lateness),
        };

        let handle = match CycleHandle::spawn(worker, thread_name) {
            Ok(handle) => handle,
            Err(e) => {
                self.timesync.uninstall();
                self.run_number = previous_run;
                self.timesync.set_run_number(previous_run);
                self.restore_configured_rate();
                return Err(ModuleError::ThreadSpawn(e));
            }
        };

        self.worker = Some(handle);
        self.state = ModuleState::Running;
        info!(thread = thread_name, "Successfully started");
        Ok(())
    }

    /// Join the cycle thread, drop the estimator and restore the configured rate
    #[instrument(name = "hsi_module_stop", skip(self), fields(module = %self.name))]
    pub fn stop(&mut self) -> Result<()> {
        self.check(CommandKind::Stop)?;

        self.last_exit = self.worker.take().and_then(CycleHandle::stop);
        if self.timesync.uninstall().is_some() {
            info!(
                received = self.stats.timesync_received(),
                "Received {} TimeSync messages",
                self.stats.timesync_received()
            );
        }
        self.restore_configured_rate();

        self.state = ModuleState::Configured;
        info!(exit = ?self.last_exit, "Successfully stopped");
        Ok(())
    }

    /// Update the trigger rate without stopping the thread; a rate <= 0 pauses
    ///
    /// # Errors
    /// [`ModuleError::InvalidRate`] for NaN or infinite rates
    #[instrument(name = "hsi_module_change_rate", skip(self), fields(module = %self.name))]
    pub fn change_rate(&mut self, rate_hz: f64) -> Result<()> {
        self.check(CommandKind::ChangeRate)?;
        let rate = self.rate.set(rate_hz)?;
        if self.source_kind() == Some(SourceKind::Hardware) {
            warn!("Trigger rate has no effect on the fixed-period hardware readout");
        }
        info!(
            trigger_rate = rate.rate_hz,
            period_us = rate.period_us,
            paused = rate.is_paused(),
            "Updating trigger rate, event period [us]"
        );
        Ok(())
    }

    /// Release configuration state; repeated scraps are no-ops
    #[instrument(name = "hsi_module_scrap", skip(self), fields(module = %self.name))]
    pub fn scrap(&mut self) -> Result<()> {
        self.check(CommandKind::Scrap)?;
        self.config = None;
        self.device = None;
        self.dispatcher = None;
        self.state = ModuleState::Scrapped;
        Ok(())
    }

    /// Current state, rate and counters
    pub fn info(&self) -> ModuleInfo {
        let source = self.source_kind();
        let (trigger_rate, period_us) = match self.config.as_ref().map(|c| &c.source) {
            Some(SourceConfig::Hardware(hardware)) => (None, Some(hardware.readout_period_us)),
            Some(SourceConfig::Synthetic(_)) => {
                let rate = self.rate.get();
                (Some(rate.rate_hz), (!rate.is_paused()).then_some(rate.period_us))
            }
            None => (None, None),
        };
        let (event_channel, raw_channel) = self
            .dispatcher
            .as_ref()
            .map(|d| d.metrics())
            .unwrap_or_default();

        ModuleInfo {
            name: self.name.clone(),
            state: self.state,
            source,
            run_number: self.run_number,
            trigger_rate,
            period_us,
            statistics: self.stats.snapshot(),
            event_channel,
            raw_channel,
            average_occupancy: self.occupancy.average(),
            wakeup_lateness_us: StatsSummary::from(&*self.lateness.lock()),
            last_exit: self.last_exit,
        }
    }

    /// Push the current counters into the `metrics` gauges
    pub fn report_metrics(&self) {
        let info = self.info();
        record_run_statistics(&self.name, &info.statistics);
        if let Some(rate) = info.trigger_rate {
            record_trigger_rate(&self.name, rate);
        }
        debug!(
            module = %self.name,
            produced = info.statistics.produced,
            sent = info.statistics.sent,
            average_occupancy = info.average_occupancy,
            "Reported module metrics"
        );
    }

    fn source_kind(&self) -> Option<SourceKind> {
        self.config.as_ref().map(|c| match c.source {
            SourceConfig::Synthetic(_) => SourceKind::Synthetic,
            SourceConfig::Hardware(_) => SourceKind::Hardware,
        })
    }

    fn restore_configured_rate(&self) {
        if self.source_kind() != Some(SourceKind::Synthetic) {
            return;
        }
        if let Ok(rate) = self.rate.set(self.configured_rate) {
            info!(
                trigger_rate = rate.rate_hz,
                period_us = rate.period_us,
                "Updating trigger rate, event period [us]"
            );
        }
    }

    fn check(&self, command: CommandKind) -> Result<()> {
        if command.allowed_in(self.state) {
            Ok(())
        } else {
            Err(ModuleError::invalid_transition(command, self.state))
        }
    }
}

impl Drop for HsiModule {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
            self.timesync.uninstall();
        }
    }
}
