//! Hardware buffer reader
//!
//! Polls the signal interface readout buffer once per cycle, decodes the
//! 5-word sub-units and forwards every accepted event. Logs under this module's
//! target are governed by the `log_verbosity` option.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    ContractError, DeviceConnector, FrameFields, FrameFormat, HardwareConfig, HsiDevice,
    RunStatistics,
};
use config_loader::expand_env_vars;
use frame_codec::decode_buffer;
use observability::metrics::{record_buffer_occupancy, record_event_produced, record_protocol_error};
use observability::OccupancyMonitor;
use tracing::{debug, error, info, instrument, trace};

use crate::source::{CycleSchedule, SignalRecord, SignalSource, SourceKind};
use crate::{Result, SourceError};

/// Trigger bit forced while the firmware runs in emulation mode
pub const EMULATION_TRIGGER_BIT: u32 = 1 << 7;

const SEQUENCE_LOG_INTERVAL: u32 = 60_000;

/// Fixed-period hardware producer
pub struct HardwareSource {
    device: Arc<dyn HsiDevice>,
    readout_period: Duration,
    frame_format: FrameFormat,
    stats: Arc<RunStatistics>,
    occupancy: Arc<OccupancyMonitor>,
}

impl std::fmt::Debug for HardwareSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardwareSource")
            .field("device", &self.device.name())
            .field("readout_period", &self.readout_period)
            .finish()
    }
}

impl HardwareSource {
    /// Build a source over an already resolved device
    pub fn new(
        device: Arc<dyn HsiDevice>,
        readout_period: Duration,
        frame_format: FrameFormat,
        stats: Arc<RunStatistics>,
        occupancy: Arc<OccupancyMonitor>,
    ) -> Self {
        Self {
            device,
            readout_period,
            frame_format,
            stats,
            occupancy,
        }
    }

    /// Resolve the configured device
    ///
    /// # Errors
    /// - [`ContractError::ConfigValidation`] for an empty device name
    /// - [`ContractError::DeviceConnection`] when the connector cannot open the device
    #[instrument(
        name = "hardware_source_open_device",
        skip(config, connector),
        fields(device = %config.hardware_device_name)
    )]
    pub fn open_device(
        config: &HardwareConfig,
        connector: &dyn DeviceConnector,
    ) -> std::result::Result<Arc<dyn HsiDevice>, ContractError> {
        if config.hardware_device_name.is_empty() {
            return Err(ContractError::config_validation(
                "hardware_device_name",
                "HSI device name is empty",
            ));
        }

        let resource = expand_env_vars(&config.connections_resource);
        let device = connector.connect(&resource, &config.hardware_device_name)?;
        info!(resource = %resource, "Connected to HSI device");
        Ok(device)
    }

    /// [`HardwareSource::open_device`] followed by [`HardwareSource::new`]
    pub fn connect(
        config: &HardwareConfig,
        connector: &dyn DeviceConnector,
        frame_format: FrameFormat,
        stats: Arc<RunStatistics>,
        occupancy: Arc<OccupancyMonitor>,
    ) -> std::result::Result<Self, ContractError> {
        let device = Self::open_device(config, connector)?;
        Ok(Self::new(
            device,
            Duration::from_micros(config.readout_period_us),
            frame_format,
            stats,
            occupancy,
        ))
    }

    pub fn device(&self) -> &Arc<dyn HsiDevice> {
        &self.device
    }

    pub fn readout_period(&self) -> Duration {
        self.readout_period
    }
}

impl SignalSource for HardwareSource {
    fn name(&self) -> &str {
        self.device.name()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Hardware
    }

    fn schedule(&self) -> CycleSchedule {
        CycleSchedule::FixedPeriod(self.readout_period)
    }

    fn prepare(&mut self, _running: &AtomicBool) -> Result<()> {
        Ok(())
    }

    fn produce(&mut self) -> Result<Vec<SignalRecord>> {
        if !self.device.endpoint_ready() {
            error!(
                device = self.device.name(),
                state = %format!("{:#x}", self.device.endpoint_state()),
                "HSI endpoint not ready"
            );
        }

        let emulation = self.device.emulation_mode();

        let read = match self.device.read_buffer() {
            Ok(read) => read,
            Err(ContractError::Transport { device, message }) => {
                error!(device = %device, message = %message, "HSI readout network issue");
                return Err(SourceError::transport(device, message));
            }
            Err(e) => return Err(e.into()),
        };

        self.occupancy.record(read.occupancy);
        record_buffer_occupancy(read.occupancy);
        debug!(occupancy = read.occupancy, "Words in HSI buffer");

        if read.word_count == 0 {
            trace!("Empty HSI buffer");
            return Ok(Vec::new());
        }

        let decoded = match decode_buffer(&read.words, usize::from(read.word_count)) {
            Ok(decoded) => decoded,
            Err(e) => {
                error!(error = %e, "Invalid number of HSI words read out");
                self.stats.inc_protocol_errors();
                record_protocol_error(e.kind());
                return Err(e.into());
            }
        };
        self.stats
            .add_readout_events((decoded.events.len() + decoded.rejected.len()) as u64);
        for rejected in &decoded.rejected {
            self.stats.inc_protocol_errors();
            record_protocol_error(rejected.kind());
        }

        debug!(events = decoded.events.len(), "Read out HSI events");

        let mut records = Vec::with_capacity(decoded.events.len());
        for event in decoded.events {
            if event.sequence > 0 && event.sequence % SEQUENCE_LOG_INTERVAL == 0 {
                debug!(sequence = event.sequence, "Sequence counter from firmware");
            }

            let trigger = if emulation {
                trace!("HSI in emulation mode, forcing trigger map to bit 7");
                EMULATION_TRIGGER_BIT
            } else {
                event.trigger
            };

            self.stats.inc_produced();
            self.stats.set_last_produced_timestamp(event.timestamp);
            self.stats.set_last_readout_timestamp(event.timestamp);
            record_event_produced(SourceKind::Hardware.as_str());

            trace!(
                device_id = %format!("{:#x}", event.device_id),
                timestamp = event.timestamp,
                data = %format!("{:#x}", event.data),
                trigger = %format!("{trigger:#034b}"),
                "Read out HSI data"
            );

            let fields = FrameFields::new(event.timestamp, event.data, trigger, event.sequence);
            records.push(SignalRecord {
                device_id: event.device_id,
                signal_map: trigger,
                timestamp: event.timestamp,
                sequence_counter: u64::from(event.sequence),
                frame: frame_codec::encode(&fields, self.frame_format),
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockConnector, MockHsiDevice};
    use contracts::BufferRead;

    const GOOD: [u32; 5] = [0xAA00_0001, 0x0000_0010, 0x0000_0000, 0x0000_0080, 0x0000_0001];

    fn hardware(device: Arc<MockHsiDevice>) -> (HardwareSource, Arc<RunStatistics>, Arc<OccupancyMonitor>) {
        let stats = Arc::new(RunStatistics::new());
        let occupancy = Arc::new(OccupancyMonitor::new());
        let connector = MockConnector::new(device);
        let config = HardwareConfig {
            hardware_device_name: "HSI_0".to_string(),
            connections_resource: "file://connections.xml".to_string(),
            readout_period_us: 1000,
        };
        let source = HardwareSource::connect(
            &config,
            &connector,
            FrameFormat::Current,
            Arc::clone(&stats),
            Arc::clone(&occupancy),
        )
        .unwrap();
        (source, stats, occupancy)
    }

    #[test]
    fn test_decodes_buffer_event() {
        let device = Arc::new(MockHsiDevice::new("HSI_0"));
        device.push_read(BufferRead::new(GOOD.to_vec(), 5));
        let (mut source, stats, occupancy) = hardware(device);

        let records = source.produce().unwrap();
        assert_eq!(records.len(), 1);
        let record = records[0];
        assert_eq!(record.timestamp, 16);
        assert_eq!(record.signal_map, 1);
        assert_eq!(record.device_id, 0xAA00);
        assert_eq!(record.sequence_counter, 1);
        assert_eq!(record.frame.words(), vec![(1 << 6) | 1, 0x10, 0, 0x80, 0, 1, 1]);
        assert_eq!(stats.produced(), 1);
        assert_eq!(stats.last_produced_timestamp(), 16);
        assert_eq!(stats.readout_events(), 1);
        assert_eq!(stats.last_readout_timestamp(), 16);
        assert_eq!(occupancy.average(), 5.0);
    }

    #[test]
    fn test_emulation_mode_forces_bit_seven() {
        let device = Arc::new(MockHsiDevice::new("HSI_0"));
        device.set_emulation_mode(true);
        device.push_read(BufferRead::new(GOOD.to_vec(), 0));
        let (mut source, _, _) = hardware(device);

        let record = source.produce().unwrap()[0];
        assert_eq!(record.signal_map, EMULATION_TRIGGER_BIT);
        assert_eq!(record.frame.trigger(), EMULATION_TRIGGER_BIT);
    }

    #[test]
    fn test_empty_buffer_is_normal() {
        let device = Arc::new(MockHsiDevice::new("HSI_0"));
        device.push_read(BufferRead::new(Vec::new(), 3));
        let (mut source, stats, occupancy) = hardware(device);

        assert!(source.produce().unwrap().is_empty());
        assert_eq!(stats.protocol_errors(), 0);
        assert_eq!(occupancy.len(), 1);
    }

    #[test]
    fn test_malformed_count_is_protocol_error() {
        let device = Arc::new(MockHsiDevice::new("HSI_0"));
        device.push_read(BufferRead::new(GOOD[..3].to_vec(), 7));
        let (mut source, stats, occupancy) = hardware(device);

        let err = source.produce().unwrap_err();
        assert!(matches!(err, SourceError::Protocol(_)));
        assert!(err.is_recoverable());
        assert_eq!(stats.protocol_errors(), 1);
        assert_eq!(stats.readout_events(), 0);
        // occupancy is recorded whatever the decode outcome
        assert_eq!(occupancy.average(), 7.0);
    }

    #[test]
    fn test_bad_sub_unit_dropped_rest_forwarded() {
        let device = Arc::new(MockHsiDevice::new("HSI_0"));
        let mut words = vec![0xBB00_0001, 0x10, 0, 0, 0];
        words.extend_from_slice(&GOOD);
        device.push_read(BufferRead::new(words, 10));
        let (mut source, stats, _) = hardware(device);

        let records = source.produce().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(stats.protocol_errors(), 1);
        // both sub-units were read out, only one was forwarded
        assert_eq!(stats.readout_events(), 2);
        assert_eq!(stats.last_readout_timestamp(), 16);
    }

    #[test]
    fn test_zero_trigger_not_suppressed() {
        let device = Arc::new(MockHsiDevice::new("HSI_0"));
        device.push_read(BufferRead::new(vec![0xAA00_0002, 0x20, 0, 0, 0], 0));
        let (mut source, _, _) = hardware(device);

        let records = source.produce().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].signal_map, 0);
    }

    #[test]
    fn test_transport_error_is_recoverable() {
        let device = Arc::new(MockHsiDevice::new("HSI_0"));
        device.push_error(ContractError::transport("HSI_0", "UDP timeout"));
        device.push_read(BufferRead::new(GOOD.to_vec(), 0));
        let (mut source, stats, _) = hardware(device);

        let err = source.produce().unwrap_err();
        assert!(matches!(err, SourceError::Transport { .. }));
        assert_eq!(stats.readout_events(), 0);
        assert_eq!(source.produce().unwrap().len(), 1);
    }

    #[test]
    fn test_endpoint_not_ready_still_reads() {
        let device = Arc::new(MockHsiDevice::new("HSI_0"));
        device.set_endpoint_ready(false);
        device.push_read(BufferRead::new(GOOD.to_vec(), 0));
        let (mut source, _, _) = hardware(Arc::clone(&device));

        assert_eq!(source.produce().unwrap().len(), 1);
        assert_eq!(device.reads(), 1);
    }

    #[test]
    fn test_connect_rejects_empty_device_name() {
        let connector = MockConnector::new(Arc::new(MockHsiDevice::new("HSI_0")));
        let config = HardwareConfig {
            hardware_device_name: String::new(),
            connections_resource: "x".to_string(),
            readout_period_us: 1000,
        };
        let err = HardwareSource::connect(
            &config,
            &connector,
            FrameFormat::Current,
            Arc::new(RunStatistics::new()),
            Arc::new(OccupancyMonitor::new()),
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
    }

    #[test]
    fn test_connect_unknown_device() {
        let connector = MockConnector::new(Arc::new(MockHsiDevice::new("HSI_0")));
        let config = HardwareConfig {
            hardware_device_name: "HSI_9".to_string(),
            connections_resource: "x".to_string(),
            readout_period_us: 1000,
        };
        let err = HardwareSource::connect(
            &config,
            &connector,
            FrameFormat::Current,
            Arc::new(RunStatistics::new()),
            Arc::new(OccupancyMonitor::new()),
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::DeviceConnection { .. }));
    }

    #[test]
    fn test_open_device_expands_resource() {
        std::env::set_var("HSI_SOURCE_TEST_SHARE", "/opt/timing");
        let connector = MockConnector::new(Arc::new(MockHsiDevice::new("HSI_0")));
        let config = HardwareConfig {
            hardware_device_name: "HSI_0".to_string(),
            connections_resource: "file://${HSI_SOURCE_TEST_SHARE}/connections.xml".to_string(),
            readout_period_us: 1000,
        };
        HardwareSource::open_device(&config, &connector).unwrap();
        assert_eq!(
            connector.last_resource().as_deref(),
            Some("file:///opt/timing/connections.xml")
        );
    }
}
