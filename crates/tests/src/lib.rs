//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 线格式快照测试
//! - 合成源 / 硬件源端到端测试（无需真实硬件）
//! - 配置文件到模块的完整流程

#[cfg(test)]
mod contract_tests {
    use contracts::{FrameFields, FrameFormat};
    use frame_codec::{encode, WireFrame, CURRENT_FRAME_SIZE, LEGACY_FRAME_SIZE};

    #[test]
    fn test_frame_sizes() {
        assert_eq!(CURRENT_FRAME_SIZE, 28);
        assert_eq!(LEGACY_FRAME_SIZE, 24);
    }

    /// 字节级兼容：下游消费者按小端 32 位字解析
    #[test]
    fn test_current_frame_byte_image() {
        let fields = FrameFields::new(0x0000_0002_0000_0010, 0xffff_ffff, 0x0000_0003, 9);
        let bytes = encode(&fields, FrameFormat::Current).to_bytes();
        let expected: [u8; 28] = [
            0x41, 0, 0, 0, // version 1, detector 1
            0x10, 0, 0, 0, // timestamp low
            0x02, 0, 0, 0, // timestamp high
            0xff, 0xff, 0xff, 0xff, // data
            0, 0, 0, 0, // reserved
            0x03, 0, 0, 0, // trigger
            0x09, 0, 0, 0, // sequence
        ];
        assert_eq!(&bytes[..], &expected[..]);

        let back = WireFrame::from_bytes(&bytes).unwrap();
        assert_eq!(back.timestamp(), 0x0000_0002_0000_0010);
        assert_eq!(back.sequence(), Some(9));
    }

    #[test]
    fn test_legacy_frame_drops_sequence() {
        let fields = FrameFields::new(16, 1, 1, 9);
        let frame = encode(&fields, FrameFormat::Legacy);
        assert_eq!(frame.to_bytes().len(), LEGACY_FRAME_SIZE);
        assert_eq!(frame.sequence(), None);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use contracts::{
        BufferRead, EmulationMode, EstimatorFactory, FrameFormat, HardwareConfig, ModuleConfig,
        RunStatistics, SignalEvent, SyntheticConfig, TimestampEstimator,
    };
    use crossbeam_channel::Receiver;
    use dispatcher::CrossbeamChannel;
    use frame_codec::WireFrame;
    use hsi_module::{CycleExit, HsiModule, HsiModuleBuilder, ModuleCommand, StartParams};
    use observability::OccupancyMonitor;
    use signal_source::{HardwareSource, ManualEstimator, MockConnector, MockHsiDevice, SignalSource};

    fn manual_factory(now: u64) -> EstimatorFactory {
        Arc::new(move |_| Arc::new(ManualEstimator::valid_at(now)) as Arc<dyn TimestampEstimator>)
    }

    fn wire(
        builder: HsiModuleBuilder,
        event_capacity: usize,
        raw_capacity: usize,
    ) -> (HsiModule, Receiver<SignalEvent>, Receiver<WireFrame>) {
        let (event_channel, events) =
            CrossbeamChannel::<SignalEvent>::bounded("hsi_events", event_capacity);
        let (raw_channel, frames) =
            CrossbeamChannel::<WireFrame>::bounded("raw_hsi_data", raw_capacity);
        let module = builder
            .event_channel(Arc::new(event_channel))
            .raw_channel(Arc::new(raw_channel))
            .build();
        (module, events, frames)
    }

    fn all_ones(rate: f64) -> ModuleConfig {
        ModuleConfig::synthetic(SyntheticConfig {
            trigger_rate: rate,
            signal_emulation_mode: EmulationMode::AllOnes,
            enabled_signals: 0xFFFF_FFFF,
            ..Default::default()
        })
    }

    /// 10 Hz、AllOnes、运行 1 秒：约 10 个事件，序号递增
    #[test]
    fn test_e2e_synthetic_ten_hertz() {
        let (mut module, events, frames) = wire(
            HsiModule::builder("fake-hsi").estimator_factory(manual_factory(1_000_000)),
            1024,
            1024,
        );
        module.execute(ModuleCommand::Configure(all_ones(10.0))).unwrap();
        module
            .execute(ModuleCommand::Start(StartParams::new(101)))
            .unwrap();
        thread::sleep(Duration::from_secs(1));
        module.execute(ModuleCommand::Stop).unwrap();

        let events: Vec<_> = events.try_iter().collect();
        assert!((9..=12).contains(&events.len()), "got {} events", events.len());
        assert!(events.iter().all(|e| e.signal_map == 0xFFFF_FFFF));
        assert!(events.iter().all(|e| e.run_number == 101));
        assert!(events
            .windows(2)
            .all(|w| w[1].sequence_counter > w[0].sequence_counter));
        assert_eq!(events[0].sequence_counter, 1);

        let frames: Vec<_> = frames.try_iter().collect();
        assert_eq!(frames.len(), events.len());
        assert!(frames.iter().all(|f| f.size() == 28));

        let info = module.info();
        assert_eq!(info.statistics.produced, events.len() as u64);
        assert_eq!(info.statistics.failed_to_send, 0);
        assert_eq!(info.last_exit, Some(CycleExit::Stopped));
        assert!(info.wakeup_lateness_us.count > 0);
    }

    /// 硬件缓冲区 [0xAA000001, 0x10, 0, 0x80, 1] -> timestamp=16, signal_map=1
    #[test]
    fn test_e2e_hardware_decode() {
        let device = Arc::new(MockHsiDevice::new("HSI_0"));
        device.push_read(BufferRead::new(
            vec![0xAA00_0001, 0x0000_0010, 0x0000_0000, 0x0000_0080, 0x0000_0001],
            5,
        ));
        let stats = Arc::new(RunStatistics::new());
        let occupancy = Arc::new(OccupancyMonitor::new());
        let mut source = HardwareSource::new(
            device,
            Duration::from_millis(1),
            FrameFormat::Current,
            Arc::clone(&stats),
            Arc::clone(&occupancy),
        );

        let records = source.produce().unwrap();
        assert_eq!(records.len(), 1);
        let event = records[0].to_event(1);
        assert_eq!(event.timestamp, 16);
        assert_eq!(event.signal_map, 1);
        assert_eq!(event.device_id, 0xAA00);
        assert_eq!(occupancy.average(), 5.0);
        assert_eq!(stats.produced(), 1);
    }

    #[test]
    fn test_e2e_hardware_module_drops_bad_sub_unit() {
        let device = Arc::new(MockHsiDevice::new("HSI_0"));
        device.push_read(BufferRead::new(
            vec![
                0xBB00_0001, 0x20, 0, 0x1, 0x1, // bad header
                0xAA00_0002, 0x30, 0, 0x2, 0x2,
            ],
            10,
        ));
        let connector = Arc::new(MockConnector::new(Arc::clone(&device)));
        let (mut module, events, _frames) =
            wire(HsiModule::builder("hsi-readout").connector(connector), 64, 64);

        module
            .configure(ModuleConfig::hardware(HardwareConfig {
                hardware_device_name: "HSI_0".to_string(),
                connections_resource: "file://connections.xml".to_string(),
                readout_period_us: 500,
            }))
            .unwrap();
        module.start(StartParams::new(8)).unwrap();
        let event = events.recv_timeout(Duration::from_millis(500)).unwrap();
        thread::sleep(Duration::from_millis(5));
        module.stop().unwrap();

        assert_eq!(event.timestamp, 0x30);
        assert_eq!(event.sequence_counter, 2);
        assert!(events.try_recv().is_err());
        assert_eq!(module.info().statistics.protocol_errors, 1);
    }

    /// 事件通道至少一次；原始帧通道超时即丢弃
    #[test]
    fn test_e2e_asymmetric_backpressure() {
        let (mut module, events, frames) = wire(
            HsiModule::builder("fake-hsi").estimator_factory(manual_factory(1)),
            1,
            1,
        );
        module.configure(all_ones(200.0)).unwrap();
        module.start(StartParams::new(1)).unwrap();

        // slow consumer on the event channel, none on the raw channel
        let mut received = Vec::new();
        let begin = Instant::now();
        while begin.elapsed() < Duration::from_millis(150) {
            if let Ok(event) = events.recv_timeout(Duration::from_millis(10)) {
                received.push(event);
                thread::sleep(Duration::from_millis(8));
            }
        }
        // keep draining so the retry loop can finish its pending event
        let drain = thread::spawn(move || {
            let mut rest = Vec::new();
            while let Ok(event) = events.recv_timeout(Duration::from_millis(100)) {
                rest.push(event);
            }
            rest
        });
        module.stop().unwrap();
        received.extend(drain.join().unwrap());

        let info = module.info();
        assert_eq!(received.len() as u64, info.statistics.produced);
        assert!(received
            .windows(2)
            .all(|w| w[1].sequence_counter == w[0].sequence_counter + 1));
        assert!(info.event_channel.failure_count > 0);

        assert_eq!(frames.try_iter().count(), 1);
        assert_eq!(info.raw_channel.write_count, 1);
        assert_eq!(info.raw_channel.dropped_count, info.statistics.produced - 1);
        assert_eq!(
            info.statistics.failed_to_send,
            info.event_channel.failure_count + info.raw_channel.failure_count
        );
    }

    #[test]
    fn test_e2e_stop_latency_at_low_rate() {
        let (mut module, events, _frames) = wire(
            HsiModule::builder("fake-hsi").estimator_factory(manual_factory(1)),
            64,
            64,
        );
        module.configure(all_ones(0.5)).unwrap();
        module.start(StartParams::new(1)).unwrap();
        events.recv_timeout(Duration::from_millis(500)).unwrap();

        let begin = Instant::now();
        module.stop().unwrap();
        assert!(begin.elapsed() < Duration::from_millis(100), "{:?}", begin.elapsed());
    }

    #[test]
    fn test_e2e_change_rate_while_running() {
        let (mut module, events, _frames) = wire(
            HsiModule::builder("fake-hsi").estimator_factory(manual_factory(1)),
            1024,
            1024,
        );
        module.configure(all_ones(2.0)).unwrap();
        module.start(StartParams::new(1)).unwrap();
        events.recv_timeout(Duration::from_millis(500)).unwrap();

        // the 500 ms period in progress still applies, then 200 Hz
        module.change_rate(200.0).unwrap();
        thread::sleep(Duration::from_millis(800));
        module.change_rate(0.0).unwrap();
        thread::sleep(Duration::from_millis(20));
        let paused_at = module.stats().produced();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(module.stats().produced(), paused_at);
        module.stop().unwrap();

        assert!(paused_at > 20, "produced {paused_at}");
        assert_eq!(module.info().trigger_rate, Some(2.0));
    }
}

#[cfg(test)]
mod config_tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use config_loader::ConfigLoader;
    use contracts::{EmulationMode, SignalEvent, SourceConfig, TimestampEstimator};
    use dispatcher::CrossbeamChannel;
    use frame_codec::WireFrame;
    use hsi_module::{HsiModule, StartParams};
    use observability::ObservabilityConfig;
    use signal_source::ManualEstimator;

    const CONFIG: &str = r#"
send_timeout_ms = 2
frame_format = "legacy"
log_verbosity = "debug"

[source]
kind = "synthetic"
trigger_rate = 100.0
timestamp_offset = -10
device_id = 4
signal_emulation_mode = "uniform_random"
enabled_signals = 255
random_seed = 1234
"#;

    #[test]
    fn test_config_file_to_running_module() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();
        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        let SourceConfig::Synthetic(synthetic) = &config.source else {
            panic!("expected synthetic source");
        };
        assert_eq!(synthetic.signal_emulation_mode, EmulationMode::UniformRandom);

        let observability = ObservabilityConfig::from_verbosity(config.log_verbosity);
        assert_eq!(observability.default_log_level, "debug");

        let (event_channel, events) = CrossbeamChannel::<SignalEvent>::bounded("hsi_events", 256);
        let (raw_channel, frames) = CrossbeamChannel::<WireFrame>::bounded("raw_hsi_data", 256);
        let mut module = HsiModule::builder("fake-hsi")
            .event_channel(Arc::new(event_channel))
            .raw_channel(Arc::new(raw_channel))
            .estimator_factory(Arc::new(|_| {
                Arc::new(ManualEstimator::valid_at(1_000)) as Arc<dyn TimestampEstimator>
            }))
            .build();
        module.configure(config).unwrap();
        module.start(StartParams::new(77)).unwrap();
        thread::sleep(Duration::from_millis(60));
        module.stop().unwrap();

        let events: Vec<_> = events.try_iter().collect();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.device_id == 4));
        assert!(events.iter().all(|e| e.timestamp == 990));
        assert!(events.iter().all(|e| e.signal_map != 0 && e.signal_map & !0xff == 0));
        assert!(frames.try_iter().all(|f| f.size() == 24));
    }
}
