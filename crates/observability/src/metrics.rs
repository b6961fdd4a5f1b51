//! HSI 指标收集模块
//!
//! 基于 `metrics` facade 记录信号模块的运行指标；未安装 recorder 时所有调用均为空操作。

use contracts::StatisticsSnapshot;
use metrics::{counter, gauge, histogram};

/// 记录产生的事件
pub fn record_event_produced(source: &'static str) {
    counter!("hsi_events_produced_total", "source" => source).increment(1);
}

/// 记录一次通道发送结果
pub fn record_send(channel: &str, success: bool) {
    let status = if success { "success" } else { "timeout" };
    counter!(
        "hsi_sends_total",
        "channel" => channel.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录被丢弃的原始帧
pub fn record_raw_frame_dropped(channel: &str) {
    counter!("hsi_raw_frames_dropped_total", "channel" => channel.to_string()).increment(1);
}

/// 记录协议错误（按类型）
pub fn record_protocol_error(kind: &'static str) {
    counter!("hsi_protocol_errors_total", "kind" => kind).increment(1);
}

/// 记录硬件缓冲区占用
pub fn record_buffer_occupancy(occupancy: u16) {
    gauge!("hsi_buffer_occupancy").set(f64::from(occupancy));
}

/// 记录时间同步数据点
pub fn record_timesync(accepted: bool) {
    let status = if accepted { "accepted" } else { "other_run" };
    counter!("hsi_timesync_received_total", "status" => status).increment(1);
}

/// 记录周期唤醒延迟 (微秒)
pub fn record_wakeup_lateness_us(lateness_us: f64) {
    histogram!("hsi_wakeup_lateness_us").record(lateness_us);
}

/// 将运行统计快照写入 gauges
pub fn record_run_statistics(module: &str, snapshot: &StatisticsSnapshot) {
    let module = module.to_string();
    gauge!("hsi_run_produced", "module" => module.clone()).set(snapshot.produced as f64);
    gauge!("hsi_run_sent", "module" => module.clone()).set(snapshot.sent as f64);
    gauge!("hsi_run_failed_to_send", "module" => module.clone())
        .set(snapshot.failed_to_send as f64);
    gauge!("hsi_run_last_sent_timestamp", "module" => module.clone())
        .set(snapshot.last_sent_timestamp as f64);
    gauge!("hsi_run_timesync_received", "module" => module)
        .set(snapshot.timesync_received as f64);
}

/// 记录当前触发频率
pub fn record_trigger_rate(module: &str, rate_hz: f64) {
    gauge!("hsi_trigger_rate_hz", "module" => module.to_string()).set(rate_hz);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
