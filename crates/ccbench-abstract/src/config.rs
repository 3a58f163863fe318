use crate::congestion::CongestionControl;
use crate::time::SimTime;
use serde::{Deserialize, Serialize};

/// Socket parameters applied to every TCP socket of a node's stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpConfig {
    pub rcv_buf_size: u32,
    pub snd_buf_size: u32,
    pub segment_size: u32,
    pub window_scaling: bool,
    pub min_rto: SimTime,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            rcv_buf_size: 1 << 30,
            snd_buf_size: 1 << 30,
            segment_size: 1448,
            window_scaling: true,
            min_rto: SimTime::from_millis(5),
        }
    }
}

/// Point-to-point link attributes. One value is used for every segment of a dumbbell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub data_rate_bps: u64,
    pub delay: SimTime,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            data_rate_bps: 1_000_000_000,
            delay: SimTime::ZERO,
        }
    }
}

/// The internet stack installed on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    pub congestion: CongestionControl,
    pub tcp: TcpConfig,
}

impl StackConfig {
    pub fn new(congestion: CongestionControl, tcp: TcpConfig) -> Self {
        Self { congestion, tcp }
    }
}

/// Knobs of the built-in fluid simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Seeds the per-node ephemeral port base.
    pub seed: u64,
    /// IPv4 + TCP header bytes carried by every segment.
    pub header_bytes: u32,
    /// Data segments acknowledged by one ACK.
    pub ack_ratio: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            header_bytes: 52,
            ack_ratio: 2,
        }
    }
}
