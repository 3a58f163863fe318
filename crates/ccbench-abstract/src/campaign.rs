use crate::config::{LinkConfig, SimConfig, TcpConfig};
use crate::time::SimTime;
use serde::Deserialize;

/// A campaign as written on disk (TOML).
///
/// Algorithm identifiers are kept as strings here; they are validated when the
/// topologies are built, before the simulation clock starts.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CampaignFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: CampaignOverride,
    #[serde(default)]
    pub topologies: Vec<TopologyEntry>,
    #[serde(default)]
    pub experiments: Vec<ExperimentEntry>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TopologyEntry {
    pub name: String,
    /// First two octets of the address blocks, e.g. `10.1`.
    pub prefix: String,
    #[serde(flatten)]
    pub congestion: CongestionEntry,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CongestionEntry {
    /// Every node of the dumbbell runs the same algorithm.
    Uniform { algorithm: String },
    /// Leaf pair 0 runs `first`, leaf pair 1 and the routers run `second`.
    Mixed { first: String, second: String },
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExperimentEntry {
    pub topology: String,
    pub port: u16,
    #[serde(default = "default_senders")]
    pub senders: u8,
}

fn default_senders() -> u8 {
    1
}

/// Timing and sizing shared by every experiment of a campaign.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignTiming {
    pub first_start: SimTime,
    pub gap: SimTime,
    pub stop: SimTime,
    pub max_bytes: u64,
    pub materiality_bytes: u64,
}

impl Default for CampaignTiming {
    fn default() -> Self {
        Self {
            first_start: SimTime::from_secs(1),
            gap: SimTime::from_secs(1),
            stop: SimTime::from_secs(180),
            max_bytes: 50 * 1024 * 1024,
            materiality_bytes: 1_000_000,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CampaignOverride {
    pub max_bytes: Option<u64>,
    pub first_start_secs: Option<f64>,
    pub gap_secs: Option<f64>,
    pub stop_secs: Option<f64>,
    pub materiality_bytes: Option<u64>,
    pub seed: Option<u64>,
    pub data_rate_bps: Option<u64>,
    pub link_delay_us: Option<u64>,
    pub segment_size: Option<u32>,
    pub min_rto_ms: Option<u64>,
}

impl CampaignOverride {
    pub fn apply_to_timing(&self, timing: &mut CampaignTiming) {
        if let Some(v) = self.max_bytes {
            timing.max_bytes = v;
        }
        if let Some(v) = self.first_start_secs {
            timing.first_start = SimTime::from_secs_f64(v);
        }
        if let Some(v) = self.gap_secs {
            timing.gap = SimTime::from_secs_f64(v);
        }
        if let Some(v) = self.stop_secs {
            timing.stop = SimTime::from_secs_f64(v);
        }
        if let Some(v) = self.materiality_bytes {
            timing.materiality_bytes = v;
        }
    }

    pub fn apply_to_link(&self, link: &mut LinkConfig) {
        if let Some(v) = self.data_rate_bps {
            link.data_rate_bps = v;
        }
        if let Some(v) = self.link_delay_us {
            link.delay = SimTime::from_micros(v);
        }
    }

    pub fn apply_to_tcp(&self, tcp: &mut TcpConfig) {
        if let Some(v) = self.segment_size {
            tcp.segment_size = v;
        }
        if let Some(v) = self.min_rto_ms {
            tcp.min_rto = SimTime::from_millis(v);
        }
    }

    pub fn apply_to_sim(&self, sim: &mut SimConfig) {
        if let Some(v) = self.seed {
            sim.seed = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_campaign() {
        let file: CampaignFile = toml::from_str(
            r#"
            name = "bic-vs-cubic"

            [config]
            max_bytes = 1048576
            stop_secs = 90.0
            link_delay_us = 500

            [[topologies]]
            name = "bic"
            prefix = "10.1"
            mode = "uniform"
            algorithm = "TcpBic"

            [[topologies]]
            name = "mixed"
            prefix = "10.3"
            mode = "mixed"
            first = "TcpBic"
            second = "TcpCubic"

            [[experiments]]
            topology = "bic"
            port = 9001

            [[experiments]]
            topology = "mixed"
            port = 9003
            senders = 2
            "#,
        )
        .unwrap();

        assert_eq!(file.topologies.len(), 2);
        assert_eq!(
            file.topologies[1].congestion,
            CongestionEntry::Mixed {
                first: "TcpBic".into(),
                second: "TcpCubic".into()
            }
        );
        assert_eq!(file.experiments[0].senders, 1);
        assert_eq!(file.experiments[1].senders, 2);

        let mut timing = CampaignTiming::default();
        file.config.apply_to_timing(&mut timing);
        assert_eq!(timing.max_bytes, 1_048_576);
        assert_eq!(timing.stop, SimTime::from_secs(90));
        assert_eq!(timing.first_start, SimTime::from_secs(1));

        let mut link = LinkConfig::default();
        file.config.apply_to_link(&mut link);
        assert_eq!(link.delay, SimTime::from_micros(500));
        assert_eq!(link.data_rate_bps, 1_000_000_000);
    }

    #[test]
    fn sections_are_optional() {
        let file: CampaignFile = toml::from_str("name = \"defaults\"").unwrap();
        assert!(file.topologies.is_empty());
        assert!(file.experiments.is_empty());
        assert!(file.config.seed.is_none());
    }
}
