use ccbench_abstract::{FabricError, SimTime, UnknownCongestionControl};
use ipnet::Ipv4Net;
use std::io;

/// Problems with the experiment description. All of them are detected before
/// the simulation clock starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    UnknownCongestionControl(#[from] UnknownCongestionControl),
    #[error("invalid address prefix '{0}', expected two octets such as 10.1")]
    InvalidAddressPrefix(String),
    #[error("address block {0} has no room left")]
    AddressesExhausted(Ipv4Net),
    #[error("topology '{0}' is defined twice")]
    DuplicateTopology(String),
    #[error("experiment {experiment} refers to unknown topology '{topology}'")]
    UnknownTopology { experiment: usize, topology: String },
    #[error("experiment {experiment} asks for {senders} senders, only 1 or 2 are supported")]
    InvalidSenderCount { experiment: usize, senders: u8 },
    #[error("window [{start}, {end}) cannot hold {runs} runs of {run_slot}")]
    WindowTooShort {
        start: SimTime,
        end: SimTime,
        runs: usize,
        run_slot: SimTime,
    },
    #[error("experiment windows need a non-zero gap between them")]
    ZeroGap,
    #[error("timeline starting at {start} does not fit the simulation clock")]
    TimelineOverflow { start: SimTime },
    #[error("simulation stops at {stop}, before the last window ends at {last_end}")]
    StopBeforeLastWindow { stop: SimTime, last_end: SimTime },
    #[error("the campaign defines no experiments")]
    NoExperiments,
    #[error(transparent)]
    Fabric(#[from] FabricError),
}

/// Failure to emit the report, the only externally visible output.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode report: {0}")]
    Csv(#[from] csv::Error),
}
