//! Attribution of monitored flows to experiments and sender slots.
//!
//! A flow belongs to the window holding its first transmission and, inside a
//! two-sender window, to the slot of its source address. Everything that
//! cannot be placed is dropped and counted.

use crate::stats::{AggregatedStats, Summary};
use crate::window::{ExperimentWindow, Senders};
use ccbench_abstract::{FlowRecord, SimTime};
use serde::Serialize;
use tracing::{debug, info, warn};

pub const DEFAULT_MATERIALITY_BYTES: u64 = 1_000_000;

/// Slots per window: first and second sender.
pub const SLOTS_PER_WINDOW: usize = 2;

/// Why a record did not contribute a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionFailure {
    /// Not more than the materiality threshold received; ACK or handshake traffic.
    BelowThreshold,
    /// Last reception not after first transmission, or last transmission
    /// before the first one.
    NonPositiveDuration,
    /// First transmission outside every window.
    OutOfWindow,
    /// Two-sender window, source matches neither sender.
    UnclassifiedSource,
}

/// Throughput and completion time derived from one flow record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowMeasurement {
    pub start: SimTime,
    pub throughput_mbps: f64,
    pub fct_secs: f64,
}

impl FlowMeasurement {
    pub fn from_record(record: &FlowRecord) -> Result<Self, AttributionFailure> {
        if record.time_last_rx <= record.time_first_tx
            || record.time_last_tx < record.time_first_tx
        {
            return Err(AttributionFailure::NonPositiveDuration);
        }
        let elapsed = (record.time_last_rx - record.time_first_tx).as_secs_f64();
        Ok(Self {
            start: record.time_first_tx,
            throughput_mbps: record.rx_bytes as f64 * 8.0 / elapsed / 1e6,
            fct_secs: (record.time_last_tx - record.time_first_tx).as_secs_f64(),
        })
    }
}

/// Samples gathered for one sender of one experiment, ordered by run start.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlotSamples {
    samples: Vec<FlowMeasurement>,
}

impl SlotSamples {
    pub fn push(&mut self, sample: FlowMeasurement) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[FlowMeasurement] {
        &self.samples
    }

    pub fn throughputs(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.throughput_mbps).collect()
    }

    pub fn fcts(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.fct_secs).collect()
    }

    pub fn aggregate(&self) -> AggregatedStats {
        AggregatedStats {
            throughput: Summary::of(&self.throughputs()),
            fct: Summary::of(&self.fcts()),
        }
    }

    fn sort_by_start(&mut self) {
        self.samples.sort_by_key(|s| s.start);
    }
}

/// Both slots of one experiment window.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSamples {
    pub window: ExperimentWindow,
    pub slots: [SlotSamples; SLOTS_PER_WINDOW],
}

impl ExperimentSamples {
    fn new(window: ExperimentWindow) -> Self {
        Self {
            window,
            slots: Default::default(),
        }
    }

    pub fn senders(&self) -> Senders {
        self.window.layout.senders()
    }

    /// Slots that had a sender, in slot order.
    pub fn active_slots(&self) -> &[SlotSamples] {
        &self.slots[..self.senders().count()]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttributionSummary {
    pub accepted: usize,
    pub below_threshold: usize,
    pub degenerate: usize,
    pub out_of_window: usize,
    pub unclassified: usize,
}

impl AttributionSummary {
    fn reject(&mut self, failure: AttributionFailure) {
        match failure {
            AttributionFailure::BelowThreshold => self.below_threshold += 1,
            AttributionFailure::NonPositiveDuration => self.degenerate += 1,
            AttributionFailure::OutOfWindow => self.out_of_window += 1,
            AttributionFailure::UnclassifiedSource => self.unclassified += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub experiments: Vec<ExperimentSamples>,
    pub summary: AttributionSummary,
}

pub struct FlowAttributor<'a> {
    windows: &'a [ExperimentWindow],
    materiality_bytes: u64,
}

impl<'a> FlowAttributor<'a> {
    /// `windows` must be ordered by start time and mutually disjoint.
    pub fn new(windows: &'a [ExperimentWindow], materiality_bytes: u64) -> Self {
        Self {
            windows,
            materiality_bytes,
        }
    }

    /// Sort every record into its experiment slot. Inputs are not modified, so
    /// attributing the same records twice gives the same result.
    pub fn attribute<'r>(&self, records: impl IntoIterator<Item = &'r FlowRecord>) -> Attribution {
        let mut experiments: Vec<ExperimentSamples> =
            self.windows.iter().cloned().map(ExperimentSamples::new).collect();
        let mut summary = AttributionSummary::default();

        for record in records {
            match self.locate(record) {
                Ok((window, slot, sample)) => {
                    debug!(
                        "{} {} -> experiment {} slot {}: {:.3} Mbps, fct {:.6}s",
                        record.id,
                        record.tuple,
                        window + 1,
                        slot,
                        sample.throughput_mbps,
                        sample.fct_secs
                    );
                    experiments[window].slots[slot].push(sample);
                    summary.accepted += 1;
                }
                Err(failure) => {
                    if failure == AttributionFailure::UnclassifiedSource {
                        warn!("{} {}: source matches no sender", record.id, record.tuple);
                    } else {
                        debug!("{} {} dropped: {:?}", record.id, record.tuple, failure);
                    }
                    summary.reject(failure);
                }
            }
        }

        for experiment in &mut experiments {
            for slot in &mut experiment.slots {
                slot.sort_by_start();
            }
        }

        info!(
            "Attributed {} flows ({} below threshold, {} degenerate, {} out of window, {} unclassified)",
            summary.accepted,
            summary.below_threshold,
            summary.degenerate,
            summary.out_of_window,
            summary.unclassified
        );
        Attribution {
            experiments,
            summary,
        }
    }

    /// Window index, slot index and measurement for one record.
    pub fn locate(
        &self,
        record: &FlowRecord,
    ) -> Result<(usize, usize, FlowMeasurement), AttributionFailure> {
        if record.rx_bytes <= self.materiality_bytes {
            return Err(AttributionFailure::BelowThreshold);
        }
        let sample = FlowMeasurement::from_record(record)?;
        let window = self
            .windows
            .iter()
            .position(|w| w.contains(sample.start))
            .ok_or(AttributionFailure::OutOfWindow)?;
        let slot = self.windows[window]
            .layout
            .slot_for(record.source())
            .ok_or(AttributionFailure::UnclassifiedSource)?;
        Ok((window, slot, sample))
    }
}
