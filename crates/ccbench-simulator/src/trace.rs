use ccbench_abstract::{FlowRecord, SimConfig, SimTime};
use serde::Serialize;

use crate::engine::EventSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration: SimTime,
    pub dumbbells: Vec<String>,
    pub flows: Vec<FlowRecord>,
    pub events: Vec<EventSummary>,
}
