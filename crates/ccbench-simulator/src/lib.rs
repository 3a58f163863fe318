pub mod engine;
pub mod trace;

pub use engine::{EventSummary, Simulator};
pub use trace::SimulationReport;
