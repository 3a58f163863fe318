pub mod attribution;
pub mod campaign;
pub mod error;
pub mod report;
pub mod scheduler;
pub mod stats;
pub mod topology;
pub mod window;

pub use attribution::{
    Attribution, AttributionFailure, AttributionSummary, ExperimentSamples, FlowAttributor,
    FlowMeasurement, SlotSamples, DEFAULT_MATERIALITY_BYTES,
};
pub use campaign::{Campaign, CampaignOutcome, ExperimentPlan, TopologyPlan};
pub use error::{ConfigError, ReportError};
pub use report::{render_report, write_report_file, ReportWriter};
pub use scheduler::{ExperimentRequest, ExperimentScheduler};
pub use stats::{AggregatedStats, Summary};
pub use topology::{AddressPrefix, CongestionSetup, Topology, TopologyBuilder, TopologyId};
pub use window::{ExperimentWindow, SenderLayout, Senders};
