pub mod campaign;
pub mod config;
pub mod congestion;
pub mod flow;
pub mod interface;
pub mod time;
pub mod topology;

pub use campaign::{CampaignFile, CampaignOverride, CampaignTiming, CongestionEntry};
pub use config::{LinkConfig, SimConfig, StackConfig, TcpConfig};
pub use congestion::{CongestionControl, UnknownCongestionControl};
pub use flow::{FiveTuple, FlowId, FlowRecord};
pub use interface::{AppId, AppRole, AppSpec, FabricError, NetworkFabric};
pub use time::SimTime;
pub use topology::{
    AccessAddresses, AddressPlan, BottleneckAddresses, DumbbellNodes, DumbbellSpec, NodeId,
    LEAVES_PER_SIDE,
};
