use crate::flow::{FlowId, FlowRecord};
use crate::time::SimTime;
use crate::topology::{DumbbellNodes, DumbbellSpec, NodeId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddrV4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AppId(pub usize);

/// What an installed application does while it is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppRole {
    /// Accept connections on `port` and discard the received data.
    Sink { port: u16 },
    /// Connect to `remote` and push up to `max_bytes` of payload as fast as possible.
    BulkSend { remote: SocketAddrV4, max_bytes: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppSpec {
    pub node: NodeId,
    pub role: AppRole,
    pub start: SimTime,
    pub stop: SimTime,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FabricError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("application on {node} stops at {stop} before it starts at {start}")]
    InvalidAppWindow {
        node: NodeId,
        start: SimTime,
        stop: SimTime,
    },
    #[error("address {0} is already bound to another node")]
    DuplicateAddress(std::net::Ipv4Addr),
    #[error("the simulation clock has already started")]
    ClockStarted,
}

/// The simulation environment the experiment core drives.
///
/// Everything is registered up front; `run` then advances the clock once and
/// the traffic monitor is read back with `flow_records`.
pub trait NetworkFabric {
    /// Create the nodes, links, stacks and addresses of one dumbbell.
    fn build_dumbbell(&mut self, spec: &DumbbellSpec) -> Result<DumbbellNodes, FabricError>;

    /// Attach an application to a node.
    fn install_application(&mut self, app: AppSpec) -> Result<AppId, FabricError>;

    /// Advance the clock until `stop` or until no events remain.
    fn run(&mut self, stop: SimTime);

    /// Per-flow statistics gathered by the traffic monitor.
    fn flow_records(&self) -> BTreeMap<FlowId, FlowRecord>;
}
