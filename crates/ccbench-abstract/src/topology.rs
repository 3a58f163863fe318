use crate::config::{LinkConfig, StackConfig};
use ipnet::Ipv4Net;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;

/// Leaves per side of a dumbbell.
pub const LEAVES_PER_SIDE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Addresses of one leaf-to-router access link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessAddresses {
    pub network: Ipv4Net,
    pub leaf: Ipv4Addr,
    pub router: Ipv4Addr,
}

/// Addresses of the router-to-router bottleneck link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BottleneckAddresses {
    pub network: Ipv4Net,
    pub left_router: Ipv4Addr,
    pub right_router: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressPlan {
    pub left: [AccessAddresses; LEAVES_PER_SIDE],
    pub right: [AccessAddresses; LEAVES_PER_SIDE],
    pub bottleneck: BottleneckAddresses,
}

/// Everything the simulation environment needs to materialise one dumbbell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DumbbellSpec {
    pub name: String,
    pub left_stacks: [StackConfig; LEAVES_PER_SIDE],
    pub right_stacks: [StackConfig; LEAVES_PER_SIDE],
    pub router_stack: StackConfig,
    pub link: LinkConfig,
    pub addresses: AddressPlan,
}

/// Node handles returned once a dumbbell exists inside the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DumbbellNodes {
    pub left: [NodeId; LEAVES_PER_SIDE],
    pub right: [NodeId; LEAVES_PER_SIDE],
    pub left_router: NodeId,
    pub right_router: NodeId,
}
