use crate::time::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

pub const PROTO_TCP: u8 = 6;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FlowId(pub u32);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow#{}", self.0)
    }
}

/// Classification key of a unidirectional flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FiveTuple {
    pub source_address: Ipv4Addr,
    pub destination_address: Ipv4Addr,
    pub protocol: u8,
    pub source_port: u16,
    pub destination_port: u16,
}

impl FiveTuple {
    pub fn tcp(
        source_address: Ipv4Addr,
        source_port: u16,
        destination_address: Ipv4Addr,
        destination_port: u16,
    ) -> Self {
        Self {
            source_address,
            destination_address,
            protocol: PROTO_TCP,
            source_port,
            destination_port,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            source_address: self.destination_address,
            destination_address: self.source_address,
            protocol: self.protocol,
            source_port: self.destination_port,
            destination_port: self.source_port,
        }
    }
}

impl fmt::Display for FiveTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.source_address, self.source_port, self.destination_address, self.destination_port
        )
    }
}

/// Per-flow statistics reported by the traffic monitor once the run is over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub id: FlowId,
    pub tuple: FiveTuple,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub time_first_tx: SimTime,
    pub time_last_tx: SimTime,
    pub time_first_rx: SimTime,
    pub time_last_rx: SimTime,
}

impl FlowRecord {
    /// An empty record opened at `first_tx`.
    pub fn open(id: FlowId, tuple: FiveTuple, first_tx: SimTime) -> Self {
        Self {
            id,
            tuple,
            tx_bytes: 0,
            rx_bytes: 0,
            tx_packets: 0,
            rx_packets: 0,
            time_first_tx: first_tx,
            time_last_tx: first_tx,
            time_first_rx: first_tx,
            time_last_rx: first_tx,
        }
    }

    pub fn source(&self) -> Ipv4Addr {
        self.tuple.source_address
    }
}
