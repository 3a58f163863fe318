use crate::error::ConfigError;
use crate::window::{SenderLayout, Senders};
use ccbench_abstract::{
    AccessAddresses, AddressPlan, BottleneckAddresses, CongestionControl, CongestionEntry,
    DumbbellNodes, DumbbellSpec, LinkConfig, NetworkFabric, StackConfig, TcpConfig,
};
use ipnet::Ipv4Net;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::info;

/// Prefix length of every point-to-point subnet.
const LINK_PREFIX_LEN: u8 = 30;

/// Third octet of the left-access, right-access and bottleneck blocks.
const LEFT_BLOCK: u8 = 1;
const RIGHT_BLOCK: u8 = 2;
const BOTTLENECK_BLOCK: u8 = 3;

/// How congestion-control algorithms are bound to the nodes of a dumbbell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CongestionSetup {
    /// All nodes run the same algorithm.
    Uniform(CongestionControl),
    /// Leaf pair 0 runs `first`, leaf pair 1 runs `second`. The routers carry
    /// the `second` stack; both pairs share the bottleneck.
    Mixed {
        first: CongestionControl,
        second: CongestionControl,
    },
}

impl CongestionSetup {
    pub fn from_entry(entry: &CongestionEntry) -> Result<Self, ConfigError> {
        Ok(match entry {
            CongestionEntry::Uniform { algorithm } => Self::Uniform(algorithm.parse()?),
            CongestionEntry::Mixed { first, second } => Self::Mixed {
                first: first.parse()?,
                second: second.parse()?,
            },
        })
    }

    /// Algorithm of the left/right leaf pair `pair`.
    pub fn for_pair(&self, pair: usize) -> CongestionControl {
        match *self {
            Self::Uniform(cc) => cc,
            Self::Mixed { first, .. } if pair == 0 => first,
            Self::Mixed { second, .. } => second,
        }
    }

    pub fn for_routers(&self) -> CongestionControl {
        match *self {
            Self::Uniform(cc) => cc,
            Self::Mixed { second, .. } => second,
        }
    }
}

impl fmt::Display for CongestionSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform(cc) => write!(f, "{cc}"),
            Self::Mixed { first, second } => write!(f, "{first}+{second}"),
        }
    }
}

/// First two octets shared by the three address blocks of a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPrefix([u8; 2]);

impl AddressPrefix {
    pub const fn new(first: u8, second: u8) -> Self {
        Self([first, second])
    }

    /// The /24 holding the block with third octet `third`.
    fn block(&self, third: u8) -> Ipv4Net {
        let [a, b] = self.0;
        Ipv4Net::new_assert(Ipv4Addr::new(a, b, third, 0), 24)
    }
}

impl FromStr for AddressPrefix {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidAddressPrefix(s.to_string());
        let (a, b) = s.trim().split_once('.').ok_or_else(invalid)?;
        let a = a.parse::<u8>().map_err(|_| invalid())?;
        let b = b.parse::<u8>().map_err(|_| invalid())?;
        Ok(Self([a, b]))
    }
}

impl fmt::Display for AddressPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0[0], self.0[1])
    }
}

/// Hands out consecutive host addresses from a /30 and steps to the next /30
/// inside its enclosing block.
#[derive(Debug)]
pub struct Ipv4AddressAllocator {
    block: Ipv4Net,
    network: Ipv4Net,
    next_host: u32,
}

impl Ipv4AddressAllocator {
    pub fn new(block: Ipv4Net) -> Self {
        let network =
            Ipv4Net::new_assert(block.network(), LINK_PREFIX_LEN.max(block.prefix_len()));
        Self {
            block,
            network,
            next_host: 1,
        }
    }

    pub fn network(&self) -> Ipv4Net {
        self.network
    }

    pub fn assign(&mut self) -> Result<Ipv4Addr, ConfigError> {
        let addr = Ipv4Addr::from(u32::from(self.network.network()) + self.next_host);
        if addr >= self.network.broadcast() {
            return Err(ConfigError::AddressesExhausted(self.network));
        }
        self.next_host += 1;
        Ok(addr)
    }

    pub fn new_network(&mut self) -> Result<(), ConfigError> {
        let next = u32::from(self.network.broadcast())
            .checked_add(1)
            .map(Ipv4Addr::from)
            .filter(|addr| self.block.contains(addr))
            .ok_or(ConfigError::AddressesExhausted(self.block))?;
        self.network = Ipv4Net::new_assert(next, self.network.prefix_len());
        self.next_host = 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopologyId(pub usize);

/// A dumbbell that exists inside the simulation environment.
#[derive(Debug, Clone)]
pub struct Topology {
    pub id: TopologyId,
    pub name: String,
    pub setup: CongestionSetup,
    pub prefix: AddressPrefix,
    pub nodes: DumbbellNodes,
    pub addresses: AddressPlan,
}

impl Topology {
    pub fn left_address(&self, leaf: usize) -> Ipv4Addr {
        self.addresses.left[leaf].leaf
    }

    pub fn right_address(&self, leaf: usize) -> Ipv4Addr {
        self.addresses.right[leaf].leaf
    }

    /// Source addresses the traffic monitor will report for `senders` senders.
    pub fn sender_layout(&self, senders: Senders) -> SenderLayout {
        match senders {
            Senders::One => SenderLayout::Single {
                source: self.left_address(0),
            },
            Senders::Two => SenderLayout::Competing {
                sources: [self.left_address(0), self.left_address(1)],
            },
        }
    }
}

/// Builds dumbbells with explicit socket and link configuration.
#[derive(Debug, Clone, Default)]
pub struct TopologyBuilder {
    tcp: TcpConfig,
    link: LinkConfig,
}

impl TopologyBuilder {
    pub fn new(tcp: TcpConfig, link: LinkConfig) -> Self {
        Self { tcp, link }
    }

    /// Addressing in the order the environment's dumbbell helper uses:
    /// bottleneck first, then every left leaf, then every right leaf, one /30 each.
    pub fn plan_addresses(prefix: &AddressPrefix) -> Result<AddressPlan, ConfigError> {
        let mut center = Ipv4AddressAllocator::new(prefix.block(BOTTLENECK_BLOCK));
        let bottleneck = BottleneckAddresses {
            network: center.network(),
            left_router: center.assign()?,
            right_router: center.assign()?,
        };

        let access = |third: u8| -> Result<[AccessAddresses; 2], ConfigError> {
            let mut alloc = Ipv4AddressAllocator::new(prefix.block(third));
            let first = AccessAddresses {
                network: alloc.network(),
                leaf: alloc.assign()?,
                router: alloc.assign()?,
            };
            alloc.new_network()?;
            let second = AccessAddresses {
                network: alloc.network(),
                leaf: alloc.assign()?,
                router: alloc.assign()?,
            };
            Ok([first, second])
        };

        Ok(AddressPlan {
            left: access(LEFT_BLOCK)?,
            right: access(RIGHT_BLOCK)?,
            bottleneck,
        })
    }

    pub fn spec(
        &self,
        name: &str,
        setup: CongestionSetup,
        prefix: &AddressPrefix,
    ) -> Result<DumbbellSpec, ConfigError> {
        let stack = |cc: CongestionControl| StackConfig::new(cc, self.tcp.clone());
        Ok(DumbbellSpec {
            name: name.to_string(),
            left_stacks: [stack(setup.for_pair(0)), stack(setup.for_pair(1))],
            right_stacks: [stack(setup.for_pair(0)), stack(setup.for_pair(1))],
            router_stack: stack(setup.for_routers()),
            link: self.link.clone(),
            addresses: Self::plan_addresses(prefix)?,
        })
    }

    pub fn build<F: NetworkFabric + ?Sized>(
        &self,
        fabric: &mut F,
        id: TopologyId,
        name: &str,
        setup: CongestionSetup,
        prefix: AddressPrefix,
    ) -> Result<Topology, ConfigError> {
        let spec = self.spec(name, setup, &prefix)?;
        let nodes = fabric.build_dumbbell(&spec)?;
        info!(
            "Configured dumbbell '{}' for {} on {}.0.0/16",
            name, setup, prefix
        );
        Ok(Topology {
            id,
            name: name.to_string(),
            setup,
            prefix,
            nodes,
            addresses: spec.addresses,
        })
    }
}
