use crate::trace::SimulationReport;
use ccbench_abstract::{
    AppId, AppRole, AppSpec, DumbbellNodes, DumbbellSpec, FabricError, FiveTuple, FlowId,
    FlowRecord, LinkConfig, NetworkFabric, NodeId, SimConfig, SimTime, StackConfig,
};
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::{debug, info};

const EPHEMERAL_PORT_FIRST: u16 = 49152;

#[derive(Debug)]
enum EventType {
    AppStart { app: AppId },
    AppStop { app: AppId },
    Established { transfer: usize },
    Drained { transfer: usize, generation: u64 },
}

#[derive(Debug)]
struct Event {
    time: SimTime,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of connection-level events, kept for traces.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub time: SimTime,
    pub description: String,
}

struct Node {
    name: String,
    dumbbell: usize,
    stack: StackConfig,
    address: Ipv4Addr,
    next_port: u16,
}

struct Dumbbell {
    name: String,
    link: LinkConfig,
    /// Transfers currently pushing data through the bottleneck.
    active: Vec<usize>,
}

struct App {
    spec: AppSpec,
    running: bool,
    transfer: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferState {
    Handshake,
    Active,
    Finished,
}

struct Transfer {
    tuple: FiveTuple,
    sink: AppId,
    dumbbell: usize,
    data_flow: FlowId,
    ack_flow: FlowId,
    opened: SimTime,
    one_way: SimTime,
    segment_wire_bytes: u64,
    /// Bytes to put on the wire including headers; infinite for unbounded senders.
    wire_total: f64,
    wire_sent: f64,
    rate_bps: f64,
    state: TransferState,
    generation: u64,
}

/// Flow-level (fluid) simulator of dumbbell networks.
///
/// Every transfer crossing a dumbbell gets an equal share of its bottleneck;
/// shares are recomputed whenever a transfer starts or ends. Each connection is
/// reported to the traffic monitor as a data flow and a reverse ACK flow.
pub struct Simulator {
    time: SimTime,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,
    clock_started: bool,

    config: SimConfig,
    rng: rand::rngs::StdRng,

    nodes: Vec<Node>,
    dumbbells: Vec<Dumbbell>,
    addresses: HashMap<Ipv4Addr, NodeId>,
    apps: Vec<App>,
    transfers: Vec<Transfer>,

    /// Five-tuple classifier of the traffic monitor.
    classifier: HashMap<FiveTuple, FlowId>,
    flows: BTreeMap<FlowId, FlowRecord>,

    /// Timeline of connection events (opens, refusals, completions, aborts).
    pub event_log: Vec<EventSummary>,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Self {
            time: SimTime::ZERO,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            clock_started: false,
            config,
            rng,
            nodes: Vec::new(),
            dumbbells: Vec::new(),
            addresses: HashMap::new(),
            apps: Vec::new(),
            transfers: Vec::new(),
            classifier: HashMap::new(),
            flows: BTreeMap::new(),
            event_log: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn current_time(&self) -> SimTime {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    pub fn peek_next_event_time(&self) -> Option<SimTime> {
        self.event_queue.peek().map(|e| e.time)
    }

    fn push_event(&mut self, time: SimTime, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    fn note(&mut self, description: String) {
        debug!("[{}] {}", self.time, description);
        self.event_log.push(EventSummary {
            time: self.time,
            description,
        });
    }

    /// Process the next event. Returns true if an event was processed, false if queue is empty.
    pub fn step(&mut self) -> bool {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };
        self.clock_started = true;
        self.advance(event.time);

        match event.event_type {
            EventType::AppStart { app } => self.start_app(app),
            EventType::AppStop { app } => self.stop_app(app),
            EventType::Established { transfer } => {
                if self.transfers[transfer].state != TransferState::Handshake {
                    return true;
                }
                self.transfers[transfer].state = TransferState::Active;
                let dumbbell = self.transfers[transfer].dumbbell;
                self.dumbbells[dumbbell].active.push(transfer);
                self.reshare(dumbbell);
            }
            EventType::Drained {
                transfer,
                generation,
            } => {
                let t = &self.transfers[transfer];
                if t.state != TransferState::Active || t.generation != generation {
                    // Superseded by a later rate change
                    return true;
                }
                self.transfers[transfer].wire_sent = self.transfers[transfer].wire_total;
                self.close_transfer(transfer, "COMPLETE");
            }
        }
        true
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration: self.time,
            dumbbells: self.dumbbells.iter().map(|d| d.name.clone()).collect(),
            flows: self.flows.values().cloned().collect(),
            events: self.event_log.clone(),
        }
    }

    /// Move the clock forward, crediting every active transfer with the bytes sent meanwhile.
    fn advance(&mut self, to: SimTime) {
        if to <= self.time {
            return;
        }
        let dt = (to - self.time).as_secs_f64();
        for t in self
            .transfers
            .iter_mut()
            .filter(|t| t.state == TransferState::Active)
        {
            t.wire_sent = (t.wire_sent + t.rate_bps * dt / 8.0).min(t.wire_total);
        }
        self.time = to;
    }

    /// Split the bottleneck of `dumbbell` equally and re-predict completions.
    fn reshare(&mut self, dumbbell: usize) {
        let active = self.dumbbells[dumbbell].active.clone();
        if active.is_empty() {
            return;
        }
        let share = self.dumbbells[dumbbell].link.data_rate_bps as f64 / active.len() as f64;
        let now = self.time;
        for idx in active {
            let t = &mut self.transfers[idx];
            t.rate_bps = share;
            t.generation += 1;
            let remaining = (t.wire_total - t.wire_sent).max(0.0);
            if !remaining.is_finite() {
                continue;
            }
            let nanos = (remaining * 8.0 / share * 1e9).ceil() as u64;
            let generation = t.generation;
            self.push_event(
                now + SimTime::from_nanos(nanos),
                EventType::Drained {
                    transfer: idx,
                    generation,
                },
            );
        }
    }

    fn start_app(&mut self, app: AppId) {
        self.apps[app.0].running = true;
        let spec = self.apps[app.0].spec.clone();
        match spec.role {
            AppRole::Sink { port } => {
                let name = self.nodes[spec.node.0].name.clone();
                self.note(format!("[{name}] sink listening on port {port}"));
            }
            AppRole::BulkSend { remote, max_bytes } => {
                self.open_connection(app, spec.node, remote, max_bytes)
            }
        }
    }

    fn stop_app(&mut self, app: AppId) {
        self.apps[app.0].running = false;
        let role = self.apps[app.0].spec.role.clone();
        match role {
            AppRole::Sink { .. } => {
                let orphaned: Vec<usize> = self
                    .transfers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.sink == app && t.state != TransferState::Finished)
                    .map(|(idx, _)| idx)
                    .collect();
                for idx in orphaned {
                    self.close_transfer(idx, "ABORT (sink stopped)");
                }
            }
            AppRole::BulkSend { .. } => {
                if let Some(idx) = self.apps[app.0].transfer
                    && self.transfers[idx].state != TransferState::Finished
                {
                    self.close_transfer(idx, "ABORT (sender stopped)");
                }
            }
        }
    }

    fn listening_sink(&self, node: NodeId, port: u16) -> Option<AppId> {
        self.apps.iter().enumerate().find_map(|(idx, app)| {
            let listening = app.running
                && app.spec.node == node
                && matches!(app.spec.role, AppRole::Sink { port: p } if p == port);
            listening.then_some(AppId(idx))
        })
    }

    fn classify(&mut self, tuple: FiveTuple) -> FlowId {
        let next = FlowId(self.classifier.len() as u32 + 1);
        *self.classifier.entry(tuple).or_insert(next)
    }

    fn allocate_port(&mut self, node: NodeId) -> u16 {
        let n = &mut self.nodes[node.0];
        let port = n.next_port;
        n.next_port = port.checked_add(1).unwrap_or(EPHEMERAL_PORT_FIRST);
        port
    }

    fn open_connection(&mut self, app: AppId, node: NodeId, remote: SocketAddrV4, max_bytes: u64) {
        let now = self.time;
        let header = self.config.header_bytes as u64;
        let src_addr = self.nodes[node.0].address;
        let src_port = self.allocate_port(node);
        let tuple = FiveTuple::tcp(src_addr, src_port, *remote.ip(), remote.port());
        let data_flow = self.classify(tuple);

        let dumbbell = self.nodes[node.0].dumbbell;
        let sink = self
            .addresses
            .get(remote.ip())
            .copied()
            .filter(|dst| self.nodes[dst.0].dumbbell == dumbbell)
            .and_then(|dst| self.listening_sink(dst, remote.port()));

        let Some(sink) = sink else {
            let mut record = FlowRecord::open(data_flow, tuple, now);
            record.tx_bytes = header;
            record.tx_packets = 1;
            self.flows.insert(data_flow, record);
            self.note(format!("[{tuple}] REFUSED (nothing listening)"));
            return;
        };

        let segment = self.nodes[node.0].stack.tcp.segment_size.max(1) as u64;
        let segment_wire_bytes = segment + header;
        let link = &self.dumbbells[dumbbell].link;
        let one_way = path_latency(link, segment_wire_bytes);
        let wire_total = if max_bytes == 0 {
            f64::INFINITY
        } else {
            (max_bytes + max_bytes.div_ceil(segment) * header) as f64
        };
        let ack_flow = self.classify(tuple.reversed());

        let idx = self.transfers.len();
        self.transfers.push(Transfer {
            tuple,
            sink,
            dumbbell,
            data_flow,
            ack_flow,
            opened: now,
            one_way,
            segment_wire_bytes,
            wire_total,
            wire_sent: 0.0,
            rate_bps: 0.0,
            state: TransferState::Handshake,
            generation: 0,
        });
        self.apps[app.0].transfer = Some(idx);
        self.note(format!(
            "[{tuple}] OPEN ({} via {})",
            self.nodes[node.0].stack.congestion, self.dumbbells[dumbbell].name
        ));
        self.push_event(now + one_way.scaled(2), EventType::Established { transfer: idx });
    }

    /// Stop a transfer at the current time and hand its two flows to the monitor.
    fn close_transfer(&mut self, idx: usize, reason: &str) {
        let now = self.time;
        let was_active = self.transfers[idx].state == TransferState::Active;
        self.transfers[idx].state = TransferState::Finished;

        let header = self.config.header_bytes as u64;
        let ack_ratio = self.config.ack_ratio.max(1) as u64;
        let t = &self.transfers[idx];
        let one_way = t.one_way;
        let wire = t.wire_sent.round() as u64;
        let segments = wire.div_ceil(t.segment_wire_bytes);

        let tuple = t.tuple;
        let mut data = FlowRecord::open(t.data_flow, tuple, t.opened);
        data.tx_bytes = header + wire;
        data.rx_bytes = data.tx_bytes;
        data.tx_packets = 1 + segments;
        data.rx_packets = data.tx_packets;
        data.time_first_rx = t.opened + one_way;
        data.time_last_tx = if segments > 0 { now } else { t.opened };
        data.time_last_rx = data.time_last_tx + one_way;

        let syn_ack = t.opened + one_way;
        let mut ack = FlowRecord::open(t.ack_flow, tuple.reversed(), syn_ack);
        ack.tx_packets = 1 + segments.div_ceil(ack_ratio);
        ack.rx_packets = ack.tx_packets;
        ack.tx_bytes = ack.tx_packets * header;
        ack.rx_bytes = ack.tx_bytes;
        ack.time_first_rx = syn_ack + one_way;
        ack.time_last_tx = if segments > 0 { data.time_last_rx } else { syn_ack };
        ack.time_last_rx = ack.time_last_tx + one_way;

        let dumbbell = t.dumbbell;
        self.note(format!(
            "[{tuple}] {reason} after {} bytes in {}",
            data.rx_bytes,
            now.saturating_sub(data.time_first_tx)
        ));
        self.flows.insert(data.id, data);
        self.flows.insert(ack.id, ack);

        if was_active {
            self.dumbbells[dumbbell].active.retain(|&i| i != idx);
            self.reshare(dumbbell);
        }
    }

    fn add_node(
        &mut self,
        name: String,
        dumbbell: usize,
        stack: &StackConfig,
        address: Ipv4Addr,
    ) -> Result<NodeId, FabricError> {
        if self.addresses.contains_key(&address) {
            return Err(FabricError::DuplicateAddress(address));
        }
        let id = NodeId(self.nodes.len());
        let next_port = EPHEMERAL_PORT_FIRST + self.rng.random_range(1..=1024u16);
        self.nodes.push(Node {
            name,
            dumbbell,
            stack: stack.clone(),
            address,
            next_port,
        });
        self.addresses.insert(address, id);
        Ok(id)
    }
}

/// Propagation plus serialisation of one full segment over the three hops.
fn path_latency(link: &LinkConfig, segment_wire_bytes: u64) -> SimTime {
    let rate = link.data_rate_bps.max(1) as f64;
    let serialisation = SimTime::from_secs_f64(segment_wire_bytes as f64 * 8.0 / rate);
    (link.delay + serialisation).scaled(3)
}

impl NetworkFabric for Simulator {
    fn build_dumbbell(&mut self, spec: &DumbbellSpec) -> Result<DumbbellNodes, FabricError> {
        if self.clock_started {
            return Err(FabricError::ClockStarted);
        }
        let plan = &spec.addresses;
        let mut addrs: Vec<Ipv4Addr> = plan.left.iter().map(|a| a.leaf).collect();
        addrs.extend(plan.right.iter().map(|a| a.leaf));
        addrs.extend([plan.bottleneck.left_router, plan.bottleneck.right_router]);
        if let Some(dup) = addrs.iter().find(|a| self.addresses.contains_key(*a)) {
            return Err(FabricError::DuplicateAddress(*dup));
        }

        let dumbbell = self.dumbbells.len();
        self.dumbbells.push(Dumbbell {
            name: spec.name.clone(),
            link: spec.link.clone(),
            active: Vec::new(),
        });

        let mut left = Vec::with_capacity(plan.left.len());
        for (i, (access, stack)) in plan.left.iter().zip(&spec.left_stacks).enumerate() {
            left.push(self.add_node(format!("{}/L{i}", spec.name), dumbbell, stack, access.leaf)?);
        }
        let mut right = Vec::with_capacity(plan.right.len());
        for (i, (access, stack)) in plan.right.iter().zip(&spec.right_stacks).enumerate() {
            right.push(self.add_node(format!("{}/R{i}", spec.name), dumbbell, stack, access.leaf)?);
        }
        let left_router = self.add_node(
            format!("{}/RL", spec.name),
            dumbbell,
            &spec.router_stack,
            plan.bottleneck.left_router,
        )?;
        let right_router = self.add_node(
            format!("{}/RR", spec.name),
            dumbbell,
            &spec.router_stack,
            plan.bottleneck.right_router,
        )?;

        info!(
            "Built dumbbell '{}' ({} bps links, bottleneck {})",
            spec.name, spec.link.data_rate_bps, plan.bottleneck.network
        );
        Ok(DumbbellNodes {
            left: [left[0], left[1]],
            right: [right[0], right[1]],
            left_router,
            right_router,
        })
    }

    fn install_application(&mut self, app: AppSpec) -> Result<AppId, FabricError> {
        if self.clock_started {
            return Err(FabricError::ClockStarted);
        }
        if app.node.0 >= self.nodes.len() {
            return Err(FabricError::UnknownNode(app.node));
        }
        if app.stop < app.start {
            return Err(FabricError::InvalidAppWindow {
                node: app.node,
                start: app.start,
                stop: app.stop,
            });
        }
        let id = AppId(self.apps.len());
        let (start, stop) = (app.start, app.stop);
        self.apps.push(App {
            spec: app,
            running: false,
            transfer: None,
        });
        self.push_event(start, EventType::AppStart { app: id });
        self.push_event(stop, EventType::AppStop { app: id });
        Ok(id)
    }

    fn run(&mut self, stop: SimTime) {
        info!(
            "Starting simulation: {} nodes, {} applications, stop at {}",
            self.nodes.len(),
            self.apps.len(),
            stop
        );
        self.clock_started = true;
        while self.peek_next_event_time().is_some_and(|t| t <= stop) {
            self.step();
        }

        let unfinished: Vec<usize> = self
            .transfers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.state != TransferState::Finished)
            .map(|(idx, _)| idx)
            .collect();
        if !unfinished.is_empty() {
            self.advance(stop);
            for idx in unfinished {
                self.close_transfer(idx, "ABORT (simulation stopped)");
            }
        }
        info!(
            "Simulation stopped at {} with {} flows monitored",
            self.time,
            self.flows.len()
        );
    }

    fn flow_records(&self) -> BTreeMap<FlowId, FlowRecord> {
        self.flows.clone()
    }
}
