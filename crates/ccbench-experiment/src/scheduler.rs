use crate::error::ConfigError;
use crate::topology::Topology;
use crate::window::{ExperimentWindow, Senders};
use ccbench_abstract::{AppRole, AppSpec, NetworkFabric, SimTime};
use std::net::SocketAddrV4;
use tracing::debug;

pub const RUNS_PER_EXPERIMENT: usize = 3;
pub const RUN_SLOT: SimTime = SimTime::from_secs(10);

/// One experiment to place on a topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentRequest {
    pub port: u16,
    pub max_bytes: u64,
    pub start: SimTime,
    pub end: SimTime,
    pub senders: Senders,
}

/// Installs sinks and repeated bulk transfers for experiments.
///
/// Each sender gets `runs` back-to-back sub-slots of `run_slot`; with two
/// senders both use the same sub-slots and contend for the bottleneck.
#[derive(Debug, Clone)]
pub struct ExperimentScheduler {
    runs: usize,
    run_slot: SimTime,
}

impl Default for ExperimentScheduler {
    fn default() -> Self {
        Self {
            runs: RUNS_PER_EXPERIMENT,
            run_slot: RUN_SLOT,
        }
    }
}

impl ExperimentScheduler {
    /// Time needed by all runs of one experiment.
    pub fn window_length(&self) -> SimTime {
        self.run_slot.scaled(self.runs as u64)
    }

    pub fn schedule<F: NetworkFabric + ?Sized>(
        &self,
        fabric: &mut F,
        topology: &Topology,
        index: usize,
        request: &ExperimentRequest,
    ) -> Result<ExperimentWindow, ConfigError> {
        let needed_end = request
            .start
            .checked_add(self.window_length())
            .ok_or(ConfigError::TimelineOverflow {
                start: request.start,
            })?;
        if request.end < needed_end {
            return Err(ConfigError::WindowTooShort {
                start: request.start,
                end: request.end,
                runs: self.runs,
                run_slot: self.run_slot,
            });
        }

        let leaves = 0..request.senders.count();
        for leaf in leaves.clone() {
            fabric.install_application(AppSpec {
                node: topology.nodes.right[leaf],
                role: AppRole::Sink { port: request.port },
                start: request.start,
                stop: request.end,
            })?;
        }

        for leaf in leaves {
            let remote = SocketAddrV4::new(topology.right_address(leaf), request.port);
            for run in 0..self.runs {
                let run_start = request.start + self.run_slot.scaled(run as u64);
                fabric.install_application(AppSpec {
                    node: topology.nodes.left[leaf],
                    role: AppRole::BulkSend {
                        remote,
                        max_bytes: request.max_bytes,
                    },
                    start: run_start,
                    stop: run_start + self.run_slot,
                })?;
                debug!(
                    "experiment {} run {} from {} to {} in [{}, {})",
                    index + 1,
                    run + 1,
                    topology.left_address(leaf),
                    remote,
                    run_start,
                    run_start + self.run_slot
                );
            }
        }

        Ok(ExperimentWindow {
            index,
            start: request.start,
            end: request.end,
            topology: topology.id,
            port: request.port,
            layout: topology.sender_layout(request.senders),
        })
    }
}
