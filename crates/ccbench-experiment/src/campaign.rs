use crate::attribution::{Attribution, FlowAttributor};
use crate::error::ConfigError;
use crate::scheduler::{ExperimentRequest, ExperimentScheduler};
use crate::topology::{AddressPrefix, CongestionSetup, Topology, TopologyBuilder, TopologyId};
use crate::window::{ExperimentWindow, Senders, lay_out_windows};
use ccbench_abstract::{
    CampaignFile, CampaignTiming, CongestionControl, LinkConfig, NetworkFabric, SimConfig,
    SimTime, TcpConfig,
};
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct TopologyPlan {
    pub name: String,
    pub prefix: AddressPrefix,
    pub setup: CongestionSetup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentPlan {
    /// Index into `Campaign::topologies`.
    pub topology: usize,
    pub port: u16,
    pub senders: Senders,
}

/// A validated set of experiments, ready to be placed on a fabric.
#[derive(Debug, Clone)]
pub struct Campaign {
    pub name: String,
    pub description: String,
    pub timing: CampaignTiming,
    pub tcp: TcpConfig,
    pub link: LinkConfig,
    pub sim: SimConfig,
    pub topologies: Vec<TopologyPlan>,
    pub experiments: Vec<ExperimentPlan>,
    pub scheduler: ExperimentScheduler,
}

#[derive(Debug, Clone)]
pub struct CampaignOutcome {
    pub topologies: Vec<Topology>,
    pub windows: Vec<ExperimentWindow>,
    pub attribution: Attribution,
}

fn plan(name: &str, prefix: AddressPrefix, setup: CongestionSetup) -> TopologyPlan {
    TopologyPlan {
        name: name.to_string(),
        prefix,
        setup,
    }
}

impl Campaign {
    /// BIC and DCTCP alone, each with one and two senders, then BIC against DCTCP.
    pub fn default_study() -> Self {
        let experiment = |topology, port, senders| ExperimentPlan {
            topology,
            port,
            senders,
        };
        Self {
            name: "tcp-congestion-study".to_string(),
            description: "TcpBic and TcpDctcp over a 1 Gbps dumbbell".to_string(),
            timing: CampaignTiming::default(),
            tcp: TcpConfig::default(),
            link: LinkConfig::default(),
            sim: SimConfig::default(),
            topologies: vec![
                plan(
                    "bic",
                    AddressPrefix::new(10, 1),
                    CongestionSetup::Uniform(CongestionControl::Bic),
                ),
                plan(
                    "dctcp",
                    AddressPrefix::new(10, 2),
                    CongestionSetup::Uniform(CongestionControl::Dctcp),
                ),
                plan(
                    "mixed",
                    AddressPrefix::new(10, 3),
                    CongestionSetup::Mixed {
                        first: CongestionControl::Bic,
                        second: CongestionControl::Dctcp,
                    },
                ),
            ],
            experiments: vec![
                experiment(0, 9001, Senders::One),
                experiment(0, 9001, Senders::Two),
                experiment(1, 9002, Senders::One),
                experiment(1, 9002, Senders::Two),
                experiment(2, 9003, Senders::Two),
            ],
            scheduler: ExperimentScheduler::default(),
        }
    }

    /// Resolve a campaign file. Without topologies the default study's
    /// topologies and experiments are used; overrides apply either way.
    pub fn from_file(file: CampaignFile) -> Result<Self, ConfigError> {
        let mut campaign = Self::default_study();
        if !file.name.is_empty() {
            campaign.name = file.name;
        }
        if !file.description.is_empty() {
            campaign.description = file.description;
        }
        file.config.apply_to_timing(&mut campaign.timing);
        file.config.apply_to_tcp(&mut campaign.tcp);
        file.config.apply_to_link(&mut campaign.link);
        file.config.apply_to_sim(&mut campaign.sim);

        if file.topologies.is_empty() {
            if !file.experiments.is_empty() {
                return Err(ConfigError::UnknownTopology {
                    experiment: 1,
                    topology: file.experiments[0].topology.clone(),
                });
            }
            return Ok(campaign);
        }

        let mut seen = HashSet::new();
        campaign.topologies = file
            .topologies
            .iter()
            .map(|entry| {
                if !seen.insert(entry.name.as_str()) {
                    return Err(ConfigError::DuplicateTopology(entry.name.clone()));
                }
                Ok(TopologyPlan {
                    name: entry.name.clone(),
                    prefix: entry.prefix.parse()?,
                    setup: CongestionSetup::from_entry(&entry.congestion)?,
                })
            })
            .collect::<Result<_, _>>()?;

        campaign.experiments = file
            .experiments
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let topology = campaign
                    .topologies
                    .iter()
                    .position(|t| t.name == entry.topology)
                    .ok_or_else(|| ConfigError::UnknownTopology {
                        experiment: i + 1,
                        topology: entry.topology.clone(),
                    })?;
                Ok(ExperimentPlan {
                    topology,
                    port: entry.port,
                    senders: Senders::from_count(i + 1, entry.senders)?,
                })
            })
            .collect::<Result<_, ConfigError>>()?;

        if campaign.experiments.is_empty() {
            return Err(ConfigError::NoExperiments);
        }
        Ok(campaign)
    }

    /// `[start, end)` of every experiment, in order.
    pub fn timeline(&self) -> Result<Vec<(SimTime, SimTime)>, ConfigError> {
        if self.experiments.is_empty() {
            return Err(ConfigError::NoExperiments);
        }
        if self.timing.gap == SimTime::ZERO {
            return Err(ConfigError::ZeroGap);
        }
        let windows = lay_out_windows(
            self.timing.first_start,
            self.scheduler.window_length(),
            self.timing.gap,
            self.experiments.len(),
        )?;
        let last_end = windows.last().map_or(SimTime::ZERO, |&(_, end)| end);
        if self.timing.stop < last_end {
            return Err(ConfigError::StopBeforeLastWindow {
                stop: self.timing.stop,
                last_end,
            });
        }
        Ok(windows)
    }

    /// Build, schedule, simulate and attribute. Every configuration problem
    /// surfaces before `fabric.run` is called.
    pub fn run<F: NetworkFabric + ?Sized>(
        &self,
        fabric: &mut F,
    ) -> Result<CampaignOutcome, ConfigError> {
        let timeline = self.timeline()?;
        info!(
            "Campaign '{}': {} topologies, {} experiments, stop at {}",
            self.name,
            self.topologies.len(),
            self.experiments.len(),
            self.timing.stop
        );

        let builder = TopologyBuilder::new(self.tcp.clone(), self.link.clone());
        let mut topologies = Vec::with_capacity(self.topologies.len());
        for (i, t) in self.topologies.iter().enumerate() {
            topologies.push(builder.build(fabric, TopologyId(i), &t.name, t.setup, t.prefix)?);
        }

        let mut windows = Vec::with_capacity(self.experiments.len());
        for (index, (experiment, &(start, end))) in
            self.experiments.iter().zip(&timeline).enumerate()
        {
            let topology = &topologies[experiment.topology];
            let request = ExperimentRequest {
                port: experiment.port,
                max_bytes: self.timing.max_bytes,
                start,
                end,
                senders: experiment.senders,
            };
            let window = self.scheduler.schedule(fabric, topology, index, &request)?;
            info!(
                "Experiment {}: '{}' ({}), {} sender(s) on port {} in [{}, {})",
                index + 1,
                topology.name,
                topology.setup,
                experiment.senders.count(),
                experiment.port,
                start,
                end
            );
            windows.push(window);
        }

        info!("Running simulation until {}", self.timing.stop);
        fabric.run(self.timing.stop);

        let records = fabric.flow_records();
        let attribution =
            FlowAttributor::new(&windows, self.timing.materiality_bytes).attribute(records.values());
        Ok(CampaignOutcome {
            topologies,
            windows,
            attribution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::render_report;
    use ccbench_simulator::Simulator;

    fn parse(text: &str) -> Result<Campaign, ConfigError> {
        let file: CampaignFile = toml::from_str(text).unwrap();
        Campaign::from_file(file)
    }

    #[test]
    fn default_timeline_matches_the_study() {
        let campaign = Campaign::default_study();
        let timeline = campaign.timeline().unwrap();
        let starts: Vec<u64> = timeline.iter().map(|(s, _)| s.as_nanos() / 1_000_000_000).collect();
        assert_eq!(starts, vec![1, 32, 63, 94, 125]);
        assert_eq!(timeline[4].1, SimTime::from_secs(155));
    }

    #[test]
    fn empty_file_falls_back_to_default_study() {
        let campaign = parse("name = \"defaults\"\n[config]\nseed = 7\nmax_bytes = 1000").unwrap();
        assert_eq!(campaign.name, "defaults");
        assert_eq!(campaign.topologies, Campaign::default_study().topologies);
        assert_eq!(campaign.experiments.len(), 5);
        assert_eq!(campaign.sim.seed, 7);
        assert_eq!(campaign.timing.max_bytes, 1000);
    }

    #[test]
    fn resolves_topologies_by_name() {
        let campaign = parse(
            r#"
            name = "cubic-vs-vegas"

            [[topologies]]
            name = "mix"
            prefix = "10.7"
            mode = "mixed"
            first = "cubic"
            second = "TcpVegas"

            [[experiments]]
            topology = "mix"
            port = 9100
            senders = 2
            "#,
        )
        .unwrap();
        assert_eq!(
            campaign.topologies[0].setup,
            CongestionSetup::Mixed {
                first: CongestionControl::Cubic,
                second: CongestionControl::Vegas,
            }
        );
        assert_eq!(
            campaign.experiments,
            vec![ExperimentPlan {
                topology: 0,
                port: 9100,
                senders: Senders::Two
            }]
        );
    }

    #[test]
    fn rejects_bad_configuration_before_running() {
        let unknown_algorithm = parse(
            r#"
            name = "x"
            [[topologies]]
            name = "t"
            prefix = "10.1"
            mode = "uniform"
            algorithm = "TcpTurbo"
            [[experiments]]
            topology = "t"
            port = 1
            "#,
        );
        assert!(matches!(
            unknown_algorithm,
            Err(ConfigError::UnknownCongestionControl(_))
        ));

        let bad_prefix = parse(
            r#"
            name = "x"
            [[topologies]]
            name = "t"
            prefix = "10.300"
            mode = "uniform"
            algorithm = "bic"
            "#,
        );
        assert!(matches!(bad_prefix, Err(ConfigError::InvalidAddressPrefix(_))));

        let unknown_topology = parse(
            r#"
            name = "x"
            [[topologies]]
            name = "t"
            prefix = "10.1"
            mode = "uniform"
            algorithm = "bic"
            [[experiments]]
            topology = "u"
            port = 1
            "#,
        );
        assert!(matches!(
            unknown_topology,
            Err(ConfigError::UnknownTopology { experiment: 1, .. })
        ));

        let three_senders = parse(
            r#"
            name = "x"
            [[topologies]]
            name = "t"
            prefix = "10.1"
            mode = "uniform"
            algorithm = "bic"
            [[experiments]]
            topology = "t"
            port = 1
            senders = 3
            "#,
        );
        assert!(matches!(
            three_senders,
            Err(ConfigError::InvalidSenderCount { senders: 3, .. })
        ));

        let duplicate = parse(
            r#"
            name = "x"
            [[topologies]]
            name = "t"
            prefix = "10.1"
            mode = "uniform"
            algorithm = "bic"
            [[topologies]]
            name = "t"
            prefix = "10.2"
            mode = "uniform"
            algorithm = "bic"
            "#,
        );
        assert!(matches!(duplicate, Err(ConfigError::DuplicateTopology(_))));
    }

    #[test]
    fn stop_time_must_cover_every_window() {
        let mut campaign = Campaign::default_study();
        campaign.timing.stop = SimTime::from_secs(100);
        let mut sim = Simulator::new(campaign.sim.clone());

        let err = campaign.run(&mut sim).unwrap_err();
        assert!(matches!(err, ConfigError::StopBeforeLastWindow { .. }));
        assert_eq!(sim.current_time(), SimTime::ZERO);
        assert!(sim.flow_records().is_empty());
    }

    #[test]
    fn windows_must_be_separated() {
        let campaign = parse("name = \"touching\"\n[config]\ngap_secs = 0.0").unwrap();
        assert!(matches!(campaign.timeline(), Err(ConfigError::ZeroGap)));

        let mut sim = Simulator::new(campaign.sim.clone());
        assert!(matches!(campaign.run(&mut sim), Err(ConfigError::ZeroGap)));
        assert_eq!(sim.current_time(), SimTime::ZERO);

        let spaced = parse("name = \"spaced\"\n[config]\ngap_secs = 0.5").unwrap();
        let timeline = spaced.timeline().unwrap();
        for pair in timeline.windows(2) {
            assert!(pair[0].1 < pair[1].0);
        }
    }

    #[test]
    fn huge_start_time_is_a_configuration_error() {
        let campaign = parse(
            "name = \"far\"\n[config]\nfirst_start_secs = 1e11\nstop_secs = 1e11",
        )
        .unwrap();
        assert!(matches!(
            campaign.timeline(),
            Err(ConfigError::TimelineOverflow { .. })
        ));

        let mut sim = Simulator::new(campaign.sim.clone());
        assert!(campaign.run(&mut sim).is_err());
        assert!(sim.flow_records().is_empty());
    }

    #[test]
    fn default_study_end_to_end() {
        let campaign = Campaign::default_study();
        let mut sim = Simulator::new(campaign.sim.clone());
        let outcome = campaign.run(&mut sim).unwrap();

        let summary = outcome.attribution.summary;
        assert_eq!(summary.accepted, 24);
        assert_eq!(summary.below_threshold, 24);
        assert_eq!(summary.unclassified, 0);
        assert_eq!(summary.out_of_window, 0);
        assert_eq!(summary.degenerate, 0);

        let experiments = &outcome.attribution.experiments;
        for experiment in experiments {
            for slot in experiment.active_slots() {
                assert_eq!(slot.len(), 3);
            }
        }

        // Alone, a sender gets the whole bottleneck; two senders split it.
        let alone = experiments[0].slots[0].aggregate().throughput.mean;
        let shared = experiments[1].slots[0].aggregate().throughput.mean;
        assert!(alone > 900.0 && alone < 1000.0, "alone: {alone}");
        assert!((shared - alone / 2.0).abs() < alone * 0.05, "shared: {shared}");

        // Mixed topology: both algorithms land in their own slot.
        let mixed = &experiments[4];
        assert_eq!(mixed.slots[0].len(), 3);
        assert_eq!(mixed.slots[1].len(), 3);

        let report = render_report(experiments).unwrap();
        let rows: Vec<Vec<&str>> = report.lines().map(|l| l.split(',').collect()).collect();
        assert_eq!(rows.len(), 11);
        let widths: Vec<usize> = rows[1..].iter().map(Vec::len).collect();
        assert_eq!(widths, vec![7, 13, 7, 13, 13, 7, 13, 7, 13, 13]);
        assert_eq!(rows[1][0], "th_1");
        assert_eq!(rows[6][0], "afct_1");
        assert_eq!(rows[2][12], "Mbps");
        assert_eq!(rows[10][12], "sec");
    }
}
