use crate::error::ConfigError;
use crate::topology::TopologyId;
use ccbench_abstract::SimTime;
use std::net::Ipv4Addr;

/// Number of competing senders in one experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Senders {
    One,
    Two,
}

impl Senders {
    pub fn count(&self) -> usize {
        match self {
            Senders::One => 1,
            Senders::Two => 2,
        }
    }

    pub fn from_count(experiment: usize, senders: u8) -> Result<Self, ConfigError> {
        match senders {
            1 => Ok(Senders::One),
            2 => Ok(Senders::Two),
            _ => Err(ConfigError::InvalidSenderCount {
                experiment,
                senders,
            }),
        }
    }
}

/// Which slot an observed flow lands in, keyed by its source address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderLayout {
    /// Every flow of the window belongs to slot 0.
    Single { source: Ipv4Addr },
    /// `sources[i]` feeds slot `i`; other sources cannot be classified.
    Competing { sources: [Ipv4Addr; 2] },
}

impl SenderLayout {
    pub fn slot_for(&self, source: Ipv4Addr) -> Option<usize> {
        match self {
            SenderLayout::Single { .. } => Some(0),
            SenderLayout::Competing { sources } => sources.iter().position(|s| *s == source),
        }
    }

    pub fn senders(&self) -> Senders {
        match self {
            SenderLayout::Single { .. } => Senders::One,
            SenderLayout::Competing { .. } => Senders::Two,
        }
    }
}

/// The closed-open slice `[start, end)` of the master clock owned by one experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentWindow {
    pub index: usize,
    pub start: SimTime,
    pub end: SimTime,
    pub topology: TopologyId,
    pub port: u16,
    pub layout: SenderLayout,
}

impl ExperimentWindow {
    pub fn contains(&self, t: SimTime) -> bool {
        self.start <= t && t < self.end
    }
}

/// Consecutive `[start, end)` intervals of length `length`, `gap` apart, the
/// first opening at `first_start`.
pub fn lay_out_windows(
    first_start: SimTime,
    length: SimTime,
    gap: SimTime,
    count: usize,
) -> Result<Vec<(SimTime, SimTime)>, ConfigError> {
    let overflow = |start| ConfigError::TimelineOverflow { start };
    let mut windows = Vec::with_capacity(count);
    let mut start = first_start;
    for i in 0..count {
        let end = start.checked_add(length).ok_or_else(|| overflow(start))?;
        windows.push((start, end));
        if i + 1 < count {
            start = end.checked_add(gap).ok_or_else(|| overflow(end))?;
        }
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 1, 1, last)
    }

    #[test]
    fn windows_never_overlap() {
        let windows = lay_out_windows(
            SimTime::from_secs(1),
            SimTime::from_secs(30),
            SimTime::from_secs(1),
            5,
        )
        .unwrap();
        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0], (SimTime::from_secs(1), SimTime::from_secs(31)));
        assert_eq!(windows[4], (SimTime::from_secs(125), SimTime::from_secs(155)));
        for pair in windows.windows(2) {
            assert!(pair[0].1 < pair[1].0);
        }
    }

    #[test]
    fn overflowing_timeline_is_an_error() {
        let err = lay_out_windows(
            SimTime::from_secs_f64(1e11),
            SimTime::from_secs(30),
            SimTime::from_secs(1),
            5,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::TimelineOverflow { .. }));

        // The gap after the last window is never needed.
        let last = SimTime::from_nanos(u64::MAX - 30);
        let windows =
            lay_out_windows(last, SimTime::from_nanos(30), SimTime::from_secs(1), 1).unwrap();
        assert_eq!(windows, vec![(last, SimTime::from_nanos(u64::MAX))]);
    }

    #[test]
    fn window_is_closed_open() {
        let w = ExperimentWindow {
            index: 0,
            start: SimTime::from_secs(32),
            end: SimTime::from_secs(62),
            topology: TopologyId(0),
            port: 9001,
            layout: SenderLayout::Single { source: addr(1) },
        };
        assert!(w.contains(SimTime::from_secs(32)));
        assert!(w.contains(SimTime::from_nanos(61_999_999_999)));
        assert!(!w.contains(SimTime::from_secs(62)));
        assert!(!w.contains(SimTime::from_nanos(31_999_999_999)));
    }

    #[test]
    fn competing_layout_matches_by_source() {
        let layout = SenderLayout::Competing {
            sources: [addr(1), addr(5)],
        };
        assert_eq!(layout.slot_for(addr(1)), Some(0));
        assert_eq!(layout.slot_for(addr(5)), Some(1));
        assert_eq!(layout.slot_for(addr(9)), None);
        assert_eq!(layout.senders(), Senders::Two);

        let single = SenderLayout::Single { source: addr(1) };
        assert_eq!(single.slot_for(addr(9)), Some(0));
    }

    #[test]
    fn only_one_or_two_senders() {
        assert_eq!(Senders::from_count(0, 1).unwrap(), Senders::One);
        assert_eq!(Senders::from_count(0, 2).unwrap().count(), 2);
        assert!(matches!(
            Senders::from_count(3, 0),
            Err(ConfigError::InvalidSenderCount { experiment: 3, senders: 0 })
        ));
        assert!(Senders::from_count(3, 3).is_err());
    }
}
