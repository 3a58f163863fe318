use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TCP congestion-control variants the simulation environment can install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CongestionControl {
    NewReno,
    Bic,
    Cubic,
    Dctcp,
    Vegas,
    Westwood,
    HighSpeed,
    Htcp,
    Hybla,
    Scalable,
    Veno,
    Yeah,
    Illinois,
    Ledbat,
    Lp,
    Bbr,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown congestion control '{0}'")]
pub struct UnknownCongestionControl(pub String);

impl CongestionControl {
    pub const ALL: [CongestionControl; 16] = [
        CongestionControl::NewReno,
        CongestionControl::Bic,
        CongestionControl::Cubic,
        CongestionControl::Dctcp,
        CongestionControl::Vegas,
        CongestionControl::Westwood,
        CongestionControl::HighSpeed,
        CongestionControl::Htcp,
        CongestionControl::Hybla,
        CongestionControl::Scalable,
        CongestionControl::Veno,
        CongestionControl::Yeah,
        CongestionControl::Illinois,
        CongestionControl::Ledbat,
        CongestionControl::Lp,
        CongestionControl::Bbr,
    ];

    /// Canonical socket type name, e.g. `TcpBic`.
    pub fn name(&self) -> &'static str {
        match self {
            CongestionControl::NewReno => "TcpNewReno",
            CongestionControl::Bic => "TcpBic",
            CongestionControl::Cubic => "TcpCubic",
            CongestionControl::Dctcp => "TcpDctcp",
            CongestionControl::Vegas => "TcpVegas",
            CongestionControl::Westwood => "TcpWestwoodPlus",
            CongestionControl::HighSpeed => "TcpHighSpeed",
            CongestionControl::Htcp => "TcpHtcp",
            CongestionControl::Hybla => "TcpHybla",
            CongestionControl::Scalable => "TcpScalable",
            CongestionControl::Veno => "TcpVeno",
            CongestionControl::Yeah => "TcpYeah",
            CongestionControl::Illinois => "TcpIllinois",
            CongestionControl::Ledbat => "TcpLedbat",
            CongestionControl::Lp => "TcpLp",
            CongestionControl::Bbr => "TcpBbr",
        }
    }

    /// Fully qualified type id as understood by the simulation environment.
    pub fn type_id(&self) -> String {
        format!("ns3::{}", self.name())
    }
}

impl FromStr for CongestionControl {
    type Err = UnknownCongestionControl;

    /// Accepts `TcpBic`, `ns3::TcpBic` and `bic`, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix("ns3::").unwrap_or(trimmed);
        let lower = bare.to_ascii_lowercase();
        let short = lower.strip_prefix("tcp").unwrap_or(&lower);

        Self::ALL
            .into_iter()
            .find(|cc| {
                let name = cc.name().to_ascii_lowercase();
                let name_short = &name[3..];
                name_short == short || (*cc == CongestionControl::Westwood && short == "westwood")
            })
            .ok_or_else(|| UnknownCongestionControl(s.to_string()))
    }
}

impl TryFrom<String> for CongestionControl {
    type Error = UnknownCongestionControl;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CongestionControl> for String {
    fn from(value: CongestionControl) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for CongestionControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::CongestionControl;

    #[test]
    fn parses_common_spellings() {
        assert_eq!("TcpBic".parse(), Ok(CongestionControl::Bic));
        assert_eq!("ns3::TcpDctcp".parse(), Ok(CongestionControl::Dctcp));
        assert_eq!("cubic".parse(), Ok(CongestionControl::Cubic));
        assert_eq!("TCPNEWRENO".parse(), Ok(CongestionControl::NewReno));
        assert_eq!("westwood".parse(), Ok(CongestionControl::Westwood));
    }

    #[test]
    fn rejects_unknown_identifier() {
        let err = "TcpQuantum".parse::<CongestionControl>().unwrap_err();
        assert_eq!(err.0, "TcpQuantum");
        assert!("".parse::<CongestionControl>().is_err());
    }

    #[test]
    fn every_name_round_trips() {
        for cc in CongestionControl::ALL {
            assert_eq!(cc.name().parse(), Ok(cc));
            assert_eq!(cc.type_id().parse(), Ok(cc));
        }
    }
}
