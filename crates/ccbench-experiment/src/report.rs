//! Delimited results table: one throughput and one FCT row per experiment.

use crate::attribution::{ExperimentSamples, SlotSamples};
use crate::error::ReportError;
use crate::stats::Summary;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::info;

pub const HEADER: [&str; 13] = [
    "exp", "r1_s1", "r2_s1", "r3_s1", "avg_s1", "std_s1", "unit_s1", "r1_s2", "r2_s2", "r3_s2",
    "avg_s2", "std_s2", "unit_s2",
];

/// Individual run columns per slot.
pub const RUN_COLUMNS: usize = 3;

const SIGNIFICANT_DIGITS: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metric {
    Throughput,
    CompletionTime,
}

impl Metric {
    fn label(self) -> &'static str {
        match self {
            Metric::Throughput => "th",
            Metric::CompletionTime => "afct",
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Metric::Throughput => "Mbps",
            Metric::CompletionTime => "sec",
        }
    }

    fn values(self, slot: &SlotSamples) -> Vec<f64> {
        match self {
            Metric::Throughput => slot.throughputs(),
            Metric::CompletionTime => slot.fcts(),
        }
    }

    fn summary(self, slot: &SlotSamples) -> Summary {
        let stats = slot.aggregate();
        match self {
            Metric::Throughput => stats.throughput,
            Metric::CompletionTime => stats.fct,
        }
    }
}

/// Six significant digits with trailing zeros trimmed, switching to exponent
/// form outside `[1e-4, 1e6)` like C's `%g`: `48`, `0.419431`, `1.23457e+06`.
pub fn format_value(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value == 0.0 { "0".to_string() } else { value.to_string() };
    }
    // The exponent after rounding to the significant digits decides the form.
    let scientific = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value);
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS - 1 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

pub struct ReportWriter<W: io::Write> {
    writer: csv::Writer<W>,
}

impl<W: io::Write> ReportWriter<W> {
    pub fn new(inner: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_writer(inner);
        Self { writer }
    }

    /// Header, then `th_1..th_N`, then `afct_1..afct_N`. Rows of single-sender
    /// experiments stop after the first slot's unit column.
    pub fn write(&mut self, experiments: &[ExperimentSamples]) -> Result<(), ReportError> {
        self.writer.write_record(HEADER)?;
        for metric in [Metric::Throughput, Metric::CompletionTime] {
            for (i, experiment) in experiments.iter().enumerate() {
                self.writer.write_record(row(metric, i + 1, experiment))?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W, ReportError> {
        self.writer
            .into_inner()
            .map_err(|e| ReportError::Io(e.into_error()))
    }
}

fn row(metric: Metric, number: usize, experiment: &ExperimentSamples) -> Vec<String> {
    let mut fields = vec![format!("{}_{}", metric.label(), number)];
    for slot in experiment.active_slots() {
        let values = metric.values(slot);
        for run in 0..RUN_COLUMNS {
            fields.push(values.get(run).copied().map(format_value).unwrap_or_default());
        }
        let summary = metric.summary(slot);
        fields.push(format_value(summary.mean));
        fields.push(format_value(summary.std_dev));
        fields.push(metric.unit().to_string());
    }
    fields
}

pub fn render_report(experiments: &[ExperimentSamples]) -> Result<String, ReportError> {
    let mut writer = ReportWriter::new(Vec::new());
    writer.write(experiments)?;
    let bytes = writer.into_inner()?;
    String::from_utf8(bytes).map_err(|e| ReportError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

pub fn write_report_file(
    path: impl AsRef<Path>,
    experiments: &[ExperimentSamples],
) -> Result<(), ReportError> {
    let path = path.as_ref();
    let mut writer = ReportWriter::new(File::create(path)?);
    writer.write(experiments)?;
    info!("Results written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::{DEFAULT_MATERIALITY_BYTES, FlowAttributor};
    use crate::topology::TopologyId;
    use crate::window::{ExperimentWindow, SenderLayout};
    use ccbench_abstract::{FiveTuple, FlowId, FlowRecord, SimTime};
    use std::net::Ipv4Addr;

    const SENDER_A: Ipv4Addr = Ipv4Addr::new(10, 3, 1, 1);
    const SENDER_B: Ipv4Addr = Ipv4Addr::new(10, 3, 1, 5);

    fn window(index: usize, start: u64, layout: SenderLayout) -> ExperimentWindow {
        ExperimentWindow {
            index,
            start: SimTime::from_secs(start),
            end: SimTime::from_secs(start + 30),
            topology: TopologyId(index),
            port: 9001,
            layout,
        }
    }

    fn record(id: u32, source: Ipv4Addr, rx_bytes: u64, first_tx: u64, last_rx: u64) -> FlowRecord {
        let tuple = FiveTuple::tcp(source, 50_000, Ipv4Addr::new(10, 3, 2, 1), 9001);
        let mut r = FlowRecord::open(FlowId(id), tuple, SimTime::from_secs(first_tx));
        r.tx_bytes = rx_bytes;
        r.rx_bytes = rx_bytes;
        r.time_last_tx = SimTime::from_secs(last_rx);
        r.time_last_rx = SimTime::from_secs(last_rx);
        r
    }

    fn lines(report: &str) -> Vec<&str> {
        report.lines().collect()
    }

    #[test]
    fn formats_six_significant_digits() {
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(48.0), "48");
        assert_eq!(format_value(47.683716), "47.6837");
        assert_eq!(format_value(0.41943104), "0.419431");
        assert_eq!(format_value(8.16496580927726), "8.16497");
        assert_eq!(format_value(-2.5), "-2.5");
        assert_eq!(format_value(999999.4), "999999");
    }

    #[test]
    fn large_and_tiny_values_use_exponent_form() {
        assert_eq!(format_value(1234567.0), "1.23457e+06");
        assert_eq!(format_value(1_000_000.0), "1e+06");
        assert_eq!(format_value(999999.7), "1e+06");
        assert_eq!(format_value(0.0001), "0.0001");
        assert_eq!(format_value(0.0000123456789), "1.23457e-05");
        assert_eq!(format_value(-2.5e-7), "-2.5e-07");
    }

    #[test]
    fn single_sender_rows_end_after_first_slot() {
        let windows = vec![window(0, 1, SenderLayout::Single { source: SENDER_A })];
        let records: Vec<FlowRecord> = [1, 11, 21]
            .into_iter()
            .enumerate()
            .map(|(i, start)| record(i as u32 + 1, SENDER_A, 50_000_000, start, start + 8))
            .collect();
        let attribution = FlowAttributor::new(&windows, DEFAULT_MATERIALITY_BYTES).attribute(&records);

        let report = render_report(&attribution.experiments).unwrap();
        let rows = lines(&report);
        assert_eq!(rows[0], HEADER.join(","));
        assert_eq!(rows[1], "th_1,50,50,50,50,0,Mbps");
        assert_eq!(rows[2], "afct_1,8,8,8,8,0,sec");
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn competing_senders_share_one_row() {
        let windows = vec![window(
            0,
            63,
            SenderLayout::Competing {
                sources: [SENDER_A, SENDER_B],
            },
        )];
        let records = vec![
            record(2, SENDER_B, 2_000_000, 64, 66),
            record(1, SENDER_A, 4_000_000, 64, 66),
        ];
        let attribution = FlowAttributor::new(&windows, DEFAULT_MATERIALITY_BYTES).attribute(&records);

        let report = render_report(&attribution.experiments).unwrap();
        let rows = lines(&report);
        assert_eq!(rows[1], "th_1,16,,,16,0,Mbps,8,,,8,0,Mbps");
        assert_eq!(rows[2], "afct_1,2,,,2,0,sec,2,,,2,0,sec");
    }

    #[test]
    fn empty_slots_report_zero() {
        let windows = vec![
            window(0, 1, SenderLayout::Single { source: SENDER_A }),
            window(
                1,
                32,
                SenderLayout::Competing {
                    sources: [SENDER_A, SENDER_B],
                },
            ),
        ];
        let attribution = FlowAttributor::new(&windows, DEFAULT_MATERIALITY_BYTES).attribute(&Vec::<FlowRecord>::new());

        let report = render_report(&attribution.experiments).unwrap();
        assert_eq!(
            lines(&report)[1..],
            [
                "th_1,,,,0,0,Mbps",
                "th_2,,,,0,0,Mbps,,,,0,0,Mbps",
                "afct_1,,,,0,0,sec",
                "afct_2,,,,0,0,sec,,,,0,0,sec",
            ]
        );
    }

    #[test]
    fn never_more_than_three_run_columns() {
        let windows = vec![window(0, 1, SenderLayout::Single { source: SENDER_A })];
        let records: Vec<FlowRecord> = (0..4)
            .map(|i| record(i + 1, SENDER_A, 3_000_000, 1 + 5 * i as u64, 2 + 5 * i as u64))
            .collect();
        let attribution = FlowAttributor::new(&windows, DEFAULT_MATERIALITY_BYTES).attribute(&records);

        let report = render_report(&attribution.experiments).unwrap();
        assert_eq!(lines(&report)[1], "th_1,24,24,24,24,0,Mbps");
    }

    #[test]
    fn writes_report_file() {
        let path = std::env::temp_dir().join(format!("ccbench-report-{}.csv", std::process::id()));
        write_report_file(&path, &[]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(written.trim_end(), HEADER.join(","));
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let path = std::env::temp_dir().join("ccbench-missing-dir").join("nested").join("out.csv");
        assert!(matches!(write_report_file(&path, &[]), Err(ReportError::Io(_))));
    }
}
