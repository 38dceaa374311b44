//! Run log: one block per accepted report, then a summary

use std::fmt;
use std::io::Write;
use std::time::{Duration, UNIX_EPOCH};

use heatgrid_core::{HeatgridResult, NodeIdentity};
use heatgrid_wire::AlertReport;

use crate::{AddressBook, RunStatistics, Verification};

const RULE: &str = "------------------------------------------------------------";

/// Correlator's classification of a report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    True,
    False,
}

impl Verdict {
    pub fn from_match(matched: bool) -> Self {
        if matched {
            Verdict::True
        } else {
            Verdict::False
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::True => write!(f, "True"),
            Verdict::False => write!(f, "False"),
        }
    }
}

/// One accepted report
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRecord {
    pub iteration: u32,
    /// Wall time the record was written (unix seconds)
    pub logged_at: f64,
    pub latency: f64,
    pub verdict: Verdict,
    pub report: AlertReport,
    pub verification: Verification,
}

/// End-of-run figures
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Seconds from correlator start to drain
    pub total_time: f64,
    pub stats: RunStatistics,
}

#[derive(Clone, Debug, Default)]
pub struct RunLog {
    records: Vec<ReportRecord>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ReportRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[ReportRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write every record followed by the summary
    pub fn render<W: Write>(
        &self,
        out: &mut W,
        addresses: &AddressBook,
        summary: &RunSummary,
    ) -> HeatgridResult<()> {
        for record in &self.records {
            write_record(out, record, addresses)?;
        }
        write_summary(out, summary)?;
        out.flush()?;
        Ok(())
    }
}

fn write_record<W: Write>(out: &mut W, r: &ReportRecord, addresses: &AddressBook) -> HeatgridResult<()> {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Iteration : {}", r.iteration)?;
    writeln!(out, "Logged Time : {}", format_wall(r.logged_at))?;
    writeln!(out, "Alert Reported Time : {}", format_unix(r.report.detection_timestamp))?;
    writeln!(out, "Alert Type : {}", r.verdict)?;
    writeln!(out)?;
    writeln!(out, "Reporting Node          Coord       Temp   MAC                 IP")?;
    write_node(out, &r.report.reporter, addresses)?;
    writeln!(out)?;
    writeln!(out, "Adjacent Nodes          Coord       Temp   MAC                 IP")?;
    for neighbor in &r.report.neighbors {
        write_node(out, neighbor, addresses)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "Number of adjacent matches to reporting node : {}",
        r.report.match_count
    )?;
    writeln!(out, "Communication Time (seconds) : {:.6}", r.latency)?;
    writeln!(out)?;
    writeln!(out, "Satellite Time : {}", format_unix(r.verification.sample_time))?;
    writeln!(out, "Satellite Temp (Celsius) : {}", r.verification.sample_reading)?;
    writeln!(out, "{}", RULE)?;
    Ok(())
}

fn write_node<W: Write>(out: &mut W, node: &NodeIdentity, addresses: &AddressBook) -> HeatgridResult<()> {
    let (mac, ip) = addresses
        .get(node.rank)
        .map_or(("-", "-"), |a| (a.mac.as_str(), a.ip.as_str()));
    writeln!(
        out,
        "{:<23} {:<11} {:<6} {:<19} {}",
        node.rank,
        node.coord.to_string(),
        node.reading,
        mac,
        ip
    )?;
    Ok(())
}

fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> HeatgridResult<()> {
    let stats = &summary.stats;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Summary")?;
    writeln!(out, "Total Simulation Time (seconds) : {:.6}", summary.total_time)?;
    match stats.shortest {
        Some(shortest) => writeln!(out, "Shortest Communication Time (seconds) : {:.6}", shortest)?,
        None => writeln!(out, "Shortest Communication Time (seconds) : no data")?,
    }
    writeln!(out, "Longest Communication Time (seconds) : {:.6}", stats.longest)?;
    writeln!(out, "Total Communication Time (seconds) : {:.6}", stats.total)?;
    writeln!(out, "Total Messages : {}", stats.reports)?;
    match stats.average() {
        Some(average) => writeln!(out, "Average Communication Time (seconds) : {:.6}", average)?,
        None => writeln!(out, "Average Communication Time (seconds) : no data")?,
    }
    writeln!(out, "True Alerts : {}", stats.true_alerts)?;
    writeln!(out, "False Alerts : {}", stats.false_alerts)?;
    writeln!(out, "{}", RULE)?;
    Ok(())
}

/// RFC 3339 rendering of a unix timestamp; `unset` for 0 and negatives.
/// Times humantime cannot render fall back to the raw seconds.
fn format_unix(secs: i64) -> String {
    let secs = match u64::try_from(secs) {
        Ok(0) | Err(_) => return "unset".to_string(),
        Ok(secs) => secs,
    };
    UNIX_EPOCH
        .checked_add(Duration::from_secs(secs))
        .and_then(|t| try_display(humantime::format_rfc3339_seconds(t)))
        .unwrap_or_else(|| secs.to_string())
}

fn format_wall(secs: f64) -> String {
    Duration::try_from_secs_f64(secs)
        .ok()
        .and_then(|d| UNIX_EPOCH.checked_add(d))
        .and_then(|t| try_display(humantime::format_rfc3339_millis(t)))
        .unwrap_or_else(|| format!("{:.3}", secs))
}

/// `to_string` without the panic when `Display` reports an error
fn try_display(value: impl fmt::Display) -> Option<String> {
    let mut out = String::new();
    fmt::write(&mut out, format_args!("{}", value)).ok()?;
    Some(out)
}
