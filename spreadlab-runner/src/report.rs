//! Run reports: summary, JSON export and CSV tapes.
//!
//! A `RunReport` bundles the run's identity, a summary with the rejection
//! breakdown, and the full `RunResult`. Persisted reports carry a
//! `schema_version`; newer versions are rejected on load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use spreadlab_core::domain::{Position, RejectionReason, RejectionRecord, RunId};
use spreadlab_core::RunResult;

pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Share of all rejections attributed to one reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionShare {
    pub reason: RejectionReason,
    pub count: u64,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub timestamps: usize,
    pub signals: u64,
    pub fills: u64,
    pub exits: u64,
    pub rejections: u64,
    /// Sorted by count, largest first.
    pub rejection_breakdown: Vec<RejectionShare>,
    /// Signals that became positions.
    pub fill_rate: Option<f64>,
    pub gap_events: u64,
    pub data_unavailable: u64,
    pub win_rate: Option<f64>,
    pub realized_pnl: f64,
    pub commissions: f64,
    pub closed_at_end: u64,
    pub closed_at_end_pnl: f64,
    pub final_equity: f64,
    pub total_return: f64,
}

impl RunSummary {
    pub fn from_result(result: &RunResult) -> Self {
        let m = &result.metrics;
        let total = m.total_rejections();
        let mut rejection_breakdown: Vec<RejectionShare> = m
            .rejections
            .iter()
            .map(|(&reason, &count)| RejectionShare {
                reason,
                count,
                fraction: if total > 0 { count as f64 / total as f64 } else { 0.0 },
            })
            .collect();
        rejection_breakdown.sort_by(|a, b| b.count.cmp(&a.count).then(a.reason.cmp(&b.reason)));

        Self {
            timestamps: result.timestamps_processed,
            signals: m.signals_generated,
            fills: m.fills,
            exits: m.exits,
            rejections: total,
            rejection_breakdown,
            fill_rate: (m.signals_generated > 0).then(|| m.fills as f64 / m.signals_generated as f64),
            gap_events: m.gap_events,
            data_unavailable: m.data_unavailable,
            win_rate: m.win_rate(),
            realized_pnl: m.realized_pnl,
            commissions: m.commissions,
            closed_at_end: m.closed_at_end,
            closed_at_end_pnl: m.closed_at_end_pnl,
            final_equity: result.final_equity,
            total_return: if result.initial_equity > 0.0 {
                result.final_equity / result.initial_equity - 1.0
            } else {
                0.0
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub name: String,
    pub run_id: RunId,
    pub summary: RunSummary,
    pub result: RunResult,
}

impl RunReport {
    pub fn new(name: impl Into<String>, run_id: RunId, result: RunResult) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: name.into(),
            run_id,
            summary: RunSummary::from_result(&result),
            result,
        }
    }
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize run report to JSON")
}

/// Deserialize a report, rejecting schema versions newer than this build.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport = serde_json::from_str(json).context("failed to deserialize run report from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV ────────────────────────────────────────────────────────────

fn opt_ts(t: Option<chrono::NaiveDateTime>) -> String {
    t.map(|t| t.to_string()).unwrap_or_default()
}

fn opt_f64(v: Option<f64>, precision: usize) -> String {
    v.map(|v| format!("{v:.precision$}")).unwrap_or_default()
}

/// Position tape, one row per position.
///
/// Columns: position_id, symbol, strategy, kind, legs, units, entered_at,
/// entry_premium, closed_at, exit_premium, exit_reason, status, gap_slippage,
/// commission, realized_pnl
pub fn export_positions_csv(positions: &[Position]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "position_id",
        "symbol",
        "strategy",
        "kind",
        "legs",
        "units",
        "entered_at",
        "entry_premium",
        "closed_at",
        "exit_premium",
        "exit_reason",
        "status",
        "gap_slippage",
        "commission",
        "realized_pnl",
    ])?;
    for p in positions {
        let legs = p
            .legs
            .iter()
            .map(|l| format!("{:?} {}", l.side, l.contract))
            .collect::<Vec<_>>()
            .join(" / ");
        let row: [&str; 15] = [
            &p.id.to_string(),
            &p.symbol,
            &p.strategy,
            &format!("{:?}", p.kind),
            &legs,
            &p.units.to_string(),
            &p.entered_at.to_string(),
            &format!("{:.4}", p.entry_premium),
            &opt_ts(p.closed_at),
            &opt_f64(p.exit_premium, 4),
            &p.exit_reason.map(|r| format!("{r:?}")).unwrap_or_default(),
            &format!("{:?}", p.status),
            &format!("{:.4}", p.gap_slippage),
            &format!("{:.2}", p.entry_commission + p.exit_commission),
            &opt_f64(p.realized_pnl, 2),
        ];
        wtr.write_record(row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Rejection tape, one row per rejected signal or exit attempt.
pub fn export_rejections_csv(rejections: &[RejectionRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "symbol",
        "signal_id",
        "position_id",
        "leg",
        "reason",
        "stage",
        "closing",
        "detail",
    ])?;
    for r in rejections {
        let row: [&str; 9] = [
            &r.timestamp.to_string(),
            &r.symbol,
            &r.signal_id.map(|id| id.to_string()).unwrap_or_default(),
            &r.position_id.map(|id| id.to_string()).unwrap_or_default(),
            r.leg.as_deref().unwrap_or(""),
            r.reason.as_str(),
            &format!("{:?}", r.stage),
            &r.is_closing.to_string(),
            &r.detail,
        ];
        wtr.write_record(row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Text summary ───────────────────────────────────────────────────

fn pct(v: Option<f64>) -> String {
    v.map(|v| format!("{:.1}%", v * 100.0)).unwrap_or_else(|| "n/a".into())
}

/// Plain-text summary for terminal output.
pub fn format_summary(report: &RunReport) -> String {
    let s = &report.summary;
    let mut out = String::with_capacity(1024);
    // writes to a String cannot fail
    let _ = writeln!(out, "Run: {} ({})", report.name, report.run_id);
    let _ = writeln!(out, "Timestamps:        {}", s.timestamps);
    let _ = writeln!(out, "Signals:           {}", s.signals);
    let _ = writeln!(out, "Fills:             {} (fill rate {})", s.fills, pct(s.fill_rate));
    let _ = writeln!(out, "Exits:             {} (win rate {})", s.exits, pct(s.win_rate));
    let _ = writeln!(out, "Gap events:        {}", s.gap_events);
    let _ = writeln!(out, "Data unavailable:  {}", s.data_unavailable);
    let _ = writeln!(out, "Realized P&L:      {:.2}", s.realized_pnl);
    let _ = writeln!(out, "Commissions:       {:.2}", s.commissions);
    let _ = writeln!(
        out,
        "Closed at end:     {} (mark P&L {:.2}, excluded from fill stats)",
        s.closed_at_end, s.closed_at_end_pnl
    );
    let _ = writeln!(
        out,
        "Final equity:      {:.2} ({:+.2}%)",
        s.final_equity,
        s.total_return * 100.0
    );
    let _ = writeln!(out, "Rejections:        {}", s.rejections);
    for share in &s.rejection_breakdown {
        let _ = writeln!(
            out,
            "  {:<18} {:>6}  {:>5.1}%",
            share.reason.as_str(),
            share.count,
            share.fraction * 100.0
        );
    }
    out
}

// ─── Artifacts ──────────────────────────────────────────────────────

/// Write `report.json`, `positions.csv` and `rejections.csv` under
/// `output_dir/{name}_{short run id}/`. Returns the created directory.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let short_id: String = report.run_id.0.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{short_id}", report.name));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)
        .with_context(|| format!("failed to write report.json in {}", run_dir.display()))?;
    std::fs::write(
        run_dir.join("positions.csv"),
        export_positions_csv(&report.result.positions)?,
    )
    .with_context(|| format!("failed to write positions.csv in {}", run_dir.display()))?;
    std::fs::write(
        run_dir.join("rejections.csv"),
        export_rejections_csv(&report.result.rejections)?,
    )
    .with_context(|| format!("failed to write rejections.csv in {}", run_dir.display()))?;

    Ok(run_dir)
}

/// Load a report from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<RunReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use spreadlab_core::domain::RejectionStage;
    use spreadlab_core::RunMetrics;

    fn rejection(reason: RejectionReason) -> RejectionRecord {
        RejectionRecord {
            signal_id: None,
            position_id: None,
            symbol: "SPY".into(),
            leg: Some("SPY240419P00395000".into()),
            reason,
            stage: RejectionStage::FillEvaluated,
            detail: "draw 0.9000 >= fill probability 0.7000 (WideSpread)".into(),
            is_closing: false,
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    fn result() -> RunResult {
        let mut metrics = RunMetrics::default();
        let rejections = vec![
            rejection(RejectionReason::Spread),
            rejection(RejectionReason::Spread),
            rejection(RejectionReason::Spread),
            rejection(RejectionReason::Liquidity),
        ];
        for r in &rejections {
            metrics.record_rejection(r.reason);
        }
        metrics.signals_generated = 8;
        metrics.fills = 4;
        metrics.record_close(120.0, 4.0);
        metrics.record_close(-80.0, 4.0);
        RunResult {
            metrics,
            positions: Vec::new(),
            rejections,
            gap_events: Vec::new(),
            timestamps_processed: 10,
            initial_equity: 100_000.0,
            final_equity: 100_040.0,
        }
    }

    fn report() -> RunReport {
        RunReport::new("spy", RunId("abcdef0123456789".into()), result())
    }

    #[test]
    fn summary_breaks_down_rejections() {
        let s = RunSummary::from_result(&result());
        assert_eq!(s.rejections, 4);
        assert_eq!(s.rejection_breakdown[0].reason, RejectionReason::Spread);
        assert_eq!(s.rejection_breakdown[0].count, 3);
        assert!((s.rejection_breakdown[0].fraction - 0.75).abs() < 1e-12);
        assert_eq!(s.fill_rate, Some(0.5));
        assert_eq!(s.win_rate, Some(0.5));
        assert!((s.total_return - 0.0004).abs() < 1e-12);
    }

    #[test]
    fn json_round_trip_and_schema_guard() {
        let json = export_json(&report()).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
        assert_eq!(back.summary, report().summary);

        let future = json.replacen("\"schema_version\": 1", "\"schema_version\": 99", 1);
        assert!(import_json(&future).is_err());
    }

    #[test]
    fn rejection_csv_has_one_row_per_record() {
        let csv = export_rejections_csv(&result().rejections).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("timestamp,symbol"));
        assert!(lines[1].contains("spread"));
    }

    #[test]
    fn text_summary_lists_reasons() {
        let text = format_summary(&report());
        assert!(text.contains("spread"));
        assert!(text.contains("liquidity"));
        assert!(text.contains("Closed at end"));
    }

    #[test]
    fn artifacts_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = save_artifacts(&report(), dir.path()).unwrap();
        assert!(run_dir.ends_with("spy_abcdef012345"));
        assert!(run_dir.join("positions.csv").exists());
        let loaded = load_artifacts(&run_dir).unwrap();
        assert_eq!(loaded.name, "spy");
    }
}
