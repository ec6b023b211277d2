//! Projections en lecture seule de l'état synchronisé, utilisées par le rendu.

use crate::health::ConnectionHealth;
use crate::plan::PlanDraft;
use crate::sizing::Sizing;
use crate::state::FleetState;
use std::fmt::Write;

pub const HOT_CPU_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorRow {
    pub id: String,
    pub active_count: i64,
    pub cpu_percent: i64,
    pub receive: String,
    pub transmit: String,
    pub hot: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FleetTotals {
    pub active_count: i64,
    pub cpu_percent: i64, // moyenne sur la flotte
    pub receive: String,
    pub transmit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub id: String,
    pub plan: String,
    pub state: String,
    pub remaining_secs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub id: String,
    pub plan: String,
    pub max_cpu_percent: i64,
    pub hot: bool,
    pub csv_url: Option<String>,
    pub cw_url: Option<String>,
}

fn percent(fraction: f64) -> i64 {
    (fraction * 100.0).trunc() as i64
}

/// Débit lisible en unités binaires, ex: `1.5 KB/sec`
pub fn format_rate(bytes_per_sec: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes_per_sec;
    let mut unit = 0;
    while value.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = format!("{value:.2}");
    let rounded = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{rounded} {}/sec", UNITS[unit])
}

pub fn generator_rows(state: &FleetState) -> Vec<GeneratorRow> {
    state
        .generators
        .iter()
        .map(|(id, g)| {
            let cpu = g.cpu.unwrap_or(0.0);
            GeneratorRow {
                id: id.to_string(),
                active_count: g.active_count.unwrap_or(0),
                cpu_percent: percent(cpu),
                receive: format_rate(g.network_rx.unwrap_or(0.0)),
                transmit: format_rate(g.network_tx.unwrap_or(0.0)),
                hot: cpu > HOT_CPU_THRESHOLD,
            }
        })
        .collect()
}

pub fn fleet_totals(state: &FleetState) -> FleetTotals {
    let generators = &state.generators;
    let active_count = generators.iter().map(|(_, g)| g.active_count.unwrap_or(0)).sum();
    let cpu_sum: f64 = generators.iter().map(|(_, g)| g.cpu.unwrap_or(0.0)).sum();
    let rx: f64 = generators.iter().map(|(_, g)| g.network_rx.unwrap_or(0.0)).sum();
    let tx: f64 = generators.iter().map(|(_, g)| g.network_tx.unwrap_or(0.0)).sum();
    let cpu_percent = if generators.is_empty() {
        0
    } else {
        percent(cpu_sum / generators.len() as f64)
    };

    FleetTotals {
        active_count,
        cpu_percent,
        receive: format_rate(rx),
        transmit: format_rate(tx),
    }
}

pub fn run_rows(state: &FleetState) -> Vec<RunRow> {
    state
        .runs
        .iter()
        .map(|(id, run)| RunRow {
            id: id.to_string(),
            plan: run.name.clone().unwrap_or_default(),
            state: run.state.clone().unwrap_or_else(|| "???".to_string()),
            remaining_secs: run.remaining_ms.unwrap_or(0.0) / 1000.0,
        })
        .collect()
}

/// Reports du plus récent au plus ancien
pub fn report_rows(state: &FleetState) -> Vec<ReportRow> {
    state
        .reports
        .iter_newest_first()
        .map(|(id, report)| {
            let max_cpu = report.max_cpu.unwrap_or(0.0);
            ReportRow {
                id: id.to_string(),
                plan: report.name.clone(),
                max_cpu_percent: percent(max_cpu),
                hot: max_cpu > HOT_CPU_THRESHOLD,
                csv_url: report.result.csv_url.clone(),
                cw_url: report.result.cw_url.clone(),
            }
        })
        .collect()
}

pub fn render_plan(draft: &PlanDraft, sizing: &Sizing) -> String {
    let mut out = String::new();
    let effective = sizing
        .effective_size
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unavailable".to_string());
    let desired = draft
        .desired_size
        .map(|s| s.to_string())
        .unwrap_or_else(|| "?".to_string());

    let _ = writeln!(out, "== Plan '{}'", draft.name);
    let _ = writeln!(out, "  desired devices   : {desired}");
    let _ = writeln!(out, "  effective devices : {effective} (multiples of {})", sizing.ramp_step_size);
    let _ = writeln!(out, "  target            : {}:{}", draft.host, draft.port);
    let _ = writeln!(
        out,
        "  rampup/sustain/rampdown : {}s / {}s / {}s",
        draft.rampup_secs, draft.sustain_secs, draft.rampdown_secs
    );
    let _ = writeln!(out, "  params            : {}", draft.params);
    out
}

/// Rendu texte complet de la flotte
pub fn render_fleet(state: &FleetState, health: &ConnectionHealth) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "== LoadGrid [{}] {} (reconnects: {})",
        health.status, health.endpoint, health.reconnects
    );

    let _ = writeln!(out, "\n-- Runs");
    for row in run_rows(state) {
        let _ = writeln!(out, "  {:<28} {:<16} {:<12} {} seconds", row.id, row.plan, row.state, row.remaining_secs);
    }

    let _ = writeln!(out, "\n-- Reports");
    for row in report_rows(state) {
        let flag = if row.hot { "!" } else { " " };
        let mut links = Vec::new();
        if let Some(url) = &row.csv_url {
            links.push(format!("CSV {url}"));
        }
        if let Some(url) = &row.cw_url {
            links.push(format!("CloudWatch {url}"));
        }
        let _ = writeln!(
            out,
            "{flag} {:<28} {:<16} {:>3} %  {}",
            row.id,
            row.plan,
            row.max_cpu_percent,
            links.join("  ")
        );
    }

    let _ = writeln!(out, "\n-- Generators");
    for row in generator_rows(state) {
        let flag = if row.hot { "!" } else { " " };
        let _ = writeln!(
            out,
            "{flag} {:<28} {:>8} {:>3} %  rx {:<14} tx {}",
            row.id, row.active_count, row.cpu_percent, row.receive, row.transmit
        );
    }
    let totals = fleet_totals(state);
    let _ = writeln!(
        out,
        "  {:<28} {:>8} {:>3} %  rx {:<14} tx {}",
        "All", totals.active_count, totals.cpu_percent, totals.receive, totals.transmit
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Generator, Report, ReportResult, Run};

    fn fleet() -> FleetState {
        let mut state = FleetState::new();
        state.generators.upsert_merge("g1", Generator { cpu: Some(0.5), network_rx: Some(1536.0), network_tx: Some(100.0), active_count: Some(10) });
        state.generators.upsert_merge("g2", Generator { cpu: Some(0.95), active_count: Some(5), ..Default::default() });
        state.runs.upsert_merge("run-1", Run { name: Some("10K".into()), state: None, remaining_ms: Some(4500.0) });
        for (id, cpu) in [("r1", 0.2), ("r2", 0.9)] {
            state.reports.upsert_replace(id, Report {
                name: format!("plan-{id}"),
                max_cpu: Some(cpu),
                max_network_rx: None,
                max_network_tx: None,
                result: ReportResult { csv_url: Some(format!("http://s3/{id}.csv")), cw_url: None },
            });
        }
        state
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0.0), "0 B/sec");
        assert_eq!(format_rate(512.0), "512 B/sec");
        assert_eq!(format_rate(1536.0), "1.5 KB/sec");
        assert_eq!(format_rate(3.0 * 1024.0 * 1024.0), "3 MB/sec");
    }

    #[test]
    fn test_generator_rows_and_totals() {
        let state = fleet();
        let rows = generator_rows(&state);
        assert_eq!(rows[0].cpu_percent, 50);
        assert_eq!(rows[0].receive, "1.5 KB/sec");
        assert!(!rows[0].hot);
        assert!(rows[1].hot);
        assert_eq!(rows[1].transmit, "0 B/sec");

        let totals = fleet_totals(&state);
        assert_eq!(totals.active_count, 15);
        assert_eq!(totals.cpu_percent, 72);
        assert_eq!(totals.transmit, "100 B/sec");
    }

    #[test]
    fn test_totals_on_empty_fleet() {
        let totals = fleet_totals(&FleetState::new());
        assert_eq!(totals.cpu_percent, 0);
        assert_eq!(totals.active_count, 0);
    }

    #[test]
    fn test_run_rows_defaults() {
        let rows = run_rows(&fleet());
        assert_eq!(rows[0].state, "???");
        assert_eq!(rows[0].remaining_secs, 4.5);
    }

    #[test]
    fn test_reports_newest_first() {
        let rows = report_rows(&fleet());
        assert_eq!(rows[0].id, "r2");
        assert!(rows[0].hot);
        assert_eq!(rows[0].max_cpu_percent, 90);
        assert_eq!(rows[1].id, "r1");
    }

    #[test]
    fn test_render_plan_shows_unavailable_size() {
        let draft = PlanDraft::default();
        let text = render_plan(&draft, &Sizing::compute(0, draft.desired_size));
        assert!(text.contains("effective devices : unavailable"));
    }
}
