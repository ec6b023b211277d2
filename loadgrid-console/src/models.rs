use serde::{Deserialize, Serialize};

/// Fusion champ par champ : seuls les champs présents dans `partial` écrasent
/// la valeur existante, les champs absents sont conservés.
pub trait Merge {
    fn merge(&mut self, partial: Self);
}

/// Télémétrie d'un worker générateur
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,           // fraction 0..1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_rx: Option<f64>,    // octets/sec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_tx: Option<f64>,    // octets/sec
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_count: Option<i64>,
}

impl Merge for Generator {
    fn merge(&mut self, partial: Self) {
        if partial.cpu.is_some() { self.cpu = partial.cpu; }
        if partial.network_rx.is_some() { self.network_rx = partial.network_rx; }
        if partial.network_tx.is_some() { self.network_tx = partial.network_tx; }
        if partial.active_count.is_some() { self.active_count = partial.active_count; }
    }
}

/// Plan de test en cours d'exécution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,      // libellé libre fourni par le coordinateur
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<f64>,
}

impl Merge for Run {
    fn merge(&mut self, partial: Self) {
        if partial.name.is_some() { self.name = partial.name; }
        if partial.state.is_some() { self.state = partial.state; }
        if partial.remaining_ms.is_some() { self.remaining_ms = partial.remaining_ms; }
    }
}

/// Artefacts produits à la fin d'un run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cw_url: Option<String>,     // dashboard CloudWatch
}

/// Rapport terminal : immuable jusqu'à sa suppression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cpu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_network_rx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_network_tx: Option<f64>,
    #[serde(default)]
    pub result: ReportResult,
}

/// Type d'entité porté par chaque store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Generator,
    Run,
    Report,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Generator => "generator",
            EntityKind::Run => "run",
            EntityKind::Report => "report",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_merge_keeps_absent_fields() {
        let mut g = Generator { cpu: Some(0.5), network_rx: Some(100.0), ..Default::default() };
        g.merge(Generator { active_count: Some(4), network_rx: Some(250.0), ..Default::default() });

        assert_eq!(g.cpu, Some(0.5));
        assert_eq!(g.network_rx, Some(250.0));
        assert_eq!(g.active_count, Some(4));
        assert_eq!(g.network_tx, None);
    }

    #[test]
    fn test_run_merge_overwrites_present_fields() {
        let mut r = Run { name: Some("10K".into()), state: Some("preparing".into()), remaining_ms: None };
        r.merge(Run { state: Some("running".into()), remaining_ms: Some(1200.0), ..Default::default() });

        assert_eq!(r.name.as_deref(), Some("10K"));
        assert_eq!(r.state.as_deref(), Some("running"));
        assert_eq!(r.remaining_ms, Some(1200.0));
    }

    #[test]
    fn test_report_without_result_decodes() {
        let report: Report = serde_json::from_str(r#"{"name":"10K","max_cpu":0.9}"#).unwrap();
        assert_eq!(report.result, ReportResult::default());
        assert_eq!(report.max_cpu, Some(0.9));
    }
}
