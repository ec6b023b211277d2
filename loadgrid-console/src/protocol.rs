/**
 * PROTOCOL CODEC - Enveloppes JSON du canal ↔ mutations des stores / commandes
 *
 * RÔLE : Traduit chaque frame entrante (tableau d'enveloppes) en opérations
 * sur les stores, et encode les commandes sortantes en lots d'une enveloppe.
 *
 * FONCTIONNEMENT :
 * - init   : clear des trois stores puis insertion du snapshot complet
 * - notify : un sous-champ peuplé → une opération de store
 * - ordre de livraison strictement respecté, aucune déduplication
 */

use crate::models::{Generator, Report, Run};
use crate::state::FleetState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid JSON frame: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Frame is not an array of envelopes (got {0})")]
    NotAnArray(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorInfo {
    pub id: String,
    #[serde(flatten)]
    pub generator: Generator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub id: String,
    #[serde(flatten)]
    pub run: Run,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportInfo {
    pub id: String,
    #[serde(flatten)]
    pub report: Report,
}

/// Snapshot complet envoyé à la (re)connexion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Init {
    #[serde(default)]
    pub generators: Vec<GeneratorInfo>,
    #[serde(default)]
    pub runs: Vec<RunInfo>,
    #[serde(default)]
    pub reports: Vec<ReportInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notify {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_changed: Option<GeneratorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_removed: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_changed: Option<RunInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_removed: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_added: Option<ReportInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_removed: Option<IdRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanOpts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramp_steps: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rampup_step_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sustain_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rampdown_step_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    pub name: String,
    pub blocks: Vec<Block>,
    pub addresses: Vec<Address>,
    pub opts: PlanOpts,
    /// Emplacement réservé, jamais renseigné par la console
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Init>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<Notify>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_plan: Option<RunPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_run: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_report: Option<IdRef>,
}

impl Envelope {
    pub fn run_plan(plan: RunPlan) -> Self {
        Self { run_plan: Some(plan), ..Default::default() }
    }

    pub fn abort_run(id: impl Into<String>) -> Self {
        Self { abort_run: Some(IdRef { id: id.into() }), ..Default::default() }
    }

    pub fn remove_report(id: impl Into<String>) -> Self {
        Self { remove_report: Some(IdRef { id: id.into() }), ..Default::default() }
    }
}

/// Frame décodée : enveloppes valides + nombre d'enveloppes ignorées
#[derive(Debug, Default)]
pub struct DecodedFrame {
    pub envelopes: Vec<Envelope>,
    pub skipped: usize,
}

/// Bilan de l'application d'une frame
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub applied: usize,
    pub skipped: usize,
    pub resyncs: usize,
}

/// Décode une frame. Une frame non JSON ou qui n'est pas un tableau est
/// rejetée en entier ; une enveloppe invalide est seulement ignorée.
pub fn decode_frame(text: &str) -> Result<DecodedFrame, ProtocolError> {
    let items = match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => items,
        other => return Err(ProtocolError::NotAnArray(json_type(&other))),
    };

    let mut frame = DecodedFrame::default();
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Envelope>(item) {
            Ok(envelope) => frame.envelopes.push(envelope),
            Err(e) => {
                warn!("[codec] skipping envelope #{index}: {e}");
                frame.skipped += 1;
            }
        }
    }
    Ok(frame)
}

/// Décode puis applique une frame, enveloppe par enveloppe, dans l'ordre
pub fn apply_frame(state: &mut FleetState, text: &str) -> Result<FrameReport, ProtocolError> {
    let frame = decode_frame(text)?;
    let mut report = FrameReport { skipped: frame.skipped, ..Default::default() };
    for envelope in frame.envelopes {
        if envelope.init.is_some() {
            report.resyncs += 1;
        }
        apply_envelope(state, envelope);
        report.applied += 1;
    }
    Ok(report)
}

/// Applique une enveloppe entrante. Les champs sortants (run_plan, abort_run,
/// remove_report) sont ignorés.
pub fn apply_envelope(state: &mut FleetState, envelope: Envelope) {
    if let Some(init) = envelope.init {
        apply_init(state, init);
    }
    if let Some(notify) = envelope.notify {
        apply_notify(state, notify);
    }
}

fn apply_init(state: &mut FleetState, init: Init) {
    state.generators.clear();
    state.runs.clear();
    state.reports.clear();

    let counts = (init.generators.len(), init.runs.len(), init.reports.len());
    for g in init.generators {
        state.generators.upsert_merge(&g.id, g.generator);
    }
    for r in init.runs {
        state.runs.upsert_merge(&r.id, r.run);
    }
    for r in init.reports {
        state.reports.upsert_replace(&r.id, r.report);
    }
    debug!(
        "[codec] init applied: {} generators, {} runs, {} reports",
        counts.0, counts.1, counts.2
    );
}

fn apply_notify(state: &mut FleetState, notify: Notify) {
    if let Some(g) = notify.generator_changed {
        debug!("[codec] generator_changed {}", g.id);
        state.generators.upsert_merge(&g.id, g.generator);
    }
    if let Some(IdRef { id }) = notify.generator_removed {
        debug!("[codec] generator_removed {id}");
        state.generators.remove(&id);
    }
    if let Some(r) = notify.run_changed {
        debug!("[codec] run_changed {}", r.id);
        state.runs.upsert_merge(&r.id, r.run);
    }
    if let Some(IdRef { id }) = notify.run_removed {
        debug!("[codec] run_removed {id}");
        state.runs.remove(&id);
    }
    if let Some(r) = notify.report_added {
        debug!("[codec] report_added {}", r.id);
        state.reports.upsert_replace(&r.id, r.report);
    }
    if let Some(IdRef { id }) = notify.report_removed {
        debug!("[codec] report_removed {id}");
        state.reports.remove(&id);
    }
}

/// Sérialise un lot d'enveloppes en une frame (tableau JSON)
pub fn encode_batch(envelopes: &[Envelope]) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(envelopes)?)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
