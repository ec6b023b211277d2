/*!
Builders d'enveloppes serveur → console

Produit les objets JSON tels que le plan de contrôle les envoie, pour
alimenter le canal simulé sans écrire le JSON à la main.
*/

use serde_json::{json, Map, Value};

pub struct EnvelopeBuilder;

impl EnvelopeBuilder {
    /// Entrée générateur avec ses métriques
    pub fn generator<S: Into<String>>(id: S, cpu: f64, network_rx: f64, network_tx: f64, active_count: i64) -> Value {
        json!({
            "id": id.into(),
            "cpu": cpu,
            "network_rx": network_rx,
            "network_tx": network_tx,
            "active_count": active_count
        })
    }

    /// Entrée run, les champs absents sont omis
    pub fn run<S: Into<String>>(id: S, name: Option<&str>, state: Option<&str>, remaining_ms: Option<f64>) -> Value {
        let mut obj = Map::new();
        obj.insert("id".into(), Value::String(id.into()));
        if let Some(name) = name {
            obj.insert("name".into(), json!(name));
        }
        if let Some(state) = state {
            obj.insert("state".into(), json!(state));
        }
        if let Some(remaining_ms) = remaining_ms {
            obj.insert("remaining_ms".into(), json!(remaining_ms));
        }
        Value::Object(obj)
    }

    /// Entrée report avec lien CSV optionnel
    pub fn report<S: Into<String>>(id: S, name: &str, max_cpu: f64, csv_url: Option<&str>) -> Value {
        let mut result = Map::new();
        if let Some(url) = csv_url {
            result.insert("csv_url".into(), json!(url));
        }
        json!({
            "id": id.into(),
            "name": name,
            "max_cpu": max_cpu,
            "max_network_rx": 0.0,
            "max_network_tx": 0.0,
            "result": Value::Object(result)
        })
    }

    pub fn init(generators: Vec<Value>, runs: Vec<Value>, reports: Vec<Value>) -> Value {
        json!({ "init": { "generators": generators, "runs": runs, "reports": reports } })
    }

    pub fn generator_changed(entry: Value) -> Value {
        json!({ "notify": { "generator_changed": entry } })
    }

    pub fn generator_removed(id: &str) -> Value {
        json!({ "notify": { "generator_removed": { "id": id } } })
    }

    pub fn run_changed(entry: Value) -> Value {
        json!({ "notify": { "run_changed": entry } })
    }

    pub fn run_removed(id: &str) -> Value {
        json!({ "notify": { "run_removed": { "id": id } } })
    }

    pub fn report_added(entry: Value) -> Value {
        json!({ "notify": { "report_added": entry } })
    }

    pub fn report_removed(id: &str) -> Value {
        json!({ "notify": { "report_removed": { "id": id } } })
    }

    /// Sérialise une frame (tableau d'enveloppes)
    pub fn frame(envelopes: Vec<Value>) -> String {
        Value::Array(envelopes).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_omits_absent_fields() {
        let run = EnvelopeBuilder::run("run-1", None, Some("rampup"), None);
        assert_eq!(run, json!({ "id": "run-1", "state": "rampup" }));
    }

    #[test]
    fn test_frame_decodes_with_console_codec() {
        let frame = EnvelopeBuilder::frame(vec![
            EnvelopeBuilder::init(vec![EnvelopeBuilder::generator("g1", 0.1, 0.0, 0.0, 2)], vec![], vec![]),
            EnvelopeBuilder::report_added(EnvelopeBuilder::report("r1", "10K", 0.4, Some("http://s3/r1.csv"))),
        ]);

        let decoded = loadgrid_console::protocol::decode_frame(&frame).unwrap();
        assert_eq!(decoded.envelopes.len(), 2);
        assert_eq!(decoded.skipped, 0);
    }
}
