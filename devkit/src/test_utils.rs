/*!
Test Harness pour la console LoadGrid

Facilite l'écriture de tests de bout en bout avec:
- Stores + canal simulé + console opérateur câblés ensemble
- Assertions sur les entités synchronisées
- Expectations sur les commandes émises
*/

use crate::envelope_builder::EnvelopeBuilder;
use crate::mock_channel::MockChannel;
use loadgrid_console::console::{Console, OperatorCommand};
use loadgrid_console::health::ConnectionTracker;
use loadgrid_console::models::EntityKind;
use loadgrid_console::plan::PlanDraft;
use loadgrid_console::state::{new_state, FleetState, Shared};
use serde_json::Value;
use std::time::Duration;
use anyhow::Result;

/// Harness de test complet : la console lit, le canal simulé écrit
pub struct TestHarness {
    pub state: Shared<FleetState>,
    pub tracker: ConnectionTracker,
    pub channel: MockChannel,
    pub console: Console,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    command: String,
    expected_count: usize,
}

impl TestHarness {
    /// Crée un nouveau harness avec le brouillon de plan par défaut
    pub fn new() -> Self {
        Self::with_plan(PlanDraft::default())
    }

    pub fn with_plan(draft: PlanDraft) -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        let state = new_state(FleetState::new());
        let tracker = ConnectionTracker::new();
        let channel = MockChannel::new(state.clone(), tracker.clone());
        let console = Console::new(state.clone(), channel.commands(), tracker.clone(), draft);

        Self { state, tracker, channel, console, expectations: Vec::new() }
    }

    /// Snapshot `init` avec N générateurs nommés g1..gN
    pub fn send_generators(&self, count: usize) {
        let generators = (1..=count)
            .map(|i| EnvelopeBuilder::generator(format!("g{i}"), 0.0, 0.0, 0.0, 0))
            .collect();
        self.channel.simulate_envelopes(vec![EnvelopeBuilder::init(generators, vec![], vec![])]);
        log::info!("💓 Sent init with {} generators", count);
    }

    pub fn send(&self, envelopes: Vec<Value>) {
        self.channel.simulate_envelopes(envelopes);
    }

    /// Exécute une ligne de commande opérateur comme la boucle stdin
    pub fn command(&mut self, line: &str) -> Result<String> {
        match OperatorCommand::parse(line)? {
            Some(command) => Ok(self.console.execute(command)?),
            None => Ok(String::new()),
        }
    }

    /// Ajoute une expectation: on s'attend à N enveloppes portant cette commande
    pub fn expect_commands(&mut self, command: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation { command: command.to_string(), expected_count: count });
        self
    }

    /// Vérifie toutes les expectations configurées
    pub fn verify_expectations(&self) -> Result<()> {
        log::info!("🔍 Verifying {} expectations...", self.expectations.len());

        for expectation in &self.expectations {
            let actual_count = self.channel.find_commands(&expectation.command)?.len();
            if actual_count != expectation.expected_count {
                anyhow::bail!(
                    "Expectation failed for '{}': expected {} envelopes, got {}",
                    expectation.command, expectation.expected_count, actual_count
                );
            }
        }
        Ok(())
    }

    /// Attend qu'une commande soit émise (utile quand la console tourne dans une tâche)
    pub async fn wait_for_command(&self, command: &str, timeout_ms: u64) -> Result<Option<Value>> {
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if let Some(found) = self.channel.find_commands(command)?.pop() {
                return Ok(Some(found));
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        log::warn!("⏰ Timeout waiting for command {}", command);
        Ok(None)
    }

    /// Entité synchronisée en JSON, telle qu'elle serait rendue
    pub fn entity(&self, kind: EntityKind, id: &str) -> Result<Option<Value>> {
        let st = self.state.lock();
        let value = match kind {
            EntityKind::Generator => st.generators.get(id).map(serde_json::to_value),
            EntityKind::Run => st.runs.get(id).map(serde_json::to_value),
            EntityKind::Report => st.reports.get(id).map(serde_json::to_value),
        };
        Ok(value.transpose()?)
    }

    /// Assert qu'un champ d'une entité a une valeur spécifique
    pub fn assert_field_equals(&self, kind: EntityKind, id: &str, field_path: &str, expected: &Value) -> Result<()> {
        let Some(entity) = self.entity(kind, id)? else {
            anyhow::bail!("{} '{}' not found", kind.as_str(), id);
        };
        match get_nested_field(&entity, field_path) {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => anyhow::bail!(
                "Field '{}' mismatch on {}: expected {:?}, got {:?}",
                field_path, id, expected, actual
            ),
            None => anyhow::bail!("Field '{}' not found on {}", field_path, id),
        }
    }

    /// Stats sur l'état synchronisé et les commandes émises
    pub fn get_stats(&self) -> TestStats {
        let st = self.state.lock();
        TestStats {
            generators: st.generators.len(),
            runs: st.runs.len(),
            reports: st.reports.len(),
            batches_sent: self.channel.sent_batches().len(),
        }
    }

    /// Reset les commandes et expectations pour un nouveau scénario
    pub fn reset(&mut self) {
        self.channel.clear();
        self.expectations.clear();
        log::info!("🧹 Test harness reset");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn get_nested_field<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[derive(Debug, PartialEq, Eq)]
pub struct TestStats {
    pub generators: usize,
    pub runs: usize,
    pub reports: usize,
    pub batches_sent: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sizing_with_three_generators() {
        let mut harness = TestHarness::new();
        harness.send_generators(3);
        harness.command("size 10000").unwrap();

        let sizing = harness.console.sizing();
        assert_eq!(sizing.ramp_step_size, 30);
        assert_eq!(sizing.ramp_steps, Some(333));
        assert_eq!(sizing.effective_size, Some(9_990));
    }

    #[test]
    fn test_submission_rejected_without_generators() {
        let mut harness = TestHarness::new();
        harness.expect_commands("run_plan", 0);

        let err = harness.command("run").unwrap_err();
        assert_eq!(err.to_string(), "Effective size is invalid");
        harness.verify_expectations().unwrap();
    }

    #[test]
    fn test_submitted_plan_on_the_wire() {
        let mut harness = TestHarness::new();
        harness.send_generators(2);
        harness.command("set name smoke").unwrap();
        harness.command("set rampup 60").unwrap();
        harness.command("run").unwrap();

        let plans = harness.channel.find_commands("run_plan").unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0]["name"], "smoke");
        assert_eq!(plans[0]["blocks"][0]["size"], 10_000);
        assert_eq!(plans[0]["opts"]["ramp_steps"], 500);
        assert_eq!(plans[0]["opts"]["rampup_step_ms"], 120.0);
    }

    #[test]
    fn test_generator_updates_merge_per_field() {
        let harness = TestHarness::new();
        harness.send(vec![EnvelopeBuilder::generator_changed(json!({ "id": "g1", "cpu": 0.5 }))]);
        harness.send(vec![EnvelopeBuilder::generator_changed(json!({ "id": "g1", "active_count": 4 }))]);

        harness.assert_field_equals(EntityKind::Generator, "g1", "cpu", &json!(0.5)).unwrap();
        harness.assert_field_equals(EntityKind::Generator, "g1", "active_count", &json!(4)).unwrap();
    }

    #[test]
    fn test_report_added_replaces_whole_record() {
        let harness = TestHarness::new();
        harness.send(vec![EnvelopeBuilder::report_added(EnvelopeBuilder::report("r1", "10K", 0.9, Some("http://s3/r1.csv")))]);
        harness.send(vec![EnvelopeBuilder::report_added(EnvelopeBuilder::report("r1", "10K-v2", 0.1, None))]);

        harness.assert_field_equals(EntityKind::Report, "r1", "name", &json!("10K-v2")).unwrap();
        harness.assert_field_equals(EntityKind::Report, "r1", "max_cpu", &json!(0.1)).unwrap();
        assert!(harness.assert_field_equals(EntityKind::Report, "r1", "result.csv_url", &json!("http://s3/r1.csv")).is_err());
        assert_eq!(harness.get_stats().reports, 1);
    }

    #[test]
    fn test_init_after_reconnect_replaces_fleet() {
        let harness = TestHarness::new();
        harness.send_generators(4);
        harness.send(vec![EnvelopeBuilder::run_changed(EnvelopeBuilder::run("run-1", Some("10K"), Some("sustain"), None))]);

        harness.channel.simulate_disconnect();
        harness.send(vec![EnvelopeBuilder::init(vec![EnvelopeBuilder::generator("g9", 0.1, 0.0, 0.0, 1)], vec![], vec![])]);

        let stats = harness.get_stats();
        assert_eq!(stats, TestStats { generators: 1, runs: 0, reports: 0, batches_sent: 0 });
        assert_eq!(harness.tracker.get_health().reconnects, 1);
    }

    #[test]
    fn test_removals_are_idempotent() {
        let harness = TestHarness::new();
        harness.send_generators(2);
        harness.send(vec![EnvelopeBuilder::generator_removed("g1")]);
        harness.send(vec![EnvelopeBuilder::generator_removed("g1")]);

        assert!(harness.entity(EntityKind::Generator, "g1").unwrap().is_none());
        assert_eq!(harness.get_stats().generators, 1);
    }

    #[tokio::test]
    async fn test_abort_and_clear_commands() {
        let mut harness = TestHarness::new();
        harness.expect_commands("abort_run", 1).expect_commands("remove_report", 1);

        harness.command("abort run-7").unwrap();
        harness.command("clear r3").unwrap();

        let abort = harness.wait_for_command("abort_run", 1000).await.unwrap();
        assert_eq!(abort, Some(json!({ "id": "run-7" })));
        harness.verify_expectations().unwrap();

        harness.reset();
        assert_eq!(harness.get_stats().batches_sent, 0);
    }
}
