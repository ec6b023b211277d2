/*!
Canal simulé pour développement sans plan de contrôle

Remplace la connexion WebSocket : les frames entrantes passent par le même
point d'application que le transport réel, et les lots de commandes émis par
la console sont enregistrés pour les assertions.
*/

use loadgrid_console::health::ConnectionTracker;
use loadgrid_console::protocol::{self, Envelope};
use loadgrid_console::state::{FleetState, Shared};
use loadgrid_console::transport::{handle_frame, CommandSender};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use anyhow::Result;

#[derive(Clone)]
pub struct MockChannel {
    state: Shared<FleetState>,
    tracker: ConnectionTracker,
    commands: CommandSender,
    outbound: Arc<Mutex<mpsc::UnboundedReceiver<Vec<Envelope>>>>,
    sent_batches: Arc<Mutex<Vec<Vec<Envelope>>>>,
}

impl MockChannel {
    pub fn new(state: Shared<FleetState>, tracker: ConnectionTracker) -> Self {
        let (commands, outbound) = CommandSender::channel();
        tracker.set_endpoint("mock://control-plane");
        tracker.mark_connected();
        Self {
            state,
            tracker,
            commands,
            outbound: Arc::new(Mutex::new(outbound)),
            sent_batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle de commandes à donner à la console testée
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    /// Simule la réception d'une frame texte brute
    pub fn simulate_frame(&self, text: &str) {
        handle_frame(&self.state, &self.tracker, text);
        log::info!("📨 [MOCK] Simulated frame: {} bytes", text.len());
    }

    /// Simule la réception d'une frame composée de ces enveloppes
    pub fn simulate_envelopes(&self, envelopes: Vec<Value>) {
        self.simulate_frame(&Value::Array(envelopes).to_string());
    }

    /// Simule une coupure : la prochaine connexion recevra un nouveau `init`
    pub fn simulate_disconnect(&self) {
        self.tracker.mark_disconnected();
        self.tracker.increment_reconnects();
        self.tracker.mark_connected();
        log::info!("🔌 [MOCK] Simulated reconnect");
    }

    /// Vide la file sortante dans l'historique et retourne l'historique complet
    pub fn sent_batches(&self) -> Vec<Vec<Envelope>> {
        let mut outbound = self.outbound.lock().unwrap();
        let mut sent = self.sent_batches.lock().unwrap();
        while let Ok(batch) = outbound.try_recv() {
            log::info!("📤 [MOCK] Sent batch of {} envelopes", batch.len());
            sent.push(batch);
        }
        sent.clone()
    }

    /// Lots sortants tels qu'ils partiraient sur le fil
    pub fn sent_json(&self) -> Result<Vec<Value>> {
        self.sent_batches()
            .iter()
            .map(|batch| Ok(serde_json::from_str(&protocol::encode_batch(batch)?)?))
            .collect()
    }

    /// Enveloppes sortantes portant une commande donnée (`run_plan`, `abort_run`...)
    pub fn find_commands(&self, command: &str) -> Result<Vec<Value>> {
        let mut found = Vec::new();
        for batch in self.sent_json()? {
            if let Value::Array(envelopes) = batch {
                found.extend(envelopes.into_iter().filter_map(|mut env| env.get_mut(command).map(Value::take)));
            }
        }
        Ok(found)
    }

    /// Reset l'historique des commandes
    pub fn clear(&self) {
        self.sent_batches();
        self.sent_batches.lock().unwrap().clear();
    }
}
