/**
 * CONSOLE - Commandes opérateur (saisie texte) → moteur de synchronisation
 *
 * RÔLE : Parse les lignes saisies par l'opérateur, met à jour le brouillon de
 * plan et le dimensionnement, et déclenche les commandes sortantes.
 * Ne fait que lire l'état synchronisé, jamais l'écrire.
 */

use crate::health::ConnectionTracker;
use crate::plan::{PlanDraft, PlanError};
use crate::sizing::{Sizing, SizingCalculator};
use crate::state::{FleetState, Shared};
use crate::transport::{CommandSender, TransportError};
use crate::view;
use tracing::info;

pub const HELP: &str = "\
commands:
  size <n>               desired number of devices
  set <field> <value>    plan field (name, size, script, params, host, port, rampup, sustain, rampdown)
  plan                   show the plan draft and its effective size
  run                    validate and submit the plan
  abort <run-id>         abort a running plan
  clear <report-id>      remove a report
  status                 connection health
  show                   redraw the fleet
  help | quit";

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Unknown command '{0}', type 'help'")]
    UnknownCommand(String),
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Size(String),
    Set { field: String, value: String },
    Plan,
    Run,
    Abort(String),
    Clear(String),
    Status,
    Show,
    Help,
    Quit,
}

impl OperatorCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let arg = |name: &'static str| -> Result<String, ConsoleError> {
            if rest.is_empty() {
                Err(ConsoleError::MissingArgument(name))
            } else {
                Ok(rest.to_string())
            }
        };

        let command = match verb {
            "size" => OperatorCommand::Size(arg("size")?),
            "set" => {
                let (field, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(ConsoleError::MissingArgument("value"))?;
                OperatorCommand::Set { field: field.to_string(), value: value.trim().to_string() }
            }
            "plan" => OperatorCommand::Plan,
            "run" => OperatorCommand::Run,
            "abort" => OperatorCommand::Abort(arg("run id")?),
            "clear" => OperatorCommand::Clear(arg("report id")?),
            "status" => OperatorCommand::Status,
            "show" => OperatorCommand::Show,
            "help" | "?" => OperatorCommand::Help,
            "quit" | "exit" => OperatorCommand::Quit,
            other => return Err(ConsoleError::UnknownCommand(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Côté lecture + commandes de la console : l'état n'est jamais modifié ici
pub struct Console {
    state: Shared<FleetState>,
    commands: CommandSender,
    tracker: ConnectionTracker,
    draft: PlanDraft,
    calculator: SizingCalculator,
}

impl Console {
    pub fn new(
        state: Shared<FleetState>,
        commands: CommandSender,
        tracker: ConnectionTracker,
        draft: PlanDraft,
    ) -> Self {
        Self { state, commands, tracker, draft, calculator: SizingCalculator::new() }
    }

    /// Dimensionnement courant, recalculé si la flotte ou la taille a changé
    pub fn sizing(&mut self) -> Sizing {
        let st = self.state.lock();
        self.calculator.sizing(&st.generators, self.draft.desired_size)
    }

    pub fn render(&self) -> String {
        let health = self.tracker.get_health();
        view::render_fleet(&self.state.lock(), &health)
    }

    /// Exécute une commande et retourne le texte à afficher
    pub fn execute(&mut self, command: OperatorCommand) -> Result<String, ConsoleError> {
        match command {
            OperatorCommand::Size(raw) => {
                self.draft.set("size", &raw)?;
                let sizing = self.sizing();
                Ok(view::render_plan(&self.draft, &sizing))
            }
            OperatorCommand::Set { field, value } => {
                self.draft.set(&field, &value)?;
                Ok(format!("{field} updated"))
            }
            OperatorCommand::Plan => {
                let sizing = self.sizing();
                Ok(view::render_plan(&self.draft, &sizing))
            }
            OperatorCommand::Run => {
                let sizing = self.sizing();
                let plan = self.draft.build(&sizing)?;
                info!(
                    "[console] submitting plan '{}' ({} devices)",
                    plan.name,
                    sizing.effective_size.unwrap_or_default()
                );
                self.commands.run_plan(plan)?;
                Ok("plan submitted".to_string())
            }
            OperatorCommand::Abort(id) => {
                self.commands.abort_run(&id)?;
                Ok(format!("abort requested for {id}"))
            }
            OperatorCommand::Clear(id) => {
                self.commands.remove_report(&id)?;
                Ok(format!("removal requested for {id}"))
            }
            OperatorCommand::Status => {
                let health = self.tracker.get_health();
                Ok(serde_json::to_string_pretty(&health).unwrap_or_else(|_| format!("{health:?}")))
            }
            OperatorCommand::Show => Ok(self.render()),
            OperatorCommand::Help => Ok(HELP.to_string()),
            OperatorCommand::Quit => Ok("bye".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Generator;
    use crate::protocol::Envelope;
    use crate::state::new_state;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn console(generators: usize) -> (Console, UnboundedReceiver<Vec<Envelope>>) {
        let state = new_state(FleetState::new());
        {
            let mut st = state.lock();
            for i in 0..generators {
                st.generators.upsert_merge(&format!("g{i}"), Generator::default());
            }
        }
        let (commands, outbound) = CommandSender::channel();
        let console = Console::new(state, commands, ConnectionTracker::new(), PlanDraft::default());
        (console, outbound)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(OperatorCommand::parse("   ").unwrap(), None);
        assert_eq!(OperatorCommand::parse("run").unwrap(), Some(OperatorCommand::Run));
        assert_eq!(OperatorCommand::parse("abort  run-42 ").unwrap(), Some(OperatorCommand::Abort("run-42".into())));
        assert_eq!(
            OperatorCommand::parse("set params {\"a\": 1}").unwrap(),
            Some(OperatorCommand::Set { field: "params".into(), value: "{\"a\": 1}".into() })
        );
        assert!(matches!(OperatorCommand::parse("clear"), Err(ConsoleError::MissingArgument(_))));
        assert!(matches!(OperatorCommand::parse("set port"), Err(ConsoleError::MissingArgument("value"))));
        assert!(matches!(OperatorCommand::parse("launch"), Err(ConsoleError::UnknownCommand(_))));
    }

    #[test]
    fn test_run_sends_single_envelope_batch() {
        let (mut console, mut outbound) = console(3);
        console.execute(OperatorCommand::Run).unwrap();

        let batch = outbound.try_recv().unwrap();
        assert_eq!(batch.len(), 1);
        let plan = batch[0].run_plan.as_ref().unwrap();
        assert_eq!(plan.blocks[0].size, Some(9_990));
        assert_eq!(plan.opts.ramp_steps, Some(333));
    }

    #[test]
    fn test_run_without_generators_sends_nothing() {
        let (mut console, mut outbound) = console(0);
        let err = console.execute(OperatorCommand::Run).unwrap_err();

        assert_eq!(err.to_string(), "Effective size is invalid");
        assert!(outbound.try_recv().is_err());
    }

    #[test]
    fn test_size_follows_fleet_changes() {
        let (mut console, _outbound) = console(3);
        console.execute(OperatorCommand::Size("100".into())).unwrap();
        assert_eq!(console.sizing().effective_size, Some(90));

        console.state.lock().generators.remove("g0");
        assert_eq!(console.sizing().effective_size, Some(100));
    }

    #[test]
    fn test_abort_and_clear_are_forwarded() {
        let (mut console, mut outbound) = console(1);
        console.execute(OperatorCommand::Abort("run-1".into())).unwrap();
        console.execute(OperatorCommand::Clear("r1".into())).unwrap();

        assert_eq!(outbound.try_recv().unwrap(), vec![Envelope::abort_run("run-1")]);
        assert_eq!(outbound.try_recv().unwrap(), vec![Envelope::remove_report("r1")]);
    }
}
