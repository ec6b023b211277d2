//! Brouillon de plan saisi par l'opérateur et validation avant envoi.
//!
//! La validation ne touche à aucun store : une erreur bloque l'envoi et
//! remonte un message à l'opérateur.

use crate::protocol::{Address, Block, PlanOpts, RunPlan};
use crate::sizing::Sizing;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SCRIPT: &str = "0..100 |> Enum.each(fn _ ->\n  get(\"/\")\n  delay(100, 0.1)\nend)";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("Name is invalid")]
    Name,
    #[error("Port is invalid")]
    Port,
    #[error("Effective size is invalid")]
    EffectiveSize,
    #[error("Ramp steps is invalid")]
    RampSteps,
    #[error("Rampdown duration is invalid")]
    RampdownDuration,
    #[error("Rampup duration is invalid")]
    RampupDuration,
    #[error("Sustain duration is invalid")]
    SustainDuration,
    #[error("Params are invalid")]
    Params,
    #[error("Unknown plan field: {0}")]
    UnknownField(String),
}

/// Champs du formulaire de plan. Les valeurs par défaut reprennent celles
/// de la console web.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanDraft {
    pub name: String,
    pub desired_size: Option<u64>,
    pub script: String,
    pub params: String, // texte JSON brut
    pub host: String,
    pub port: u16,
    pub rampup_secs: u64,
    pub sustain_secs: u64,
    pub rampdown_secs: u64,
}

impl Default for PlanDraft {
    fn default() -> Self {
        Self {
            name: "10K".into(),
            desired_size: Some(10_000),
            script: DEFAULT_SCRIPT.into(),
            params: "{ }".into(),
            host: "localhost".into(),
            port: 5000,
            rampup_secs: 900,
            sustain_secs: 900,
            rampdown_secs: 900,
        }
    }
}

impl PlanDraft {
    /// Met à jour un champ depuis une saisie texte
    pub fn set(&mut self, field: &str, value: &str) -> Result<(), PlanError> {
        let trimmed = value.trim();
        match field {
            "name" => self.name = trimmed.to_string(),
            // saisie non entière : taille absente, le dimensionnement devient indisponible
            "size" => self.desired_size = trimmed.parse().ok(),
            "script" => self.script = value.replace("\\n", "\n"),
            "params" => self.params = value.to_string(),
            "host" => self.host = trimmed.to_string(),
            "port" => self.port = trimmed.parse().map_err(|_| PlanError::Port)?,
            "rampup" => self.rampup_secs = trimmed.parse().map_err(|_| PlanError::RampupDuration)?,
            "sustain" => self.sustain_secs = trimmed.parse().map_err(|_| PlanError::SustainDuration)?,
            "rampdown" => self.rampdown_secs = trimmed.parse().map_err(|_| PlanError::RampdownDuration)?,
            other => return Err(PlanError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Valide le brouillon et construit le plan à envoyer
    pub fn build(&self, sizing: &Sizing) -> Result<RunPlan, PlanError> {
        if self.name.trim().is_empty() {
            return Err(PlanError::Name);
        }
        if self.port == 0 {
            return Err(PlanError::Port);
        }
        let size = match sizing.effective_size {
            Some(size) if size > 0 => size,
            _ => return Err(PlanError::EffectiveSize),
        };
        let ramp_steps = match sizing.ramp_steps {
            Some(steps) if steps > 0 => steps,
            _ => return Err(PlanError::RampSteps),
        };
        // durée par palier fractionnaire, seule une durée nulle est refusée
        let rampdown_step_ms = step_ms(self.rampdown_secs, ramp_steps);
        if rampdown_step_ms <= 0.0 {
            return Err(PlanError::RampdownDuration);
        }
        let rampup_step_ms = step_ms(self.rampup_secs, ramp_steps);
        if rampup_step_ms <= 0.0 {
            return Err(PlanError::RampupDuration);
        }
        let sustain_ms = self.sustain_secs.saturating_mul(1000);
        if sustain_ms == 0 {
            return Err(PlanError::SustainDuration);
        }
        let params: serde_json::Value =
            serde_json::from_str(&self.params).map_err(|_| PlanError::Params)?;

        Ok(RunPlan {
            name: self.name.clone(),
            blocks: vec![Block {
                script: Some(self.script.clone()),
                params: Some(params),
                size: Some(size),
            }],
            addresses: vec![Address {
                host: self.host.clone(),
                port: Some(self.port),
                protocol: None,
            }],
            opts: PlanOpts {
                ramp_steps: Some(ramp_steps),
                rampup_step_ms: Some(rampup_step_ms),
                sustain_ms: Some(sustain_ms),
                rampdown_step_ms: Some(rampdown_step_ms),
            },
            script: None,
        })
    }
}

fn step_ms(secs: u64, ramp_steps: u64) -> f64 {
    secs as f64 * 1000.0 / ramp_steps as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_draft_builds_with_three_generators() {
        let draft = PlanDraft::default();
        let plan = draft.build(&Sizing::compute(3, draft.desired_size)).unwrap();

        assert_eq!(plan.name, "10K");
        assert_eq!(plan.blocks[0].size, Some(9_990));
        assert_eq!(plan.blocks[0].params, Some(json!({})));
        assert_eq!(plan.addresses[0].port, Some(5000));
        assert_eq!(plan.opts.ramp_steps, Some(333));
        let step = plan.opts.rampup_step_ms.unwrap();
        assert!((step - 2_702.702).abs() < 0.001);
        assert_eq!(plan.opts.rampdown_step_ms, Some(step));
        assert_eq!(plan.opts.sustain_ms, Some(900_000));
        assert_eq!(plan.script, None);
    }

    #[test]
    fn test_zero_generators_rejects_effective_size() {
        let draft = PlanDraft::default();
        let err = draft.build(&Sizing::compute(0, draft.desired_size)).unwrap_err();
        assert_eq!(err, PlanError::EffectiveSize);
        assert_eq!(err.to_string(), "Effective size is invalid");
    }

    #[test]
    fn test_desired_below_step_rejects_effective_size() {
        let draft = PlanDraft { desired_size: Some(5), ..Default::default() };
        let err = draft.build(&Sizing::compute(1, draft.desired_size)).unwrap_err();
        assert_eq!(err, PlanError::EffectiveSize);
    }

    #[test]
    fn test_validation_order() {
        let sizing = Sizing::compute(3, Some(10_000));

        let draft = PlanDraft { name: "  ".into(), port: 0, ..Default::default() };
        assert_eq!(draft.build(&sizing), Err(PlanError::Name));

        let draft = PlanDraft { port: 0, ..Default::default() };
        assert_eq!(draft.build(&sizing), Err(PlanError::Port));

        let draft = PlanDraft { rampdown_secs: 0, rampup_secs: 0, ..Default::default() };
        assert_eq!(draft.build(&sizing), Err(PlanError::RampdownDuration));

        let draft = PlanDraft { rampup_secs: 0, ..Default::default() };
        assert_eq!(draft.build(&sizing), Err(PlanError::RampupDuration));

        let draft = PlanDraft { sustain_secs: 0, ..Default::default() };
        assert_eq!(draft.build(&sizing), Err(PlanError::SustainDuration));

        let draft = PlanDraft { params: "{ oops".into(), ..Default::default() };
        assert_eq!(draft.build(&sizing), Err(PlanError::Params));
    }

    #[test]
    fn test_sub_millisecond_steps_are_accepted() {
        // 10 000 paliers pour 5s de rampe : une demi-milliseconde par palier
        let sizing = Sizing::compute(1, Some(100_000));
        let draft = PlanDraft { rampup_secs: 5, rampdown_secs: 5, ..Default::default() };
        let plan = draft.build(&sizing).unwrap();
        assert_eq!(plan.opts.rampup_step_ms, Some(0.5));
        assert_eq!(plan.opts.rampdown_step_ms, Some(0.5));

        let draft = PlanDraft { rampup_secs: 0, ..Default::default() };
        assert_eq!(draft.build(&sizing), Err(PlanError::RampupDuration));
    }

    #[test]
    fn test_set_parses_operator_input() {
        let mut draft = PlanDraft::default();
        draft.set("port", " 8080 ").unwrap();
        draft.set("size", "2500").unwrap();
        draft.set("script", "get(\"/\")\\ndelay(10)").unwrap();

        assert_eq!(draft.port, 8080);
        assert_eq!(draft.desired_size, Some(2500));
        assert_eq!(draft.script, "get(\"/\")\ndelay(10)");

        assert_eq!(draft.set("port", "-1"), Err(PlanError::Port));
        assert_eq!(draft.set("sustain", "soon"), Err(PlanError::SustainDuration));
        assert_eq!(draft.set("colour", "red"), Err(PlanError::UnknownField("colour".into())));
        assert_eq!(draft.port, 8080);

        draft.set("size", "lots").unwrap();
        assert_eq!(draft.desired_size, None);
    }
}
