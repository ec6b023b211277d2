//! Dimensionnement d'un plan à partir de la flotte connectée.
//!
//! Chaque générateur ajoute de la capacité par paquets de
//! [`DEVICES_PER_GENERATOR`] devices : la taille effective est toujours un
//! multiple du pas de rampe et ne dépasse jamais la taille demandée.

use crate::models::Generator;
use crate::store::EntityStore;

pub const DEVICES_PER_GENERATOR: u64 = 10;

/// Résultat du calcul. `ramp_steps` et `effective_size` valent `None` quand
/// la taille est indisponible (aucun générateur ou taille demandée absente).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sizing {
    pub ramp_step_size: u64,
    pub ramp_steps: Option<u64>,
    pub effective_size: Option<u64>,
}

impl Sizing {
    pub fn compute(generator_count: usize, desired_size: Option<u64>) -> Self {
        let ramp_step_size = generator_count as u64 * DEVICES_PER_GENERATOR;
        let ramp_steps = match desired_size {
            Some(desired) if ramp_step_size > 0 => Some(desired / ramp_step_size),
            _ => None,
        };
        Self {
            ramp_step_size,
            ramp_steps,
            effective_size: ramp_steps.map(|steps| steps * ramp_step_size),
        }
    }

    pub fn is_available(&self) -> bool {
        self.effective_size.is_some()
    }
}

/// Calculateur avec cache invalidé par la taille du store generators
/// ou par un changement de la taille demandée.
#[derive(Debug, Default)]
pub struct SizingCalculator {
    cached: Option<(usize, Option<u64>, Sizing)>,
}

impl SizingCalculator {
    pub fn new() -> Self {
        Self { cached: None }
    }

    pub fn sizing(&mut self, generators: &EntityStore<Generator>, desired_size: Option<u64>) -> Sizing {
        let key = (generators.len(), desired_size);
        match self.cached {
            Some((count, desired, sizing)) if (count, desired) == key => sizing,
            _ => {
                let sizing = Sizing::compute(key.0, key.1);
                self.cached = Some((key.0, key.1, sizing));
                sizing
            }
        }
    }
}
