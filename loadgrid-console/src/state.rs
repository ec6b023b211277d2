use crate::models::{EntityKind, Generator, Report, Run};
use crate::store::{EntityStore, StoreChange};
use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Racine de composition : les trois stores, écrits par le codec,
/// lus par le rendu.
#[derive(Debug)]
pub struct FleetState {
    pub generators: EntityStore<Generator>,
    pub runs: EntityStore<Run>,
    pub reports: EntityStore<Report>,
}

impl FleetState {
    pub fn new() -> Self {
        Self {
            generators: EntityStore::new(EntityKind::Generator),
            runs: EntityStore::new(EntityKind::Run),
            reports: EntityStore::new(EntityKind::Report),
        }
    }

    /// Abonne le même listener aux trois stores
    pub fn subscribe_all<F>(&mut self, listener: F)
    where
        F: Fn(EntityKind, &StoreChange) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let l = listener.clone();
        self.generators.subscribe(move |kind, change| l(kind, change));
        let l = listener.clone();
        self.runs.subscribe(move |kind, change| l(kind, change));
        self.reports.subscribe(move |kind, change| listener(kind, change));
    }
}

impl Default for FleetState {
    fn default() -> Self {
        Self::new()
    }
}
