/**
 * ENTITY STORES - Mapping id → entité, un store par type (generators, runs, reports)
 *
 * RÔLE : Détient l'état synchronisé côté client. Seul le codec écrit dedans,
 * le rendu ne fait que lire.
 *
 * FONCTIONNEMENT :
 * - upsert_merge : fusion champ par champ (generators, runs)
 * - upsert_replace : remplacement complet (reports)
 * - remove : idempotent, aucun effet si l'id est absent
 * - chaque mutation notifie les listeners de façon synchrone avant de retourner
 */

use crate::models::{EntityKind, Merge};
use std::collections::HashMap;
use std::fmt;

/// Mutation observée par les listeners d'un store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Cleared,
    Upserted(String),
    Removed(String),
}

pub type ListenerId = u64;

type Listener = Box<dyn FnMut(EntityKind, &StoreChange) + Send>;

pub struct EntityStore<T> {
    kind: EntityKind,
    entries: HashMap<String, T>,
    order: Vec<String>, // ordre d'insertion, pour l'affichage
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: ListenerId,
}

impl<T> EntityStore<T> {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            order: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Enregistre un listener appelé après chaque mutation
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(EntityKind, &StoreChange) + Send + 'static,
    {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Vide le mapping (appelé une fois par `init`)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.emit(StoreChange::Cleared);
    }

    /// Stocke `full` en écrasant toute valeur précédente pour `id`
    pub fn upsert_replace(&mut self, id: &str, full: T) {
        if self.entries.insert(id.to_string(), full).is_none() {
            self.order.push(id.to_string());
        }
        self.emit(StoreChange::Upserted(id.to_string()));
    }

    /// Supprime l'entrée si présente. Retourne `false` (sans notifier) si absente.
    pub fn remove(&mut self, id: &str) -> bool {
        if self.entries.remove(id).is_none() {
            return false;
        }
        self.order.retain(|k| k != id);
        self.emit(StoreChange::Removed(id.to_string()));
        true
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Itère dans l'ordre d'insertion
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.entries.get(id).map(|v| (id.as_str(), v)))
    }

    /// Itère du plus récent au plus ancien (affichage des reports)
    pub fn iter_newest_first(&self) -> impl Iterator<Item = (&str, &T)> + '_ {
        self.order
            .iter()
            .rev()
            .filter_map(move |id| self.entries.get(id).map(|v| (id.as_str(), v)))
    }

    fn emit(&mut self, change: StoreChange) {
        let kind = self.kind;
        for (_, listener) in self.listeners.iter_mut() {
            listener(kind, &change);
        }
    }
}

impl<T: Merge + Default> EntityStore<T> {
    /// Insère `partial` si l'id est absent, sinon fusionne les champs présents
    pub fn upsert_merge(&mut self, id: &str, partial: T) {
        match self.entries.get_mut(id) {
            Some(existing) => existing.merge(partial),
            None => {
                let mut fresh = T::default();
                fresh.merge(partial);
                self.entries.insert(id.to_string(), fresh);
                self.order.push(id.to_string());
            }
        }
        self.emit(StoreChange::Upserted(id.to_string()));
    }
}

impl<T: fmt::Debug> fmt::Debug for EntityStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("kind", &self.kind)
            .field("entries", &self.entries)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
