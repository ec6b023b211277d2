//! Moteur de synchronisation de la console opérateur LoadGrid : stores
//! d'entités, codec du protocole, transport WebSocket et dimensionnement.

pub mod config;
pub mod console;
pub mod health;
pub mod models;
pub mod plan;
pub mod protocol;
pub mod sizing;
pub mod state;
pub mod store;
pub mod transport;
pub mod view;
