/**
 * LOADGRID CONSOLE - Point d'entrée de la console opérateur
 *
 * RÔLE : Bootstrap config, stores, transport WebSocket, rendu et commandes.
 * Le transport est le seul écrivain des stores ; le rendu et les commandes
 * ne font que lire.
 *
 * ARCHITECTURE : tâche transport + tâche de rendu throttlée + boucle stdin.
 */

use anyhow::{Context, Result};
use loadgrid_console::config::load_config;
use loadgrid_console::console::{Console, OperatorCommand};
use loadgrid_console::health::ConnectionTracker;
use loadgrid_console::state::{new_state, FleetState};
use loadgrid_console::transport::spawn_transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    // logs sur stderr, stdout reste au rendu
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loadgrid_console=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cfg = load_config().await;
    let endpoint = cfg.resolve_endpoint().context("Failed to resolve control-plane endpoint")?;
    info!("[console] control plane at {endpoint}");

    // les listeners tournent sous le verrou : ils se contentent de signaler
    let dirty = Arc::new(Notify::new());
    let mut fleet = FleetState::new();
    let d = dirty.clone();
    fleet.subscribe_all(move |_, _| d.notify_one());
    let state = new_state(fleet);

    let tracker = ConnectionTracker::new();
    let (commands, transport) = spawn_transport(
        endpoint,
        state.clone(),
        tracker.clone(),
        Duration::from_millis(cfg.reconnect_delay_ms),
    );

    let mut console = Console::new(state.clone(), commands, tracker.clone(), cfg.plan.clone());

    // rendu throttlé : au plus un redraw par intervalle
    let render_state = state.clone();
    let render_tracker = tracker.clone();
    let render_interval = Duration::from_millis(cfg.render_interval_ms.max(1));
    let renderer = tokio::spawn(async move {
        loop {
            dirty.notified().await;
            let frame = {
                let health = render_tracker.get_health();
                loadgrid_console::view::render_fleet(&render_state.lock(), &health)
            };
            println!("{frame}");
            tokio::time::sleep(render_interval).await;
        }
    });

    println!("{}", loadgrid_console::console::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let command = match OperatorCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        let quit = command == OperatorCommand::Quit;
        match console.execute(command) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                warn!("[console] command failed: {e}");
                println!("{e}");
            }
        }
        if quit {
            break;
        }
    }

    renderer.abort();
    transport.abort();
    info!("[console] stopped");
    Ok(())
}
