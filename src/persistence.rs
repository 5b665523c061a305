//! Background persistence of session state.
//!
//! Rounds are handed to a tokio task over an unbounded channel so settling a
//! round never waits on disk. Write failures are logged and counted; they never
//! reach the round path.

use crate::games::types::{GameType, RoundRecord};
use crate::metrics::FairnessMetrics;
use crate::seeds::SeedPair;
use crate::session_store::SessionStore;
use crate::stats::GameStats;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Most commands written per blocking hop
const MAX_BATCH: usize = 256;

#[derive(Debug)]
enum PersistCommand {
    Round(Box<RoundRecord>),
    SeedPair(Box<SeedPair>),
    Stats(GameType, Box<GameStats>),
    ClientSeed(String),
    Shutdown(oneshot::Sender<()>),
}

/// Cheap, cloneable submission side of the worker
#[derive(Clone)]
pub struct PersistenceHandle {
    sender: mpsc::UnboundedSender<PersistCommand>,
}

impl PersistenceHandle {
    fn send(&self, command: PersistCommand) {
        if self.sender.send(command).is_err() {
            tracing::warn!("Persistence worker stopped; dropping write");
        }
    }

    pub fn submit_round(&self, record: RoundRecord) {
        self.send(PersistCommand::Round(Box::new(record)));
    }

    pub fn submit_seed_pair(&self, pair: SeedPair) {
        self.send(PersistCommand::SeedPair(Box::new(pair)));
    }

    pub fn submit_stats(&self, game_type: GameType, stats: GameStats) {
        self.send(PersistCommand::Stats(game_type, Box::new(stats)));
    }

    pub fn submit_client_seed(&self, client_seed: String) {
        self.send(PersistCommand::ClientSeed(client_seed));
    }
}

pub struct PersistenceWorker {
    handle: PersistenceHandle,
    task: JoinHandle<()>,
}

impl PersistenceWorker {
    /// Start the worker on the current tokio runtime
    pub fn spawn(store: Arc<dyn SessionStore>, metrics: Option<FairnessMetrics>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<PersistCommand>();

        let task = tokio::spawn(async move {
            while let Some(first) = receiver.recv().await {
                let mut batch = vec![first];
                while batch.len() < MAX_BATCH {
                    match receiver.try_recv() {
                        Ok(command) => batch.push(command),
                        Err(_) => break,
                    }
                }

                let store = store.clone();
                let metrics = metrics.clone();
                let written = tokio::task::spawn_blocking(move || write_batch(store.as_ref(), metrics.as_ref(), batch)).await;

                match written {
                    Ok(acks) => {
                        let stop = !acks.is_empty();
                        for ack in acks {
                            let _ = ack.send(());
                        }
                        if stop {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Persistence batch panicked: {}", e),
                }
            }
            tracing::debug!("Persistence worker stopped");
        });

        Self {
            handle: PersistenceHandle { sender },
            task,
        }
    }

    pub fn handle(&self) -> PersistenceHandle {
        self.handle.clone()
    }

    /// Flush everything submitted so far, then stop the worker
    pub async fn shutdown(self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.handle.send(PersistCommand::Shutdown(ack_tx));
        let _ = ack_rx.await;
        let _ = self.task.await;
    }
}

/// Returns shutdown acknowledgements found in the batch
fn write_batch(
    store: &dyn SessionStore,
    metrics: Option<&FairnessMetrics>,
    batch: Vec<PersistCommand>,
) -> Vec<oneshot::Sender<()>> {
    let mut acks = Vec::new();
    for command in batch {
        let result = match command {
            PersistCommand::Round(record) => store.append_round(&record).map_err(|e| (format!("round {}", record.id), e)),
            PersistCommand::SeedPair(pair) => store
                .save_seed_pair(&pair)
                .map_err(|e| ("seed pair".to_string(), e)),
            PersistCommand::Stats(game_type, stats) => store
                .save_stats(game_type, &stats)
                .map_err(|e| (format!("{} stats", game_type), e)),
            PersistCommand::ClientSeed(seed) => store
                .save_client_seed(&seed)
                .map_err(|e| ("client seed".to_string(), e)),
            PersistCommand::Shutdown(ack) => {
                acks.push(ack);
                Ok(())
            }
        };

        if let Err((what, e)) = result {
            tracing::warn!(error = %e, "Failed to persist {}", what);
            if let Some(metrics) = metrics {
                metrics.record_persistence_failure();
            }
        }
    }
    acks
}
