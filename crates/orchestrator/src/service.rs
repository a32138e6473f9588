//! Background task owning an orchestrator, driven through a handle

use std::future::Future;

use launchpad_types::LaunchRequest;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::orchestrator::LaunchOrchestrator;
use crate::provider::{ChainReader, WalletProvider};
use crate::state::LaunchSnapshot;

const COMMAND_BUFFER: usize = 16;

#[derive(Debug)]
enum Command {
    Start(Box<LaunchRequest>),
    Reset,
}

/// Handle to a spawned orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<LaunchSnapshot>,
}

pub struct OrchestratorService;

impl OrchestratorService {
    /// Move `orchestrator` into a task and return a handle to it.
    ///
    /// The task exits once every handle is dropped.
    pub fn spawn<W, R>(mut orchestrator: LaunchOrchestrator<W, R>) -> (OrchestratorHandle, JoinHandle<()>)
    where
        W: WalletProvider + 'static,
        R: ChainReader + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(orchestrator.snapshot());
        orchestrator.observe(snapshot_tx);

        let task = tokio::spawn(serve(orchestrator, command_rx));
        (OrchestratorHandle { commands: command_tx, snapshots: snapshot_rx }, task)
    }
}

async fn serve<W: WalletProvider, R: ChainReader>(
    mut orchestrator: LaunchOrchestrator<W, R>,
    mut commands: mpsc::Receiver<Command>,
) {
    info!("Orchestrator service started");
    while let Some(command) = commands.recv().await {
        match command {
            Command::Reset => orchestrator.reset(),
            Command::Start(request) => drive(&mut orchestrator, *request, &mut commands).await,
        }
    }
    info!("Orchestrator service stopped");
}

/// Run one launch, abandoning it if a reset arrives while waiting
async fn drive<W: WalletProvider, R: ChainReader>(
    orchestrator: &mut LaunchOrchestrator<W, R>,
    request: LaunchRequest,
    commands: &mut mpsc::Receiver<Command>,
) {
    let Some(preflight) = until_interrupted(orchestrator.preflight(&request), commands).await else {
        orchestrator.reset();
        return;
    };

    let mut effect = orchestrator.start(request, preflight);
    while let Some(current) = effect {
        let Some(event) = until_interrupted(orchestrator.execute(current), commands).await else {
            orchestrator.reset();
            return;
        };
        effect = orchestrator.apply(event);
    }
    debug!(phase = %orchestrator.state().phase(), "Launch run finished");
}

/// Await `work`, handling commands that arrive meanwhile. Returns `None` when
/// a reset (or closed channel) interrupts it.
async fn until_interrupted<F: Future>(work: F, commands: &mut mpsc::Receiver<Command>) -> Option<F::Output> {
    tokio::pin!(work);
    loop {
        tokio::select! {
            output = &mut work => return Some(output),
            command = commands.recv() => match command {
                Some(Command::Start(_)) => warn!("Launch already in progress, ignoring start"),
                Some(Command::Reset) => {
                    info!("Reset requested, abandoning in-flight step");
                    return None;
                }
                None => return None,
            },
        }
    }
}

impl OrchestratorHandle {
    pub async fn start(&self, request: LaunchRequest) -> OrchestratorResult<()> {
        self.commands
            .send(Command::Start(Box::new(request)))
            .await
            .map_err(|_| OrchestratorError::ServiceStopped)
    }

    pub async fn reset(&self) -> OrchestratorResult<()> {
        self.commands.send(Command::Reset).await.map_err(|_| OrchestratorError::ServiceStopped)
    }

    pub fn snapshot(&self) -> LaunchSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LaunchSnapshot> {
        self.snapshots.clone()
    }

    /// Wait for the current run to reach `COMPLETED` or `FAILED`
    pub async fn wait_for_outcome(&self) -> OrchestratorResult<LaunchSnapshot> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| snapshot.is_finished())
            .await
            .map_err(|_| OrchestratorError::ServiceStopped)?;
        Ok(snapshot.clone())
    }
}
