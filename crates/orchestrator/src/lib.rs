pub mod abi;
pub mod config;
pub mod error;
pub mod metadata;
pub mod orchestrator;
pub mod provider;
pub mod rpc;
pub mod service;
pub mod state;
pub mod testing;
pub mod validation;

pub use config::{create_example_config, OrchestratorConfig, RetryConfig};
pub use error::{OrchestratorError, OrchestratorResult};
pub use metadata::TokenMetadataCache;
pub use orchestrator::LaunchOrchestrator;
pub use provider::{ChainReader, Log, TxKind, TxReceipt, TxRequest, WalletProvider};
pub use rpc::JsonRpcProvider;
pub use service::{OrchestratorHandle, OrchestratorService};
pub use state::{transition, Effect, LaunchEvent, LaunchSettings, LaunchSnapshot, LaunchState, StepContext, SubmittedTx};
pub use testing::InMemoryChain;
pub use validation::{validate, Preflight, ValidatedLaunch};
