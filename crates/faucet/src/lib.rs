//! Testnet faucet service
//!
//! Sends a fixed amount of test ETH to requested addresses:
//! - Address syntax validation (EIP-55 checksums)
//! - Per-client cooldown, keyed by network origin
//! - Transfers signed by a custodial wallet over JSON-RPC
//! - Prometheus metrics

pub mod admission;
pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod service;

pub use admission::{Admission, AdmissionFilter, Denial, GrantRecord, Reservation};
pub use config::FaucetConfig;
pub use error::{FaucetError, FaucetResult};
pub use ledger::{LedgerClient, RpcLedgerClient};
pub use metrics::FaucetMetrics;
pub use service::{DispenseResponse, FaucetService, WalletInfo};
