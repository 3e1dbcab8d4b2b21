//! Shared primitives for the Sepolia faucet workspace.

pub mod address;
pub mod error;
pub mod types;
pub mod units;
pub mod utils;

pub use address::{is_address, parse_address, to_checksum};
pub use error::{CommonError, Result};
pub use types::{Address, TxHash};
