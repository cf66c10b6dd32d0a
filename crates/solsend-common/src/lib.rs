//! solsend-common holds everything the `solsend` binary needs to move SOL:
//! key loading and conversion, transfer construction, the JSON-RPC client and
//! the websocket confirmation waiter.

pub mod config;
pub mod confirmation;
pub mod crypto;
pub mod errors;
pub mod pubsub;
pub mod rpc;
pub mod transfer;
pub mod utils;

pub use config::{ClientConfig, Cluster, Commitment};
pub use confirmation::{await_outcome, wait_for_confirmation, ConfirmationOutcome};
pub use crypto::{convert_base58_key, load_keypair_file, ConvertedKey, KeypairFile};
pub use errors::{Error, Result};
pub use rpc::{prepare_transfer, send_transfer, LedgerRpc, RpcClient};
