//! JSON-RPC request/response surface of the node and the submit flow built on it.

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{json, Value};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use tracing::{debug, info, warn};

use crate::{
    config::{ClientConfig, Commitment},
    errors::{Error, Result},
    transfer::build_transfer_transaction,
    utils::check_sufficient_funds,
};

/// The node calls a transfer needs
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn get_latest_blockhash(&self) -> Result<Hash>;

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64>;

    /// Submit a signed transaction. Returns as soon as the node accepts it.
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature>;
}

/// Solana JSON-RPC client over HTTP
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    rpc_url: String,
    commitment: Commitment,
}

impl RpcClient {
    pub fn new(rpc_url: impl Into<String>, commitment: Commitment) -> Self {
        let rpc_url = rpc_url.into();
        info!("Initializing Solana RPC client for {}", rpc_url);

        Self {
            client: reqwest::Client::new(),
            rpc_url,
            commitment,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.rpc_url(), config.commitment)
    }

    pub fn url(&self) -> &str {
        &self.rpc_url
    }

    /// Send a JSON-RPC request and return its `result` member
    async fn call(&self, method: &str, params: Value) -> std::result::Result<Value, String> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        debug!("RPC {} -> {}", method, self.rpc_url);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| format!("HTTP {}: failed to parse JSON response: {}", status, e))?;

        extract_result(body)
    }
}

#[async_trait]
impl LedgerRpc for RpcClient {
    async fn get_latest_blockhash(&self) -> Result<Hash> {
        let result = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment.as_str() }]),
            )
            .await
            .map_err(Error::BlockhashFetch)?;
        parse_blockhash(&result).map_err(Error::BlockhashFetch)
    }

    async fn get_balance(&self, pubkey: &Pubkey) -> Result<u64> {
        let result = self
            .call(
                "getBalance",
                json!([pubkey.to_string(), { "commitment": self.commitment.as_str() }]),
            )
            .await
            .map_err(Error::BalanceFetch)?;
        parse_balance(&result).map_err(Error::BalanceFetch)
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        let wire = encode_transaction(transaction)?;
        let result = self
            .call(
                "sendTransaction",
                json!([wire, {
                    "encoding": "base64",
                    "preflightCommitment": self.commitment.as_str(),
                }]),
            )
            .await
            .map_err(Error::Submission)?;

        let signature = parse_signature(&result).map_err(Error::Submission)?;
        if transaction.signatures.first() != Some(&signature) {
            warn!("Node returned signature {} for a different transaction", signature);
        }
        Ok(signature)
    }
}

/// Split a JSON-RPC 2.0 response into its result or a readable error
fn extract_result(mut body: Value) -> std::result::Result<Value, String> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(match error.get("code").and_then(Value::as_i64) {
            Some(code) => format!("RPC error {}: {}", code, message),
            None => format!("RPC error: {}", message),
        });
    }
    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(format!("response has neither result nor error: {}", body)),
    }
}

fn parse_blockhash(result: &Value) -> std::result::Result<Hash, String> {
    let blockhash = result
        .pointer("/value/blockhash")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing value.blockhash in {}", result))?;
    Hash::from_str(blockhash).map_err(|e| format!("invalid blockhash {}: {}", blockhash, e))
}

fn parse_balance(result: &Value) -> std::result::Result<u64, String> {
    result
        .get("value")
        .and_then(Value::as_u64)
        .ok_or_else(|| format!("missing value in {}", result))
}

fn parse_signature(result: &Value) -> std::result::Result<Signature, String> {
    let signature = result
        .as_str()
        .ok_or_else(|| format!("expected signature string, got {}", result))?;
    Signature::from_str(signature).map_err(|e| format!("invalid signature {}: {}", signature, e))
}

/// Wire form accepted by `sendTransaction` with `encoding: base64`
pub fn encode_transaction(transaction: &Transaction) -> Result<String> {
    let bytes = bincode::serialize(transaction)
        .map_err(|e| Error::Submission(format!("failed to serialize transaction: {}", e)))?;
    Ok(base64::encode(bytes))
}

/// Fetch the payer's balance and check it covers `lamports` plus `fee_buffer`.
///
/// Returns the balance. Nothing is submitted.
pub async fn prepare_transfer<R: LedgerRpc + ?Sized>(
    rpc: &R,
    payer: &Pubkey,
    lamports: u64,
    fee_buffer: u64,
) -> Result<u64> {
    let balance = rpc.get_balance(payer).await?;
    debug!("Balance of {}: {} lamports", payer, balance);
    check_sufficient_funds(balance, lamports, fee_buffer)?;
    Ok(balance)
}

/// Build, sign and submit a transfer against a fresh blockhash.
///
/// Does not wait for the transaction to land.
pub async fn send_transfer<R: LedgerRpc + ?Sized>(
    rpc: &R,
    payer: &Keypair,
    to: &Pubkey,
    lamports: u64,
) -> Result<Signature> {
    let blockhash = rpc.get_latest_blockhash().await?;
    debug!("Using blockhash {}", blockhash);

    let transaction = build_transfer_transaction(payer, to, lamports, blockhash)?;
    let signature = rpc.send_transaction(&transaction).await?;
    info!("Submitted transfer of {} lamports to {}: {}", lamports, to, signature);
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRpc {
        balance: u64,
        blockhash: Hash,
        reject_with: Option<String>,
        submitted: Mutex<Vec<Transaction>>,
    }

    #[async_trait]
    impl LedgerRpc for FakeRpc {
        async fn get_latest_blockhash(&self) -> Result<Hash> {
            Ok(self.blockhash)
        }

        async fn get_balance(&self, _pubkey: &Pubkey) -> Result<u64> {
            Ok(self.balance)
        }

        async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature> {
            if let Some(reason) = &self.reject_with {
                return Err(Error::Submission(reason.clone()));
            }
            self.submitted.lock().unwrap().push(transaction.clone());
            Ok(transaction.signatures[0])
        }
    }

    #[tokio::test]
    async fn test_prepare_transfer_sufficient() {
        let rpc = FakeRpc {
            balance: 2_500_000_000,
            ..Default::default()
        };
        let balance = prepare_transfer(&rpc, &Pubkey::new_unique(), 100_000_000, 5000)
            .await
            .unwrap();
        assert_eq!(balance, 2_500_000_000);
    }

    #[tokio::test]
    async fn test_prepare_transfer_insufficient() {
        let rpc = FakeRpc {
            balance: 90_000,
            ..Default::default()
        };
        let result = prepare_transfer(&rpc, &Pubkey::new_unique(), 100_000_000, 5000).await;

        assert!(matches!(
            result,
            Err(Error::InsufficientFunds {
                required: 100_005_000,
                available: 90_000
            })
        ));
        assert!(rpc.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_transfer_submits_signed_transaction() {
        let rpc = FakeRpc {
            blockhash: Hash::new_unique(),
            ..Default::default()
        };
        let payer = Keypair::new();
        let to = Pubkey::new_unique();

        let signature = send_transfer(&rpc, &payer, &to, 100_000_000).await.unwrap();

        let submitted = rpc.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let tx = &submitted[0];
        assert_eq!(tx.signatures[0], signature);
        assert_eq!(tx.message.recent_blockhash, rpc.blockhash);
        assert!(tx.verify().is_ok());
    }

    #[tokio::test]
    async fn test_send_transfer_surfaces_rejection() {
        let rpc = FakeRpc {
            reject_with: Some("RPC error -32002: Blockhash not found".to_string()),
            ..Default::default()
        };
        let result = send_transfer(&rpc, &Keypair::new(), &Pubkey::new_unique(), 1).await;
        assert!(matches!(result, Err(Error::Submission(msg)) if msg.contains("Blockhash not found")));
    }

    #[test]
    fn test_extract_result() {
        let ok = json!({"jsonrpc": "2.0", "id": 1, "result": 42});
        assert_eq!(extract_result(ok).unwrap(), json!(42));

        let err = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32002, "message": "Transaction simulation failed: Attempt to debit an account but found no record of a prior credit."}
        });
        let msg = extract_result(err).unwrap_err();
        assert!(msg.starts_with("RPC error -32002"));
        assert!(msg.contains("no record of a prior credit"));

        assert!(extract_result(json!({"jsonrpc": "2.0", "id": 1})).is_err());
    }

    #[test]
    fn test_parse_responses() {
        let hash = Hash::new_unique();
        let blockhash = json!({
            "context": {"slot": 2792},
            "value": {"blockhash": hash.to_string(), "lastValidBlockHeight": 3090}
        });
        assert_eq!(parse_blockhash(&blockhash).unwrap(), hash);
        assert!(parse_blockhash(&json!({"value": {}})).is_err());

        let balance = json!({"context": {"slot": 1}, "value": 2_500_000_000u64});
        assert_eq!(parse_balance(&balance).unwrap(), 2_500_000_000);
        assert!(parse_balance(&json!({"value": "lots"})).is_err());

        let signature = Signature::new_unique();
        assert_eq!(parse_signature(&json!(signature.to_string())).unwrap(), signature);
        assert!(parse_signature(&json!(12)).is_err());
    }

    #[test]
    fn test_encode_transaction() {
        let payer = Keypair::new();
        let tx = build_transfer_transaction(&payer, &Pubkey::new_unique(), 5, Hash::new_unique())
            .unwrap();
        let wire = encode_transaction(&tx).unwrap();
        let decoded: Transaction = bincode::deserialize(&base64::decode(wire).unwrap()).unwrap();
        assert_eq!(decoded, tx);
    }
}
