//! Ledger access: the custodial wallet that signs and broadcasts transfers.

use crate::error::{FaucetError, FaucetResult};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use keccak_hash::keccak;
use rlp::RlpStream;
use sepolia_common::units::parse_ether;
use sepolia_common::Address;
use serde_json::Value;
use tracing::{debug, info};

/// Capability to send value from the faucet wallet.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address of the custodial wallet
    fn address(&self) -> FaucetResult<Address>;

    /// Send `amount` ether to `to`, returning the transaction hash
    async fn transfer(&self, to: &Address, amount: &str) -> FaucetResult<String>;
}

/// Decode a hex private key into a secp256k1 signing key
pub fn signing_key_from_hex(hex_key: &str) -> FaucetResult<SigningKey> {
    let stripped = hex_key.trim().strip_prefix("0x").unwrap_or(hex_key.trim());
    let bytes = hex::decode(stripped)
        .map_err(|e| FaucetError::Config(format!("Invalid private key: {}", e)))?;

    if bytes.len() != 32 {
        return Err(FaucetError::Config(format!(
            "Invalid private key: expected 32 bytes, got {}",
            bytes.len()
        )));
    }

    SigningKey::from_slice(&bytes)
        .map_err(|e| FaucetError::Config(format!("Invalid signing key: {}", e)))
}

/// Derive the account address controlled by a signing key
pub fn derive_address(signing_key: &SigningKey) -> Address {
    let public_key = signing_key.verifying_key();
    let pub_key_bytes = public_key.to_encoded_point(false);
    let hash = keccak(&pub_key_bytes.as_bytes()[1..]); // Skip the 0x04 tag
    let mut addr_bytes = [0u8; 20];
    addr_bytes.copy_from_slice(&hash.0[12..]);
    Address(addr_bytes)
}

/// Pre-EIP-1559 value transfer with an empty data field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
}

impl LegacyTransaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        stream.append(&self.to.0.to_vec());
        stream.append(&self.value);
        stream.append_empty_data();
    }

    /// EIP-155 signing hash
    pub fn signing_hash(&self, chain_id: u64) -> [u8; 32] {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
        keccak(stream.out()).0
    }

    /// Sign and RLP-encode for `eth_sendRawTransaction`
    pub fn sign(&self, signing_key: &SigningKey, chain_id: u64) -> FaucetResult<Vec<u8>> {
        let hash = self.signing_hash(chain_id);
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&hash)
            .map_err(|e| FaucetError::Internal(format!("Signing failed: {}", e)))?;

        let v = chain_id * 2 + 35 + u64::from(recovery_id.to_byte());
        let r = signature.r().to_bytes();
        let s = signature.s().to_bytes();

        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&v);
        stream.append(&trim_leading_zeros(&r).to_vec());
        stream.append(&trim_leading_zeros(&s).to_vec());
        Ok(stream.out().to_vec())
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn parse_quantity(method: &str, value: &Value) -> FaucetResult<u128> {
    let text = value
        .as_str()
        .ok_or_else(|| FaucetError::Rpc(format!("{} returned a non-string result", method)))?;
    u128::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|e| FaucetError::Rpc(format!("{} returned {:?}: {}", method, text, e)))
}

/// Ledger client backed by an Ethereum JSON-RPC endpoint; transactions are signed locally.
pub struct RpcLedgerClient {
    rpc_url: String,
    client: reqwest::Client,
    signing_key: SigningKey,
    address: Address,
    gas_limit: u64,
}

impl RpcLedgerClient {
    pub fn new(rpc_url: String, private_key: &str, gas_limit: u64) -> FaucetResult<Self> {
        let signing_key = signing_key_from_hex(private_key)?;
        let address = derive_address(&signing_key);
        info!("Faucet address: {}", address);

        Ok(Self {
            rpc_url,
            client: reqwest::Client::new(),
            signing_key,
            address,
            gas_limit,
        })
    }

    async fn call(&self, method: &str, params: Value) -> FaucetResult<Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| FaucetError::Rpc(format!("{} request failed: {}", method, e)))?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| FaucetError::Rpc(format!("{} invalid response: {}", method, e)))?;

        if let Some(error) = json.get("error") {
            return Err(FaucetError::Rpc(format!("{}: {}", method, error)));
        }

        Ok(json.get("result").cloned().unwrap_or(Value::Null))
    }

    pub async fn chain_id(&self) -> FaucetResult<u64> {
        let result = self.call("eth_chainId", serde_json::json!([])).await?;
        let chain_id = parse_quantity("eth_chainId", &result)?;
        u64::try_from(chain_id).map_err(|_| FaucetError::Rpc("chain id out of range".to_string()))
    }

    pub async fn gas_price(&self) -> FaucetResult<u128> {
        let result = self.call("eth_gasPrice", serde_json::json!([])).await?;
        parse_quantity("eth_gasPrice", &result)
    }

    pub async fn pending_nonce(&self) -> FaucetResult<u64> {
        let result = self
            .call(
                "eth_getTransactionCount",
                serde_json::json!([self.address.to_hex(), "pending"]),
            )
            .await?;
        let nonce = parse_quantity("eth_getTransactionCount", &result)?;
        u64::try_from(nonce).map_err(|_| FaucetError::Rpc("nonce out of range".to_string()))
    }

    pub async fn send_raw_transaction(&self, raw_tx: &[u8]) -> FaucetResult<String> {
        let result = self
            .call(
                "eth_sendRawTransaction",
                serde_json::json!([format!("0x{}", hex::encode(raw_tx))]),
            )
            .await?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    fn address(&self) -> FaucetResult<Address> {
        Ok(self.address)
    }

    async fn transfer(&self, to: &Address, amount: &str) -> FaucetResult<String> {
        let value = parse_ether(amount)?;
        let chain_id = self.chain_id().await?;
        let gas_price = self.gas_price().await?;
        let nonce = self.pending_nonce().await?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit: self.gas_limit,
            to: *to,
            value,
        };
        debug!(chain_id, nonce, gas_price = %gas_price, to = %to, "Signing transfer");

        let raw = tx.sign(&self.signing_key, chain_id)?;
        let local_hash = format!("0x{}", hex::encode(keccak(&raw).0));

        let tx_hash = self.send_raw_transaction(&raw).await?;
        if tx_hash.is_empty() {
            return Ok(local_hash);
        }

        info!("Transaction sent: {}", tx_hash);
        Ok(tx_hash)
    }
}
