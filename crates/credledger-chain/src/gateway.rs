//! # Contract Gateway
//!
//! [`CredentialLedger`] over a wallet [`Session`]: reads go out as
//! `eth_call`, writes as `eth_sendTransaction` from the session's account,
//! confirmation polls `eth_getTransactionReceipt`, and verification events
//! come from `eth_getLogs` filtered on the contract and event topic.

use std::time::Duration;

use async_trait::async_trait;
use credledger_core::{Address, CredentialRequest, RequestId, ShareId, SharedCredential, TxHash};
use serde_json::{json, Value};

use crate::abi::{encode_call, from_hex_data, quantity, Decoder, Token};
use crate::connector::{Session, Signer};
use crate::contract::{decode_request, decode_share, selector, CREDENTIAL_VERIFIED_TOPIC};
use crate::error::ChainError;
use crate::ledger::{CredentialLedger, CredentialVerified, EventCursor, TxReceipt};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Typed handle on the deployed credential contract.
#[derive(Debug, Clone)]
pub struct ContractGateway {
    signer: Signer,
    contract: Address,
    poll_interval: Duration,
}

impl ContractGateway {
    /// Bind the contract at `contract` to `session`'s signer.
    ///
    /// The interface description is compiled in, so binding cannot fail.
    pub fn bind(session: &Session, contract: Address) -> Self {
        Self {
            signer: session.signer(),
            contract,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Interval between receipt polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    async fn read(&self, operation: &str, data: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        self.signer.call(&self.contract, &data, operation).await
    }

    async fn read_uint(&self, operation: &str, sel: [u8; 4]) -> Result<u64, ChainError> {
        let out = self.read(operation, encode_call(sel, &[])).await?;
        Decoder::new(&out)
            .uint(0)
            .map_err(|e| ChainError::decode(operation, e))
    }

    async fn write(&self, operation: &str, data: Vec<u8>) -> Result<TxHash, ChainError> {
        self.signer.send_transaction(&self.contract, &data, operation).await
    }
}

#[async_trait]
impl CredentialLedger for ContractGateway {
    fn account(&self) -> Address {
        self.signer.address()
    }

    async fn request_count(&self) -> Result<u64, ChainError> {
        self.read_uint("requestCount", selector::REQUEST_COUNT).await
    }

    async fn shared_credential_count(&self) -> Result<u64, ChainError> {
        self.read_uint("sharedCredentialCount", selector::SHARED_CREDENTIAL_COUNT)
            .await
    }

    async fn request(&self, id: RequestId) -> Result<CredentialRequest, ChainError> {
        let out = self
            .read("requests", encode_call(selector::REQUESTS, &[Token::Uint(id.get())]))
            .await?;
        decode_request(&Decoder::new(&out)).map_err(|e| ChainError::decode("requests", e))
    }

    async fn shared_credential(&self, id: ShareId) -> Result<SharedCredential, ChainError> {
        let out = self
            .read(
                "sharedCredentials",
                encode_call(selector::SHARED_CREDENTIALS, &[Token::Uint(id.get())]),
            )
            .await?;
        decode_share(&Decoder::new(&out)).map_err(|e| ChainError::decode("sharedCredentials", e))
    }

    async fn credential_by_id(&self, id: RequestId) -> Result<CredentialRequest, ChainError> {
        let out = self
            .read(
                "getCredentialById",
                encode_call(selector::GET_CREDENTIAL_BY_ID, &[Token::Uint(id.get())]),
            )
            .await?;
        Decoder::new(&out)
            .tuple(0)
            .and_then(|inner| decode_request(&inner))
            .map_err(|e| ChainError::decode("getCredentialById", e))
    }

    async fn request_credential(
        &self,
        credential_type: &str,
        enrollment_number: &str,
        verifier: &Address,
    ) -> Result<TxHash, ChainError> {
        let data = encode_call(
            selector::REQUEST_CREDENTIAL,
            &[
                Token::String(credential_type.to_string()),
                Token::String(enrollment_number.to_string()),
                Token::Address(*verifier),
            ],
        );
        self.write("requestCredential", data).await
    }

    async fn approve_credential(&self, id: RequestId, notes: &str) -> Result<TxHash, ChainError> {
        let data = encode_call(
            selector::APPROVE_CREDENTIAL,
            &[Token::Uint(id.get()), Token::String(notes.to_string())],
        );
        self.write("approveCredential", data).await
    }

    async fn share_credential(
        &self,
        id: RequestId,
        recipient: &Address,
        document_type: &str,
    ) -> Result<TxHash, ChainError> {
        let data = encode_call(
            selector::SHARE_CREDENTIAL,
            &[
                Token::Uint(id.get()),
                Token::Address(*recipient),
                Token::String(document_type.to_string()),
            ],
        );
        self.write("shareCredential", data).await
    }

    async fn verify_shared_credential(&self, id: ShareId) -> Result<TxHash, ChainError> {
        let data = encode_call(selector::VERIFY_SHARED_CREDENTIAL, &[Token::Uint(id.get())]);
        self.write("verifySharedCredential", data).await
    }

    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<TxReceipt, ChainError> {
        self.signer.wait_for_receipt(tx_hash, self.poll_interval).await
    }

    async fn event_cursor(&self) -> Result<EventCursor, ChainError> {
        Ok(EventCursor(self.signer.block_number().await? + 1))
    }

    async fn verified_events_since(
        &self,
        cursor: EventCursor,
    ) -> Result<(Vec<CredentialVerified>, EventCursor), ChainError> {
        let latest = self.signer.block_number().await?;
        if latest < cursor.0 {
            return Ok((Vec::new(), cursor));
        }

        let logs = self
            .signer
            .get_logs(json!({
                "address": self.contract.to_hex(),
                "topics": [CREDENTIAL_VERIFIED_TOPIC],
                "fromBlock": quantity(cursor.0),
                "toBlock": quantity(latest),
            }))
            .await?;

        let events = logs
            .iter()
            .map(parse_verified_log)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(
            from = cursor.0,
            to = latest,
            events = events.len(),
            "polled verification events"
        );
        Ok((events, EventCursor(latest + 1)))
    }
}

/// Decode a `CredentialVerified` log, whether or not its parameters were
/// declared `indexed`.
fn parse_verified_log(log: &Value) -> Result<CredentialVerified, ChainError> {
    let decode_err = |detail: String| ChainError::Decode {
        operation: "CredentialVerified".into(),
        detail,
    };
    let hex_field = |raw: Option<&Value>| -> Result<Vec<u8>, ChainError> {
        let raw = raw
            .and_then(Value::as_str)
            .ok_or_else(|| decode_err(format!("log field missing in {log}")))?;
        from_hex_data(raw).map_err(|e| ChainError::decode("CredentialVerified", e))
    };

    let topics = log
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| decode_err("log has no topics".into()))?;

    // Indexed parameters move from the data section into topics 1.. in order.
    let mut words = Vec::with_capacity(64);
    for topic in topics.iter().skip(1) {
        words.extend(hex_field(Some(topic))?);
    }
    words.extend(hex_field(log.get("data"))?);

    let dec = Decoder::new(&words);
    let share_id = dec
        .uint(0)
        .map_err(|e| ChainError::decode("CredentialVerified", e))?;
    let share_id = ShareId::new(share_id).map_err(|e| decode_err(e.to_string()))?;
    let verifier = dec
        .address(1)
        .map_err(|e| ChainError::decode("CredentialVerified", e))?;

    Ok(CredentialVerified { share_id, verifier })
}
