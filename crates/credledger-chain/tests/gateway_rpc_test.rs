//! Contract tests for ContractGateway against a mocked JSON-RPC endpoint.
//!
//! ## Calls Tested
//!
//! | JSON-RPC method | Contract function | Test |
//! |-----------------|-------------------|------|
//! | `eth_call` | `requestCount()` | `reads_request_count` |
//! | `eth_call` | `requests(uint256)` | `reads_flattened_request` |
//! | `eth_call` | `getCredentialById(uint256)` | `reads_credential_by_id` |
//! | `eth_sendTransaction` + receipt | `approveCredential(uint256,string)` | `approve_*` |
//! | `eth_getLogs` | `CredentialVerified` | `polls_verification_events` |
//!
//! Reads retry transient HTTP statuses (`read_recovers_after_transient_status`);
//! transactions are sent once (`transaction_is_not_resent_on_transient_status`).

use credledger_chain::abi::{encode_tokens, to_hex_data, Token, ERROR_STRING_SELECTOR};
use credledger_chain::contract::{selector, CREDENTIAL_VERIFIED_TOPIC};
use credledger_chain::{
    ChainConnector, ChainError, ContractGateway, CredentialLedger, EventCursor, LedgerConfig,
};
use credledger_core::{Address, RequestId, ShareId, TxHash};
use serde_json::{json, Value};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

const ACCOUNT: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const VERIFIER: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

/// Matches a JSON-RPC request by method and, for calls and transactions,
/// by the function selector at the front of `params[0].data`.
struct RpcCall {
    method: &'static str,
    selector: Option<[u8; 4]>,
}

impl Match for RpcCall {
    fn matches(&self, request: &Request) -> bool {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return false;
        };
        if body["method"] != self.method {
            return false;
        }
        match self.selector {
            None => true,
            Some(sel) => body["params"][0]["data"]
                .as_str()
                .is_some_and(|data| data.starts_with(&to_hex_data(&sel))),
        }
    }
}

fn rpc(method: &'static str) -> RpcCall {
    RpcCall {
        method,
        selector: None,
    }
}

fn contract_call(method: &'static str, sel: [u8; 4]) -> RpcCall {
    RpcCall {
        method,
        selector: Some(sel),
    }
}

fn result(value: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": value }))
}

fn rpc_error(code: i64, message: &str, data: Option<Value>) -> ResponseTemplate {
    let mut error = json!({ "code": code, "message": message });
    if let Some(data) = data {
        error["data"] = data;
    }
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "error": error }))
}

fn request_tokens(approved: bool) -> Vec<Token> {
    vec![
        Token::Uint(1),
        Token::String("Degree".into()),
        Token::String("EN123".into()),
        Token::Address(Address::parse(ACCOUNT).unwrap()),
        Token::Address(Address::parse(VERIFIER).unwrap()),
        Token::Bool(approved),
        Token::FixedBytes(if approved { [0x42; 32] } else { [0; 32] }),
        Token::String(if approved { "looks good".into() } else { String::new() }),
    ]
}

/// Mount the connection handshake and return a gateway bound to the server.
async fn connected_gateway(server: &MockServer) -> ContractGateway {
    Mock::given(rpc("eth_requestAccounts"))
        .respond_with(result(json!([ACCOUNT])))
        .mount(server)
        .await;
    Mock::given(rpc("eth_chainId"))
        .respond_with(result(json!("0x7a69")))
        .mount(server)
        .await;

    let config = LedgerConfig::local_mock(&server.uri()).unwrap();
    let session = ChainConnector::from_config(&config)
        .unwrap()
        .connect()
        .await
        .unwrap();
    ContractGateway::bind(&session, config.contract_address).with_poll_interval(config.poll_interval)
}

// ── Reads ────────────────────────────────────────────────────────────

#[tokio::test]
async fn reads_request_count() {
    let server = MockServer::start().await;
    let gateway = connected_gateway(&server).await;

    Mock::given(contract_call("eth_call", selector::REQUEST_COUNT))
        .respond_with(result(json!(to_hex_data(&encode_tokens(&[Token::Uint(3)])))))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(gateway.request_count().await.unwrap(), 3);
    assert_eq!(gateway.account(), Address::parse(ACCOUNT).unwrap());
}

#[tokio::test]
async fn reads_flattened_request() {
    let server = MockServer::start().await;
    let gateway = connected_gateway(&server).await;

    Mock::given(contract_call("eth_call", selector::REQUESTS))
        .respond_with(result(json!(to_hex_data(&encode_tokens(&request_tokens(false))))))
        .mount(&server)
        .await;

    let req = gateway.request(RequestId::new(1).unwrap()).await.unwrap();
    assert_eq!(req.credential_type, "Degree");
    assert_eq!(req.verifier_id, Address::parse(VERIFIER).unwrap());
    assert!(!req.approved);
    assert!(!req.credential_id.is_assigned());
}

#[tokio::test]
async fn reads_credential_by_id() {
    let server = MockServer::start().await;
    let gateway = connected_gateway(&server).await;

    let mut encoded = encode_tokens(&[Token::Uint(32)]);
    encoded.extend(encode_tokens(&request_tokens(true)));
    Mock::given(contract_call("eth_call", selector::GET_CREDENTIAL_BY_ID))
        .respond_with(result(json!(to_hex_data(&encoded))))
        .mount(&server)
        .await;

    let req = gateway
        .credential_by_id(RequestId::new(1).unwrap())
        .await
        .unwrap();
    assert!(req.approved);
    assert!(req.credential_id.is_assigned());
    assert_eq!(req.verifier_notes, "looks good");
}

#[tokio::test]
async fn malformed_read_is_decode_error() {
    let server = MockServer::start().await;
    let gateway = connected_gateway(&server).await;

    Mock::given(contract_call("eth_call", selector::SHARED_CREDENTIALS))
        .respond_with(result(json!("0x1234")))
        .mount(&server)
        .await;

    let err = gateway
        .shared_credential(ShareId::new(1).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Decode { .. }), "got {err:?}");
}

#[tokio::test]
async fn persistent_server_error_is_unavailable_after_retries() {
    let server = MockServer::start().await;
    let gateway = connected_gateway(&server).await;

    // One attempt plus the three retries of the mock configuration.
    Mock::given(contract_call("eth_call", selector::SHARED_CREDENTIAL_COUNT))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let err = gateway.shared_credential_count().await.unwrap_err();
    assert!(matches!(err, ChainError::Unavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn read_recovers_after_transient_status() {
    let server = MockServer::start().await;
    let gateway = connected_gateway(&server).await;

    Mock::given(contract_call("eth_call", selector::REQUEST_COUNT))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(contract_call("eth_call", selector::REQUEST_COUNT))
        .respond_with(result(json!(to_hex_data(&encode_tokens(&[Token::Uint(2)])))))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(gateway.request_count().await.unwrap(), 2);
}

#[tokio::test]
async fn transaction_is_not_resent_on_transient_status() {
    let server = MockServer::start().await;
    let gateway = connected_gateway(&server).await;

    Mock::given(contract_call("eth_sendTransaction", selector::APPROVE_CREDENTIAL))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway
        .approve_credential(RequestId::new(1).unwrap(), "ok")
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Unavailable(_)), "got {err:?}");
}

// ── Writes ───────────────────────────────────────────────────────────

#[tokio::test]
async fn approve_submits_and_confirms() {
    let server = MockServer::start().await;
    let gateway = connected_gateway(&server).await;
    let tx_hex = format!("0x{}", "ab".repeat(32));

    Mock::given(contract_call("eth_sendTransaction", selector::APPROVE_CREDENTIAL))
        .respond_with(result(json!(tx_hex)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(rpc("eth_getTransactionReceipt"))
        .respond_with(result(json!({
            "transactionHash": tx_hex,
            "status": "0x1",
            "blockNumber": "0x2a",
        })))
        .mount(&server)
        .await;

    let tx = gateway
        .approve_credential(RequestId::new(1).unwrap(), "looks good")
        .await
        .unwrap();
    assert_eq!(tx, TxHash::parse(&tx_hex).unwrap());

    let receipt = gateway.wait_for_confirmation(&tx).await.unwrap();
    assert_eq!(receipt.block_number, 42);
}

#[tokio::test]
async fn approve_rejected_with_revert_reason() {
    let server = MockServer::start().await;
    let gateway = connected_gateway(&server).await;

    let mut payload = ERROR_STRING_SELECTOR.to_vec();
    payload.extend(encode_tokens(&[Token::String(
        "Only the designated verifier can approve".into(),
    )]));
    Mock::given(contract_call("eth_sendTransaction", selector::APPROVE_CREDENTIAL))
        .respond_with(rpc_error(
            -32603,
            "execution reverted",
            Some(json!(to_hex_data(&payload))),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway
        .approve_credential(RequestId::new(1).unwrap(), "looks good")
        .await
        .unwrap_err();
    assert_eq!(err.reason(), Some("Only the designated verifier can approve"));
}

#[tokio::test]
async fn disconnected_session_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(rpc("eth_requestAccounts"))
        .respond_with(result(json!([ACCOUNT])))
        .mount(&server)
        .await;
    Mock::given(rpc("eth_chainId"))
        .respond_with(result(json!("0x7a69")))
        .mount(&server)
        .await;
    Mock::given(rpc("eth_sendTransaction"))
        .respond_with(result(json!(format!("0x{}", "cd".repeat(32)))))
        .expect(0)
        .mount(&server)
        .await;

    let config = LedgerConfig::local_mock(&server.uri()).unwrap();
    let session = ChainConnector::from_config(&config)
        .unwrap()
        .connect()
        .await
        .unwrap();
    let gateway = ContractGateway::bind(&session, config.contract_address);
    session.disconnect();

    let err = gateway
        .verify_shared_credential(ShareId::new(1).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Disconnected));
}

// ── Events ───────────────────────────────────────────────────────────

#[tokio::test]
async fn polls_verification_events() {
    let server = MockServer::start().await;
    let gateway = connected_gateway(&server).await;

    Mock::given(rpc("eth_blockNumber"))
        .respond_with(result(json!("0x10")))
        .mount(&server)
        .await;
    Mock::given(rpc("eth_getLogs"))
        .respond_with(result(json!([{
            "address": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "topics": [CREDENTIAL_VERIFIED_TOPIC],
            "data": to_hex_data(&encode_tokens(&[
                Token::Uint(1),
                Token::Address(Address::parse(VERIFIER).unwrap()),
            ])),
            "blockNumber": "0x10",
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let (events, next) = gateway.verified_events_since(EventCursor(5)).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].share_id.get(), 1);
    assert_eq!(events[0].verifier, Address::parse(VERIFIER).unwrap());
    assert_eq!(next, EventCursor(17));

    // A cursor ahead of the chain yields nothing without querying logs.
    let (none, same) = gateway.verified_events_since(EventCursor(17)).await.unwrap();
    assert!(none.is_empty());
    assert_eq!(same, EventCursor(17));
}
