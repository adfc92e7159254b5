//! `EvmHeaderSource` against a scripted transport.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use chainscan_core::{HeaderSource, ScanError};
use chainscan_rpc::{
    EvmHeaderSource, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId, RpcTransport,
    TransportError,
};

/// Answers by method name and records every request.
#[derive(Default)]
struct ScriptedTransport {
    answers: HashMap<&'static str, Value>,
    seen: Mutex<Vec<JsonRpcRequest>>,
}

impl ScriptedTransport {
    fn answer(mut self, method: &'static str, result: Value) -> Self {
        self.answers.insert(method, result);
        self
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.seen.lock().unwrap().push(req.clone());
        let id = match req.id {
            RpcId::Number(n) => n,
            _ => 0,
        };
        match self.answers.get(req.method.as_str()) {
            Some(result) => Ok(JsonRpcResponse::success(id, result.clone())),
            None => Ok(JsonRpcResponse {
                jsonrpc: "2.0".into(),
                id: req.id,
                result: None,
                error: Some(JsonRpcError {
                    code: -32601,
                    message: "method not found".into(),
                    data: None,
                }),
            }),
        }
    }

    fn url(&self) -> &str {
        "scripted"
    }
}

/// Shares a [`ScriptedTransport`] so the test can inspect it afterwards.
struct Recording(Arc<ScriptedTransport>);

#[async_trait]
impl RpcTransport for Recording {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.0.send(req).await
    }

    fn url(&self) -> &str {
        self.0.url()
    }
}

#[tokio::test]
async fn head_honours_confirmations() {
    let transport = ScriptedTransport::default().answer("eth_blockNumber", json!("0xf4240b"));
    let source = EvmHeaderSource::new(transport).with_confirmations(3);
    assert_eq!(source.current_head().await.unwrap(), 16_000_011 - 3);
}

#[tokio::test]
async fn head_never_underflows() {
    let transport = ScriptedTransport::default().answer("eth_blockNumber", json!("0x2"));
    let source = EvmHeaderSource::new(transport).with_confirmations(12);
    assert_eq!(source.current_head().await.unwrap(), 0);
}

#[tokio::test]
async fn pulls_header_by_hex_number() {
    let transport = ScriptedTransport::default().answer(
        "eth_getBlockByNumber",
        json!({
            "number": "0xf42400",
            "hash": "0xaa",
            "parentHash": "0x99",
            "timestamp": "0x10",
            "transactions": []
        }),
    );
    let source = EvmHeaderSource::new(transport);
    let header = source.pull_header(16_000_000).await.unwrap();
    assert_eq!(header.number, 16_000_000);
    assert_eq!(header.tx_count, 0);
}

#[tokio::test]
async fn null_block_is_not_found() {
    let transport = ScriptedTransport::default().answer("eth_getBlockByNumber", Value::Null);
    let source = EvmHeaderSource::new(Recording(Arc::new(transport)));
    let err = source.pull_header(255).await.unwrap_err();
    assert!(matches!(err, ScanError::HeaderNotFound { number: 255 }));
}

#[tokio::test]
async fn requests_carry_hex_params_and_fresh_ids() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .answer("eth_blockNumber", json!("0x1"))
            .answer("eth_getBlockByNumber", Value::Null),
    );
    let source = EvmHeaderSource::new(Recording(transport.clone()));

    source.current_head().await.unwrap();
    let _ = source.pull_header(255).await;

    let seen = transport.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].method, "eth_blockNumber");
    assert!(seen[0].params.is_empty());
    assert_eq!(seen[1].method, "eth_getBlockByNumber");
    assert_eq!(seen[1].params, vec![json!("0xff"), json!(false)]);
    assert_ne!(seen[0].id, seen[1].id);
}

#[tokio::test]
async fn node_error_surfaces_as_rpc_error() {
    let source = EvmHeaderSource::new(ScriptedTransport::default());
    let err = source.current_head().await.unwrap_err();
    assert!(matches!(err, ScanError::Rpc(msg) if msg.contains("method not found")));
    assert!(ScanError::Rpc(String::new()).is_transient());
}
