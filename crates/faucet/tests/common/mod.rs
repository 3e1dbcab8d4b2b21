use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use sepolia_common::Address;
use sepolia_faucet::api::router;
use sepolia_faucet::{FaucetConfig, FaucetError, FaucetMetrics, FaucetResult, FaucetService, LedgerClient};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const VALID_ADDRESS: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
pub const FAUCET_ADDRESS: Address = Address([0xab; 20]);

/// In-process ledger that records transfers instead of broadcasting them
#[derive(Default)]
pub struct MockLedger {
    pub fail_transfers: AtomicBool,
    pub fail_address: AtomicBool,
    pub transfers: Mutex<Vec<(Address, String)>>,
    counter: AtomicUsize,
}

impl MockLedger {
    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    fn address(&self) -> FaucetResult<Address> {
        if self.fail_address.load(Ordering::SeqCst) {
            return Err(FaucetError::Internal("no signing key".to_string()));
        }
        Ok(FAUCET_ADDRESS)
    }

    async fn transfer(&self, to: &Address, amount: &str) -> FaucetResult<String> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(FaucetError::Rpc("insufficient funds for gas".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.transfers.lock().unwrap().push((*to, amount.to_string()));
        Ok(format!("0x{:064x}", n))
    }
}

pub fn test_app(config: FaucetConfig) -> (Router, Arc<MockLedger>) {
    let ledger = Arc::new(MockLedger::default());
    let metrics = Arc::new(FaucetMetrics::new().unwrap());
    let service = FaucetService::new(&config, ledger.clone(), metrics).unwrap();
    (router(Arc::new(service)), ledger)
}

pub fn dispense_request(body: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/request")
        .header("content-type", "application/json");
    if let Some(ip) = forwarded_for {
        builder = builder.header("x-forwarded-for", ip);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
