//! Faucet service core logic

use crate::admission::AdmissionFilter;
use crate::config::FaucetConfig;
use crate::error::{FaucetError, FaucetResult};
use crate::ledger::LedgerClient;
use crate::metrics::FaucetMetrics;
use chrono::{DateTime, Utc};
use sepolia_common::parse_address;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Faucet service
pub struct FaucetService {
    ledger: Arc<dyn LedgerClient>,
    admission: AdmissionFilter,
    metrics: Arc<FaucetMetrics>,
    cooldown: Duration,
    drip_amount: String,
    network_name: String,
}

impl FaucetService {
    /// Create new faucet service
    pub fn new(
        config: &FaucetConfig,
        ledger: Arc<dyn LedgerClient>,
        metrics: Arc<FaucetMetrics>,
    ) -> FaucetResult<Self> {
        Ok(Self {
            ledger,
            admission: AdmissionFilter::new(),
            metrics,
            cooldown: config.cooldown()?,
            drip_amount: config.drip_amount.clone(),
            network_name: config.network_name.clone(),
        })
    }

    /// Send the drip amount to `raw_address` on behalf of `client_key`
    pub async fn dispense(
        &self,
        raw_address: Option<&str>,
        client_key: &str,
    ) -> FaucetResult<DispenseResponse> {
        self.dispense_at(raw_address, client_key, Utc::now()).await
    }

    /// [`dispense`](Self::dispense) with an explicit request time
    pub async fn dispense_at(
        &self,
        raw_address: Option<&str>,
        client_key: &str,
        now: DateTime<Utc>,
    ) -> FaucetResult<DispenseResponse> {
        let result = self.process(raw_address, client_key, now).await;
        self.metrics.observe(&result);
        result
    }

    async fn process(
        &self,
        raw_address: Option<&str>,
        client_key: &str,
        now: DateTime<Utc>,
    ) -> FaucetResult<DispenseResponse> {
        // 1. Validate address
        let raw = match raw_address {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(FaucetError::InvalidAddress("address is required".to_string())),
        };
        let address = parse_address(raw)?;

        // 2. Admission check, holding the client's slot while the transfer runs
        let reservation = self
            .admission
            .try_reserve(client_key, now, self.cooldown, raw)
            .map_err(|denial| {
                warn!(
                    client = %client_key,
                    retry_after_secs = denial.retry_after.as_secs(),
                    "Rate limit exceeded"
                );
                FaucetError::RateLimited {
                    retry_after: denial.retry_after,
                    last_address: denial.last_destination,
                }
            })?;

        // 3. Send transaction
        let timer = self.metrics.disbursement_duration.start_timer();
        let sent = self.ledger.transfer(&address, &self.drip_amount).await;
        timer.observe_duration();

        let tx_hash = match sent {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                // A failed transfer must not use up the client's slot
                reservation.release();
                error!(client = %client_key, to = %address, "Transfer failed: {}", e);
                return Err(FaucetError::DisbursementFailed(e.to_string()));
            }
        };

        // 4. Record grant
        reservation.commit();

        info!(
            client = %client_key,
            to = %address,
            amount = %self.drip_amount,
            "Dispensed, tx: {}",
            tx_hash
        );

        Ok(DispenseResponse {
            tx_hash,
            amount: self.drip_amount.clone(),
        })
    }

    /// Address of the faucet wallet, for operators topping it up
    pub fn wallet_info(&self) -> FaucetResult<WalletInfo> {
        let address = self
            .ledger
            .address()
            .map_err(|e| FaucetError::WalletUnavailable(e.to_string()))?;
        Ok(WalletInfo {
            address: address.to_string(),
            note: format!("Fund this address with {} ETH", self.network_name),
        })
    }

    /// Forget grants whose cooldown has elapsed
    pub fn prune_expired(&self) -> usize {
        self.admission.prune_expired(Utc::now(), self.cooldown)
    }

    pub fn admission(&self) -> &AdmissionFilter {
        &self.admission
    }

    pub fn metrics(&self) -> &FaucetMetrics {
        &self.metrics
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn drip_amount(&self) -> &str {
        &self.drip_amount
    }
}

/// Dispense response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispenseResponse {
    pub tx_hash: String,
    pub amount: String,
}

/// Faucet wallet details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: String,
    pub note: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use sepolia_common::Address;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    const ADDR: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    #[derive(Default)]
    struct MockLedger {
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LedgerClient for MockLedger {
        fn address(&self) -> FaucetResult<Address> {
            Ok(Address([0x11; 20]))
        }

        async fn transfer(&self, _to: &Address, _amount: &str) -> FaucetResult<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(FaucetError::Rpc("insufficient funds".to_string()));
            }
            Ok(format!("0x{:064x}", n + 1))
        }
    }

    /// Ledger that parks every transfer until released
    #[derive(Default)]
    struct GatedLedger {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl LedgerClient for GatedLedger {
        fn address(&self) -> FaucetResult<Address> {
            Ok(Address([0x22; 20]))
        }

        async fn transfer(&self, _to: &Address, _amount: &str) -> FaucetResult<String> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok("0xgated".to_string())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn hours(h: i64) -> chrono::Duration {
        chrono::Duration::hours(h)
    }

    fn service_with(ledger: Arc<dyn LedgerClient>) -> FaucetService {
        let config = FaucetConfig::default();
        FaucetService::new(&config, ledger, Arc::new(FaucetMetrics::new().unwrap())).unwrap()
    }

    #[tokio::test]
    async fn test_cooldown_scenario() {
        let ledger = Arc::new(MockLedger::default());
        let service = service_with(ledger.clone());

        let first = service.dispense_at(Some(ADDR), "client-a", t0()).await.unwrap();
        assert_eq!(first.amount, "0.01");

        let err = service
            .dispense_at(Some(ADDR), "client-a", t0() + hours(1))
            .await
            .unwrap_err();
        match &err {
            FaucetError::RateLimited {
                retry_after,
                last_address,
            } => {
                assert_eq!(*retry_after, Duration::from_secs(23 * 3600));
                assert_eq!(last_address, ADDR);
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
        assert_eq!(err.to_string(), "Rate limit exceeded. Try again in 23.0 hours");

        let again = service
            .dispense_at(Some(ADDR), "client-a", t0() + hours(25))
            .await
            .unwrap();
        assert_ne!(again.tx_hash, first.tx_hash);
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 2);

        assert_eq!(service.metrics().requests("granted"), 2);
        assert_eq!(service.metrics().requests("rate-limited"), 1);
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_without_record() {
        let ledger = Arc::new(MockLedger::default());
        let service = service_with(ledger.clone());

        for bad in [None, Some(""), Some("not-an-address")] {
            let err = service.dispense_at(bad, "client-a", t0()).await.unwrap_err();
            assert_eq!(err.reason(), "invalid-address");
        }

        assert!(service.admission().is_empty());
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_even_when_rate_limited() {
        let service = service_with(Arc::new(MockLedger::default()));
        service.dispense_at(Some(ADDR), "client-a", t0()).await.unwrap();

        let err = service
            .dispense_at(Some("0x1234"), "client-a", t0() + hours(1))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "invalid-address");
    }

    #[tokio::test]
    async fn test_failed_transfer_keeps_slot_free() {
        let ledger = Arc::new(MockLedger::default());
        ledger.fail.store(true, Ordering::SeqCst);
        let service = service_with(ledger.clone());

        let err = service.dispense_at(Some(ADDR), "client-a", t0()).await.unwrap_err();
        assert_eq!(err.reason(), "disbursement-failed");
        assert!(service.admission().grant_for("client-a").is_none());

        ledger.fail.store(false, Ordering::SeqCst);
        service.dispense_at(Some(ADDR), "client-a", t0()).await.unwrap();
        assert!(service.admission().grant_for("client-a").is_some());
    }

    #[tokio::test]
    async fn test_concurrent_request_denied_while_in_flight() {
        let ledger = Arc::new(GatedLedger::default());
        let service = Arc::new(service_with(ledger.clone()));

        let first = {
            let service = service.clone();
            tokio::spawn(async move { service.dispense_at(Some(ADDR), "client-a", t0()).await })
        };
        ledger.entered.notified().await;

        let err = service.dispense_at(Some(ADDR), "client-a", t0()).await.unwrap_err();
        assert_eq!(err.reason(), "rate-limited");

        ledger.release.notify_one();
        let granted = first.await.unwrap().unwrap();
        assert_eq!(granted.tx_hash, "0xgated");
    }

    #[tokio::test]
    async fn test_cancelled_transfer_keeps_slot_free() {
        let ledger = Arc::new(GatedLedger::default());
        let service = Arc::new(service_with(ledger.clone()));

        let pending = {
            let service = service.clone();
            tokio::spawn(async move { service.dispense_at(Some(ADDR), "client-a", t0()).await })
        };
        ledger.entered.notified().await;
        assert!(!service.admission().check("client-a", t0(), service.cooldown()).is_allowed());

        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());

        assert!(service.admission().grant_for("client-a").is_none());
        assert!(service.admission().is_empty());
        assert!(service
            .admission()
            .check("client-a", t0() + hours(1), service.cooldown())
            .is_allowed());
    }

    #[tokio::test]
    async fn test_cancelled_transfer_restores_previous_grant() {
        let ledger = Arc::new(GatedLedger::default());
        let service = Arc::new(service_with(ledger.clone()));
        service.admission().record_grant("client-a", t0(), "0xfirst");

        let later = t0() + hours(25);
        let pending = {
            let service = service.clone();
            tokio::spawn(async move { service.dispense_at(Some(ADDR), "client-a", later).await })
        };
        ledger.entered.notified().await;
        pending.abort();
        let _ = pending.await;

        let record = service.admission().grant_for("client-a").unwrap();
        assert_eq!(record.destination, "0xfirst");
        assert!(service.admission().check("client-a", later, service.cooldown()).is_allowed());
    }

    #[tokio::test]
    async fn test_wallet_info() {
        let service = service_with(Arc::new(MockLedger::default()));
        let info = service.wallet_info().unwrap();
        assert_eq!(info.address, Address([0x11; 20]).to_string());
        assert_eq!(info.note, "Fund this address with Sepolia ETH");
    }

    #[test]
    fn test_response_field_names() {
        let response = DispenseResponse {
            tx_hash: "0xabc".to_string(),
            amount: "0.01".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["txHash"], "0xabc");
        assert_eq!(json["amount"], "0.01");
    }
}
