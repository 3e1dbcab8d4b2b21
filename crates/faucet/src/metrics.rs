use crate::error::FaucetResult;
use prometheus::{
    histogram_opts, opts, Encoder, Histogram, IntCounterVec, Registry, TextEncoder,
};

/// Request outcome label for successful grants
pub const OUTCOME_GRANTED: &str = "granted";

/// Prometheus metrics for the faucet
#[derive(Clone)]
pub struct FaucetMetrics {
    registry: Registry,
    /// Requests by outcome (`granted` or a rejection reason)
    pub requests_total: IntCounterVec,
    /// Time spent waiting on the ledger per disbursement
    pub disbursement_duration: Histogram,
}

impl FaucetMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            opts!("faucet_requests_total", "Disbursement requests by outcome"),
            &["outcome"],
        )?;

        let disbursement_duration = Histogram::with_opts(histogram_opts!(
            "faucet_disbursement_duration_seconds",
            "Time spent sending a disbursement through the ledger"
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(disbursement_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            disbursement_duration,
        })
    }

    /// Count the outcome of one disbursement request
    pub fn observe<T>(&self, result: &FaucetResult<T>) {
        let outcome = match result {
            Ok(_) => OUTCOME_GRANTED,
            Err(e) => e.reason(),
        };
        self.requests_total.with_label_values(&[outcome]).inc();
    }

    pub fn requests(&self, outcome: &str) -> u64 {
        self.requests_total.with_label_values(&[outcome]).get()
    }

    /// Render all metrics in the text exposition format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaucetError;

    #[test]
    fn test_observe_counts_by_outcome() {
        let metrics = FaucetMetrics::new().unwrap();
        metrics.observe(&Ok::<_, FaucetError>(()));
        metrics.observe(&Ok::<_, FaucetError>(()));
        metrics.observe::<()>(&Err(FaucetError::InvalidAddress("x".into())));

        assert_eq!(metrics.requests(OUTCOME_GRANTED), 2);
        assert_eq!(metrics.requests("invalid-address"), 1);
        assert_eq!(metrics.requests("rate-limited"), 0);
    }

    #[test]
    fn test_outcome_labels_match_error_reasons() {
        let metrics = FaucetMetrics::new().unwrap();
        let errors = [
            FaucetError::InvalidAddress("x".into()),
            FaucetError::RateLimited {
                retry_after: std::time::Duration::ZERO,
                last_address: String::new(),
            },
            FaucetError::DisbursementFailed("x".into()),
            FaucetError::Rpc("x".into()),
        ];
        for err in errors {
            metrics.observe::<()>(&Err(err));
        }

        let text = metrics.gather().unwrap();
        for label in ["invalid-address", "rate-limited", "disbursement-failed", "internal"] {
            assert!(
                text.contains(&format!("outcome=\"{}\"", label)),
                "missing {}",
                label
            );
            assert_eq!(metrics.requests(label), 1);
        }
    }

    #[test]
    fn test_gather_renders_text() {
        let metrics = FaucetMetrics::new().unwrap();
        metrics.observe::<()>(&Err(FaucetError::DisbursementFailed("x".into())));

        let text = metrics.gather().unwrap();
        assert!(text.contains("faucet_requests_total"));
        assert!(text.contains("disbursement-failed"));
    }
}
