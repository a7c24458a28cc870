use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

/// Counters shared by a [crate::SigningService] and its [crate::Boundary].
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub sessions: Gauge,
    pub signatures: Counter,
    pub nonce_mismatches: Counter,
    pub failures: Counter,
}

impl Metrics {
    pub fn register(&self, registry: &mut Registry) {
        registry.register(
            "sessions",
            "Number of registered signing sessions",
            self.sessions.clone(),
        );
        registry.register(
            "signatures",
            "Number of transactions and auth tokens signed",
            self.signatures.clone(),
        );
        registry.register(
            "nonce_mismatches",
            "Number of signing requests rejected for a stale or future nonce",
            self.nonce_mismatches.clone(),
        );
        registry.register(
            "failures",
            "Number of operations that returned the failure sentinel",
            self.failures.clone(),
        );
    }
}
