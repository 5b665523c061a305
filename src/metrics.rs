//! Fairness counters exported in Prometheus text format

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct FairnessMetrics {
    registry: Registry,
    rounds_total: IntCounterVec,
    wins_total: IntCounterVec,
    rotations_total: IntCounter,
    verifications_total: IntCounterVec,
    integrity_failures_total: IntCounter,
    persistence_failures_total: IntCounter,
}

impl FairnessMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let rounds_total = IntCounterVec::new(
            Opts::new("fairness_rounds_total", "Rounds settled per game"),
            &["game"],
        )?;
        let wins_total = IntCounterVec::new(
            Opts::new("fairness_wins_total", "Winning rounds per game"),
            &["game"],
        )?;
        let rotations_total = IntCounter::new("fairness_rotations_total", "Server seed rotations")?;
        let verifications_total = IntCounterVec::new(
            Opts::new("fairness_verifications_total", "Outcome verifications by result"),
            &["result"],
        )?;
        let integrity_failures_total = IntCounter::new(
            "fairness_integrity_failures_total",
            "Revealed seeds that did not match their commitment",
        )?;
        let persistence_failures_total = IntCounter::new(
            "fairness_persistence_failures_total",
            "Session writes that could not be completed",
        )?;

        registry.register(Box::new(rounds_total.clone()))?;
        registry.register(Box::new(wins_total.clone()))?;
        registry.register(Box::new(rotations_total.clone()))?;
        registry.register(Box::new(verifications_total.clone()))?;
        registry.register(Box::new(integrity_failures_total.clone()))?;
        registry.register(Box::new(persistence_failures_total.clone()))?;

        Ok(Self {
            registry,
            rounds_total,
            wins_total,
            rotations_total,
            verifications_total,
            integrity_failures_total,
            persistence_failures_total,
        })
    }

    pub fn record_round(&self, game: &str, won: bool) {
        self.rounds_total.with_label_values(&[game]).inc();
        if won {
            self.wins_total.with_label_values(&[game]).inc();
        }
    }

    pub fn record_rotation(&self) {
        self.rotations_total.inc();
    }

    /// `result` is one of `match`, `mismatch` or `error`
    pub fn record_verification(&self, result: &str) {
        self.verifications_total.with_label_values(&[result]).inc();
    }

    pub fn record_integrity_failure(&self) {
        self.integrity_failures_total.inc();
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures_total.inc();
    }

    pub fn rounds(&self, game: &str) -> u64 {
        self.rounds_total.with_label_values(&[game]).get()
    }

    pub fn rotations(&self) -> u64 {
        self.rotations_total.get()
    }

    pub fn persistence_failures(&self) -> u64 {
        self.persistence_failures_total.get()
    }

    pub fn to_prometheus_format(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_export() {
        let metrics = FairnessMetrics::new().unwrap();
        metrics.record_round("slots", true);
        metrics.record_round("slots", false);
        metrics.record_rotation();
        metrics.record_verification("match");

        assert_eq!(metrics.rounds("slots"), 2);
        assert_eq!(metrics.rotations(), 1);

        let text = metrics.to_prometheus_format();
        assert!(text.contains("fairness_rounds_total{game=\"slots\"} 2"));
        assert!(text.contains("fairness_wins_total{game=\"slots\"} 1"));
        assert!(text.contains("fairness_verifications_total{result=\"match\"} 1"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = FairnessMetrics::new().unwrap();
        let b = FairnessMetrics::new().unwrap();
        a.record_rotation();
        assert_eq!(b.rotations(), 0);
    }
}
