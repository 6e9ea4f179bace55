// Trust inputs supplied by people rather than probes

use crate::error::{FederationError, FederationResult};
use crate::events::FederationEventType;
use crate::registry::ServerRegistry;
use crate::storage::ServerStore;
use crate::types::{AbuseReport, AuditRequest, AuditResponse, FederatedServer};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decides whether `proof` demonstrates control of `server.owner`
#[async_trait]
pub trait OwnershipVerifier: Send + Sync {
    async fn verify(&self, server: &FederatedServer, proof: &str) -> bool;
}

/// Owner is a hex-encoded Ed25519 public key; proof is a hex-encoded
/// signature over the server id.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519OwnershipVerifier;

impl Ed25519OwnershipVerifier {
    fn check(owner: &str, message: &[u8], proof: &str) -> Result<(), String> {
        let key_bytes: [u8; 32] = hex::decode(strip_hex_prefix(owner))
            .map_err(|e| format!("owner is not hex: {e}"))?
            .try_into()
            .map_err(|_| "owner key must be 32 bytes".to_string())?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| format!("owner is not an Ed25519 key: {e}"))?;

        let sig_bytes: [u8; 64] = hex::decode(strip_hex_prefix(proof))
            .map_err(|e| format!("proof is not hex: {e}"))?
            .try_into()
            .map_err(|_| "signature must be 64 bytes".to_string())?;
        let signature = Signature::from_bytes(&sig_bytes);

        key.verify(message, &signature)
            .map_err(|_| "signature does not match".to_string())
    }
}

#[async_trait]
impl OwnershipVerifier for Ed25519OwnershipVerifier {
    async fn verify(&self, server: &FederatedServer, proof: &str) -> bool {
        match Self::check(&server.owner, server.id.as_bytes(), proof) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!("Ownership proof rejected for {}: {}", server.id, reason);
                false
            }
        }
    }
}

fn strip_hex_prefix(value: &str) -> &str {
    value.trim().strip_prefix("0x").unwrap_or(value.trim())
}

/// Outcome of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutcome {
    pub report: AbuseReport,
    pub report_count: u32,
    pub trust_score: f64,
}

pub struct AbuseReporting {
    registry: Arc<ServerRegistry>,
    store: Arc<dyn ServerStore>,
    verifier: Arc<dyn OwnershipVerifier>,
}

impl AbuseReporting {
    pub fn new(
        registry: Arc<ServerRegistry>,
        store: Arc<dyn ServerStore>,
        verifier: Arc<dyn OwnershipVerifier>,
    ) -> Self {
        Self {
            registry,
            store,
            verifier,
        }
    }

    /// Record a report against a known server. Each report bumps the count
    /// by exactly one and never raises trust.
    pub async fn report_server(&self, server_id: &str, reason: &str) -> FederationResult<ReportOutcome> {
        if !self.registry.contains(server_id).await {
            return Err(FederationError::ServerNotFound(server_id.to_string()));
        }

        let report = AbuseReport::new(server_id, reason);
        self.store.append_report(&report)?;

        let (report_count, trust_score) = self
            .registry
            .penalize(server_id, |stored| {
                stored.metrics.report_count = stored.metrics.report_count.saturating_add(1);
                stored.metrics.report_count
            })
            .await
            .ok_or_else(|| FederationError::ServerNotFound(server_id.to_string()))?;

        tracing::warn!(
            "Server {} reported ({} total): {}",
            server_id,
            report_count,
            reason
        );
        self.registry
            .events()
            .publish(FederationEventType::ServerReported {
                server_id: server_id.to_string(),
                reason: reason.to_string(),
            });

        Ok(ReportOutcome {
            report,
            report_count,
            trust_score,
        })
    }

    /// Check an ownership proof; on success the server's trust gains the
    /// verified-owner bonus. Returns whether the proof was accepted.
    pub async fn verify_owner(&self, server_id: &str, proof: &str) -> FederationResult<bool> {
        let server = self
            .registry
            .get_server(server_id)
            .await
            .ok_or_else(|| FederationError::ServerNotFound(server_id.to_string()))?;

        if !self.verifier.verify(&server, proof).await {
            return Ok(false);
        }

        self.registry
            .update_metrics(server_id, |stored| stored.metrics.verified_owner = true)
            .await
            .ok_or_else(|| FederationError::ServerNotFound(server_id.to_string()))?;

        tracing::info!("Verified owner of {}", server_id);
        self.registry
            .events()
            .publish(FederationEventType::OwnerVerified {
                server_id: server_id.to_string(),
            });
        Ok(true)
    }

    /// Record audit findings (code audited, quality score) and recompute trust
    pub async fn record_audit(&self, server_id: &str, audit: &AuditRequest) -> FederationResult<AuditResponse> {
        if let Some(quality) = audit.quality_score {
            if !(0.0..=100.0).contains(&quality) {
                return Err(FederationError::InvalidAudit(format!(
                    "quality score {} outside 0-100",
                    quality
                )));
            }
        }

        let (metrics, trust_score) = self
            .registry
            .update_metrics(server_id, |stored| {
                if let Some(quality) = audit.quality_score {
                    stored.metrics.quality_score = quality;
                }
                if let Some(audited) = audit.audited_code {
                    stored.metrics.audited_code = audited;
                }
                stored.metrics.clone()
            })
            .await
            .ok_or_else(|| FederationError::ServerNotFound(server_id.to_string()))?;

        tracing::info!(
            "Audit recorded for {} (quality {:.1}, audited {}): trust {:.2}",
            server_id,
            metrics.quality_score,
            metrics.audited_code,
            trust_score
        );
        Ok(AuditResponse {
            trust_score,
            metrics,
        })
    }

    /// Stored reports against one server, oldest first
    pub fn reports_for(&self, server_id: &str) -> FederationResult<Vec<AbuseReport>> {
        Ok(self
            .store
            .list_reports()?
            .into_iter()
            .filter(|r| r.server_id == server_id)
            .collect())
    }

    /// Administrative amnesty: zero the report count and recompute trust.
    /// The report log itself is kept.
    pub async fn reset_reports(&self, server_id: &str) -> FederationResult<f64> {
        let (_, trust) = self
            .registry
            .update_metrics(server_id, |stored| stored.metrics.report_count = 0)
            .await
            .ok_or_else(|| FederationError::ServerNotFound(server_id.to_string()))?;
        tracing::info!("Reset reports for {}", server_id);
        Ok(trust)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FederationConfig;
    use crate::events::EventBus;
    use crate::storage::MemoryServerStore;
    use crate::testing::test_server;
    use crate::transport::MockTransport;
    use ed25519_dalek::{Signer, SigningKey};

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    async fn setup() -> (AbuseReporting, Arc<ServerRegistry>) {
        let store = Arc::new(MemoryServerStore::new());
        let registry = Arc::new(ServerRegistry::new(
            Arc::new(FederationConfig::isolated()),
            store.clone(),
            Arc::new(MockTransport::new()),
            EventBus::default(),
        ));

        let mut server = test_server("a", &["t"]);
        server.owner = hex::encode(signing_key().verifying_key().to_bytes());
        registry.register_server(server).await.unwrap();
        registry.register_server(test_server("b", &["t"])).await.unwrap();

        let reporting = AbuseReporting::new(registry.clone(), store, Arc::new(Ed25519OwnershipVerifier));
        (reporting, registry)
    }

    #[tokio::test]
    async fn test_report_increments_count_once() {
        let (reporting, registry) = setup().await;
        let before = registry.get_server("a").await.unwrap().trust_score;

        let outcome = reporting.report_server("a", "spam responses").await.unwrap();
        assert_eq!(outcome.report_count, 1);
        assert_eq!(registry.get_trust_metrics("a").await.unwrap().report_count, 1);
        assert!(outcome.trust_score <= before);
        assert_eq!(reporting.reports_for("a").unwrap().len(), 1);
        assert!(reporting.reports_for("b").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_never_raises_overridden_trust() {
        let (reporting, registry) = setup().await;
        registry.set_trust_score("b", 5.0).await;

        let outcome = reporting.report_server("b", "abuse").await.unwrap();
        assert!(outcome.trust_score <= 5.0);
    }

    #[tokio::test]
    async fn test_report_unknown_server() {
        let (reporting, _) = setup().await;
        let err = reporting.report_server("missing", "x").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(reporting.reports_for("missing").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_valid_proof_verifies_and_raises_trust() {
        let (reporting, registry) = setup().await;
        let before = registry.get_server("a").await.unwrap().trust_score;

        let proof = hex::encode(signing_key().sign(b"a").to_bytes());
        assert!(reporting.verify_owner("a", &proof).await.unwrap());

        let metrics = registry.get_trust_metrics("a").await.unwrap();
        assert!(metrics.verified_owner);
        assert!(registry.get_server("a").await.unwrap().trust_score > before);
    }

    #[tokio::test]
    async fn test_invalid_proofs_are_rejected() {
        let (reporting, registry) = setup().await;

        // signed over the wrong message
        let wrong = hex::encode(signing_key().sign(b"b").to_bytes());
        assert!(!reporting.verify_owner("a", &wrong).await.unwrap());
        assert!(!reporting.verify_owner("a", "not-hex").await.unwrap());
        // owner of "b" is not a key at all
        let proof = hex::encode(signing_key().sign(b"b").to_bytes());
        assert!(!reporting.verify_owner("b", &proof).await.unwrap());

        assert!(!registry.get_trust_metrics("a").await.unwrap().verified_owner);
    }

    #[tokio::test]
    async fn test_reset_reports_restores_trust() {
        let (reporting, registry) = setup().await;
        reporting.report_server("a", "one").await.unwrap();
        let penalized = reporting.report_server("a", "two").await.unwrap().trust_score;

        let restored = reporting.reset_reports("a").await.unwrap();
        assert!(restored > penalized);
        assert_eq!(registry.get_trust_metrics("a").await.unwrap().report_count, 0);
        assert_eq!(reporting.reports_for("a").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_audit_feeds_trust() {
        let (reporting, registry) = setup().await;
        let before = registry.get_server("b").await.unwrap().trust_score;

        let audit = AuditRequest {
            quality_score: Some(95.0),
            audited_code: Some(true),
        };
        let outcome = reporting.record_audit("b", &audit).await.unwrap();
        assert!(outcome.metrics.audited_code);
        assert_eq!(outcome.metrics.quality_score, 95.0);
        assert!(outcome.trust_score > before);
        assert_eq!(registry.get_server("b").await.unwrap().trust_score, outcome.trust_score);

        // absent fields are left alone
        let lowered = reporting
            .record_audit(
                "b",
                &AuditRequest {
                    quality_score: Some(10.0),
                    audited_code: None,
                },
            )
            .await
            .unwrap();
        assert!(lowered.metrics.audited_code);
        assert!(lowered.trust_score < outcome.trust_score);
    }

    #[tokio::test]
    async fn test_audit_rejects_bad_input() {
        let (reporting, _) = setup().await;
        let out_of_range = AuditRequest {
            quality_score: Some(140.0),
            audited_code: None,
        };
        assert!(reporting.record_audit("a", &out_of_range).await.unwrap_err().is_validation());
        assert!(reporting
            .record_audit("missing", &AuditRequest::default())
            .await
            .unwrap_err()
            .is_not_found());
    }
}
