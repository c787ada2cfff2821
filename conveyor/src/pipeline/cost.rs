//! Per-item cost governance.

use uuid::Uuid;

use crate::errors::PipelineError;
use crate::store::StageRunStore;

/// Enforces a cumulative per-item spend ceiling.
///
/// The check runs once per chargeable collaborator call, before the call is
/// made: prior spend is summed from stage run history and the call is
/// refused if its estimate would push the total over the ceiling. This is a
/// soft cap: overshoot is bounded by one call's actual cost, since the
/// estimate checked here is not a pre-commitment.
#[derive(Debug, Clone, Copy)]
pub struct CostLedger {
    ceiling_usd: f64,
}

impl CostLedger {
    /// Default per-item ceiling in USD.
    pub const DEFAULT_CEILING_USD: f64 = 5.0;

    /// Creates a ledger with the given per-item ceiling.
    #[must_use]
    pub fn new(ceiling_usd: f64) -> Self {
        Self { ceiling_usd }
    }

    /// The configured ceiling.
    #[must_use]
    pub fn ceiling_usd(&self) -> f64 {
        self.ceiling_usd
    }

    /// Refuses a chargeable call that would exceed the ceiling.
    pub async fn reserve(
        &self,
        runs: &dyn StageRunStore,
        item_id: Uuid,
        estimated_usd: f64,
    ) -> Result<(), PipelineError> {
        let spent_usd = runs.total_cost(item_id).await;
        if spent_usd + estimated_usd > self.ceiling_usd {
            tracing::warn!(
                %item_id,
                spent_usd,
                estimated_usd,
                ceiling_usd = self.ceiling_usd,
                "refusing collaborator call: cost ceiling reached"
            );
            return Err(PipelineError::CostLimitExceeded {
                item_id,
                spent_usd,
                estimated_usd,
                ceiling_usd: self.ceiling_usd,
            });
        }
        Ok(())
    }
}

impl Default for CostLedger {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CEILING_USD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StageRun;
    use crate::store::{InMemoryStageRunStore, StageRunStore};

    #[tokio::test]
    async fn reserve_allows_within_ceiling() {
        let runs = InMemoryStageRunStore::new();
        let ledger = CostLedger::new(0.10);
        let item_id = Uuid::new_v4();

        runs.append(StageRun::begin(item_id, "transcribe", Uuid::new_v4()).succeed(0.04, 0, 0))
            .await;

        assert!(ledger.reserve(&runs, item_id, 0.05).await.is_ok());
    }

    #[tokio::test]
    async fn reserve_refuses_over_ceiling() {
        let runs = InMemoryStageRunStore::new();
        let ledger = CostLedger::new(0.01);
        let item_id = Uuid::new_v4();

        let err = ledger.reserve(&runs, item_id, 0.03).await.unwrap_err();
        assert!(err.is_cost_limit());
    }

    #[tokio::test]
    async fn prior_spend_counts_toward_ceiling() {
        let runs = InMemoryStageRunStore::new();
        let ledger = CostLedger::new(0.10);
        let item_id = Uuid::new_v4();

        runs.append(StageRun::begin(item_id, "transcribe", Uuid::new_v4()).succeed(0.08, 0, 0))
            .await;

        let err = ledger.reserve(&runs, item_id, 0.05).await.unwrap_err();
        match err {
            PipelineError::CostLimitExceeded { spent_usd, .. } => {
                assert!((spent_usd - 0.08).abs() < 1e-9);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
