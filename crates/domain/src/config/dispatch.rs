use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dispatch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Procedure invoked by `run_effect`.
    #[serde(default = "d_effect_procedure")]
    pub effect_procedure: String,
    /// Concurrency limit for queues built from this config.
    #[serde(default = "d_queue_concurrency")]
    pub queue_concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            effect_procedure: d_effect_procedure(),
            queue_concurrency: d_queue_concurrency(),
        }
    }
}

fn d_effect_procedure() -> String {
    "network.m0.praxis.code.effect.run".into()
}

fn d_queue_concurrency() -> usize {
    1
}
