use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registry configuration. Loaded from JSON by the drivers; every field has
/// a default so partial files are fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Parts named `<prefix><digits>` are explosion pieces.
    pub explosion_part_prefix: String,
    /// Failed primary load attempts before switching to the fallback source.
    pub load_retry_limit: u32,
    /// Try the fallback source once the primary retries run out.
    pub use_fallback: bool,
    /// Maximum number of load attempts pumped per `process_loads` call.
    pub loads_per_frame: usize,
    pub culling: CullingConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            explosion_part_prefix: "Piece".into(),
            load_retry_limit: 2,
            use_fallback: true,
            loads_per_frame: 8,
            culling: CullingConfig::default(),
        }
    }
}

/// Time budget of a culling scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CullingConfig {
    /// Wall-time a scan may run before it backs off.
    pub budget_ms: u64,
    /// How long to back off once the budget is exceeded. Zero yields instead.
    pub yield_ms: u64,
    /// Instances tested between budget checks.
    pub check_interval: usize,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            budget_ms: 16,
            yield_ms: 1,
            check_interval: 256,
        }
    }
}

impl CullingConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn yield_duration(&self) -> Duration {
        Duration::from_millis(self.yield_ms)
    }
}
