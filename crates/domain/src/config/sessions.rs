use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session retention
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How long finished sessions stay addressable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Seconds a session stays in the registry after reaching `complete` or
    /// `error`.  `0` keeps every session for the process lifetime.
    #[serde(default = "d_3600")]
    pub retention_secs: u64,
    /// How often the reaper sweeps the registry.
    #[serde(default = "d_60")]
    pub reap_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3_600,
            reap_interval_secs: 60,
        }
    }
}

fn d_3600() -> u64 {
    3_600
}
fn d_60() -> u64 {
    60
}
