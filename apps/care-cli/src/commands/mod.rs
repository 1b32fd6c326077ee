//! CLI command implementations.

mod actions;
mod dispatch;
mod snapshot;

pub use actions::actions;
pub use dispatch::{dispatch, resolve_agency, DispatchArgs};
pub use snapshot::snapshot;

use anyhow::{Context, Result};
use care_config_and_utils::Config;
use care_dispatch::{DemoAuthority, Snapshot, SupabaseDispatcher};
use care_fsm::{CareState, EmergencyState};
use std::sync::Arc;

/// Starting record for a demo resident.
#[derive(Debug, Clone, Copy)]
pub struct DemoSeed {
    pub care: Snapshot<CareState>,
    pub emergency: Snapshot<EmergencyState>,
}

impl DemoSeed {
    pub fn parse(care: &str, emergency: &str, version: u64) -> Result<Self> {
        let care: CareState = care.parse()?;
        let emergency: EmergencyState = emergency.parse()?;
        Ok(Self {
            care: Snapshot::new(care, version),
            emergency: Snapshot::new(emergency, version),
        })
    }
}

/// In-memory authority holding one seeded resident.
pub async fn demo_authority(resident_id: &str, seed: DemoSeed) -> Arc<DemoAuthority> {
    let authority = Arc::new(DemoAuthority::new());
    authority.seed(resident_id, seed.care, seed.emergency).await;
    authority
}

/// Live backend client from configuration.
pub fn live_dispatcher(config: &Config) -> Result<Arc<SupabaseDispatcher>> {
    let dispatcher =
        SupabaseDispatcher::from_config(config).context("Failed to configure the backend client")?;
    Ok(Arc::new(dispatcher))
}
