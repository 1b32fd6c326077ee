//! Snapshot lookup.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use care_dispatch::{ActionDispatcher, EntitySnapshot};
use serde::Serialize;
use std::fmt;

#[derive(Serialize)]
#[serde(transparent)]
struct SnapshotReport(EntitySnapshot);

impl fmt::Display for SnapshotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = &self.0;
        writeln!(f, "Resident {}", record.resident_id)?;
        writeln!(
            f,
            "  care:      {} (v{}) - {}",
            record.care.state,
            record.care.version,
            record.care.state.label()
        )?;
        write!(
            f,
            "  emergency: {} (v{}) - {}",
            record.emergency.state,
            record.emergency.version,
            record.emergency.state.label()
        )
    }
}

/// Fetch and print a resident's current record.
pub async fn snapshot<D: ActionDispatcher>(
    dispatcher: &D,
    resident_id: &str,
    format: &OutputFormat,
) -> Result<()> {
    let record = dispatcher.fetch_snapshot(resident_id).await?;
    output::print(&SnapshotReport(record), format);
    Ok(())
}
