//! Equipment referenced by tickets. Read-only from this crate's perspective.

use crate::ids::EquipmentId;
use serde::{Deserialize, Serialize};

/// Operational state of a piece of equipment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    /// In service
    Operational,
    /// Temporarily out of service for upkeep
    Maintenance,
    /// Broken
    Faulty,
    /// Permanently out of service
    Decommissioned,
}

/// A physical asset at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    /// Equipment ID
    pub id: EquipmentId,
    /// Display name
    pub name: String,
    /// Free-text category (e.g. "HVAC", "Generator")
    pub equipment_type: String,
    /// Manufacturer serial number
    #[serde(default)]
    pub serial_number: Option<String>,
    /// Where it is installed
    pub location: String,
    /// Operational state
    pub status: EquipmentStatus,
}
