//! Entity types and mutation actions.

use serde::{Deserialize, Serialize};

/// The logical collections the sync engine replicates.
///
/// Each entity type maps to a fixed REST path on the remote service.
/// The mapping is part of the wire contract and must not change without
/// a coordinated server release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Patient demographic records.
    Patients,
    /// Stock and inventory items.
    Inventory,
    /// Prescription records.
    Prescriptions,
    /// Point-of-sale transactions.
    Sales,
    /// Supplier records.
    Suppliers,
    /// Hospital appointment records.
    Appointments,
    /// Hospital admission records.
    Admissions,
    /// Occupational-health employee records.
    EmployeeRecords,
}

impl EntityType {
    /// All entity types, in pull-phase iteration order.
    pub const ALL: [EntityType; 8] = [
        EntityType::Patients,
        EntityType::Inventory,
        EntityType::Prescriptions,
        EntityType::Sales,
        EntityType::Suppliers,
        EntityType::Appointments,
        EntityType::Admissions,
        EntityType::EmployeeRecords,
    ];

    /// Returns the stable string name used in queue entry ids and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Patients => "patients",
            EntityType::Inventory => "inventory",
            EntityType::Prescriptions => "prescriptions",
            EntityType::Sales => "sales",
            EntityType::Suppliers => "suppliers",
            EntityType::Appointments => "appointments",
            EntityType::Admissions => "admissions",
            EntityType::EmployeeRecords => "employee_records",
        }
    }

    /// Returns the REST path for this entity type, with leading and
    /// trailing slashes.
    pub fn remote_path(&self) -> &'static str {
        match self {
            EntityType::Patients => "/patients/",
            EntityType::Inventory => "/inventory/",
            EntityType::Prescriptions => "/prescriptions/",
            EntityType::Sales => "/sales/",
            EntityType::Suppliers => "/suppliers/",
            EntityType::Appointments => "/hospital/appointments/",
            EntityType::Admissions => "/hospital/admissions/",
            EntityType::EmployeeRecords => "/occupational-health/employee-records/",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of change a queued mutation represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationAction {
    /// A new record was created locally.
    Create,
    /// An existing record was modified locally.
    Update,
    /// An existing record was deleted locally.
    Delete,
}

impl MutationAction {
    /// Returns true for actions that require a remote id to sync.
    pub fn requires_remote_id(&self) -> bool {
        matches!(self, MutationAction::Update | MutationAction::Delete)
    }
}

impl std::fmt::Display for MutationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MutationAction::Create => "create",
            MutationAction::Update => "update",
            MutationAction::Delete => "delete",
        };
        f.write_str(name)
    }
}
