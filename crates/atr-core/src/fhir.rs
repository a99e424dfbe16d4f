use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// FHIR R4 resource types this server can store or reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    Coverage,
    Device,
    Encounter,
    EpisodeOfCare,
    Group,
    Medication,
    MedicationAdministration,
    MedicationDispense,
    MedicationRequest,
    MedicationStatement,
    Observation,
    Organization,
    Patient,
    Practitioner,
    PractitionerRole,
    Procedure,
    RelatedPerson,
}

impl ResourceType {
    pub const ALL: [ResourceType; 17] = [
        ResourceType::Coverage,
        ResourceType::Device,
        ResourceType::Encounter,
        ResourceType::EpisodeOfCare,
        ResourceType::Group,
        ResourceType::Medication,
        ResourceType::MedicationAdministration,
        ResourceType::MedicationDispense,
        ResourceType::MedicationRequest,
        ResourceType::MedicationStatement,
        ResourceType::Observation,
        ResourceType::Organization,
        ResourceType::Patient,
        ResourceType::Practitioner,
        ResourceType::PractitionerRole,
        ResourceType::Procedure,
        ResourceType::RelatedPerson,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Coverage => "Coverage",
            ResourceType::Device => "Device",
            ResourceType::Encounter => "Encounter",
            ResourceType::EpisodeOfCare => "EpisodeOfCare",
            ResourceType::Group => "Group",
            ResourceType::Medication => "Medication",
            ResourceType::MedicationAdministration => "MedicationAdministration",
            ResourceType::MedicationDispense => "MedicationDispense",
            ResourceType::MedicationRequest => "MedicationRequest",
            ResourceType::MedicationStatement => "MedicationStatement",
            ResourceType::Observation => "Observation",
            ResourceType::Organization => "Organization",
            ResourceType::Patient => "Patient",
            ResourceType::Practitioner => "Practitioner",
            ResourceType::PractitionerRole => "PractitionerRole",
            ResourceType::Procedure => "Procedure",
            ResourceType::RelatedPerson => "RelatedPerson",
        }
    }

    /// Physical table name used by relational stores (lowercased type name).
    pub fn table_name(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .iter()
            .copied()
            .find(|rt| rt.as_str() == s)
            .ok_or_else(|| ValidationError::UnsupportedResourceType(s.to_string()))
    }
}
