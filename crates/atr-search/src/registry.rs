//! Search parameter registry.
//!
//! Holds the fixed parameter set per resource type plus, for each type that
//! takes part in bulk export, the parameters linking it to a patient and to
//! its canonical date.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use atr_core::{ResourceType, ValidationError};

use crate::parameters::{ParameterSource, SearchParameter, SearchParameterType};

/// Parameters a resource type uses for patient-scoped exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportProfile {
    /// Reference parameter pointing at the patient
    pub patient_param: String,
    /// Date parameter holding the canonical effective/recorded date
    pub date_param: String,
}

#[derive(Debug, Default)]
pub struct SearchParameterRegistry {
    /// Parameters indexed by resource type, in declaration order
    by_resource: HashMap<ResourceType, IndexMap<String, Arc<SearchParameter>>>,
    /// Parameters every registered type accepts
    common: IndexMap<String, Arc<SearchParameter>>,
    export: HashMap<ResourceType, ExportProfile>,
}

impl SearchParameterRegistry {
    /// Create a new empty registry with only the common parameters.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_common(
            SearchParameter::new("_id", SearchParameterType::Token, ParameterSource::RowId)
                .sortable(),
        );
        registry.register_common(
            SearchParameter::new(
                "_lastUpdated",
                SearchParameterType::Date,
                ParameterSource::LastUpdated,
            )
            .sortable(),
        );
        registry
    }

    fn register_common(&mut self, param: SearchParameter) {
        self.common.insert(param.code.clone(), param.into_arc());
    }

    /// Register a parameter for one resource type.
    pub fn register(&mut self, resource_type: ResourceType, param: SearchParameter) {
        self.by_resource
            .entry(resource_type)
            .or_default()
            .insert(param.code.clone(), param.into_arc());
    }

    /// Declare the export link and date parameters of a resource type.
    pub fn set_export_profile(
        &mut self,
        resource_type: ResourceType,
        patient_param: impl Into<String>,
        date_param: impl Into<String>,
    ) {
        self.export.insert(
            resource_type,
            ExportProfile {
                patient_param: patient_param.into(),
                date_param: date_param.into(),
            },
        );
    }

    /// Whether any parameters are registered for the type.
    pub fn supports(&self, resource_type: ResourceType) -> bool {
        self.by_resource.contains_key(&resource_type)
    }

    /// Resolve a type name against the registered types.
    pub fn resource_type(&self, name: &str) -> Result<ResourceType, ValidationError> {
        let rt: ResourceType = name.parse()?;
        if self.supports(rt) {
            Ok(rt)
        } else {
            Err(ValidationError::UnsupportedResourceType(name.to_string()))
        }
    }

    /// Get a parameter for a resource type, falling back to the common ones.
    pub fn get(&self, resource_type: ResourceType, code: &str) -> Option<Arc<SearchParameter>> {
        self.by_resource
            .get(&resource_type)
            .and_then(|params| params.get(code))
            .or_else(|| self.common.get(code))
            .cloned()
    }

    /// All parameters for a type: common ones first, then type-specific in declaration order.
    pub fn params_for(&self, resource_type: ResourceType) -> Vec<Arc<SearchParameter>> {
        let mut params: Vec<_> = self.common.values().cloned().collect();
        if let Some(specific) = self.by_resource.get(&resource_type) {
            params.extend(specific.values().cloned());
        }
        params
    }

    pub fn export_profile(&self, resource_type: ResourceType) -> Option<&ExportProfile> {
        self.export.get(&resource_type)
    }

    /// Registered resource types, sorted by name.
    pub fn resource_types(&self) -> Vec<ResourceType> {
        let mut types: Vec<_> = self.by_resource.keys().copied().collect();
        types.sort();
        types
    }

    /// Registry with the FHIR R4 parameters of the medication and coverage resources.
    pub fn r4() -> Self {
        use ResourceType::*;

        let mut registry = Self::new();

        let statement = MedicationStatement;
        for param in [
            SearchParameter::token("identifier", &["identifier"]),
            SearchParameter::token("status", &["status"]).sortable(),
            SearchParameter::token("category", &["category"]),
            SearchParameter::token("code", &["medicationCodeableConcept"]).sortable(),
            SearchParameter::reference("medication", &["medicationReference"], &[Medication]),
            SearchParameter::reference("patient", &["subject"], &[Patient]),
            SearchParameter::reference("subject", &["subject"], &[Patient, Group]),
            SearchParameter::reference("context", &["context"], &[Encounter, EpisodeOfCare]),
            SearchParameter::reference(
                "part-of",
                &["partOf"],
                &[
                    MedicationAdministration,
                    MedicationDispense,
                    MedicationStatement,
                    Procedure,
                    Observation,
                ],
            ),
            SearchParameter::reference(
                "source",
                &["informationSource"],
                &[Organization, Patient, Practitioner, PractitionerRole, RelatedPerson],
            ),
            SearchParameter::date("effective", &["effectiveDateTime", "effectivePeriod.start"])
                .sortable(),
        ] {
            registry.register(statement, param);
        }
        registry.set_export_profile(statement, "patient", "effective");

        let administration = MedicationAdministration;
        for param in [
            SearchParameter::token("identifier", &["identifier"]),
            SearchParameter::token("status", &["status"]).sortable(),
            SearchParameter::token("code", &["medicationCodeableConcept"]).sortable(),
            SearchParameter::reference("medication", &["medicationReference"], &[Medication]),
            SearchParameter::reference("patient", &["subject"], &[Patient]),
            SearchParameter::reference("subject", &["subject"], &[Patient, Group]),
            SearchParameter::reference("context", &["context"], &[Encounter, EpisodeOfCare]),
            SearchParameter::reference(
                "performer",
                &["performer.actor"],
                &[Practitioner, PractitionerRole, Patient, RelatedPerson, Device],
            ),
            SearchParameter::reference("device", &["device"], &[Device]),
            SearchParameter::reference("request", &["request"], &[MedicationRequest]),
            SearchParameter::token("reason-given", &["reasonCode"]),
            SearchParameter::token("reason-not-given", &["statusReason"]),
            SearchParameter::date(
                "effective-time",
                &["effectiveDateTime", "effectivePeriod.start"],
            )
            .sortable(),
        ] {
            registry.register(administration, param);
        }
        registry.set_export_profile(administration, "patient", "effective-time");

        for param in [
            SearchParameter::token("identifier", &["identifier"]),
            SearchParameter::token("status", &["status"]).sortable(),
            SearchParameter::token("type", &["type"]).sortable(),
            SearchParameter::reference("patient", &["beneficiary"], &[Patient]),
            SearchParameter::reference("beneficiary", &["beneficiary"], &[Patient]),
            SearchParameter::reference("subscriber", &["subscriber"], &[Patient, RelatedPerson]),
            SearchParameter::reference(
                "policy-holder",
                &["policyHolder"],
                &[Patient, RelatedPerson, Organization],
            ),
            SearchParameter::reference("payor", &["payor"], &[Organization, Patient, RelatedPerson]),
            SearchParameter::date("period", &["period.start"]).sortable(),
        ] {
            registry.register(Coverage, param);
        }
        registry.set_export_profile(Coverage, "patient", "period");

        registry
    }
}
