//! Reference search values.
//!
//! A value can be:
//! - A relative reference: "Patient/123"
//! - An id only: "123", expanded to every target type of the parameter
//!   (or to the type named by a `:Type` modifier)
//! - A full URL: "http://example.org/fhir/Patient/123", optionally versioned

use atr_core::{ReferenceError, ResourceRef, ResourceType, ValidationError};

use crate::parameters::SearchParameter;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceValue {
    pub raw: String,
    pub type_hint: Option<ResourceType>,
}

/// Reference values of one parameter, one OR group per occurrence of its name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceConstraint {
    pub groups: Vec<Vec<ReferenceValue>>,
}

impl ReferenceConstraint {
    pub fn push_group(&mut self, group: Vec<ReferenceValue>) {
        self.groups.push(group);
    }
}

/// Normalize one value to the canonical `Type/id` forms it may denote.
pub fn resolve_reference(
    param: &SearchParameter,
    value: &ReferenceValue,
) -> Result<Vec<String>, ValidationError> {
    let raw = value.raw.trim();
    let unresolvable =
        |reason: String| ValidationError::unresolvable_reference(&param.code, raw, reason);

    if let Some(hint) = value.type_hint
        && !param.targets.contains(&hint)
    {
        return Err(unresolvable(format!(
            "{hint} is not a target of '{}'",
            param.code
        )));
    }

    if !raw.contains('/') && !raw.starts_with('#') && !raw.starts_with("urn:") {
        if raw.is_empty() {
            return Err(unresolvable("empty reference".to_string()));
        }
        let types: Vec<ResourceType> = match value.type_hint {
            Some(hint) => vec![hint],
            None => param.targets.clone(),
        };
        return Ok(types.into_iter().map(|t| format!("{t}/{raw}")).collect());
    }

    let reference: ResourceRef = raw
        .parse()
        .map_err(|e: ReferenceError| unresolvable(e.to_string()))?;

    if !param.targets.contains(&reference.resource_type) {
        return Err(unresolvable(format!(
            "{} is not a target of '{}'",
            reference.resource_type, param.code
        )));
    }
    if let Some(hint) = value.type_hint
        && hint != reference.resource_type
    {
        return Err(unresolvable(format!(
            "reference type {} conflicts with modifier :{hint}",
            reference.resource_type
        )));
    }

    Ok(vec![reference.relative()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> SearchParameter {
        SearchParameter::reference(
            "subject",
            &["subject"],
            &[ResourceType::Patient, ResourceType::Group],
        )
    }

    fn value(raw: &str, hint: Option<ResourceType>) -> ReferenceValue {
        ReferenceValue {
            raw: raw.to_string(),
            type_hint: hint,
        }
    }

    #[test]
    fn test_bare_id_expands_to_targets() {
        assert_eq!(
            resolve_reference(&subject(), &value("7", None)).unwrap(),
            vec!["Patient/7", "Group/7"]
        );
        assert_eq!(
            resolve_reference(&subject(), &value("7", Some(ResourceType::Group))).unwrap(),
            vec!["Group/7"]
        );
    }

    #[test]
    fn test_qualified_forms_normalize() {
        for raw in [
            "Patient/7",
            "http://ehr.example.org/fhir/Patient/7",
            "Patient/7/_history/3",
        ] {
            assert_eq!(
                resolve_reference(&subject(), &value(raw, None)).unwrap(),
                vec!["Patient/7"],
                "{raw}"
            );
        }
    }

    #[test]
    fn test_unresolvable_references() {
        for raw in ["Spaceship/7", "Device/7", "#contained", "urn:uuid:1234"] {
            let err = resolve_reference(&subject(), &value(raw, None)).unwrap_err();
            assert!(
                matches!(err, ValidationError::UnresolvableReference { .. }),
                "{raw}"
            );
        }
        assert!(resolve_reference(&subject(), &value("7", Some(ResourceType::Device))).is_err());
        assert!(resolve_reference(&subject(), &value("Group/7", Some(ResourceType::Patient))).is_err());
    }
}
