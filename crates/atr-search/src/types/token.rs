//! Token search values.
//!
//! Token search is used for coded elements (CodeableConcept, Coding,
//! Identifier, code) and supports:
//! - (default): match code, optionally with system
//! - :not: negation

use atr_core::ValidationError;

/// Parse a token value into system and code parts.
///
/// Token values can be in the following formats:
/// - `system|code` - match both system and code
/// - `|code` - match code with no system (explicit null system)
/// - `code` - match code in any system
pub fn parse_token_value(value: &str) -> (Option<&str>, &str) {
    if let Some(pos) = value.find('|') {
        let system = &value[..pos];
        let code = &value[pos + 1..];
        if system.is_empty() {
            (Some(""), code)
        } else {
            (Some(system), code)
        }
    } else {
        (None, value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenValue {
    pub system: Option<String>,
    pub code: String,
    pub negated: bool,
}

impl TokenValue {
    pub fn parse(parameter: &str, raw: &str, negated: bool) -> Result<Self, ValidationError> {
        let (system, code) = parse_token_value(raw);
        if code.is_empty() {
            return Err(ValidationError::invalid_value(
                parameter,
                format!("token '{raw}' has no code"),
            ));
        }
        Ok(Self {
            system: system.map(str::to_string),
            code: code.to_string(),
            negated,
        })
    }

    /// Canonical `[!]system|code` rendering.
    pub fn canonical(&self) -> String {
        let bang = if self.negated { "!" } else { "" };
        match &self.system {
            Some(system) => format!("{bang}{system}|{}", self.code),
            None => format!("{bang}{}", self.code),
        }
    }
}

/// Token values of one parameter, one OR group per occurrence of its name.
///
/// Groups are AND-combined. A group parsed under `:not` holds only negated
/// values, each of which excludes on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenConstraint {
    pub groups: Vec<Vec<TokenValue>>,
}

impl TokenConstraint {
    pub fn push_group(&mut self, group: Vec<TokenValue>) {
        self.groups.push(group);
    }

    /// Every value across all groups.
    pub fn values(&self) -> impl Iterator<Item = &TokenValue> {
        self.groups.iter().flatten()
    }

    /// Canonical rendering: values sorted within a group, groups sorted and `&`-joined.
    pub fn canonical(&self) -> String {
        let mut groups: Vec<String> = self
            .groups
            .iter()
            .map(|group| {
                let mut values: Vec<String> = group.iter().map(TokenValue::canonical).collect();
                values.sort();
                values.dedup();
                values.join(",")
            })
            .collect();
        groups.sort();
        groups.dedup();
        groups.join("&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_value() {
        assert_eq!(
            parse_token_value("http://loinc.org|1234-5"),
            (Some("http://loinc.org"), "1234-5")
        );
        assert_eq!(parse_token_value("|active"), (Some(""), "active"));
        assert_eq!(parse_token_value("active"), (None, "active"));
    }

    #[test]
    fn test_token_value_requires_code() {
        assert!(TokenValue::parse("status", "http://x|", false).is_err());
        let v = TokenValue::parse("status", "active", true).unwrap();
        assert!(v.negated);
        assert_eq!(v.canonical(), "!active");
    }

    #[test]
    fn test_canonical_groups() {
        let value = |raw: &str, negated| TokenValue::parse("status", raw, negated).unwrap();
        let mut a = TokenConstraint::default();
        a.push_group(vec![value("completed", false), value("active", false)]);
        a.push_group(vec![value("stopped", true)]);

        let mut b = TokenConstraint::default();
        b.push_group(vec![value("stopped", true)]);
        b.push_group(vec![value("active", false), value("completed", false)]);

        assert_eq!(a.canonical(), "!stopped&active,completed");
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.values().count(), 3);
    }
}
