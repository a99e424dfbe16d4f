//! Version tag policies.

use std::sync::Arc;

use atr_storage::VersionPolicy;

use crate::config::VersioningMode;

/// Tags every write "1".
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantVersion;

impl VersionPolicy for ConstantVersion {
    fn initial(&self) -> String {
        "1".to_string()
    }

    fn next(&self, _current: &str) -> String {
        "1".to_string()
    }
}

/// Numbers writes 1, 2, 3, ... per resource.
///
/// A tag that is not a number restarts the sequence at "1".
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialVersion;

impl VersionPolicy for SequentialVersion {
    fn initial(&self) -> String {
        "1".to_string()
    }

    fn next(&self, current: &str) -> String {
        current
            .parse::<u64>()
            .map(|n| n.saturating_add(1))
            .unwrap_or(1)
            .to_string()
    }
}

pub fn policy_for(mode: VersioningMode) -> Arc<dyn VersionPolicy> {
    match mode {
        VersioningMode::Constant => Arc::new(ConstantVersion),
        VersioningMode::Sequential => Arc::new(SequentialVersion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let policy = ConstantVersion;
        assert_eq!(policy.initial(), "1");
        assert_eq!(policy.next("1"), "1");
    }

    #[test]
    fn test_sequential() {
        let policy = policy_for(VersioningMode::Sequential);
        assert_eq!(policy.initial(), "1");
        assert_eq!(policy.next("1"), "2");
        assert_eq!(policy.next("41"), "42");
        assert_eq!(policy.next("abc"), "1");
    }
}
