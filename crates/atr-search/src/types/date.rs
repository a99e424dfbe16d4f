//! Date range search values.
//!
//! A constraint holds at most one lower and one upper bound. Each bound
//! covers the precision range of its value and the prefix picks the edge:
//! - eq: both bounds, `[start, end)` of the value
//! - ge: lower, from the value's start
//! - gt, sa: lower, from the value's end
//! - le: upper, up to the value's end (exclusive)
//! - lt, eb: upper, up to the value's start (exclusive)
//!
//! Stored values compare by the start instant of their own precision range.

use time::OffsetDateTime;

use atr_core::{DateRange, ValidationError, parse_date_range};
use atr_core::time::format_instant;

use crate::parameters::SearchPrefix;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateBound {
    pub prefix: SearchPrefix,
    pub range: DateRange,
    /// The value as supplied, prefix included
    pub raw: String,
}

impl DateBound {
    pub fn parse(parameter: &str, raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let (prefix, value) = SearchPrefix::split(trimmed);
        let range = parse_date_range(value)
            .map_err(|e| ValidationError::invalid_value(parameter, e.to_string()))?;
        Ok(Self {
            prefix: prefix.unwrap_or(SearchPrefix::Eq),
            range,
            raw: trimmed.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRangeConstraint {
    pub lower: Option<DateBound>,
    pub upper: Option<DateBound>,
}

impl DateRangeConstraint {
    /// Adds a bound, filling the side its prefix designates.
    pub fn add(&mut self, parameter: &str, raw: &str) -> Result<(), ValidationError> {
        let bound = DateBound::parse(parameter, raw)?;
        let duplicate = |side: &str| ValidationError::DuplicateBound {
            parameter: parameter.to_string(),
            side: side.to_string(),
        };

        match bound.prefix {
            SearchPrefix::Eq => {
                if self.lower.is_some() {
                    return Err(duplicate("lower"));
                }
                if self.upper.is_some() {
                    return Err(duplicate("upper"));
                }
                self.lower = Some(bound.clone());
                self.upper = Some(bound);
            }
            SearchPrefix::Ge | SearchPrefix::Gt | SearchPrefix::Sa => {
                if self.lower.is_some() {
                    return Err(duplicate("lower"));
                }
                self.lower = Some(bound);
            }
            SearchPrefix::Le | SearchPrefix::Lt | SearchPrefix::Eb => {
                if self.upper.is_some() {
                    return Err(duplicate("upper"));
                }
                self.upper = Some(bound);
            }
        }
        Ok(())
    }

    /// Inclusive lower instant, if constrained.
    pub fn lower_instant(&self) -> Option<OffsetDateTime> {
        self.lower.as_ref().map(|b| match b.prefix {
            SearchPrefix::Gt | SearchPrefix::Sa => b.range.end,
            _ => b.range.start,
        })
    }

    /// Exclusive upper instant, if constrained.
    pub fn upper_instant(&self) -> Option<OffsetDateTime> {
        self.upper.as_ref().map(|b| match b.prefix {
            SearchPrefix::Lt | SearchPrefix::Eb => b.range.start,
            _ => b.range.end,
        })
    }

    /// Rejects a lower bound lying after the upper bound.
    pub fn check_order(&self, parameter: &str) -> Result<(), ValidationError> {
        if let (Some(lower), Some(upper)) = (self.lower_instant(), self.upper_instant())
            && lower > upper
        {
            return Err(ValidationError::InvertedDateRange {
                parameter: parameter.to_string(),
                lower: self.lower.as_ref().map(|b| b.raw.clone()).unwrap_or_default(),
                upper: self.upper.as_ref().map(|b| b.raw.clone()).unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Canonical `[lower,upper)` rendering in instants.
    pub fn canonical(&self) -> String {
        let lower = self.lower_instant().map(|i| format_instant(&i)).unwrap_or_default();
        let upper = self.upper_instant().map(|i| format_instant(&i)).unwrap_or_default();
        format!("[{lower},{upper})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_eq_fills_both_sides() {
        let mut c = DateRangeConstraint::default();
        c.add("effective", "2023-01-15").unwrap();
        assert_eq!(c.lower_instant(), Some(datetime!(2023-01-15 0:00 UTC)));
        assert_eq!(c.upper_instant(), Some(datetime!(2023-01-16 0:00 UTC)));
    }

    #[test]
    fn test_prefix_edges() {
        let mut c = DateRangeConstraint::default();
        c.add("effective", "gt2023-01").unwrap();
        c.add("effective", "lt2023-06").unwrap();
        assert_eq!(c.lower_instant(), Some(datetime!(2023-02-01 0:00 UTC)));
        assert_eq!(c.upper_instant(), Some(datetime!(2023-06-01 0:00 UTC)));

        let mut c = DateRangeConstraint::default();
        c.add("effective", "ge2023-01-01").unwrap();
        c.add("effective", "le2023-01-31").unwrap();
        assert_eq!(c.lower_instant(), Some(datetime!(2023-01-01 0:00 UTC)));
        assert_eq!(c.upper_instant(), Some(datetime!(2023-02-01 0:00 UTC)));
    }

    #[test]
    fn test_duplicate_bound() {
        let mut c = DateRangeConstraint::default();
        c.add("effective", "ge2023").unwrap();
        let err = c.add("effective", "sa2024").unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateBound { ref side, .. } if side == "lower"));

        let mut c = DateRangeConstraint::default();
        c.add("effective", "le2023").unwrap();
        assert!(c.add("effective", "2022").is_err());
    }

    #[test]
    fn test_malformed_value() {
        let mut c = DateRangeConstraint::default();
        let err = c.add("effective", "ge2023-13-01").unwrap_err();
        assert_eq!(err.parameter(), Some("effective"));
        assert!(c.lower.is_none());
    }

    #[test]
    fn test_inverted_range() {
        let mut c = DateRangeConstraint::default();
        c.add("effective", "ge2024-06-01").unwrap();
        c.add("effective", "le2024-01-01").unwrap();
        assert!(matches!(
            c.check_order("effective"),
            Err(ValidationError::InvertedDateRange { .. })
        ));

        // Same-day window is valid
        let mut c = DateRangeConstraint::default();
        c.add("effective", "ge2024-01-01").unwrap();
        c.add("effective", "le2024-01-01").unwrap();
        assert!(c.check_order("effective").is_ok());
    }
}
