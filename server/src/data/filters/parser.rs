//! Rule group parsing
//!
//! Parses the JSON wire form into a [`RuleGroup`] with size and shape limits.

use super::error::FilterError;
use super::types::RuleGroup;
use super::validate::{MAX_RULE_DEPTH, MAX_RULES};

/// Parse a rule group from JSON
///
/// Rejects oversized documents before parsing and over-deep or oversized
/// trees after it. Field, operator and value checks are left to validation.
pub fn parse_rule_group(json_str: &str, max_bytes: usize) -> Result<RuleGroup, FilterError> {
    if json_str.len() > max_bytes {
        return Err(FilterError::MalformedRuleGroup(format!(
            "Rule JSON exceeds maximum size of {} bytes",
            max_bytes
        )));
    }

    let group: RuleGroup = serde_json::from_str(json_str)
        .map_err(|e| FilterError::MalformedRuleGroup(e.to_string()))?;

    if group.depth() > MAX_RULE_DEPTH {
        return Err(FilterError::MalformedRuleGroup(format!(
            "Rule groups may be nested at most {} levels deep",
            MAX_RULE_DEPTH
        )));
    }

    if group.leaves().len() > MAX_RULES {
        return Err(FilterError::MalformedRuleGroup(format!(
            "Maximum {} rules allowed",
            MAX_RULES
        )));
    }

    Ok(group)
}
