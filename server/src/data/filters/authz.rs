//! Caller identity and authorization narrowing
//!
//! Each entity derives an implicit rule group from the caller's role. The
//! caller's own filter and the implicit one are joined under a synthetic
//! top-level AND before compilation, so no OR branch chosen by the caller
//! can reach rows outside the implicit group. A request without a filter is
//! still narrowed by the implicit group.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::{GroupCondition, ValidatedNode, ValidatedRuleGroup};

/// Role hierarchy: superadmin > admin > member > anonymous
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerRole {
    #[default]
    Anonymous,
    Member,
    Admin,
    Superadmin,
}

impl CallerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for CallerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anonymous" => Ok(Self::Anonymous),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::Superadmin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The authenticated party a search runs on behalf of
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub contact_id: Option<String>,
    pub role: CallerRole,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn member(contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: Some(contact_id.into()),
            role: CallerRole::Member,
        }
    }

    pub fn admin(contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: Some(contact_id.into()),
            role: CallerRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role >= CallerRole::Admin
    }
}

/// Join the caller's group with the implicit one under a top-level AND
///
/// Returns an empty AND group (matches everything) only when neither side
/// contributes a group, which transformers avoid by always returning an
/// implicit group for non-admin callers.
pub fn merge_authorization(
    requested: Option<ValidatedRuleGroup>,
    implicit: Option<ValidatedRuleGroup>,
) -> ValidatedRuleGroup {
    let rules = [requested, implicit]
        .into_iter()
        .flatten()
        .map(ValidatedNode::Group)
        .collect();
    ValidatedRuleGroup::new(GroupCondition::And, rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::schema::{FilterDefinition, FilterSchema};
    use crate::data::filters::types::{Rule, RuleGroup};
    use crate::data::filters::validate::{ValidationContext, validate};
    use crate::data::filters::operators::RuleOperator;

    fn schema() -> FilterSchema {
        FilterSchema::new()
            .with("a", FilterDefinition::boolean())
            .with("b", FilterDefinition::boolean())
    }

    fn validated(group: RuleGroup) -> ValidatedRuleGroup {
        validate(&group, &schema(), &ValidationContext::new(None)).unwrap()
    }

    #[test]
    fn role_ordering() {
        assert!(Caller::admin("c1").is_admin());
        assert!(!Caller::member("c1").is_admin());
        assert!(CallerRole::Superadmin > CallerRole::Admin);
        assert_eq!("superadmin".parse::<CallerRole>(), Ok(CallerRole::Superadmin));
        assert!("root".parse::<CallerRole>().is_err());
    }

    #[test]
    fn caller_or_cannot_escape_implicit_and() {
        let requested = validated(RuleGroup::or([
            Rule::new("a", RuleOperator::Equal, vec![true.into()]).into(),
            Rule::new("b", RuleOperator::Equal, vec![true.into()]).into(),
        ]));
        let implicit = validated(RuleGroup::and([Rule::new(
            "b",
            RuleOperator::Equal,
            vec![false.into()],
        )
        .into()]));

        let merged = merge_authorization(Some(requested.clone()), Some(implicit.clone()));

        assert_eq!(merged.condition(), GroupCondition::And);
        assert_eq!(
            merged.rules(),
            &[ValidatedNode::Group(requested), ValidatedNode::Group(implicit)]
        );
    }

    #[test]
    fn implicit_group_applies_without_caller_filter() {
        let implicit = validated(RuleGroup::deny_all());
        let merged = merge_authorization(None, Some(implicit.clone()));
        assert_eq!(merged.rules(), &[ValidatedNode::Group(implicit)]);
    }
}
