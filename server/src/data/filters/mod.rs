//! Rule-based filter engine
//!
//! Pipeline for one search request:
//!
//! 1. [`parse_rule_group`] - JSON wire form to [`RuleGroup`]
//! 2. [`extend_schema`] - resolve `<namespace>.<instanceId>` fields
//! 3. [`validate`] - check against the schema, producing [`ValidatedRuleGroup`]
//! 4. [`merge_authorization`] - AND the caller's group with the implicit one
//! 5. [`compile`] - parameterized SQL predicate
//! 6. [`fetch_paginated`] - COUNT + page SELECT
//!
//! Steps 1, 3, 4 and 5 are pure. Only 2 and 6 touch the database.

pub mod authz;
pub mod compiler;
pub mod dates;
pub mod dynamic;
pub mod error;
pub mod handlers;
pub mod materialize;
pub mod operators;
pub mod parser;
pub mod schema;
pub mod types;
pub mod validate;

pub use authz::{Caller, CallerRole, merge_authorization};
pub use compiler::{BoundParam, CompileContext, CompiledPredicate, SqlValue, compile};
pub use dynamic::{DynamicFieldResolver, extend_schema};
pub use error::FilterError;
pub use handlers::{FieldHandler, FieldHandlerMap, HandlerArgs};
pub use materialize::{
    PageLimit, PageRequest, Paginated, QuerySource, SortDirection, SortSpec, count,
    fetch_paginated,
};
pub use operators::RuleOperator;
pub use parser::parse_rule_group;
pub use schema::{FilterDefinition, FilterSchema, FilterType};
pub use types::{
    GroupCondition, Rule, RuleGroup, RuleNode, RuleValue, TypedValue, ValidatedRuleGroup,
};
pub use validate::{ValidationContext, validate};
