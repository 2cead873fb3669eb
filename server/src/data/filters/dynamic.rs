//! Dynamic schema extension
//!
//! Some fields only exist because a specific runtime instance of another
//! entity defines them, e.g. the answers of one callout's form:
//!
//! ```text
//! callouts.<calloutId>.responses.answers.<slide>.<key>
//! ```
//!
//! Before validation, every `<namespace>.<instanceId>` referenced by the rule
//! group is resolved through the [`DynamicFieldResolver`] registered for the
//! namespace, and the returned fragment is merged into the schema under that
//! prefix. An instance that cannot be resolved fails the whole request.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use async_trait::async_trait;

use super::authz::Caller;
use super::error::FilterError;
use super::schema::FilterSchema;
use super::types::RuleGroup;
use crate::data::DataError;

fn instance_id_regex() -> &'static regex::Regex {
    static RE_INSTANCE_ID: OnceLock<regex::Regex> = OnceLock::new();
    RE_INSTANCE_ID
        .get_or_init(|| regex::Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("Invalid regex"))
}

/// Looks up the field definitions one instance contributes
#[async_trait]
pub trait DynamicFieldResolver: Send + Sync {
    /// Leading field segment this resolver owns, e.g. `callouts`
    fn namespace(&self) -> &'static str;

    /// Resolve the fields of one instance for `caller`
    ///
    /// `Ok(None)` means the instance does not exist or the caller may not
    /// see it. Fragment field names are relative to `<namespace>.<instanceId>`.
    async fn resolve(
        &self,
        instance_id: &str,
        caller: &Caller,
    ) -> Result<Option<FilterSchema>, DataError>;
}

/// A `<namespace>.<instanceId>` reference found in a rule group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct InstanceRef {
    namespace: &'static str,
    instance_id: String,
}

/// Collect distinct instance references with the first field naming each
fn collect_refs<'a>(
    group: &RuleGroup,
    resolvers: &[&'a dyn DynamicFieldResolver],
) -> BTreeMap<InstanceRef, (String, &'a dyn DynamicFieldResolver)> {
    let mut refs = BTreeMap::new();

    for rule in group.leaves() {
        let mut segments = rule.field.splitn(3, '.');
        let (Some(head), Some(instance_id)) = (segments.next(), segments.next()) else {
            continue;
        };
        let Some(&resolver) = resolvers.iter().find(|r| r.namespace() == head) else {
            continue;
        };
        // Malformed ids are left for validation to reject as unknown fields
        if !instance_id_regex().is_match(instance_id) {
            continue;
        }

        refs.entry(InstanceRef {
            namespace: resolver.namespace(),
            instance_id: instance_id.to_string(),
        })
        .or_insert_with(|| (rule.field.clone(), resolver));
    }

    refs
}

/// Return `base` extended with every dynamic field `group` references
pub async fn extend_schema(
    group: &RuleGroup,
    base: &FilterSchema,
    resolvers: &[&dyn DynamicFieldResolver],
    caller: &Caller,
) -> Result<FilterSchema, FilterError> {
    let mut schema = base.clone();
    let refs = collect_refs(group, resolvers);
    if refs.is_empty() {
        return Ok(schema);
    }

    let lookups = refs
        .iter()
        .map(|(instance, (_, resolver))| resolver.resolve(&instance.instance_id, caller));
    let fragments = futures::future::try_join_all(lookups).await?;

    for ((instance, (field, _)), fragment) in refs.into_iter().zip(fragments) {
        let Some(fragment) = fragment else {
            tracing::warn!(
                namespace = instance.namespace,
                instance_id = %instance.instance_id,
                "Dynamic field instance not resolvable"
            );
            return Err(FilterError::UnresolvableDynamicField {
                field,
                namespace: instance.namespace.to_string(),
                instance_id: instance.instance_id,
            });
        };
        let prefix = format!("{}.{}", instance.namespace, instance.instance_id);
        schema.merge_prefixed(&prefix, fragment);
    }

    tracing::debug!(fields = schema.len(), "Schema extended with dynamic fields");
    Ok(schema)
}
