//! Payments

use serde::Serialize;
use sqlx::FromRow;

use super::transformer::{Transformer, contact_id_column, owned_by_caller};
use crate::data::filters::{
    Caller, FieldHandlerMap, FilterDefinition, FilterSchema, QuerySource, RuleGroup,
    SortDirection,
};

static SOURCE: QuerySource = QuerySource {
    table: "payments",
    alias: "p",
    sortable: &[
        ("chargeDate", r#"p."chargeDate""#),
        ("amount", r#"p."amount""#),
    ],
    default_sort: ("chargeDate", SortDirection::Desc),
};

#[derive(Debug, Clone, FromRow)]
#[sqlx(rename_all = "camelCase")]
pub struct PaymentRow {
    pub id: String,
    pub contact_id: Option<String>,
    pub charge_date: String,
    pub amount: f64,
    pub amount_refunded: Option<f64>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub contact: Option<String>,
    pub charge_date: String,
    pub amount: f64,
    pub amount_refunded: Option<f64>,
    pub status: String,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            contact: row.contact_id,
            charge_date: row.charge_date,
            amount: row.amount,
            amount_refunded: row.amount_refunded,
            status: row.status,
        }
    }
}

pub struct PaymentTransformer {
    schema: FilterSchema,
    handlers: FieldHandlerMap,
}

impl PaymentTransformer {
    pub fn new() -> Self {
        let schema = FilterSchema::new()
            .with("id", FilterDefinition::text())
            .with("contact", FilterDefinition::contact().nullable())
            .with("chargeDate", FilterDefinition::date())
            .with("amount", FilterDefinition::number())
            .with("amountRefunded", FilterDefinition::number().nullable())
            .with(
                "status",
                FilterDefinition::enumeration(["pending", "successful", "failed", "cancelled"]),
            );
        let handlers = FieldHandlerMap::new().with("contact", contact_id_column);
        Self { schema, handlers }
    }
}

impl Default for PaymentTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for PaymentTransformer {
    type Row = PaymentRow;
    type Item = Payment;

    fn source(&self) -> &'static QuerySource {
        &SOURCE
    }

    fn schema(&self) -> &FilterSchema {
        &self.schema
    }

    fn handlers(&self) -> &FieldHandlerMap {
        &self.handlers
    }

    fn implicit_rules(&self, caller: &Caller) -> Option<RuleGroup> {
        owned_by_caller(caller, "contact")
    }

    fn to_item(&self, row: PaymentRow) -> Payment {
        row.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::{GroupCondition, PageRequest, Rule, RuleOperator, SortSpec};
    use crate::domain::fixtures;
    use crate::domain::transformer::search;

    async fn seeded() -> fixtures::Db {
        let db = fixtures::db().await;
        let pool = db.pool();
        fixtures::contact(pool, "1", "a@example.com", "2020-01-01").await;
        fixtures::contact(pool, "2", "b@example.com", "2020-01-01").await;
        fixtures::payment(pool, "p1", "1", 5.0, "successful").await;
        fixtures::payment(pool, "p2", "1", 20.0, "failed").await;
        fixtures::payment(pool, "p3", "2", 12.5, "successful").await;
        db
    }

    #[tokio::test]
    async fn test_or_of_amount_and_status() {
        let db = seeded().await;
        let rules = RuleGroup::new(
            GroupCondition::Or,
            vec![
                Rule::new("amount", RuleOperator::Greater, vec![15.0.into()]).into(),
                Rule::new("status", RuleOperator::Equal, vec!["successful".into()]).into(),
            ],
        );
        let page = PageRequest::unbounded()
            .sorted_by(Some(SortSpec::new("amount", SortDirection::Asc)));

        let result = search(
            &PaymentTransformer::new(),
            db.pool(),
            &Caller::admin("a"),
            Some(&rules),
            &page,
        )
        .await
        .unwrap();

        let ids: Vec<&str> = result.items.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3", "p2"]);
        assert_eq!(result.total, 3);
    }

    #[tokio::test]
    async fn test_members_see_only_their_payments() {
        let db = seeded().await;
        let rules = RuleGroup::and([
            Rule::new("status", RuleOperator::Equal, vec!["successful".into()]).into(),
        ]);

        let result = search(
            &PaymentTransformer::new(),
            db.pool(),
            &Caller::member("2"),
            Some(&rules),
            &PageRequest::unbounded(),
        )
        .await
        .unwrap();

        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].id, "p3");
        assert_eq!(result.items[0].contact.as_deref(), Some("2"));
    }
}
