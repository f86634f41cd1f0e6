//! DynamoDB repository implementation.
//!
//! Implements the repository traits from `surveyor_core::storage` using DynamoDB.

use std::collections::HashSet;

use async_trait::async_trait;
use aws_sdk_dynamodb::operation::query::builders::QueryFluentBuilder;
use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use surveyor_core::storage::{ElementRepository, RepositoryError, Result, SurveyRepository};
use surveyor_core::survey::{
    latest_per_guid, select_most_recent, sort_most_recent_first, Survey, SurveyElement,
    SurveyKeys,
};

use super::conversions::{
    element_to_item, get_string, item_to_element, item_to_survey, survey_to_item, Item,
};
use super::error::{
    map_build_error, map_delete_item_error, map_get_item_error, map_put_item_error,
    map_query_error, map_transact_write_error, map_update_item_error,
};
use super::keys;

/// Upper bound on actions in one `TransactWriteItems` call.
pub const MAX_TRANSACT_ITEMS: usize = 100;

/// DynamoDB-based repository implementation.
///
/// Provides async access to DynamoDB storage for surveys and their elements.
pub struct DynamoDbRepository {
    client: Client,
    table_name: String,
}

impl DynamoDbRepository {
    /// Creates a new repository with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Creates a new repository using the AWS SDK default credential chain.
    pub async fn connect(table_name: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), table_name)
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Runs a query to completion, following `LastEvaluatedKey`.
    async fn query_all(&self, query: QueryFluentBuilder) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key = None;
        loop {
            let output = query
                .clone()
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(map_query_error)?;
            items.extend(output.items.unwrap_or_default());
            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }
        Ok(items)
    }

    /// Loads every revision of one survey, most recent first.
    async fn revisions_of(&self, study_id: &str, guid: Uuid) -> Result<Vec<Survey>> {
        let query = self
            .client
            .query()
            .table_name(&self.table_name)
            .consistent_read(true)
            .scan_index_forward(false)
            .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
            .expression_attribute_values(":pk", AttributeValue::S(keys::survey_pk(study_id, guid)))
            .expression_attribute_values(
                ":sk_prefix",
                AttributeValue::S(keys::revision_sk_prefix().to_string()),
            );

        let items = self.query_all(query).await?;
        items.iter().map(item_to_survey).collect()
    }

    /// Loads every revision in a study via GSI1.
    async fn revisions_in_study(&self, study_id: &str) -> Result<Vec<Survey>> {
        let query = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name("GSI1")
            .key_condition_expression("GSI1PK = :pk")
            .expression_attribute_values(":pk", AttributeValue::S(keys::survey_gsi1_pk(study_id)));

        let items = self.query_all(query).await?;
        items.iter().map(item_to_survey).collect()
    }

    /// Loads the sort keys of all element items stored for a revision.
    async fn element_sort_keys(
        &self,
        survey_guid: Uuid,
        created_on: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let query = self
            .client
            .query()
            .table_name(&self.table_name)
            .consistent_read(true)
            .projection_expression("SK")
            .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
            .expression_attribute_values(
                ":pk",
                AttributeValue::S(keys::element_pk(survey_guid, created_on)),
            )
            .expression_attribute_values(
                ":sk_prefix",
                AttributeValue::S(keys::element_sk_prefix().to_string()),
            );

        let items = self.query_all(query).await?;
        items.iter().map(|item| get_string(item, "SK")).collect()
    }

    fn delete_action(&self, pk: &str, sk: String) -> Result<TransactWriteItem> {
        let delete = Delete::builder()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(pk.to_string()))
            .key("SK", AttributeValue::S(sk))
            .build()
            .map_err(map_build_error)?;
        Ok(TransactWriteItem::builder().delete(delete).build())
    }

    fn put_action(&self, item: Item) -> Result<TransactWriteItem> {
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .build()
            .map_err(map_build_error)?;
        Ok(TransactWriteItem::builder().put(put).build())
    }
}

/// Sort keys of stale element items: present before, not overwritten now.
pub fn stale_sort_keys(existing: Vec<String>, new_items: &[Item]) -> Vec<String> {
    let kept: HashSet<&str> = new_items
        .iter()
        .filter_map(|item| item.get("SK").and_then(|v| v.as_s().ok()))
        .map(String::as_str)
        .collect();
    existing
        .into_iter()
        .filter(|sk| !kept.contains(sk.as_str()))
        .collect()
}

// ============================================================================
// SurveyRepository implementation
// ============================================================================

#[async_trait]
impl SurveyRepository for DynamoDbRepository {
    async fn get_survey(&self, study_id: &str, keys: SurveyKeys) -> Result<Option<Survey>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .consistent_read(true)
            .key("PK", AttributeValue::S(keys::survey_pk(study_id, keys.guid)))
            .key("SK", AttributeValue::S(keys::revision_sk(keys.created_on)))
            .send()
            .await
            .map_err(map_get_item_error)?;

        match result.item {
            Some(item) => Ok(Some(item_to_survey(&item)?)),
            None => Ok(None),
        }
    }

    async fn get_most_recent(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Survey>> {
        let revisions = self.revisions_of(study_id, guid).await?;
        Ok(select_most_recent(revisions, include_deleted, false))
    }

    async fn get_most_recent_published(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Survey>> {
        let revisions = self.revisions_of(study_id, guid).await?;
        Ok(select_most_recent(revisions, include_deleted, true))
    }

    async fn get_all_versions(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Vec<Survey>> {
        let mut revisions: Vec<Survey> = self
            .revisions_of(study_id, guid)
            .await?
            .into_iter()
            .filter(|s| include_deleted || !s.deleted)
            .collect();
        sort_most_recent_first(&mut revisions);
        Ok(revisions)
    }

    async fn get_guid_for_identifier(
        &self,
        study_id: &str,
        identifier: &str,
        include_deleted: bool,
    ) -> Result<Option<Uuid>> {
        let query = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name("GSI2")
            .scan_index_forward(false)
            .key_condition_expression("GSI2PK = :pk")
            .expression_attribute_values(
                ":pk",
                AttributeValue::S(keys::survey_gsi2_pk(study_id, identifier)),
            );

        let items = self.query_all(query).await?;
        let revisions = items
            .iter()
            .map(item_to_survey)
            .collect::<Result<Vec<_>>>()?;
        Ok(select_most_recent(revisions, include_deleted, false).and_then(|s| s.guid))
    }

    async fn get_all_most_recent(
        &self,
        study_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<Survey>> {
        let revisions = self.revisions_in_study(study_id).await?;
        Ok(latest_per_guid(revisions, include_deleted, false))
    }

    async fn get_all_most_recently_published(
        &self,
        study_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<Survey>> {
        let revisions = self.revisions_in_study(study_id).await?;
        Ok(latest_per_guid(revisions, include_deleted, true))
    }

    async fn save_survey(&self, survey: &Survey) -> Result<u64> {
        let id = survey
            .keys()
            .map(|k| k.to_string())
            .unwrap_or_default();

        match survey.version {
            None => {
                let item = survey_to_item(survey, 1)?;
                self.client
                    .put_item()
                    .table_name(&self.table_name)
                    .set_item(Some(item))
                    .condition_expression("attribute_not_exists(PK)")
                    .send()
                    .await
                    .map_err(|e| {
                        map_put_item_error(
                            e,
                            RepositoryError::AlreadyExists {
                                entity_type: "Survey",
                                id: id.clone(),
                            },
                        )
                    })?;
                Ok(1)
            }
            Some(expected) => {
                let next = expected + 1;
                let item = survey_to_item(survey, next)?;
                self.client
                    .put_item()
                    .table_name(&self.table_name)
                    .set_item(Some(item))
                    .condition_expression("#version = :expected")
                    .expression_attribute_names("#version", "version")
                    .expression_attribute_values(
                        ":expected",
                        AttributeValue::N(expected.to_string()),
                    )
                    .send()
                    .await
                    .map_err(|e| {
                        map_put_item_error(
                            e,
                            RepositoryError::ConcurrentModification {
                                entity_type: "Survey",
                                id: id.clone(),
                            },
                        )
                    })?;
                Ok(next)
            }
        }
    }

    async fn delete_survey(&self, survey: &Survey) -> Result<u64> {
        let keys = survey.keys().ok_or_else(|| {
            RepositoryError::InvalidData("survey is missing its guid or createdOn".to_string())
        })?;
        let Some(expected) = survey.version else {
            return Err(RepositoryError::ConcurrentModification {
                entity_type: "Survey",
                id: keys.to_string(),
            });
        };
        let next = expected + 1;

        self.client
            .update_item()
            .table_name(&self.table_name)
            .key(
                "PK",
                AttributeValue::S(keys::survey_pk(&survey.study_id, keys.guid)),
            )
            .key("SK", AttributeValue::S(keys::revision_sk(keys.created_on)))
            .update_expression("SET #deleted = :deleted, #version = :next")
            .condition_expression("#version = :expected")
            .expression_attribute_names("#deleted", "deleted")
            .expression_attribute_names("#version", "version")
            .expression_attribute_values(":deleted", AttributeValue::Bool(true))
            .expression_attribute_values(":next", AttributeValue::N(next.to_string()))
            .expression_attribute_values(":expected", AttributeValue::N(expected.to_string()))
            .send()
            .await
            .map_err(|e| map_update_item_error(e, "Survey", keys.to_string()))?;

        Ok(next)
    }

    async fn delete_survey_permanently(&self, study_id: &str, keys: SurveyKeys) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("PK", AttributeValue::S(keys::survey_pk(study_id, keys.guid)))
            .key("SK", AttributeValue::S(keys::revision_sk(keys.created_on)))
            .condition_expression("attribute_exists(PK)")
            .send()
            .await
            .map_err(|e| map_delete_item_error(e, "Survey", keys.to_string()))?;

        Ok(())
    }
}

// ============================================================================
// ElementRepository implementation
// ============================================================================

#[async_trait]
impl ElementRepository for DynamoDbRepository {
    async fn get_elements(
        &self,
        survey_guid: Uuid,
        created_on: DateTime<Utc>,
    ) -> Result<Vec<SurveyElement>> {
        let query = self
            .client
            .query()
            .table_name(&self.table_name)
            .consistent_read(true)
            .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
            .expression_attribute_values(
                ":pk",
                AttributeValue::S(keys::element_pk(survey_guid, created_on)),
            )
            .expression_attribute_values(
                ":sk_prefix",
                AttributeValue::S(keys::element_sk_prefix().to_string()),
            );

        let items = self.query_all(query).await?;
        let mut elements = items
            .iter()
            .map(item_to_element)
            .collect::<Result<Vec<_>>>()?;
        elements.sort_by_key(|e| e.order);
        Ok(elements)
    }

    async fn replace_elements(
        &self,
        survey_guid: Uuid,
        created_on: DateTime<Utc>,
        elements: &[SurveyElement],
    ) -> Result<()> {
        let survey_keys = SurveyKeys::new(survey_guid, created_on);
        let pk = keys::element_pk(survey_guid, created_on);

        let new_items = elements
            .iter()
            .enumerate()
            .map(|(position, element)| element_to_item(element, survey_keys, position as u32))
            .collect::<Result<Vec<_>>>()?;
        let existing = self.element_sort_keys(survey_guid, created_on).await?;
        let stale = stale_sort_keys(existing, &new_items);

        if new_items.len() + stale.len() > MAX_TRANSACT_ITEMS {
            return Err(RepositoryError::InvalidData(format!(
                "replacing elements of {survey_keys} needs {} writes, limit is {MAX_TRANSACT_ITEMS}",
                new_items.len() + stale.len()
            )));
        }

        let mut actions = Vec::with_capacity(new_items.len() + stale.len());
        for sk in stale {
            actions.push(self.delete_action(&pk, sk)?);
        }
        for item in new_items {
            actions.push(self.put_action(item)?);
        }
        if actions.is_empty() {
            return Ok(());
        }

        self.client
            .transact_write_items()
            .set_transact_items(Some(actions))
            .send()
            .await
            .map_err(map_transact_write_error)?;

        Ok(())
    }

    async fn delete_elements(&self, survey_guid: Uuid, created_on: DateTime<Utc>) -> Result<()> {
        let pk = keys::element_pk(survey_guid, created_on);
        let existing = self.element_sort_keys(survey_guid, created_on).await?;

        let actions = existing
            .into_iter()
            .map(|sk| self.delete_action(&pk, sk))
            .collect::<Result<Vec<_>>>()?;

        for chunk in actions.chunks(MAX_TRANSACT_ITEMS) {
            self.client
                .transact_write_items()
                .set_transact_items(Some(chunk.to_vec()))
                .send()
                .await
                .map_err(map_transact_write_error)?;
        }

        Ok(())
    }
}
