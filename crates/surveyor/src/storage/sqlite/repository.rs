//! SQLite repository implementation.
//!
//! Implements the repository traits from `surveyor_core::storage` using SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use surveyor_core::storage::{ElementRepository, RepositoryError, Result, SurveyRepository};
use surveyor_core::survey::{latest_per_guid, Survey, SurveyElement, SurveyKeys};

use super::conversions::{
    element_to_record, row_to_element, row_to_survey, version_to_sql, ElementRecord,
    SurveyRecord,
};
use super::error::{map_tokio_rusqlite_error, wrap_err};
use super::schema;

/// SQLite-based repository implementation.
///
/// Provides async access to SQLite storage for surveys and their elements.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Creates a new repository with a file-based database.
    ///
    /// The database file will be created if it doesn't exist.
    /// Schema tables are created automatically.
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Creates a new repository with an in-memory database.
    ///
    /// Useful for testing - data is lost when the connection is dropped.
    pub async fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| RepositoryError::ConnectionFailed(e.to_string()))?;

        Self::init_schema(&conn).await?;

        Ok(Self { conn })
    }

    /// Initialize the database schema.
    async fn init_schema(conn: &Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(schema::CREATE_TABLES)
                .map_err(wrap_err)?;
            Ok(())
        })
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))
    }

    /// Runs a survey SELECT and collects every row.
    async fn query_surveys(
        &self,
        sql: String,
        study_id: &str,
        guid: Option<Uuid>,
        include_deleted: bool,
    ) -> Result<Vec<Survey>> {
        let study_id = study_id.to_string();
        let id = guid.map_or_else(|| study_id.clone(), |g| g.to_string());

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql).map_err(wrap_err)?;
                let rows = match guid {
                    Some(guid) => stmt.query_map(
                        rusqlite::params![study_id, guid.to_string(), include_deleted],
                        row_to_survey,
                    ),
                    None => {
                        stmt.query_map(rusqlite::params![study_id, include_deleted], row_to_survey)
                    }
                }
                .map_err(wrap_err)?;

                let mut surveys = Vec::new();
                for row_result in rows {
                    surveys.push(row_result.map_err(wrap_err)?);
                }
                Ok(surveys)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "Survey", id))
    }

    /// Runs a version-checked write and turns "no rows" into a lock failure.
    async fn execute_versioned(
        &self,
        sql: &'static str,
        record: SurveyRecord,
        expected: i64,
        soft_delete: bool,
    ) -> Result<u64> {
        let id = format!("{}:{}", record.guid, record.created_on);

        let rows = self
            .conn
            .call(move |conn| {
                let result = if soft_delete {
                    conn.execute(
                        sql,
                        rusqlite::params![record.study_id, record.guid, record.created_on, expected],
                    )
                } else {
                    conn.execute(
                        sql,
                        rusqlite::params![
                            record.study_id,
                            record.guid,
                            record.created_on,
                            record.modified_on,
                            record.identifier,
                            record.name,
                            record.copyright_notice,
                            record.schema_revision,
                            record.published,
                            record.deleted,
                            expected
                        ],
                    )
                };
                result.map_err(wrap_err)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "Survey", id.clone()))?;

        if rows == 0 {
            return Err(RepositoryError::ConcurrentModification {
                entity_type: "Survey",
                id,
            });
        }
        Ok(expected as u64 + 1)
    }
}

// ============================================================================
// SurveyRepository implementation
// ============================================================================

#[async_trait]
impl SurveyRepository for SqliteRepository {
    async fn get_survey(&self, study_id: &str, keys: SurveyKeys) -> Result<Option<Survey>> {
        let study_id = study_id.to_string();
        let guid = keys.guid.to_string();
        let created_on = keys.created_on.timestamp_millis();

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&schema::select_survey_by_keys())
                    .map_err(wrap_err)?;
                match stmt.query_row(rusqlite::params![study_id, guid, created_on], row_to_survey) {
                    Ok(survey) => Ok(Some(survey)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(wrap_err(e)),
                }
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "Survey", keys.to_string()))
    }

    async fn get_most_recent(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Survey>> {
        let revisions = self
            .query_surveys(
                schema::select_survey_versions(),
                study_id,
                Some(guid),
                include_deleted,
            )
            .await?;
        Ok(revisions.into_iter().next())
    }

    async fn get_most_recent_published(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Option<Survey>> {
        let revisions = self
            .query_surveys(
                schema::select_published_survey_versions(),
                study_id,
                Some(guid),
                include_deleted,
            )
            .await?;
        Ok(revisions.into_iter().next())
    }

    async fn get_all_versions(
        &self,
        study_id: &str,
        guid: Uuid,
        include_deleted: bool,
    ) -> Result<Vec<Survey>> {
        self.query_surveys(
            schema::select_survey_versions(),
            study_id,
            Some(guid),
            include_deleted,
        )
        .await
    }

    async fn get_guid_for_identifier(
        &self,
        study_id: &str,
        identifier: &str,
        include_deleted: bool,
    ) -> Result<Option<Uuid>> {
        let study_id = study_id.to_string();
        let identifier = identifier.to_string();
        let id = identifier.clone();

        let guid = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(schema::SELECT_GUID_FOR_IDENTIFIER)
                    .map_err(wrap_err)?;
                match stmt.query_row(
                    rusqlite::params![study_id, identifier, include_deleted],
                    |row| row.get::<_, String>(0),
                ) {
                    Ok(guid) => Ok(Some(guid)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(wrap_err(e)),
                }
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "Survey", id))?;

        guid.map(|g| {
            Uuid::parse_str(&g)
                .map_err(|e| RepositoryError::InvalidData(format!("Invalid UUID guid: {e}")))
        })
        .transpose()
    }

    async fn get_all_most_recent(
        &self,
        study_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<Survey>> {
        let revisions = self
            .query_surveys(schema::select_study_surveys(), study_id, None, include_deleted)
            .await?;
        Ok(latest_per_guid(revisions, include_deleted, false))
    }

    async fn get_all_most_recently_published(
        &self,
        study_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<Survey>> {
        let revisions = self
            .query_surveys(schema::select_study_surveys(), study_id, None, include_deleted)
            .await?;
        Ok(latest_per_guid(revisions, include_deleted, true))
    }

    async fn save_survey(&self, survey: &Survey) -> Result<u64> {
        let record = SurveyRecord::from_survey(survey)?;

        if let Some(expected) = record.version {
            return self
                .execute_versioned(schema::UPDATE_SURVEY, record, expected, false)
                .await;
        }

        let id = format!("{}:{}", record.guid, record.created_on);
        self.conn
            .call(move |conn| {
                conn.execute(
                    schema::INSERT_SURVEY,
                    rusqlite::params![
                        record.study_id,
                        record.guid,
                        record.created_on,
                        record.modified_on,
                        record.identifier,
                        record.name,
                        record.copyright_notice,
                        record.schema_revision,
                        record.published,
                        record.deleted
                    ],
                )
                .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "Survey", id))?;

        Ok(1)
    }

    async fn delete_survey(&self, survey: &Survey) -> Result<u64> {
        let record = SurveyRecord::from_survey(survey)?;
        let Some(expected) = record.version else {
            return Err(RepositoryError::ConcurrentModification {
                entity_type: "Survey",
                id: format!("{}:{}", record.guid, record.created_on),
            });
        };

        self.execute_versioned(schema::SOFT_DELETE_SURVEY, record, expected, true)
            .await
    }

    async fn delete_survey_permanently(&self, study_id: &str, keys: SurveyKeys) -> Result<()> {
        let study_id = study_id.to_string();
        let guid = keys.guid.to_string();
        let created_on = keys.created_on.timestamp_millis();

        self.conn
            .call(move |conn| {
                let rows = conn
                    .execute(
                        schema::DELETE_SURVEY,
                        rusqlite::params![study_id, guid, created_on],
                    )
                    .map_err(wrap_err)?;
                if rows == 0 {
                    Err(wrap_err(rusqlite::Error::QueryReturnedNoRows))
                } else {
                    Ok(())
                }
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "Survey", keys.to_string()))
    }
}

// ============================================================================
// ElementRepository implementation
// ============================================================================

#[async_trait]
impl ElementRepository for SqliteRepository {
    async fn get_elements(
        &self,
        survey_guid: Uuid,
        created_on: DateTime<Utc>,
    ) -> Result<Vec<SurveyElement>> {
        let guid = survey_guid.to_string();
        let millis = created_on.timestamp_millis();

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(schema::SELECT_ELEMENTS).map_err(wrap_err)?;
                let rows = stmt
                    .query_map(rusqlite::params![guid, millis], row_to_element)
                    .map_err(wrap_err)?;

                let mut elements = Vec::new();
                for row_result in rows {
                    elements.push(row_result.map_err(wrap_err)?);
                }
                Ok(elements)
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "SurveyElement", survey_guid.to_string()))
    }

    async fn replace_elements(
        &self,
        survey_guid: Uuid,
        created_on: DateTime<Utc>,
        elements: &[SurveyElement],
    ) -> Result<()> {
        let records = elements
            .iter()
            .enumerate()
            .map(|(position, element)| element_to_record(element, position))
            .collect::<Result<Vec<ElementRecord>>>()?;
        let guid = survey_guid.to_string();
        let millis = created_on.timestamp_millis();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(wrap_err)?;
                tx.execute(schema::DELETE_ELEMENTS, rusqlite::params![guid, millis])
                    .map_err(wrap_err)?;
                {
                    let mut stmt = tx.prepare(schema::INSERT_ELEMENT).map_err(wrap_err)?;
                    for record in &records {
                        stmt.execute(rusqlite::params![
                            guid,
                            millis,
                            record.position,
                            record.guid,
                            record.identifier,
                            record.element_type,
                            record.payload,
                            record.before_rules,
                            record.after_rules
                        ])
                        .map_err(wrap_err)?;
                    }
                }
                tx.commit().map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "SurveyElement", survey_guid.to_string()))
    }

    async fn delete_elements(&self, survey_guid: Uuid, created_on: DateTime<Utc>) -> Result<()> {
        let guid = survey_guid.to_string();
        let millis = created_on.timestamp_millis();

        self.conn
            .call(move |conn| {
                conn.execute(schema::DELETE_ELEMENTS, rusqlite::params![guid, millis])
                    .map_err(wrap_err)?;
                Ok(())
            })
            .await
            .map_err(|e| map_tokio_rusqlite_error(e, "SurveyElement", survey_guid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surveyor_core::survey::{Constraints, DataType, RuleOperator, SurveyRule};

    fn ts(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn revision(guid: Uuid, created_on: i64) -> Survey {
        Survey::new("study-1", "demographics", "Demographics")
            .with_keys(SurveyKeys::new(guid, ts(created_on)))
            .with_copyright_notice("(c) Example Lab")
    }

    #[tokio::test]
    async fn test_insert_and_get_survey() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let mut survey = revision(Uuid::new_v4(), 1_718_444_400_123);
        survey.modified_on = survey.created_on;
        survey.schema_revision = Some(2);

        let version = repo.save_survey(&survey).await.unwrap();
        let stored = repo
            .get_survey("study-1", survey.keys().unwrap())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(version, 1);
        survey.version = Some(1);
        assert_eq!(stored, survey);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_already_exists() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let survey = revision(Uuid::new_v4(), 1_000);
        repo.save_survey(&survey).await.unwrap();

        let result = repo.save_survey(&survey).await;

        assert!(matches!(result, Err(RepositoryError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_conditional_update() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let mut survey = revision(Uuid::new_v4(), 1_000);
        survey.version = Some(repo.save_survey(&survey).await.unwrap());
        let stale = survey.clone();

        survey.name = "Renamed".to_string();
        let version = repo.save_survey(&survey).await.unwrap();
        assert_eq!(version, 2);

        let result = repo.save_survey(&stale).await;
        assert!(matches!(
            result,
            Err(RepositoryError::ConcurrentModification { .. })
        ));

        let stored = repo
            .get_survey("study-1", survey.keys().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.version, Some(2));
    }

    #[tokio::test]
    async fn test_soft_delete_and_filters() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let guid = Uuid::new_v4();
        let mut published = revision(guid, 1_000);
        published.published = true;
        repo.save_survey(&published).await.unwrap();
        let mut draft = revision(guid, 2_000);
        draft.version = Some(repo.save_survey(&draft).await.unwrap());

        assert_eq!(repo.delete_survey(&draft).await.unwrap(), 2);

        let latest = repo.get_most_recent("study-1", guid, false).await.unwrap();
        assert_eq!(latest.unwrap().created_on, Some(ts(1_000)));
        let latest = repo.get_most_recent("study-1", guid, true).await.unwrap();
        assert!(latest.unwrap().deleted);
        let published = repo
            .get_most_recent_published("study-1", guid, false)
            .await
            .unwrap();
        assert_eq!(published.unwrap().created_on, Some(ts(1_000)));
        let versions = repo.get_all_versions("study-1", guid, true).await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].created_on, Some(ts(2_000)));
    }

    #[tokio::test]
    async fn test_guid_for_identifier() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let guid = Uuid::new_v4();
        let mut survey = revision(guid, 1_000);
        survey.version = Some(repo.save_survey(&survey).await.unwrap());

        let found = repo
            .get_guid_for_identifier("study-1", "demographics", false)
            .await
            .unwrap();
        assert_eq!(found, Some(guid));

        repo.delete_survey(&survey).await.unwrap();
        let hidden = repo
            .get_guid_for_identifier("study-1", "demographics", false)
            .await
            .unwrap();
        assert_eq!(hidden, None);
        let admin = repo
            .get_guid_for_identifier("study-1", "demographics", true)
            .await
            .unwrap();
        assert_eq!(admin, Some(guid));
    }

    #[tokio::test]
    async fn test_get_all_most_recent_one_per_guid() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        repo.save_survey(&revision(first, 1_000)).await.unwrap();
        repo.save_survey(&revision(first, 2_000)).await.unwrap();
        let mut other = revision(second, 1_500);
        other.identifier = "intake".to_string();
        other.name = "Intake".to_string();
        other.published = true;
        repo.save_survey(&other).await.unwrap();

        let latest = repo.get_all_most_recent("study-1", false).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].name, "Demographics");
        assert_eq!(latest[0].created_on, Some(ts(2_000)));

        let published = repo
            .get_all_most_recently_published("study-1", false)
            .await
            .unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].guid, Some(second));
    }

    #[tokio::test]
    async fn test_delete_permanently() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let survey = revision(Uuid::new_v4(), 1_000);
        let keys = survey.keys().unwrap();
        repo.save_survey(&survey).await.unwrap();

        repo.delete_survey_permanently("study-1", keys).await.unwrap();

        assert!(repo.get_survey("study-1", keys).await.unwrap().is_none());
        let again = repo.delete_survey_permanently("study-1", keys).await;
        assert!(matches!(again, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_replace_elements_round_trip() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let guid = Uuid::new_v4();
        let elements = vec![
            SurveyElement::info_screen("intro", "Welcome", "Hello"),
            SurveyElement::question(
                "smoker",
                "Do you smoke?",
                Constraints::new(DataType::Boolean).required(),
            )
            .with_after_rule(SurveyRule::skip_to(
                RuleOperator::Eq,
                Some(serde_json::json!(false)),
                "done",
            )),
        ];

        repo.replace_elements(guid, ts(1_000), &elements).await.unwrap();
        let stored = repo.get_elements(guid, ts(1_000)).await.unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].order, 0);
        assert_eq!(stored[1].order, 1);
        assert_eq!(stored[1].kind, elements[1].kind);
        assert_eq!(stored[1].after_rules, elements[1].after_rules);
        assert_eq!(
            stored[1].survey_keys,
            Some(SurveyKeys::new(guid, ts(1_000)))
        );
    }

    #[tokio::test]
    async fn test_replace_elements_removes_previous_set() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let guid = Uuid::new_v4();
        let q1 = SurveyElement::question("q1", "Q1?", Constraints::new(DataType::String));
        let q2 = SurveyElement::question("q2", "Q2?", Constraints::new(DataType::String));
        repo.replace_elements(guid, ts(1_000), &[q1.clone(), q2.clone()])
            .await
            .unwrap();

        repo.replace_elements(guid, ts(1_000), &[q2.clone(), q1.clone()])
            .await
            .unwrap();

        let stored = repo.get_elements(guid, ts(1_000)).await.unwrap();
        let order: Vec<_> = stored.iter().map(|e| (e.identifier.as_str(), e.order)).collect();
        assert_eq!(order, vec![("q2", 0), ("q1", 1)]);
    }

    #[tokio::test]
    async fn test_delete_elements_is_idempotent() {
        let repo = SqliteRepository::new_in_memory().await.unwrap();
        let guid = Uuid::new_v4();
        let q1 = SurveyElement::question("q1", "Q1?", Constraints::new(DataType::String));
        repo.replace_elements(guid, ts(1_000), &[q1]).await.unwrap();

        repo.delete_elements(guid, ts(1_000)).await.unwrap();
        repo.delete_elements(guid, ts(1_000)).await.unwrap();

        assert!(repo.get_elements(guid, ts(1_000)).await.unwrap().is_empty());
    }
}
