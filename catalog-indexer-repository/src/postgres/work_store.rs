use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::WorkStoreError;
use crate::interfaces::WorkStore;
use catalog_indexer_shared::{
    AccessReportRecord, AgentRecord, AgentRole, ChangedWork, DateRecord, IdentifierRecord,
    IdentifierValue, InstanceRecord, ItemRecord, LinkRecord, MeasurementRecord, PartialDate,
    RawDateRange, SubjectRecord, WorkGraph,
};

/// Entity owning a set of rows through a `<owner>_<entity>` join table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Work,
    Instance,
    Item,
    Agent,
    AccessReport,
}

impl Owner {
    fn prefix(self) -> &'static str {
        match self {
            Owner::Work => "work",
            Owner::Instance => "instance",
            Owner::Item => "item",
            Owner::Agent => "agent",
            Owner::AccessReport => "access_report",
        }
    }

    fn join_table(self, entity: &str) -> String {
        format!("{}_{}", self.prefix(), entity)
    }

    fn column(self) -> String {
        format!("{}_id", self.prefix())
    }
}

#[derive(sqlx::FromRow)]
struct ChangedWorkRow {
    id: i64,
    uuid: Uuid,
}

#[derive(sqlx::FromRow)]
struct WorkRow {
    id: i64,
    uuid: Uuid,
    title: Option<String>,
    sort_title: Option<String>,
    language: Option<String>,
    license: Option<String>,
    rights_statement: Option<String>,
    medium: Option<String>,
    series: Option<String>,
    series_position: Option<i16>,
    date_created: Option<DateTime<Utc>>,
    date_modified: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct InstanceRow {
    id: i64,
    title: Option<String>,
    sub_title: Option<String>,
    pub_place: Option<String>,
    edition: Option<String>,
    edition_statement: Option<String>,
    table_of_contents: Option<String>,
    language: Option<String>,
    extent: Option<String>,
    license: Option<String>,
    rights_statement: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    source: Option<String>,
    content_type: Option<String>,
    drm: Option<String>,
    rights_uri: Option<String>,
}

#[derive(sqlx::FromRow)]
struct AccessReportRow {
    id: i64,
    ace_version: Option<String>,
    score: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: i64,
    name: String,
    sort_name: Option<String>,
    lcnaf: Option<String>,
    viaf: Option<String>,
    biography: Option<String>,
    role: Option<String>,
}

#[derive(sqlx::FromRow)]
struct DateRow {
    date_type: String,
    display_date: Option<String>,
    range_lower: Option<String>,
    range_upper: Option<String>,
    date_value: Option<String>,
}

#[derive(sqlx::FromRow)]
struct IdentifierRow {
    identifier_id: i64,
    id_type: String,
    value_type: Option<String>,
    value: Option<String>,
}

#[derive(sqlx::FromRow)]
struct MeasurementRow {
    quantity: Option<String>,
    value: Option<f64>,
    weight: Option<f64>,
    taken_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    url: Option<String>,
    media_type: Option<String>,
    content: Option<String>,
    rel_type: Option<String>,
    thumbnail: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct SubjectRow {
    authority: Option<String>,
    uri: Option<String>,
    subject: Option<String>,
    weight: Option<f64>,
}

fn parse_partial_date(
    value: Option<String>,
    column: &str,
) -> Result<Option<PartialDate>, WorkStoreError> {
    value
        .map(|raw| {
            raw.trim().parse::<PartialDate>().map_err(|e| {
                WorkStoreError::unexpected_shape(format!("Invalid {} '{}': {}", column, raw, e))
            })
        })
        .transpose()
}

impl DateRow {
    fn into_record(self) -> Result<DateRecord, WorkStoreError> {
        let lower = parse_partial_date(self.range_lower, "range_lower")?;
        let upper = parse_partial_date(self.range_upper, "range_upper")?;
        let date_range = if lower.is_some() || upper.is_some() {
            Some(RawDateRange { lower, upper })
        } else {
            None
        };

        Ok(DateRecord {
            date_type: self.date_type,
            display_date: self.display_date,
            date_range,
            date: parse_partial_date(self.date_value, "date_value")?,
        })
    }
}

impl From<MeasurementRow> for MeasurementRecord {
    fn from(row: MeasurementRow) -> Self {
        Self {
            quantity: row.quantity,
            value: row.value,
            weight: row.weight,
            taken_at: row.taken_at,
        }
    }
}

impl From<LinkRow> for LinkRecord {
    fn from(row: LinkRow) -> Self {
        Self {
            url: row.url,
            media_type: row.media_type,
            content: row.content,
            rel_type: row.rel_type,
            thumbnail: row.thumbnail,
        }
    }
}

impl From<SubjectRow> for SubjectRecord {
    fn from(row: SubjectRow) -> Self {
        Self {
            authority: row.authority,
            uri: row.uri,
            subject: row.subject,
            weight: row.weight,
        }
    }
}

/// Group identifier rows (ordered by identifier id) into identifier records.
///
/// A row with no value columns is an identifier with no typed sub-records.
fn group_identifiers(rows: Vec<IdentifierRow>) -> Vec<IdentifierRecord> {
    let mut grouped: Vec<(i64, IdentifierRecord)> = Vec::new();

    for row in rows {
        let value = match (row.value_type, row.value) {
            (Some(id_type), Some(value)) => Some(IdentifierValue { id_type, value }),
            _ => None,
        };

        match grouped.last_mut() {
            Some((id, record)) if *id == row.identifier_id => record.values.extend(value),
            _ => grouped.push((
                row.identifier_id,
                IdentifierRecord {
                    id_type: row.id_type,
                    values: value.into_iter().collect(),
                },
            )),
        }
    }

    grouped.into_iter().map(|(_, record)| record).collect()
}

/// PostgreSQL implementation of the `WorkStore` trait.
///
/// Every graph is read inside a single read-only transaction so that all
/// nested collections reflect one consistent snapshot of the catalog.
pub struct PostgresWorkStore {
    pool: sqlx::PgPool,
}

impl PostgresWorkStore {
    /// Creates a work store over an existing pool.
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to the catalog database.
    ///
    /// # Arguments
    ///
    /// * `database_url` - PostgreSQL connection string
    /// * `acquire_timeout` - Maximum wait for a pooled connection
    pub async fn connect(
        database_url: &str,
        acquire_timeout: Duration,
    ) -> Result<Self, WorkStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    async fn load_graph(
        &self,
        uuid: &Uuid,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<WorkGraph, WorkStoreError> {
        let work = sqlx::query_as::<_, WorkRow>(
            r#"
            SELECT id, uuid, title, sort_title, language, license, rights_statement,
                   medium, series, series_position, date_created, date_modified
            FROM works
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(WorkStoreError::WorkNotFound(*uuid))?;

        let mut graph = WorkGraph::empty(work.id, work.uuid);
        graph.title = work.title;
        graph.sort_title = work.sort_title;
        graph.language = work.language;
        graph.license = work.license;
        graph.rights_statement = work.rights_statement;
        graph.medium = work.medium;
        graph.series = work.series;
        graph.series_position = work.series_position;
        graph.date_created = work.date_created;
        graph.date_modified = work.date_modified;

        graph.dates = self.load_dates(Owner::Work, work.id, tx).await?;
        graph.alt_titles = self.load_alt_titles(Owner::Work, work.id, tx).await?;
        graph.subjects = self.load_subjects(work.id, tx).await?;
        graph.agents = self.load_agents(Owner::Work, work.id, tx).await?;
        graph.identifiers = self.load_identifiers(Owner::Work, work.id, tx).await?;
        graph.measurements = self.load_measurements(Owner::Work, work.id, tx).await?;
        graph.links = self.load_links(Owner::Work, work.id, tx).await?;
        graph.instances = self.load_instances(work.id, tx).await?;

        Ok(graph)
    }

    async fn load_instances(
        &self,
        work_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<InstanceRecord>, WorkStoreError> {
        let rows = sqlx::query_as::<_, InstanceRow>(
            r#"
            SELECT id, title, sub_title, pub_place, edition, edition_statement,
                   table_of_contents, language, extent, license, rights_statement
            FROM instances
            WHERE work_id = $1
            ORDER BY id
            "#,
        )
        .bind(work_id)
        .fetch_all(&mut **tx)
        .await?;

        let mut instances = Vec::with_capacity(rows.len());
        for row in rows {
            instances.push(InstanceRecord {
                title: row.title,
                sub_title: row.sub_title,
                alt_titles: self.load_alt_titles(Owner::Instance, row.id, tx).await?,
                pub_place: row.pub_place,
                edition: row.edition,
                edition_statement: row.edition_statement,
                table_of_contents: row.table_of_contents,
                language: row.language,
                extent: row.extent,
                license: row.license,
                rights_statement: row.rights_statement,
                dates: self.load_dates(Owner::Instance, row.id, tx).await?,
                items: self.load_items(row.id, tx).await?,
                agents: self.load_agents(Owner::Instance, row.id, tx).await?,
                measurements: self.load_measurements(Owner::Instance, row.id, tx).await?,
                identifiers: self.load_identifiers(Owner::Instance, row.id, tx).await?,
                links: self.load_links(Owner::Instance, row.id, tx).await?,
            });
        }

        Ok(instances)
    }

    async fn load_items(
        &self,
        instance_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<ItemRecord>, WorkStoreError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, source, content_type, drm, rights_uri
            FROM items
            WHERE instance_id = $1
            ORDER BY id
            "#,
        )
        .bind(instance_id)
        .fetch_all(&mut **tx)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(ItemRecord {
                source: row.source,
                content_type: row.content_type,
                drm: row.drm,
                rights_uri: row.rights_uri,
                dates: self.load_dates(Owner::Item, row.id, tx).await?,
                agents: self.load_agents(Owner::Item, row.id, tx).await?,
                measurements: self.load_measurements(Owner::Item, row.id, tx).await?,
                identifiers: self.load_identifiers(Owner::Item, row.id, tx).await?,
                links: self.load_links(Owner::Item, row.id, tx).await?,
                access_reports: self.load_access_reports(row.id, tx).await?,
            });
        }

        Ok(items)
    }

    async fn load_access_reports(
        &self,
        item_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<AccessReportRecord>, WorkStoreError> {
        let rows = sqlx::query_as::<_, AccessReportRow>(
            "SELECT id, ace_version, score FROM access_reports WHERE item_id = $1 ORDER BY id",
        )
        .bind(item_id)
        .fetch_all(&mut **tx)
        .await?;

        let mut reports = Vec::with_capacity(rows.len());
        for row in rows {
            reports.push(AccessReportRecord {
                ace_version: row.ace_version,
                score: row.score,
                measurements: self.load_measurements(Owner::AccessReport, row.id, tx).await?,
            });
        }

        Ok(reports)
    }

    /// Loads agent-role pairings in a stable order: one entry per join row.
    async fn load_agents(
        &self,
        owner: Owner,
        owner_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<AgentRole>, WorkStoreError> {
        let sql = format!(
            r#"
            SELECT a.id, a.name, a.sort_name, a.lcnaf, a.viaf, a.biography, j.role
            FROM agents a
            JOIN {join} j ON j.agent_id = a.id
            WHERE j.{column} = $1
            ORDER BY a.id, j.role NULLS FIRST
            "#,
            join = owner.join_table("agents"),
            column = owner.column(),
        );

        let rows = sqlx::query_as::<_, AgentRow>(&sql)
            .bind(owner_id)
            .fetch_all(&mut **tx)
            .await?;

        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            let aliases: Vec<(String,)> =
                sqlx::query_as("SELECT alias FROM aliases WHERE agent_id = $1 ORDER BY id")
                    .bind(row.id)
                    .fetch_all(&mut **tx)
                    .await?;

            agents.push(AgentRole {
                agent: AgentRecord {
                    name: row.name,
                    sort_name: row.sort_name,
                    aliases: aliases.into_iter().map(|(alias,)| alias).collect(),
                    lcnaf: row.lcnaf,
                    viaf: row.viaf,
                    biography: row.biography,
                    dates: self.load_dates(Owner::Agent, row.id, tx).await?,
                    links: self.load_links(Owner::Agent, row.id, tx).await?,
                },
                role: row.role,
            });
        }

        Ok(agents)
    }

    async fn load_subjects(
        &self,
        work_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<SubjectRecord>, WorkStoreError> {
        let rows = sqlx::query_as::<_, SubjectRow>(
            r#"
            SELECT s.authority, s.uri, s.subject, s.weight
            FROM subjects s
            JOIN work_subjects j ON j.subject_id = s.id
            WHERE j.work_id = $1
            ORDER BY s.id
            "#,
        )
        .bind(work_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(SubjectRecord::from).collect())
    }

    async fn load_identifiers(
        &self,
        owner: Owner,
        owner_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<IdentifierRecord>, WorkStoreError> {
        let sql = format!(
            r#"
            SELECT i.id AS identifier_id, i.type AS id_type,
                   v.id_type AS value_type, v.value
            FROM identifiers i
            JOIN {join} j ON j.identifier_id = i.id
            LEFT JOIN identifier_values v ON v.identifier_id = i.id
            WHERE j.{column} = $1
            ORDER BY i.id, v.id
            "#,
            join = owner.join_table("identifiers"),
            column = owner.column(),
        );

        let rows = sqlx::query_as::<_, IdentifierRow>(&sql)
            .bind(owner_id)
            .fetch_all(&mut **tx)
            .await?;

        Ok(group_identifiers(rows))
    }

    async fn load_measurements(
        &self,
        owner: Owner,
        owner_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<MeasurementRecord>, WorkStoreError> {
        let sql = format!(
            r#"
            SELECT m.quantity, m.value, m.weight, m.taken_at
            FROM measurements m
            JOIN {join} j ON j.measurement_id = m.id
            WHERE j.{column} = $1
            ORDER BY m.id
            "#,
            join = owner.join_table("measurements"),
            column = owner.column(),
        );

        let rows = sqlx::query_as::<_, MeasurementRow>(&sql)
            .bind(owner_id)
            .fetch_all(&mut **tx)
            .await?;

        Ok(rows.into_iter().map(MeasurementRecord::from).collect())
    }

    async fn load_links(
        &self,
        owner: Owner,
        owner_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<LinkRecord>, WorkStoreError> {
        let sql = format!(
            r#"
            SELECT l.url, l.media_type, l.content, l.rel_type, l.thumbnail
            FROM links l
            JOIN {join} j ON j.link_id = l.id
            WHERE j.{column} = $1
            ORDER BY l.id
            "#,
            join = owner.join_table("links"),
            column = owner.column(),
        );

        let rows = sqlx::query_as::<_, LinkRow>(&sql)
            .bind(owner_id)
            .fetch_all(&mut **tx)
            .await?;

        Ok(rows.into_iter().map(LinkRecord::from).collect())
    }

    async fn load_dates(
        &self,
        owner: Owner,
        owner_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<DateRecord>, WorkStoreError> {
        let sql = format!(
            r#"
            SELECT d.date_type, d.display_date, d.range_lower, d.range_upper, d.date_value
            FROM dates d
            JOIN {join} j ON j.date_id = d.id
            WHERE j.{column} = $1
            ORDER BY d.id
            "#,
            join = owner.join_table("dates"),
            column = owner.column(),
        );

        let rows = sqlx::query_as::<_, DateRow>(&sql)
            .bind(owner_id)
            .fetch_all(&mut **tx)
            .await?;

        rows.into_iter().map(DateRow::into_record).collect()
    }

    async fn load_alt_titles(
        &self,
        owner: Owner,
        owner_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<String>, WorkStoreError> {
        let sql = format!(
            r#"
            SELECT t.title
            FROM alt_titles t
            JOIN {join} j ON j.title_id = t.id
            WHERE j.{column} = $1
            ORDER BY t.id
            "#,
            join = owner.join_table("alt_titles"),
            column = owner.column(),
        );

        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(owner_id)
            .fetch_all(&mut **tx)
            .await?;

        Ok(rows.into_iter().map(|(title,)| title).collect())
    }
}

#[async_trait]
impl WorkStore for PostgresWorkStore {
    async fn fetch_modified_since(
        &self,
        since: DateTime<Utc>,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<ChangedWork>, WorkStoreError> {
        let rows = sqlx::query_as::<_, ChangedWorkRow>(
            r#"
            SELECT id, uuid
            FROM works
            WHERE date_modified >= $1 AND id > $2
            ORDER BY id
            LIMIT $3
            "#,
        )
        .bind(since)
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(after_id, count = rows.len(), "Fetched modified works page");

        Ok(rows
            .into_iter()
            .map(|row| ChangedWork {
                id: row.id,
                uuid: row.uuid,
            })
            .collect())
    }

    /// Reads the graph in one read-only transaction, rolled back on any error.
    async fn fetch_graph(&self, uuid: &Uuid) -> Result<WorkGraph, WorkStoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION READ ONLY")
            .execute(&mut *tx)
            .await?;

        match self.load_graph(uuid, &mut tx).await {
            Ok(graph) => {
                tx.commit().await?;
                Ok(graph)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!(error = %rollback_error, work = %uuid, "Failed to roll back read transaction");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_join_tables() {
        assert_eq!(Owner::Work.join_table("agents"), "work_agents");
        assert_eq!(Owner::Item.join_table("links"), "item_links");
        assert_eq!(
            Owner::AccessReport.join_table("measurements"),
            "access_report_measurements"
        );
        assert_eq!(Owner::Instance.column(), "instance_id");
        assert_eq!(Owner::Agent.column(), "agent_id");
    }

    #[test]
    fn test_date_row_single_value() {
        let row = DateRow {
            date_type: "issued".to_string(),
            display_date: None,
            range_lower: None,
            range_upper: None,
            date_value: Some("1922".to_string()),
        };

        let record = row.into_record().unwrap();
        assert_eq!(record.date, Some(PartialDate::Year(1922)));
        assert!(record.date_range.is_none());
    }

    #[test]
    fn test_date_row_half_open_range() {
        let row = DateRow {
            date_type: "birth_date".to_string(),
            display_date: Some("born 1850".to_string()),
            range_lower: Some("1850-03".to_string()),
            range_upper: None,
            date_value: None,
        };

        let record = row.into_record().unwrap();
        let range = record.date_range.unwrap();
        assert_eq!(range.lower, Some(PartialDate::YearMonth(1850, 3)));
        assert!(range.upper.is_none());
        assert_eq!(record.display_date.as_deref(), Some("born 1850"));
    }

    #[test]
    fn test_date_row_invalid_value() {
        let row = DateRow {
            date_type: "issued".to_string(),
            display_date: None,
            range_lower: None,
            range_upper: None,
            date_value: Some("circa 1900".to_string()),
        };

        assert!(matches!(
            row.into_record(),
            Err(WorkStoreError::UnexpectedShape(_))
        ));
    }

    fn identifier_row(id: i64, id_type: &str, value: Option<(&str, &str)>) -> IdentifierRow {
        IdentifierRow {
            identifier_id: id,
            id_type: id_type.to_string(),
            value_type: value.map(|(t, _)| t.to_string()),
            value: value.map(|(_, v)| v.to_string()),
        }
    }

    #[test]
    fn test_group_identifiers() {
        let rows = vec![
            identifier_row(1, "isbn", Some(("isbn", "9780143127741"))),
            identifier_row(2, "oclc", Some(("oclc", "123"))),
            identifier_row(2, "oclc", Some(("oclc", "456"))),
            identifier_row(3, "lccn", None),
        ];

        let grouped = group_identifiers(rows);
        assert_eq!(grouped.len(), 3);
        assert_eq!(grouped[0], IdentifierRecord::new("isbn", "9780143127741"));
        assert_eq!(grouped[1].values.len(), 2);
        assert_eq!(grouped[2].id_type, "lccn");
        assert!(grouped[2].values.is_empty());
    }
}
