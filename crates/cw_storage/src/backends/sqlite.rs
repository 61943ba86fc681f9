use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use cw_core::analytics::{
    DateWindow, DisruptionTypeTotal, Period, SeverityPeriodCount, SeverityTotal,
    WeeklyDisruptionCount, WEEKLY_COUNTS_LIMIT,
};
use cw_core::filter::{FilterCriteria, SearchQuery};
use cw_core::storage::{ArticleStorage, DistinctField};
use cw_core::{Article, DisruptionType, Error, NewArticle, Result, Severity, UpsertOutcome, TARGET_DB};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
// Normalises any stored ISO 8601 variant to the bound format above.
const PUBLISHED_AT: &str = "strftime('%Y-%m-%d %H:%M:%f', published_date)";

fn migrations(table: &str) -> Vec<String> {
    vec![
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                image_url TEXT,
                disruption_type TEXT NOT NULL,
                published_date TEXT NOT NULL,
                location TEXT NOT NULL,
                lat REAL,
                lng REAL,
                radius REAL,
                severity TEXT NOT NULL,
                raw_text TEXT NOT NULL,
                text TEXT NOT NULL,
                source_name TEXT,
                is_deleted INTEGER NOT NULL DEFAULT 0
            )
            "#
        ),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_published ON {table} (published_date)"),
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_deleted ON {table} (is_deleted)"),
        // Add future migrations here
    ]
}

fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Database(format!("{}: {}", context, e))
}

fn format_bound(at: &NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn bucket_start(raw: &str) -> Result<chrono::DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| Error::Database(format!("Bad bucket date {}: {}", raw, e)))?;
    Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

fn parse_severity(raw: &str) -> Result<Severity> {
    raw.parse::<Severity>()
        .map_err(|_| Error::Database(format!("Stored severity is invalid: {}", raw)))
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let get_err = db_error("Failed to decode article row");
    let decode = || -> std::result::Result<Article, sqlx::Error> {
        let disruption_type: String = row.try_get("disruption_type")?;
        let severity: String = row.try_get("severity")?;
        Ok(Article {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            url: row.try_get("url")?,
            image_url: row.try_get("image_url")?,
            disruption_type: DisruptionType::from_label(&disruption_type),
            published_date: row.try_get("published_date")?,
            location: row.try_get("location")?,
            lat: row.try_get("lat")?,
            lng: row.try_get("lng")?,
            radius: row.try_get("radius")?,
            severity: severity.parse().unwrap_or_default(),
            raw_text: row.try_get("raw_text")?,
            text: row.try_get("text")?,
            source_name: row.try_get("source_name")?,
            is_deleted: row.try_get::<i64, _>("is_deleted")? != 0,
        })
    };
    decode().map_err(get_err)
}

fn push_in_list<'a>(qb: &mut QueryBuilder<'a, Sqlite>, column: &str, values: &'a [String]) {
    if values.is_empty() {
        return;
    }
    qb.push(format!(" AND {} IN (", column));
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value.as_str());
    }
    separated.push_unseparated(")");
}

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
    table: String,
}

impl SqliteStorage {
    /// Open (creating if missing) the database at `url` and migrate `table`.
    pub async fn connect(url: &str, table: &str) -> Result<Self> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::validation(format!("Invalid collection name: {}", table)));
        }

        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_error("Invalid database URL"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_error("Failed to connect to database"))?;

        for (i, migration) in migrations(table).iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }
        info!(target: TARGET_DB, "Connected to {} (table {})", url, table);

        Ok(Self {
            pool: Arc::new(pool),
            table: table.to_string(),
        })
    }

    fn select_live<'a>(&self) -> QueryBuilder<'a, Sqlite> {
        QueryBuilder::new(format!("SELECT * FROM {} WHERE is_deleted = 0", self.table))
    }

    async fn fetch_articles(&self, mut qb: QueryBuilder<'_, Sqlite>) -> Result<Vec<Article>> {
        qb.push(" ORDER BY datetime(published_date) DESC, published_date DESC");
        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(db_error("Failed to fetch articles"))?;
        rows.iter().map(row_to_article).collect()
    }
}

#[async_trait]
impl ArticleStorage for SqliteStorage {
    async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query(&format!("SELECT * FROM {} WHERE url = ?", self.table))
            .bind(url)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error("Failed to look up article by url"))?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn upsert_article(&self, article: &NewArticle) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to begin upsert"))?;

        let existing: Option<(String, i64)> =
            sqlx::query_as(&format!("SELECT id, is_deleted FROM {} WHERE url = ?", self.table))
                .bind(&article.url)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("Failed to look up article by url"))?;

        let (id, outcome) = match existing {
            Some((_, deleted)) if deleted != 0 => {
                debug!(target: TARGET_DB, "Skipping soft-deleted {}", article.url);
                return Ok(UpsertOutcome::SkippedDeleted);
            }
            Some((id, _)) => (id, UpsertOutcome::Updated),
            None => (Uuid::new_v4().to_string(), UpsertOutcome::Inserted),
        };

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (
                id, title, url, image_url, disruption_type, published_date, location,
                lat, lng, radius, severity, raw_text, text, source_name, is_deleted
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                image_url = excluded.image_url,
                disruption_type = excluded.disruption_type,
                published_date = excluded.published_date,
                location = excluded.location,
                lat = excluded.lat,
                lng = excluded.lng,
                radius = excluded.radius,
                severity = excluded.severity,
                raw_text = excluded.raw_text,
                text = excluded.text,
                source_name = excluded.source_name
            "#,
            self.table
        ))
        .bind(&id)
        .bind(&article.title)
        .bind(&article.url)
        .bind(article.image_url.as_deref())
        .bind(article.disruption_type.as_str())
        .bind(&article.published_date)
        .bind(&article.location)
        .bind(article.coordinates.map(|c| c.lat))
        .bind(article.coordinates.map(|c| c.lng))
        .bind(article.radius)
        .bind(article.severity.as_str())
        .bind(&article.raw_text)
        .bind(&article.text)
        .bind(article.source_name.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to store article"))?;

        tx.commit().await.map_err(db_error("Failed to commit upsert"))?;
        Ok(outcome)
    }

    async fn list_articles(&self, disruption_type: Option<&str>) -> Result<Vec<Article>> {
        let mut qb = self.select_live();
        if let Some(kind) = disruption_type {
            qb.push(" AND disruption_type = ").push_bind(kind);
        }
        self.fetch_articles(qb).await
    }

    async fn get_article(&self, id: &str) -> Result<Option<Article>> {
        let row = sqlx::query(&format!(
            "SELECT * FROM {} WHERE id = ? AND is_deleted = 0",
            self.table
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(db_error("Failed to get article"))?;
        row.as_ref().map(row_to_article).transpose()
    }

    async fn soft_delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET is_deleted = 1 WHERE id = ? AND is_deleted = 0",
            self.table
        ))
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(db_error("Failed to delete article"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {}", self.table))
            .execute(&*self.pool)
            .await
            .map_err(db_error("Failed to delete articles"))?;
        Ok(result.rows_affected())
    }

    async fn filter_articles(&self, criteria: &FilterCriteria) -> Result<Vec<Article>> {
        let mut qb = self.select_live();
        if let Some(from) = &criteria.from {
            qb.push(format!(" AND {} >= ", PUBLISHED_AT)).push_bind(format_bound(from));
        }
        if let Some(to) = &criteria.to {
            qb.push(format!(" AND {} <= ", PUBLISHED_AT)).push_bind(format_bound(to));
        }
        push_in_list(&mut qb, "location", &criteria.locations);
        push_in_list(&mut qb, "disruption_type", &criteria.disruption_types);
        if !criteria.severities.is_empty() {
            qb.push(" AND severity IN (");
            let mut separated = qb.separated(", ");
            for severity in &criteria.severities {
                separated.push_bind(severity.as_str());
            }
            separated.push_unseparated(")");
        }
        push_in_list(&mut qb, "source_name", &criteria.suppliers);
        if let Some(max) = criteria.max_radius {
            qb.push(" AND radius IS NOT NULL AND radius <= ").push_bind(max);
        }
        self.fetch_articles(qb).await
    }

    async fn search_articles(&self, query: &SearchQuery) -> Result<Vec<Article>> {
        // SQLite ships without REGEXP, so the pattern is applied here.
        let articles = self.fetch_articles(self.select_live()).await?;
        Ok(articles.into_iter().filter(|a| query.matches(a)).collect())
    }

    async fn distinct_values(&self, field: DistinctField) -> Result<Vec<String>> {
        let column = match field {
            DistinctField::Location => "location",
            DistinctField::DisruptionType => "disruption_type",
            DistinctField::Severity => "severity",
        };
        let values: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT DISTINCT {column} FROM {} WHERE is_deleted = 0 ORDER BY {column}",
            self.table
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("Failed to fetch distinct values"))?;
        Ok(values.into_iter().map(|(v,)| v).collect())
    }

    async fn disruption_type_totals(&self) -> Result<Vec<DisruptionTypeTotal>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
            r#"
            SELECT COALESCE(disruption_type, 'Unknown') AS kind, COUNT(*) AS total
            FROM {}
            WHERE is_deleted = 0
            GROUP BY kind
            ORDER BY total DESC, kind ASC
            "#,
            self.table
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("Failed to aggregate disruption types"))?;

        Ok(rows
            .into_iter()
            .map(|(disruption_type, total)| DisruptionTypeTotal {
                disruption_type,
                total: total as u64,
            })
            .collect())
    }

    async fn weekly_disruption_type_counts(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<WeeklyDisruptionCount>> {
        // '-6 days' then 'weekday 0' lands on the Sunday that starts the week
        let rows: Vec<(String, String, i64)> = sqlx::query_as(&format!(
            r#"
            SELECT date(published_date, '-6 days', 'weekday 0') AS bucket,
                   disruption_type,
                   COUNT(*) AS total
            FROM {table}
            WHERE is_deleted = 0 AND {published} BETWEEN ? AND ?
            GROUP BY bucket, disruption_type
            ORDER BY bucket ASC, disruption_type ASC
            LIMIT ?
            "#,
            table = self.table,
            published = PUBLISHED_AT,
        ))
        .bind(format_bound(&window.start))
        .bind(format_bound(&window.end))
        .bind(WEEKLY_COUNTS_LIMIT as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("Failed to aggregate weekly disruption counts"))?;

        rows.into_iter()
            .map(|(bucket, disruption_type, total)| {
                Ok(WeeklyDisruptionCount {
                    week_start: bucket_start(&bucket)?,
                    disruption_type,
                    total: total as u64,
                })
            })
            .collect()
    }

    async fn severity_level_counts(
        &self,
        window: &DateWindow,
        period: Period,
    ) -> Result<Vec<SeverityPeriodCount>> {
        let bucket = match period {
            Period::Week => "date(published_date, '-6 days', 'weekday 0')",
            Period::Month => "date(published_date, 'start of month')",
        };
        let rows: Vec<(String, String, i64)> = sqlx::query_as(&format!(
            r#"
            SELECT {bucket} AS bucket, severity, COUNT(*) AS total
            FROM {table}
            WHERE is_deleted = 0 AND {published} BETWEEN ? AND ?
            GROUP BY bucket, severity
            ORDER BY bucket ASC
            "#,
            table = self.table,
            published = PUBLISHED_AT,
        ))
        .bind(format_bound(&window.start))
        .bind(format_bound(&window.end))
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("Failed to aggregate severity counts"))?;

        let mut counts = rows
            .into_iter()
            .map(|(bucket, severity, total)| {
                Ok(SeverityPeriodCount {
                    period_start: bucket_start(&bucket)?,
                    severity: parse_severity(&severity)?,
                    total: total as u64,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        counts.sort_by(|a, b| (a.period_start, a.severity).cmp(&(b.period_start, b.severity)));
        Ok(counts)
    }

    async fn total_severity_counts(&self) -> Result<Vec<SeverityTotal>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
            "SELECT severity, COUNT(*) AS total FROM {} WHERE is_deleted = 0 GROUP BY severity",
            self.table
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(db_error("Failed to aggregate severity totals"))?;

        let mut totals = rows
            .into_iter()
            .map(|(severity, total)| {
                Ok(SeverityTotal {
                    severity: parse_severity(&severity)?,
                    total: total as u64,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        totals.sort_by(|a, b| b.total.cmp(&a.total).then(a.severity.cmp(&b.severity)));
        Ok(totals)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!(target: TARGET_DB, "Database connections closed");
        Ok(())
    }
}
