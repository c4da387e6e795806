//! Date-bucketed queries over an entity's timestamp column.
//!
//! # Responsibility
//! - List the distinct years, months and days present in a table.
//! - Aggregate a numeric column over a half-open time range.
//!
//! # Invariants
//! - Buckets are calendar values of the stored timestamp text, ascending.
//! - Ranges are `start <= timestamp < end`.
//! - Month names never depend on the process locale.

use super::entity_repo::{EntityRepository, RepoError, RepoResult};
use crate::db::Store;
use crate::model::field_map::timestamp_value;
use chrono::NaiveDateTime;
use rusqlite::types::Value;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Three-letter English abbreviation for a month number (1-12).
pub fn month_abbreviation(month: u32) -> Option<&'static str> {
    let index = usize::try_from(month).ok()?.checked_sub(1)?;
    MONTH_ABBREVIATIONS.get(index).copied()
}

/// SQL aggregate applied over a time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Avg,
    Min,
    Max,
    Sum,
}

impl AggregateOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Sum => "SUM",
        }
    }
}

impl EntityRepository<'_> {
    /// Distinct calendar years present in the timestamp column.
    pub fn distinct_years(&self, db: &Store) -> RepoResult<Vec<i32>> {
        let timestamp = self.timestamp_column()?;
        self.query_buckets(
            db,
            &format!(
                "SELECT DISTINCT CAST(strftime('%Y', \"{timestamp}\") AS INTEGER) AS bucket
                 FROM \"{}\"
                 WHERE strftime('%Y', \"{timestamp}\") IS NOT NULL
                 ORDER BY bucket;",
                self.entity().table
            ),
            None,
        )
    }

    /// Distinct month numbers (1-12) within `year`.
    pub fn distinct_months(&self, db: &Store, year: i32) -> RepoResult<Vec<u32>> {
        self.buckets_within_year(db, "%m", year)
    }

    /// Distinct months within `year` as `Jan`..`Dec`.
    pub fn month_names(&self, db: &Store, year: i32) -> RepoResult<Vec<&'static str>> {
        self.distinct_months(db, year)?
            .into_iter()
            .map(|month| {
                month_abbreviation(month).ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "month {month} out of range in {}",
                        self.entity().table
                    ))
                })
            })
            .collect()
    }

    /// Distinct day-of-year ordinals (1-366) within `year`.
    pub fn distinct_days_of_year(&self, db: &Store, year: i32) -> RepoResult<Vec<u32>> {
        self.buckets_within_year(db, "%j", year)
    }

    /// Applies `op` to `column` over rows with `start <= timestamp < end`.
    ///
    /// Returns `None` when no row in the range has a non-null value.
    pub fn aggregate(
        &self,
        db: &Store,
        column: &str,
        op: AggregateOp,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> RepoResult<Option<f64>> {
        let timestamp = self.timestamp_column()?;
        let entity = self.entity();
        if !entity.has_column(column) {
            return Err(RepoError::UnknownColumn {
                entity: entity.name,
                column: column.to_string(),
            });
        }

        let sql = format!(
            "SELECT {}(\"{column}\") FROM \"{}\"
             WHERE \"{timestamp}\" >= ?1 AND \"{timestamp}\" < ?2;",
            op.as_sql(),
            entity.table
        );
        let session = db.session()?;
        let value = session.conn().query_row(
            &sql,
            [timestamp_value(start), timestamp_value(end)],
            |row| row.get::<_, Option<f64>>(0),
        )?;
        session.commit()?;
        Ok(value)
    }

    pub fn column_avg(
        &self,
        db: &Store,
        column: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> RepoResult<Option<f64>> {
        self.aggregate(db, column, AggregateOp::Avg, start, end)
    }

    pub fn column_min(
        &self,
        db: &Store,
        column: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> RepoResult<Option<f64>> {
        self.aggregate(db, column, AggregateOp::Min, start, end)
    }

    pub fn column_max(
        &self,
        db: &Store,
        column: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> RepoResult<Option<f64>> {
        self.aggregate(db, column, AggregateOp::Max, start, end)
    }

    pub fn column_sum(
        &self,
        db: &Store,
        column: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> RepoResult<Option<f64>> {
        self.aggregate(db, column, AggregateOp::Sum, start, end)
    }

    fn timestamp_column(&self) -> RepoResult<&'static str> {
        let entity = self.entity();
        entity.timestamp.ok_or(RepoError::MissingTimestamp {
            entity: entity.name,
        })
    }

    fn buckets_within_year<T>(&self, db: &Store, format: &str, year: i32) -> RepoResult<Vec<T>>
    where
        T: rusqlite::types::FromSql,
    {
        let timestamp = self.timestamp_column()?;
        self.query_buckets(
            db,
            &format!(
                "SELECT DISTINCT CAST(strftime('{format}', \"{timestamp}\") AS INTEGER) AS bucket
                 FROM \"{}\"
                 WHERE strftime('%Y', \"{timestamp}\") = ?1
                 ORDER BY bucket;",
                self.entity().table
            ),
            Some(Value::Text(format!("{year:04}"))),
        )
    }

    fn query_buckets<T>(&self, db: &Store, sql: &str, year: Option<Value>) -> RepoResult<Vec<T>>
    where
        T: rusqlite::types::FromSql,
    {
        let session = db.session()?;
        let buckets = {
            let mut stmt = session.conn().prepare(sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(year), |row| row.get::<_, T>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        session.commit()?;
        Ok(buckets)
    }
}

#[cfg(test)]
mod tests {
    use super::{month_abbreviation, AggregateOp};

    #[test]
    fn month_abbreviations_cover_calendar_months() {
        assert_eq!(month_abbreviation(1), Some("Jan"));
        assert_eq!(month_abbreviation(9), Some("Sep"));
        assert_eq!(month_abbreviation(12), Some("Dec"));
        assert_eq!(month_abbreviation(0), None);
        assert_eq!(month_abbreviation(13), None);
    }

    #[test]
    fn aggregate_ops_render_sql_functions() {
        assert_eq!(AggregateOp::Avg.as_sql(), "AVG");
        assert_eq!(AggregateOp::Sum.as_sql(), "SUM");
    }
}
