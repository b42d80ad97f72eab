//! Date-indexed tables of Fahrenheit values, backed by a Polars `DataFrame`.

use chrono::{Duration, NaiveDate};
use polars::prelude::{
    DataFrame, DataType, IntoLazy, JoinArgs, JoinCoalesce, JoinType, NamedFrom, Series,
    SortMultipleOptions, col,
};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::{info, trace};

use crate::error::{Error, Result};

/// Name of the date index column.
pub const EVENT_COLUMN: &str = "event";
/// Name of the value column produced from raster observations.
pub const IMAGE_COLUMN: &str = "image";

const EVENT_FORMAT: &str = "%Y-%m-%d";

/// Kelvin to degrees Fahrenheit.
pub fn to_fahrenheit(kelvin: f64) -> f64 {
    (kelvin - 273.15) * 9.0 / 5.0 + 32.0
}

/// A wrapper around a Polars `DataFrame` with an `event` date column, sorted
/// ascending, and one `Float64` column per series.
///
/// Values are null where a column has no observation for that date, which
/// only happens after [`SeriesTable::concat`].
#[derive(Debug, Clone)]
pub struct SeriesTable {
    /// The underlying frame.
    pub frame: DataFrame,
}

impl SeriesTable {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    /// Loads the `results` array of a raster series response into an
    /// `event`/`image` frame.
    ///
    /// `image` is converted from Kelvin to Fahrenheit; it may be a JSON number
    /// or a numeric string. `event` must be exactly `YYYY-MM-DD`. Rows where
    /// either fails are dropped. A non-empty `results` in which no record has
    /// an `image` (or `event`) field is a schema error. If two rows share a
    /// date the later one wins.
    pub fn from_raster_json(json: &Value) -> Result<Self> {
        let results = json
            .get("results")
            .ok_or_else(|| Error::missing("results", "raster series response"))?
            .as_array()
            .ok_or_else(|| Error::Schema("`results` is not an array".to_string()))?;

        if !results.is_empty() {
            for field in [EVENT_COLUMN, IMAGE_COLUMN] {
                if !results.iter().any(|r| r.get(field).is_some()) {
                    return Err(Error::missing(field, "raster series record"));
                }
            }
        }

        let mut events: Vec<Option<i32>> = Vec::with_capacity(results.len());
        let mut images: Vec<Option<f64>> = Vec::with_capacity(results.len());
        for record in results {
            let date = record
                .get(EVENT_COLUMN)
                .and_then(Value::as_str)
                .and_then(|s| NaiveDate::parse_from_str(s, EVENT_FORMAT).ok());
            let fahrenheit = record
                .get(IMAGE_COLUMN)
                .and_then(numeric)
                .map(to_fahrenheit)
                .filter(|f| !f.is_nan());
            if date.is_none() || fahrenheit.is_none() {
                trace!(?record, "dropping raster record");
            }
            events.push(date.map(epoch_days));
            images.push(fahrenheit);
        }
        mask_superseded(&mut events);

        let event = Series::new(EVENT_COLUMN.into(), events).cast(&DataType::Date)?;
        let image = Series::new(IMAGE_COLUMN.into(), images);
        let valid = &event.is_not_null() & &image.is_not_null();

        let frame = DataFrame::new(vec![event.into(), image.into()])?
            .filter(&valid)?
            .lazy()
            .sort_by_exprs([col(EVENT_COLUMN)], SortMultipleOptions::default())
            .collect()?;

        info!(
            kept = frame.height(),
            dropped = results.len() - frame.height(),
            "raster records converted"
        );
        Ok(Self::new(frame))
    }

    /// Renames the `image` column, e.g. to the feature it was fetched for.
    pub fn renamed(self, name: &str) -> Result<Self> {
        let frame = self
            .frame
            .lazy()
            .select([col(EVENT_COLUMN), col(IMAGE_COLUMN).alias(name)])
            .collect()?;
        Ok(Self::new(frame))
    }

    /// Full outer join on `event`: the result holds the union of dates and
    /// nulls where a table lacks a date. No tables gives an empty table.
    pub fn concat(tables: Vec<SeriesTable>) -> Result<Self> {
        let mut tables = tables.into_iter();
        let Some(first) = tables.next() else {
            return Ok(Self::new(DataFrame::empty()));
        };

        let args = JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns);
        let joined = tables.fold(first.frame.lazy(), |acc, t| {
            acc.join(
                t.frame.lazy(),
                [col(EVENT_COLUMN)],
                [col(EVENT_COLUMN)],
                args.clone(),
            )
        });

        let frame = joined
            .sort_by_exprs([col(EVENT_COLUMN)], SortMultipleOptions::default())
            .collect()?;
        Ok(Self::new(frame))
    }

    /// Value column names, in order.
    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .filter(|n| n != EVENT_COLUMN)
            .collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Row index in ascending date order.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        if self.frame.width() == 0 {
            return Ok(Vec::new());
        }
        let days = self
            .frame
            .column(EVENT_COLUMN)?
            .as_materialized_series()
            .cast(&DataType::Int32)?;
        days.i32()?
            .into_iter()
            .map(|d| {
                d.and_then(from_epoch_days)
                    .ok_or_else(|| Error::Schema("null or invalid `event` in table".to_string()))
            })
            .collect()
    }

    /// Values of one column aligned with [`SeriesTable::dates`].
    pub fn values(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let series = self.frame.column(column)?.as_materialized_series();
        Ok(series.f64()?.into_iter().collect())
    }

    pub fn get(&self, date: NaiveDate, column: &str) -> Result<Option<f64>> {
        let values = self.values(column)?;
        let row = self.dates()?.iter().position(|d| *d == date);
        Ok(row.and_then(|i| values[i]))
    }
}

impl fmt::Display for SeriesTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.frame, f)
    }
}

fn epoch_days(date: NaiveDate) -> i32 {
    date.signed_duration_since(NaiveDate::default()).num_days() as i32
}

fn from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::default().checked_add_signed(Duration::days(days.into()))
}

// Nulls out every event whose date reappears later, so the last record for
// a date is the one that survives the null filter.
fn mask_superseded(events: &mut [Option<i32>]) {
    let mut last: HashMap<i32, usize> = HashMap::new();
    for (i, d) in events.iter().enumerate() {
        if let Some(d) = d {
            last.insert(*d, i);
        }
    }
    for (i, d) in events.iter_mut().enumerate() {
        if d.is_some_and(|day| last.get(&day) != Some(&i)) {
            *d = None;
        }
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
