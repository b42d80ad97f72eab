//! A small blocking client for two public web APIs:
//!
//! - the Cal-Adapt raster **series** API, turned into date-indexed tables of
//!   Fahrenheit values, optionally averaged over a polygon;
//! - the GBIF **occurrence search** API, paged lazily up to an offset threshold.
//!
//! ## Quick start
//!
//! ```no_run
//! use caladapt_gbif::{CalAdaptClient, Feature, GbifClient, OccurrenceQuery};
//! use geo_types::polygon;
//!
//! fn main() -> Result<(), caladapt_gbif::Error> {
//!     let climate = CalAdaptClient::new()?;
//!     let county = Feature::new(polygon![
//!         (x: -122.3, y: 37.5),
//!         (x: -121.5, y: 37.5),
//!         (x: -121.5, y: 37.9),
//!         (x: -122.3, y: 37.5),
//!     ])
//!     .with_property("id", "alameda");
//!     let table = climate.concat_features_by_id(&[county])?;
//!     println!("{table}");
//!
//!     let gbif = GbifClient::new()?;
//!     let query = OccurrenceQuery::new().with("scientificName", "Puma concolor");
//!     for page in gbif.search(query) {
//!         println!("{} record(s)", page?.results().len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Requests are logged through `tracing`; install a subscriber to see them.

#![forbid(unsafe_code)]

mod caladapt;
mod config;
mod error;
mod feature;
mod gbif;
mod table;
mod transport;
mod util;

pub use caladapt::{
    CalAdaptClient, DEFAULT_ID_FIELD, DEFAULT_SLUG, DateRange, PAGE_SIZE, SeriesRequest,
};
pub use config::{ClientConfig, OCCURRENCE_URL, SERIES_URL};
pub use error::{Error, Result};
pub use feature::Feature;
pub use gbif::{
    DEFAULT_LIMIT, DEFAULT_THRESHOLD, GbifClient, OccurrencePage, OccurrenceQuery, Pages,
};
pub use table::{EVENT_COLUMN, IMAGE_COLUMN, SeriesTable, to_fahrenheit};
pub use transport::{HttpTransport, Transport};
