use chrono::NaiveDate;
use geo_types::Geometry;
use serde_json::Value;
use tracing::{debug, info};
use wkt::ToWkt;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::feature::Feature;
use crate::table::SeriesTable;
use crate::transport::{HttpTransport, Transport};
use crate::util::{join_segments, value_label};

/// Annual maximum temperature, CanESM2 model, RCP 8.5.
pub const DEFAULT_SLUG: &str = "tasmax_year_CanESM2_rcp85";
/// Page size sent with every series request.
pub const PAGE_SIZE: u32 = 94;
/// Feature property used to name columns in [`CalAdaptClient::concat_features_by_id`].
pub const DEFAULT_ID_FIELD: &str = "id";

/// Two path segments that scope a raster query, usually a start and end
/// date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Segments formatted as `YYYY-MM-DD`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(
            start.format("%Y-%m-%d").to_string(),
            end.format("%Y-%m-%d").to_string(),
        )
    }
}

/// A fully built raster query: resource URL plus ordered query pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl SeriesRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Client for the Cal-Adapt raster series API, bound to one series slug.
#[derive(Debug, Clone)]
pub struct CalAdaptClient<T = HttpTransport> {
    series_url: String,
    slug: String,
    transport: T,
}

impl CalAdaptClient<HttpTransport> {
    /// Client for [`DEFAULT_SLUG`] against the public API.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(&config, transport))
    }
}

impl<T: Transport> CalAdaptClient<T> {
    pub fn with_transport(config: &ClientConfig, transport: T) -> Self {
        Self {
            series_url: config.series_url.clone(),
            slug: DEFAULT_SLUG.to_string(),
            transport,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    fn base_query(&self) -> Vec<(String, String)> {
        vec![("pagesize".to_string(), PAGE_SIZE.to_string())]
    }

    /// Lists the slugs of the first catalog page.
    pub fn list_series_slugs(&self) -> Result<Vec<String>> {
        let json = self.transport.get_json(&self.series_url, &self.base_query())?;
        let results = json
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::missing("results", "series catalog response"))?;

        let slugs = results
            .iter()
            .map(|row| {
                row.get("slug")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| Error::missing("slug", "series catalog row"))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(count = slugs.len(), "listed series slugs");
        Ok(slugs)
    }

    /// Builds the raster query for this client's slug.
    ///
    /// Without `dates` the resource is `<slug>/rasters/`; with `dates` the
    /// two dates replace `rasters` in the path. A geometry is sent as WKT in
    /// `g`, and polygons and multipolygons also ask the server for the mean
    /// over the area with `stat=mean`.
    pub fn series_request(
        &self,
        geometry: Option<&Geometry<f64>>,
        dates: Option<&DateRange>,
    ) -> SeriesRequest {
        let url = match dates {
            Some(range) => join_segments(
                &self.series_url,
                [self.slug.as_str(), range.start.as_str(), range.end.as_str()],
            ),
            None => join_segments(&self.series_url, [self.slug.as_str(), "rasters"]),
        };

        let mut query = self.base_query();
        if let Some(geometry) = geometry {
            query.push(("g".to_string(), geometry.wkt_string()));
            if is_areal(geometry) {
                query.push(("stat".to_string(), "mean".to_string()));
            }
        }

        SeriesRequest { url, query }
    }

    /// Fetches raw raster series JSON.
    pub fn series(
        &self,
        geometry: Option<&Geometry<f64>>,
        dates: Option<&DateRange>,
    ) -> Result<Value> {
        let request = self.series_request(geometry, dates);
        self.transport.get_json(&request.url, &request.query)
    }

    /// Converts a raster series response into a Fahrenheit table.
    /// See [`SeriesTable::from_raster_json`].
    pub fn to_table(&self, json: &Value) -> Result<SeriesTable> {
        SeriesTable::from_raster_json(json)
    }

    /// Fetches the series for every feature and joins them on date, one
    /// column per feature named by its `field` property.
    ///
    /// Features whose series has no valid rows are left out.
    pub fn concat_features(&self, features: &[Feature], field: &str) -> Result<SeriesTable> {
        let mut tables = Vec::with_capacity(features.len());

        for feature in features {
            let name = feature
                .property(field)
                .map(value_label)
                .ok_or_else(|| Error::missing(field, "feature properties"))?;

            let json = self.series(Some(&feature.geometry), None)?;
            let table = self.to_table(&json)?;
            if table.is_empty() {
                debug!(feature = %name, "skipping feature with empty series");
                continue;
            }
            tables.push(table.renamed(&name)?);
        }

        info!(
            features = features.len(),
            columns = tables.len(),
            "joined feature series"
        );
        SeriesTable::concat(tables)
    }

    pub fn concat_features_by_id(&self, features: &[Feature]) -> Result<SeriesTable> {
        self.concat_features(features, DEFAULT_ID_FIELD)
    }
}

fn is_areal(geometry: &Geometry<f64>) -> bool {
    matches!(geometry, Geometry::Polygon(_) | Geometry::MultiPolygon(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::to_fahrenheit;
    use crate::transport::fake::FakeTransport;
    use geo_types::{LineString, MultiPolygon, line_string, point, polygon};
    use serde_json::json;

    fn client(transport: &FakeTransport) -> CalAdaptClient<&FakeTransport> {
        let cfg = ClientConfig::default().with_series_url("http://caladapt.test/api/series/");
        CalAdaptClient::with_transport(&cfg, transport)
    }

    fn square() -> Geometry<f64> {
        polygon![
            (x: -122.0, y: 37.0),
            (x: -121.0, y: 37.0),
            (x: -121.0, y: 38.0),
            (x: -122.0, y: 38.0),
            (x: -122.0, y: 37.0),
        ]
        .into()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn default_slug() {
        let fake = FakeTransport::default();
        assert_eq!(client(&fake).slug(), "tasmax_year_CanESM2_rcp85");
        assert_eq!(client(&fake).with_slug("pr_year_CCSM4_rcp45").slug(), "pr_year_CCSM4_rcp45");
    }

    #[test]
    fn lists_slugs_with_page_size() {
        let fake = FakeTransport::ok([json!({
            "count": 2,
            "results": [
                {"slug": "tasmax_year_CanESM2_rcp85", "name": "a"},
                {"slug": "tasmin_year_CanESM2_rcp85", "name": "b"},
            ]
        })]);
        let slugs = client(&fake).list_series_slugs().unwrap();
        assert_eq!(slugs, ["tasmax_year_CanESM2_rcp85", "tasmin_year_CanESM2_rcp85"]);

        let calls = fake.calls.borrow();
        assert_eq!(calls[0].0, "http://caladapt.test/api/series/");
        assert_eq!(fake.query_value(0, "pagesize").as_deref(), Some("94"));
    }

    #[test]
    fn list_without_results_is_schema_error() {
        let fake = FakeTransport::ok([json!({"detail": "nope"})]);
        let err = client(&fake).list_series_slugs().unwrap_err();
        assert!(matches!(err, Error::Schema(_)));

        let fake = FakeTransport::ok([json!({"results": [{"name": "no slug"}]})]);
        let err = client(&fake).list_series_slugs().unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn transport_errors_propagate() {
        let fake = FakeTransport::new([Err(Error::Status {
            url: "http://caladapt.test/api/series/".into(),
            status: 500,
            message: "boom".into(),
        })]);
        let err = client(&fake).list_series_slugs().unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn polygon_requests_mean() {
        let fake = FakeTransport::default();
        let req = client(&fake).series_request(Some(&square()), None);
        assert_eq!(req.param("stat"), Some("mean"));
        assert!(req.param("g").unwrap().starts_with("POLYGON"));
        assert_eq!(req.param("pagesize"), Some("94"));
    }

    #[test]
    fn multipolygon_requests_mean() {
        let fake = FakeTransport::default();
        let Geometry::Polygon(p) = square() else {
            unreachable!()
        };
        let multi: Geometry<f64> = MultiPolygon::new(vec![p]).into();
        let req = client(&fake).series_request(Some(&multi), None);
        assert_eq!(req.param("stat"), Some("mean"));
        assert!(req.param("g").unwrap().starts_with("MULTIPOLYGON"));
    }

    #[test]
    fn point_and_line_do_not_request_mean() {
        let fake = FakeTransport::default();
        let c = client(&fake);

        let pt: Geometry<f64> = point!(x: -122.27, y: 37.80).into();
        let req = c.series_request(Some(&pt), None);
        assert!(req.param("g").unwrap().starts_with("POINT"));
        assert_eq!(req.param("stat"), None);

        let line: LineString<f64> = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)];
        let req = c.series_request(Some(&line.into()), None);
        assert_eq!(req.param("stat"), None);
    }

    #[test]
    fn no_geometry_sends_only_page_size() {
        let fake = FakeTransport::default();
        let req = client(&fake).series_request(None, None);
        assert_eq!(
            req.url,
            "http://caladapt.test/api/series/tasmax_year_CanESM2_rcp85/rasters/"
        );
        assert_eq!(req.query, vec![("pagesize".to_string(), "94".to_string())]);
    }

    #[test]
    fn date_range_replaces_rasters_segment() {
        let fake = FakeTransport::default();
        let range = DateRange::from_dates(date("2020-01-01"), date("2020-12-31"));
        let req = client(&fake).series_request(Some(&square()), Some(&range));
        assert_eq!(
            req.url,
            "http://caladapt.test/api/series/tasmax_year_CanESM2_rcp85/2020-01-01/2020-12-31/"
        );
        assert!(!req.url.contains("rasters"));
        assert!(req.query.iter().all(|(_, v)| !v.contains("2020-01-01")));
    }

    #[test]
    fn series_issues_built_request() {
        let fake = FakeTransport::ok([json!({"results": []})]);
        let c = client(&fake);
        let json = c.series(Some(&square()), None).unwrap();
        assert_eq!(json, json!({"results": []}));

        let calls = fake.calls.borrow();
        assert_eq!(
            calls[0].0,
            "http://caladapt.test/api/series/tasmax_year_CanESM2_rcp85/rasters/"
        );
        assert_eq!(fake.query_value(0, "stat").as_deref(), Some("mean"));
    }

    #[test]
    fn concat_features_joins_on_date() {
        let fake = FakeTransport::ok([
            json!({"results": [
                {"event": "2006-01-01", "image": 290.0},
                {"event": "2007-01-01", "image": 291.0},
            ]}),
            json!({"results": [
                {"event": "2008-01-01", "image": 292.0},
            ]}),
        ]);
        let features = vec![
            Feature::new(square()).with_property("id", "alameda"),
            Feature::new(square()).with_property("id", 6085),
        ];

        let table = client(&fake).concat_features_by_id(&features).unwrap();
        assert_eq!(table.columns(), ["alameda", "6085"]);
        assert_eq!(
            table.dates().unwrap(),
            [date("2006-01-01"), date("2007-01-01"), date("2008-01-01")]
        );
        let cell = |d: &str, c: &str| table.get(date(d), c).unwrap();
        assert_eq!(cell("2006-01-01", "alameda"), Some(to_fahrenheit(290.0)));
        assert_eq!(cell("2006-01-01", "6085"), None);
        assert_eq!(cell("2008-01-01", "alameda"), None);
        assert_eq!(cell("2008-01-01", "6085"), Some(to_fahrenheit(292.0)));
        assert_eq!(fake.call_count(), 2);
    }

    #[test]
    fn concat_features_skips_empty_series() {
        let fake = FakeTransport::ok([
            json!({"results": [{"event": "2006-01-01", "image": "bad"}]}),
            json!({"results": [{"event": "2006-01-01", "image": 280.0}]}),
        ]);
        let features = vec![
            Feature::new(square()).with_property("name", "empty"),
            Feature::new(square()).with_property("name", "full"),
        ];
        let table = client(&fake).concat_features(&features, "name").unwrap();
        assert_eq!(table.columns(), ["full"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn concat_features_rejects_unexpected_record_shape() {
        let fake = FakeTransport::ok([json!({"results": [
            {"date": "2006-01-01", "value": 290.0},
        ]})]);
        let features = vec![Feature::new(square()).with_property("id", "a")];
        let err = client(&fake).concat_features_by_id(&features).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn date_range_accepts_arbitrary_segments() {
        let fake = FakeTransport::default();
        let range = DateRange::new("2006", "2010");
        let req = client(&fake).series_request(None, Some(&range));
        assert_eq!(
            req.url,
            "http://caladapt.test/api/series/tasmax_year_CanESM2_rcp85/2006/2010/"
        );
    }

    #[test]
    fn concat_features_requires_id_field() {
        let fake = FakeTransport::default();
        let features = vec![Feature::new(square()).with_property("name", "x")];
        let err = client(&fake).concat_features_by_id(&features).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(fake.call_count(), 0);
    }

    #[test]
    fn concat_of_no_features_is_empty() {
        let fake = FakeTransport::default();
        let table = client(&fake).concat_features_by_id(&[]).unwrap();
        assert!(table.is_empty());
    }
}
