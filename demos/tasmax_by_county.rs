use anyhow::Result;
use caladapt_gbif::{CalAdaptClient, Feature};
use geo_types::{point, polygon};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // RUST_LOG=caladapt_gbif=debug shows every request.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = CalAdaptClient::new()?;

    let slugs = client.list_series_slugs()?;
    println!("{} series available, e.g. {:?}", slugs.len(), slugs.first());

    // Rough outlines; the API averages rasters over each polygon.
    let features = [
        Feature::new(polygon![
            (x: -122.33, y: 37.45),
            (x: -121.47, y: 37.45),
            (x: -121.47, y: 37.91),
            (x: -122.33, y: 37.91),
            (x: -122.33, y: 37.45),
        ])
        .with_property("id", "alameda"),
        Feature::new(polygon![
            (x: -120.65, y: 38.50),
            (x: -119.90, y: 38.50),
            (x: -119.90, y: 39.07),
            (x: -120.65, y: 39.07),
            (x: -120.65, y: 38.50),
        ])
        .with_property("id", "el_dorado"),
        Feature::new(point!(x: -118.24, y: 34.05)).with_property("id", "los_angeles"),
    ];

    let table = client.concat_features_by_id(&features)?;
    println!("{table}");
    Ok(())
}
