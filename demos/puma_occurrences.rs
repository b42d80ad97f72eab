use anyhow::Result;
use caladapt_gbif::{GbifClient, OccurrenceQuery};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = GbifClient::new()?;
    let query = OccurrenceQuery::new()
        .with("scientificName", "Puma concolor")
        .with("stateProvince", "California")
        .with("hasCoordinate", "true");

    let mut records = 0usize;
    for page in client.pages(query, 300).with_progress(true) {
        let page = page?;
        records += page.results().len();
        if let Some(count) = page.count() {
            println!("offset {:?}: {} of {} record(s)", page.offset(), records, count);
        }
    }

    println!("fetched {records} record(s)");
    Ok(())
}
