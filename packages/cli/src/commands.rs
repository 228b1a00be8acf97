//! Subcommand implementations.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use climate_map_api::{ApiClient, ApiConfig, CachedApi};
use climate_map_api_models::{AirQuality, ClimateEvent, EventStatus};
use climate_map_boundaries::{BoundaryLoader, BoundarySource, SourceFetcher};
use climate_map_cache::QueryResult;
use climate_map_cli_utils::{IndicatifProgress, MultiProgress, spinner};
use climate_map_events::analytics::Summary;
use climate_map_events::{
    CategoryIndex, CentroidFallback, EventFilter, Geocoder, MapEvent, RegionResolver,
    filter_events, prepare, reconcile_batch,
};
use climate_map_region::{RegionCatalog, RegionIndex, RegionLabel, district_name, find_feature};

use crate::Commands;

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Shared clients for one CLI run.
pub struct App {
    multi: MultiProgress,
    config: ApiConfig,
    api: CachedApi,
    boundaries: BoundaryLoader,
}

impl App {
    /// Builds the API client and boundary loader from `CLIMATE_MAP_*`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid.
    pub fn from_env(multi: MultiProgress) -> CliResult<Self> {
        let config = ApiConfig::from_env()?;
        let client = ApiClient::new(&config)?;
        let source = BoundarySource::from_env();
        log::debug!("API at {}, boundaries from {source}", config.base_url);

        let boundaries = BoundaryLoader::new(Arc::new(SourceFetcher::new(
            reqwest::Client::new(),
            source,
        )));

        Ok(Self {
            multi,
            config,
            api: CachedApi::new(client),
            boundaries,
        })
    }

    pub async fn run(&self, command: Commands) -> CliResult {
        match command {
            Commands::Regions => {
                print_regions(RegionCatalog::bc());
                Ok(())
            }
            Commands::Boundaries => self.boundaries().await,
            Commands::Lookup { name } => self.lookup(&name).await,
            Commands::ExportGroups { dir } => self.export_groups(&dir).await,
            Commands::Events {
                region,
                category,
                status,
                fallback,
            } => {
                let region = parse_region(region.as_deref())?;
                let filter = EventFilter::new(region, category.as_deref());
                self.events(&filter, status, fallback).await
            }
            Commands::Stats => self.stats().await,
            Commands::AirQuality {
                region,
                interval_secs,
            } => {
                self.air_quality(&region, Duration::from_secs(interval_secs))
                    .await
            }
        }
    }

    async fn boundaries(&self) -> CliResult {
        let report = self.boundaries.load_grouped(RegionCatalog::bc()).await?;

        println!("{:<26} FEATURES", "REGION");
        println!("{}", "-".repeat(36));
        for (label, collection) in &report.groups {
            println!("{:<26} {}", label.to_string(), collection.features.len());
        }
        println!();
        println!("{} features grouped", report.grouped_count());

        if !report.unmapped.is_empty() {
            println!("{} uncatalogued:", report.unmapped.len());
            for name in &report.unmapped {
                println!("  {name}");
            }
        }
        Ok(())
    }

    async fn lookup(&self, name: &str) -> CliResult {
        let collection = self.boundaries.load().await?;
        let Some(hit) = find_feature(&collection.features, name) else {
            println!("No boundary matches {name:?}");
            return Ok(());
        };

        let district = district_name(hit.feature).unwrap_or("<unnamed>");
        let region = RegionCatalog::bc()
            .region_of(district)
            .map_or_else(|| "uncatalogued".to_string(), |label| label.to_string());
        println!("{district} ({region}), matched by {:?}", hit.strategy);
        Ok(())
    }

    async fn export_groups(&self, dir: &Path) -> CliResult {
        let groups = self
            .boundaries
            .load_grouped(RegionCatalog::bc())
            .await?
            .into_groups();
        tokio::fs::create_dir_all(dir).await?;

        let progress = IndicatifProgress::steps_bar(&self.multi, "Writing regions", groups.len() as u64);
        for group in &groups {
            let path = dir.join(format!("{}.geojson", file_stem(group.label)));
            tokio::fs::write(&path, group.to_geojson_string()?).await?;
            log::info!(
                "Wrote {} ({} features)",
                path.display(),
                group.features.features.len()
            );
            progress.inc(1);
        }
        progress.finish(format!("Wrote {} region files", groups.len()));
        Ok(())
    }

    async fn events(&self, filter: &EventFilter, status: Option<EventStatus>, fallback: bool) -> CliResult {
        let events = self.load_events(status, fallback).await?;

        let index = if filter.region.is_some() {
            match self.boundaries.load_grouped(RegionCatalog::bc()).await {
                Ok(report) => Some(RegionIndex::build(&report.groups)),
                Err(e) => {
                    log::warn!("Boundaries unavailable, filtering by stored region only: {e}");
                    None
                }
            }
        } else {
            None
        };

        let shown = filter_events(&events, filter, index.as_ref());
        print_events(&shown);
        println!();
        println!("{} of {} events shown", shown.len(), events.len());
        Ok(())
    }

    async fn stats(&self) -> CliResult {
        let events = self.load_events(None, false).await?;
        print_summary(&Summary::from_events(&events));
        Ok(())
    }

    async fn air_quality(&self, region: &str, interval: Duration) -> CliResult {
        println!("Polling air quality for {region} every {}s (Ctrl-C to stop)", interval.as_secs());

        let region_name = region.to_string();
        let mut task = self.api.poll_air_quality(region, interval, move |result| {
            print_air_quality(&region_name, &result);
        });

        tokio::signal::ctrl_c().await?;
        task.stop();
        log::info!("Stopped {}", task.name());
        Ok(())
    }

    /// Fetches events, categories and regions, geocodes events missing
    /// coordinates, and resolves their regions and categories.
    async fn load_events(&self, status: Option<EventStatus>, fallback: bool) -> CliResult<Vec<MapEvent>> {
        let wait = spinner(&self.multi, "Fetching events");
        let (events, categories, regions) = tokio::join!(
            self.api.events_all(status),
            self.api.categories(),
            self.api.regions(),
        );
        wait.finish_and_clear();

        let events = required(events, "events")?;
        let categories = optional(categories, "categories");
        let regions = optional(regions, "regions");

        let catalog = RegionCatalog::bc();
        let resolver = RegionResolver::new(catalog, &regions);
        let client = Arc::new(self.api.client().clone());
        let geocoder: Box<dyn Geocoder> = if fallback {
            Box::new(CentroidFallback::new(client, resolver.clone(), catalog))
        } else {
            Box::new(client)
        };

        let progress = IndicatifProgress::batch_bar(&self.multi, "Geocoding events");
        let reconciled = reconcile_batch(
            geocoder.as_ref(),
            Vec::clone(&events),
            self.config.geocode_concurrency,
            progress.as_ref(),
        )
        .await;

        Ok(prepare(reconciled, &resolver, &CategoryIndex::new(&categories)))
    }
}

/// Unwraps a query result, failing if no data is available.
fn required<T>(result: QueryResult<T>, what: &str) -> CliResult<Arc<T>> {
    match (result.data, result.error) {
        (Some(data), None) => Ok(data),
        (Some(data), Some(e)) => {
            log::warn!("Refreshing {what} failed, using cached data: {e}");
            Ok(data)
        }
        (None, Some(e)) => Err(format!("Failed to fetch {what}: {e}").into()),
        (None, None) => Err(format!("No {what} returned").into()),
    }
}

/// Like [`required`] but degrades to an empty list.
fn optional<T: Clone>(result: QueryResult<Vec<T>>, what: &str) -> Vec<T> {
    match required(result, what) {
        Ok(data) => Vec::clone(&data),
        Err(e) => {
            log::warn!("{e}");
            Vec::new()
        }
    }
}

/// `"all"` or blank means no region filter.
fn parse_region(raw: Option<&str>) -> CliResult<Option<RegionLabel>> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if raw.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    RegionLabel::parse_label(raw).map(Some).ok_or_else(|| {
        let known: Vec<String> = RegionLabel::ALL.iter().map(ToString::to_string).collect();
        format!("Unknown region {raw:?}; expected one of: {}", known.join(", ")).into()
    })
}

/// Lowercase ASCII stem such as `vancouver-island-coast`.
fn file_stem(label: RegionLabel) -> String {
    let mut stem = String::new();
    for c in label.to_string().chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.ends_with('-') {
            stem.push('-');
        }
    }
    stem.trim_matches('-').to_string()
}

fn print_regions(catalog: &RegionCatalog) {
    for definition in catalog.definitions() {
        println!(
            "{} {} ({:.1}, {:.1})",
            definition.label, definition.color, definition.centroid.lat, definition.centroid.lng
        );
        for district in &definition.districts {
            println!("    {district}");
        }
    }
    println!();
    println!("{} districts in {} regions", catalog.district_count(), RegionLabel::ALL.len());
}

fn print_events(events: &[ClimateEvent]) {
    println!("{:<12} {:<10} {:<20} {:>9} {:>10}  TITLE", "ID", "DATE", "LOCATION", "LAT", "LNG");
    println!("{}", "-".repeat(80));
    for event in events {
        let Some(point) = event.coordinates() else {
            continue;
        };
        let marker = if event.coordinates_adjusted == Some(true) { "~" } else { " " };
        println!(
            "{:<12} {:<10} {:<20} {:>9.4} {:>10.4}{marker} {}",
            truncate(&event.event_id, 12),
            truncate(&event.date, 10),
            truncate(&event.location, 20),
            point.lat,
            point.lng,
            event.title
        );
    }
}

fn print_summary(summary: &Summary) {
    println!(
        "{} events, {} located, {} featured, {} without a known region",
        summary.total, summary.located, summary.featured, summary.unresolved_region
    );

    println!();
    println!("By category:");
    for (category, count) in &summary.by_category {
        println!("  {category:<24} {count}");
    }

    println!();
    println!("By region:");
    for (label, count) in &summary.by_region {
        println!("  {:<24} {count}", label.to_string());
    }

    println!();
    println!("By status:");
    for (status, count) in &summary.by_status {
        println!("  {status:<24} {count}");
    }

    println!();
    println!("By year:");
    for (year, count) in &summary.by_year {
        println!("  {year:<24} {count}");
    }
}

fn print_air_quality(region: &str, result: &QueryResult<AirQuality>) {
    if let Some(e) = &result.error {
        log::error!("Air quality for {region}: {e}");
    }
    let Some(reading) = result.data.as_ref().and_then(|aq| aq.current.as_ref()) else {
        println!("{region}: no current reading");
        return;
    };

    let aqi = reading.aqi_label().unwrap_or_else(|| "n/a".to_string());
    let pm2_5 = reading
        .pm2_5
        .map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"));
    let smoke = reading
        .smoke_level()
        .map_or_else(String::new, |level| format!(" ({level} smoke)"));
    println!(
        "{region} {}: AQI {aqi}, PM2.5 {pm2_5}{smoke}",
        reading.time.as_deref().unwrap_or("")
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
