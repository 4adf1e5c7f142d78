use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use pricelist_catalog::SortDirective;
use pricelist_client::{
    ApiUrl, CatalogApi, CatalogSession, ClientConfig, DirectorySink, ExportCoordinator,
    ExportFormat, HealthMonitor, LocalStorage, LogNotifier, ProbeState, render,
};
use pricelist_core::ProductId;

/// Browse and export the product price list served by the catalog backend.
#[derive(Parser, Debug)]
#[command(name = "pricelist", version, about)]
struct Cli {
    /// Backend base URL (overrides PRICELIST_API_URL).
    #[arg(long = "api-url")]
    api_url: Option<String>,

    /// Show only this brand.
    #[arg(short = 'b', long)]
    brand: Option<String>,

    /// Show only this category.
    #[arg(short = 'c', long)]
    category: Option<String>,

    /// Sort directive, `field` or `field:asc|desc` (e.g. `price_uah:desc`).
    #[arg(short = 's', long)]
    sort: Option<String>,

    /// Toggle these product ids in the saved selection.
    #[arg(long, value_delimiter = ',')]
    select: Vec<i64>,

    /// Clear the saved selection before applying --select.
    #[arg(long)]
    clear: bool,

    /// Export after listing.
    #[arg(short = 'e', long, value_enum)]
    export: Option<ExportMode>,

    /// Directory receiving exported files (overrides PRICELIST_EXPORT_DIR).
    #[arg(long = "export-dir")]
    export_dir: Option<PathBuf>,

    /// Keep reporting connection health until interrupted.
    #[arg(short = 'w', long)]
    watch: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportMode {
    /// Everything when nothing is selected, the selection as xlsx otherwise.
    Auto,
    /// Full catalog as xlsx.
    All,
    /// Selected products as xlsx.
    Xlsx,
    /// Selected products as xml.
    Xml,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    pricelist_observability::init();

    let mut config = ClientConfig::from_env().context("failed to read configuration")?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(ApiUrl::new(url.as_str()));
    }
    if let Some(dir) = &cli.export_dir {
        config = config.with_export_dir(dir);
    }

    tracing::info!(
        api_url = %config.api_url,
        layer = ?config.policy.layer,
        "pricelist starting"
    );

    let api = CatalogApi::from_config(&config).context("failed to build HTTP client")?;
    let monitor = HealthMonitor::new(api.clone(), config.health_interval).activate();

    let mut session = CatalogSession::new(api.clone(), config.policy)
        .with_storage(LocalStorage::open(&config.storage_path));

    if let Err(err) = session.load().await {
        eprintln!("Failed to load products: {err}");
    }

    if let Some(brand) = &cli.brand {
        session.set_brand_filter(brand.as_str());
    }
    if let Some(category) = &cli.category {
        session.set_category_filter(category.as_str());
    }
    if let Some(sort) = &cli.sort {
        let sort: SortDirective = sort
            .parse()
            .with_context(|| format!("invalid --sort value {sort:?}"))?;
        session.set_sort(sort);
    }
    if cli.clear {
        session.clear_selection();
    }
    for id in &cli.select {
        session.toggle(ProductId::new(*id));
    }

    let facets = session.facets();
    println!("Brands: {}", facets.brands.join(", "));
    println!("Categories: {}", facets.categories.join(", "));
    println!();
    print!("{}", render::render_table(&session.rows()));
    println!(
        "\n{} shown, {} selected",
        session.view().len(),
        session.selection().len()
    );

    if let Some(mode) = cli.export {
        let coordinator = ExportCoordinator::new(
            api,
            Arc::new(DirectorySink::new(config.export_dir.clone())),
            Arc::new(LogNotifier),
        );
        let selection = session.selection();
        let outcome = match mode {
            ExportMode::Auto => coordinator.export_default(selection).await,
            ExportMode::All => coordinator.export_all().await,
            ExportMode::Xlsx => {
                coordinator
                    .export_selected(ExportFormat::Spreadsheet, selection)
                    .await
            }
            ExportMode::Xml => coordinator.export_selected(ExportFormat::Xml, selection).await,
        };
        match outcome {
            Ok(delivered) => println!(
                "Saved {} ({} bytes) to {}",
                delivered.file_name,
                delivered.bytes,
                delivered.path.display()
            ),
            Err(err) => eprintln!("Export failed: {err}"),
        }
    }

    let mut health = monitor.subscribe();
    if cli.watch {
        loop {
            println!("Connection: {}", health.borrow_and_update().state.label());
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = health.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    } else {
        let settled = tokio::time::timeout(
            Duration::from_secs(5),
            health.wait_for(|probe| probe.state != ProbeState::Checking),
        );
        let label = match settled.await {
            Ok(Ok(probe)) => probe.state.label(),
            _ => monitor.current().state.label(),
        };
        println!("Connection: {label}");
    }

    monitor.shutdown().await;
    Ok(())
}
