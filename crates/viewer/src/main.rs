use rayon::prelude::*;
use shared::image::format_image_size;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use viewer::CacheServices;
use viewer_config::CacheConfig;
use viewer_image::{FolderSource, ImageSource};

const USAGE: &str = "usage: folio-cache <stats | clear | warm <dir> | favorite <file> | direction <dir>>";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let services = CacheServices::open(CacheConfig::load());

    match run(&services, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(services: &CacheServices, args: &[String]) -> Result<(), String> {
    let command = args.first().map(String::as_str);
    let target = args.get(1).map(PathBuf::from);

    match (command, target) {
        (Some("stats"), None) => {
            let stats = services.stats();
            println!("thumbnails: {}", stats.file_count);
            println!("disk usage: {}", format_image_size(stats.total_bytes));
            println!("indexed locations: {}", services.index().len());
            println!("favorites: {}", services.favorites().len());
            println!("sources with settings: {}", services.settings().len());
        }
        (Some("clear"), None) => {
            services.clear_memory();
            let removed = services.clear_persisted();
            println!("removed {removed} thumbnails");
        }
        (Some("warm"), Some(dir)) => warm(services, &dir)?,
        (Some("favorite"), Some(file)) => {
            let dir = file
                .parent()
                .ok_or_else(|| format!("{} has no parent folder", file.display()))?;
            let source = FolderSource::new(dir);
            let status = services.toggle_favorite(&source, &file.to_string_lossy());
            println!("{status}");
        }
        (Some("direction"), Some(dir)) => {
            let direction = services
                .settings()
                .toggle_reading_direction(&dir.to_string_lossy());
            println!("{direction}");
        }
        _ => return Err(USAGE.to_string()),
    }
    Ok(())
}

fn warm(services: &CacheServices, dir: &Path) -> Result<(), String> {
    if !dir.is_dir() {
        return Err(format!("{} is not a folder", dir.display()));
    }

    let source = FolderSource::new(dir);
    let entries = source.list_entries();
    let failed = AtomicUsize::new(0);

    entries.par_iter().for_each(|location| {
        if services.thumbnail(&source, location).is_none() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    });

    let failed = failed.into_inner();
    println!(
        "warmed {} of {} images",
        entries.len() - failed,
        entries.len()
    );
    Ok(())
}
