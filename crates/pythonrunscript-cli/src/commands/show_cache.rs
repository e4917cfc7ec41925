use super::{colorize_status, json_pretty, EXIT_SUCCESS};
use pythonrunscript_core::Engine;
use pythonrunscript_store::CacheEntry;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct CacheListing<'a> {
    cache_root: &'a Path,
    trash_root: &'a Path,
    entries: &'a [CacheEntry],
}

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let layout = engine.store_layout();
    let entries = engine.list_entries().map_err(|e| e.to_string())?;

    if json {
        let listing = CacheListing {
            cache_root: layout.cache_root(),
            trash_root: layout.trash_root(),
            entries: &entries,
        };
        println!("{}", json_pretty(&listing)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("cache: {}", layout.cache_root().display());
    println!("trash: {}", layout.trash_root().display());
    println!();
    if entries.is_empty() {
        println!("no cached environments");
        return Ok(EXIT_SUCCESS);
    }
    println!("{:<14} {:<6} {:<11} {:<26} SCRIPT", "ID", "KIND", "STATUS", "CREATED");
    for entry in &entries {
        let (id, kind, created, script) = match &entry.metadata {
            Some(meta) => (
                meta.short_id.to_string(),
                meta.kind.to_string(),
                meta.created_at.as_str(),
                meta.script.display().to_string(),
            ),
            None => (
                entry.name.chars().take(12).collect(),
                String::from("?"),
                "",
                String::new(),
            ),
        };
        println!(
            "{id:<14} {:<6} {:<11} {created:<26} {script}",
            colorize_status(&kind),
            colorize_status(entry.status()),
        );
    }
    Ok(EXIT_SUCCESS)
}
