use super::EXIT_SUCCESS;
use pythonrunscript_core::Engine;

pub fn run(engine: &Engine) -> Result<u8, String> {
    match engine.clean_cache().map_err(|e| e.to_string())? {
        Some(trashed) => {
            println!("moved the cache to {}", trashed.display());
            println!("the operating system will dispose of it from there");
        }
        None => println!(
            "no cache at {}, nothing to clean",
            engine.store_layout().cache_root().display()
        ),
    }
    Ok(EXIT_SUCCESS)
}
