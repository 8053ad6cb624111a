//! Environment readiness check.

use std::path::Path;

use anyhow::Result;

use crate::config::resolve_data_dir;
use crate::renderer::chromium::find_chromium;

/// Check Chromium, model API access, and the data directory.
pub async fn run(data_dir: Option<&Path>) -> Result<()> {
    println!("Web Explorer Doctor");
    println!("===================");
    println!();

    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    let chromium_path = find_chromium();
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Install Chrome or set EXPLORER_CHROMIUM_PATH."),
    }

    let has_key = std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty());
    if has_key {
        println!("[OK] OPENAI_API_KEY is set");
    } else {
        println!("[!!] OPENAI_API_KEY is not set");
    }
    match std::env::var("OPENAI_BASE_URL") {
        Ok(base) => println!("[OK] Model API: {base}"),
        Err(_) => println!("[OK] Model API: default OpenAI endpoint"),
    }

    let dir = resolve_data_dir(data_dir);
    match std::fs::create_dir_all(&dir) {
        Ok(()) => println!("[OK] Data directory is writable: {}", dir.display()),
        Err(e) => println!("[!!] Data directory {} is not usable: {e}", dir.display()),
    }

    println!();
    if chromium_path.is_some() && has_key {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
