use anyhow::Result;
use std::path::PathBuf;

use ImageBank::{BankRequest, CacheRegistry, ImageBank as Bank, PersistConfig};

use super::util::{load_images, parse_bank_id};

pub fn exec(
    cfg: &PersistConfig,
    cache: String,
    bank_name: String,
    bank_id: String,
    structured: bool,
    index: i64,
    images: Vec<PathBuf>,
) -> Result<()> {
    let id = parse_bank_id(&bank_id, structured)?;
    let batch = load_images(&images)?;

    let reg = CacheRegistry::open(cfg)?;
    let bank = Bank::new(&reg, cfg);
    let req = BankRequest::new(&bank_name, &id)
        .with_cache(&cache)
        .with_selected_index(index);
    let out = bank.process(&req, Some(batch))?;

    println!(
        "OK put: {} frame(s) into {}",
        out.images.len(),
        bank.bank_path_for(&cache, &bank_name, &id)?.display()
    );
    if let Some(video) = out.video {
        println!("video: {}", serde_json::to_string(&video)?);
    }
    Ok(())
}
