use anyhow::Result;

use ImageBank::{list_banks, CacheRegistry, PersistConfig};

pub fn exec(cfg: &PersistConfig, cache: String, json: bool) -> Result<()> {
    let reg = CacheRegistry::open(cfg)?;
    let root = reg.get_cache_root(&cache)?;
    let mut banks = list_banks(&root)?;
    banks.sort_by_key(|b| b.key());

    if json {
        println!("{}", serde_json::to_string_pretty(&banks)?);
        return Ok(());
    }

    println!("Banks in '{}' ({}): {}", cache, root.display(), banks.len());
    for b in &banks {
        println!(
            "  {}  frames={}  encoder={}",
            b.key(),
            b.metadata
                .num_frames()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".into()),
            b.metadata.encoder.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
