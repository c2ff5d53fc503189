use anyhow::Result;
use serde_json::json;

use ImageBank::{CacheRegistry, PersistConfig};

pub fn exec(cfg: &PersistConfig, json: bool) -> Result<()> {
    let reg = CacheRegistry::open(cfg)?;

    let mut rows = Vec::new();
    for name in reg.cache_names() {
        // неполная запись реестра не должна прятать остальные кэши
        let root = reg
            .get_cache_root(&name)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|e| format!("<{}>", e));
        let encoder = reg
            .get_cache_encoder(&name)
            .unwrap_or_else(|e| format!("<{}>", e));
        rows.push((name, root, encoder));
    }

    if json {
        let arr: Vec<_> = rows
            .iter()
            .map(|(n, r, e)| json!({ "name": n, "cache_path": r, "encoder": e }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&arr)?);
        return Ok(());
    }

    println!("Caches ({}):", reg.path().display());
    for (n, r, e) in rows {
        println!("  {:<16} encoder={:<12} {}", n, e, r);
    }
    Ok(())
}
