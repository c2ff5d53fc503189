use anyhow::Result;
use serde_json::json;

use ImageBank::{list_banks, metrics, CacheRegistry, PersistConfig};

pub fn exec(cfg: &PersistConfig, json: bool) -> Result<()> {
    let reg = CacheRegistry::open(cfg)?;

    let mut caches = Vec::new();
    for name in reg.cache_names() {
        let banks = match reg.get_cache_root(&name) {
            Ok(root) => Some(list_banks(&root)?.len()),
            Err(_) => None,
        };
        caches.push((name, banks));
    }
    let m = metrics::snapshot();

    if json {
        let caches_json: Vec<_> = caches
            .iter()
            .map(|(n, b)| json!({ "name": n, "banks": b }))
            .collect();
        let obj = json!({
            "registry": reg.path().display().to_string(),
            "default_encoder": cfg.default_encoder,
            "lock_banks": cfg.lock_banks,
            "export_video": cfg.export_video,
            "caches": caches_json,
            "metrics": m,
        });
        println!("{}", serde_json::to_string_pretty(&obj)?);
        return Ok(());
    }

    println!("{}", cfg);
    println!("registry: {}", reg.path().display());
    for (n, b) in &caches {
        match b {
            Some(count) => println!("  cache {:<16} banks={}", n, count),
            None => println!("  cache {:<16} (no cache_path)", n),
        }
    }
    println!("metrics:");
    println!("  lazy hits/misses  = {}/{} (ratio {:.2})", m.lazy_hits, m.lazy_misses, m.lazy_hit_ratio());
    println!("  banks written     = {}", m.banks_written);
    println!("  banks read        = {}", m.banks_read);
    println!("  frames enc/dec    = {}/{}", m.frames_encoded, m.frames_decoded);
    Ok(())
}
