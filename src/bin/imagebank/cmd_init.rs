use anyhow::Result;

use ImageBank::{CacheRegistry, PersistConfig};

pub fn exec(cfg: &PersistConfig) -> Result<()> {
    let existed = cfg.registry_path().is_file();
    let reg = CacheRegistry::open(cfg)?;
    if existed {
        println!("Registry already initialized at {}", reg.path().display());
    } else {
        println!("Initialized registry at {}", reg.path().display());
    }
    for name in reg.cache_names() {
        println!("  {} -> {}", name, reg.get_cache_root(&name)?.display());
    }
    Ok(())
}
