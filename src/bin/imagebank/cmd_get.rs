use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use ImageBank::{BankRequest, CacheRegistry, ImageBank as Bank, PersistConfig};

use super::util::{parse_bank_id, save_png};

pub fn exec(
    cfg: &PersistConfig,
    cache: String,
    bank_name: String,
    bank_id: String,
    structured: bool,
    index: i64,
    out: PathBuf,
) -> Result<()> {
    let id = parse_bank_id(&bank_id, structured)?;
    let reg = CacheRegistry::open(cfg)?;
    let bank = Bank::new(&reg, cfg);
    let req = BankRequest::new(&bank_name, &id)
        .with_cache(&cache)
        .with_selected_index(index);
    let res = bank.process(&req, None)?;

    fs::create_dir_all(&out).with_context(|| format!("create {}", out.display()))?;
    for (i, frame) in ImageBank::frames::split_images(&res.images).iter().enumerate() {
        save_png(frame, &out.join(format!("{}.png", i)))?;
    }

    let [h, w, c] = res.selected.shape();
    println!(
        "OK get: {} frame(s) -> {}; selected[{}] = {}x{}x{}",
        res.images.len(),
        out.display(),
        index,
        h,
        w,
        c
    );
    Ok(())
}
