use anyhow::Result;

use ImageBank::{is_bank_valid, CacheRegistry, ImageBank as Bank, PersistConfig};

use super::util::parse_bank_id;

pub fn exec(
    cfg: &PersistConfig,
    cache: String,
    bank_name: String,
    bank_id: String,
    structured: bool,
) -> Result<()> {
    let id = parse_bank_id(&bank_id, structured)?;
    let reg = CacheRegistry::open(cfg)?;
    let bank = Bank::new(&reg, cfg);

    let path = bank.bank_path_for(&cache, &bank_name, &id)?;
    let needed = bank.check_lazy_status(&cache, &bank_name, &id)?;

    println!("path:   {}", path.display());
    println!("valid:  {}", is_bank_valid(&path));
    if needed.is_empty() {
        println!("lazy:   cached");
    } else {
        println!("lazy:   needs {}", needed.join(", "));
    }
    Ok(())
}
