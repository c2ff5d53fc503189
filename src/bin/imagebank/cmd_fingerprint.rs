use anyhow::Result;

use ImageBank::fingerprint;

use super::util::parse_bank_id;

pub fn exec(bank_id: String, structured: bool) -> Result<()> {
    let id = parse_bank_id(&bank_id, structured)?;
    println!("{}", fingerprint(&id));
    Ok(())
}
