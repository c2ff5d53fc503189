// Метрики глобальные для процесса: один тест на файл, чтобы счётчики не смешивались.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use ImageBank::metrics;
use ImageBank::{BankId, BankRequest, CacheRegistry, ImageBank as Bank, ImageBatch, NullSink, PersistConfig};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("imgbank-metrics-{prefix}-{pid}-{t}"))
}

#[test]
fn counters_track_lazy_checks_and_bank_io() -> Result<()> {
    metrics::reset();
    let root = unique_root("io");
    let cfg = PersistConfig::default();
    let reg = CacheRegistry::single("default", &root, "safetensors");
    let bank = Bank::new(&reg, &cfg).with_events(NullSink);
    let id = BankId::literal("m");

    bank.check_lazy_status("default", "m", &id)?;
    bank.process(
        &BankRequest::new("m", &id),
        Some(ImageBatch::new(3, 1, 1, 1, vec![0.1, 0.2, 0.3])?),
    )?;
    bank.check_lazy_status("default", "m", &id)?;
    bank.check_lazy_status("default", "m", &id)?;
    bank.process(&BankRequest::new("m", &id), None)?;

    let m = metrics::snapshot();
    assert_eq!(m.lazy_misses, 1);
    assert_eq!(m.lazy_hits, 2);
    assert!((m.lazy_hit_ratio() - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(m.banks_written, 1);
    assert_eq!(m.frames_encoded, 3);
    assert_eq!(m.banks_read, 1);
    assert_eq!(m.frames_decoded, 3);

    metrics::reset();
    let m = metrics::snapshot();
    assert_eq!(m.banks_written + m.lazy_hits + m.frames_decoded, 0);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
