use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde_json::{json, Value};

use ImageBank::error::bank_error;
use ImageBank::registry::{BANK_CONF_FILE, DEFAULT_CACHE_NAME, DEFAULT_CACHE_SUBDIR};
use ImageBank::{
    BankError, BankId, BankRequest, CacheRegistry, ImageBank as Bank, ImageBatch, NullSink,
    PersistConfig,
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("imgbank-registry-{prefix}-{pid}-{t}-{id}"))
}

#[test]
fn first_open_creates_default_cache() -> Result<()> {
    let root = unique_root("first");
    let cfg = PersistConfig::default()
        .with_user_dir(root.join("user"))
        .with_output_dir(root.join("output"));

    let reg = CacheRegistry::open(&cfg)?;
    let file = root.join("user").join(BANK_CONF_FILE);
    assert!(file.is_file());
    assert_eq!(reg.path(), file.as_path());
    assert_eq!(reg.cache_names(), vec![DEFAULT_CACHE_NAME.to_string()]);
    assert_eq!(
        reg.get_cache_root(DEFAULT_CACHE_NAME)?,
        root.join("output").join(DEFAULT_CACHE_SUBDIR)
    );
    assert_eq!(reg.get_cache_encoder(DEFAULT_CACHE_NAME)?, "webp");

    // the engine does not rewrite an existing registry
    let custom = json!({
        "default": { "cache_path": root.join("elsewhere").to_string_lossy() },
        "tensors": { "cache_path": root.join("t").to_string_lossy(), "encoder": "safetensors" }
    });
    fs::write(&file, serde_json::to_vec_pretty(&custom)?)?;
    let reg = CacheRegistry::open(&cfg)?;
    assert_eq!(reg.cache_names(), vec!["default", "tensors"]);
    assert_eq!(reg.get_cache_root("default")?, root.join("elsewhere"));
    assert_eq!(reg.get_cache_encoder("default")?, "webp");
    assert_eq!(reg.get_cache_encoder("tensors")?, "safetensors");

    let on_disk: Value = serde_json::from_slice(&fs::read(&file)?)?;
    assert_eq!(on_disk, custom);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn cache_encoder_decides_how_banks_are_written() -> Result<()> {
    let root = unique_root("per-cache");
    let cfg = PersistConfig::default()
        .with_user_dir(&root)
        .with_output_dir(&root);
    let file = cfg.registry_path();
    fs::create_dir_all(&root)?;
    fs::write(
        &file,
        serde_json::to_vec(&json!({
            "raster": { "cache_path": root.join("r").to_string_lossy(), "encoder": "pil" },
            "tensor": { "cache_path": root.join("t").to_string_lossy(), "encoder": "safetensors" },
            "broken": { "cache_path": root.join("b").to_string_lossy(), "encoder": "gif" }
        }))?,
    )?;

    let reg = CacheRegistry::open(&cfg)?;
    let bank = Bank::new(&reg, &cfg).with_events(NullSink);
    let id = BankId::literal("x");
    let input = ImageBatch::new(1, 2, 2, 3, vec![0.5; 12])?;

    bank.process(&BankRequest::new("n", &id).with_cache("raster"), Some(input.clone()))?;
    assert!(root.join("r/n/x/0.webp").is_file());

    bank.process(&BankRequest::new("n", &id).with_cache("tensor"), Some(input.clone()))?;
    assert!(root.join("t/n/x/0.safetensors.zst").is_file());

    // unknown encoder fails before the bank directory is created
    let err = bank
        .process(&BankRequest::new("n", &id).with_cache("broken"), Some(input))
        .unwrap_err();
    assert!(matches!(bank_error(&err), Some(BankError::Configuration(_))));
    assert!(!root.join("b").exists());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn malformed_registry_is_an_error() -> Result<()> {
    let root = unique_root("malformed");
    fs::create_dir_all(&root)?;
    let cfg = PersistConfig::default().with_user_dir(&root);
    for body in [&b"{ not json"[..], &b"[]"[..]] {
        fs::write(cfg.registry_path(), body)?;
        let err = CacheRegistry::open(&cfg).unwrap_err();
        assert!(matches!(bank_error(&err), Some(BankError::Configuration(_))));
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn invalid_entry_does_not_hide_valid_caches() -> Result<()> {
    let root = unique_root("bad-entry");
    fs::create_dir_all(&root)?;
    let cfg = PersistConfig::default().with_user_dir(&root);
    fs::write(
        cfg.registry_path(),
        serde_json::to_vec(&json!({
            "default": { "cache_path": root.join("ok").to_string_lossy() },
            "bad": { "cache_path": 5 }
        }))?,
    )?;

    let reg = CacheRegistry::open(&cfg)?;
    let err = reg.get_cache_root("bad").unwrap_err();
    assert!(matches!(bank_error(&err), Some(BankError::Configuration(_))));

    let bank = Bank::new(&reg, &cfg).with_events(NullSink);
    let id = BankId::literal("still-works");
    let input = ImageBatch::new(1, 1, 1, 1, vec![0.5])?;
    bank.process(&BankRequest::new("n", &id), Some(input))?;
    assert!(root.join("ok/n/still-works").is_dir());

    let err = bank
        .process(&BankRequest::new("n", &id).with_cache("bad"), None)
        .unwrap_err();
    assert!(matches!(bank_error(&err), Some(BankError::Configuration(_))));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn bank_names_are_sanitized_into_the_cache_root() -> Result<()> {
    let root = unique_root("sanitize");
    let cfg = PersistConfig::default();
    let reg = CacheRegistry::single("default", &root, "safetensors");
    let bank = Bank::new(&reg, &cfg).with_events(NullSink);

    let id = BankId::literal("a:b?");
    let path = bank.bank_path_for("default", "../escape", &id)?;
    assert!(path.starts_with(&root), "{} escapes {}", path.display(), root.display());

    let input = ImageBatch::new(1, 1, 1, 1, vec![0.5])?;
    bank.process(&BankRequest::new("../escape", &id), Some(input))?;
    assert!(path.is_dir());
    assert_eq!(path.file_name().and_then(|s| s.to_str()), Some("a_b_"));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
