//! bank: identity, layout and metadata of image banks.
//!
//! Layout (relative to a cache root):
//! ```text
//! <cache_root>/<bank_name>/<fingerprint>/
//!     metadata.json      {"encoder": str, "bank_config": {"num_frames": int, ...}}
//!     0.<ext> .. (N-1).<ext>
//! ```
//!
//! Подмодули:
//! - store.rs  : ImageBank: process (write/read), lazy check
//! - stepped.rs: SteppedImageBank: series of banks on top of ImageBank
//!
//! Validity: metadata.json parses and `bank_config.num_frames` is present and
//! non-null. Frame files are not checked.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::BankError;
use crate::util::hex_encode;

pub mod stepped;
pub mod store;

pub use stepped::{
    parse_forced_bank, resolve_bank_settings, Series, SeriesStep, StepOutput, StepRequest,
    SteppedImageBank, BANK_NAME_PLACEHOLDER, NO_FORCED_BANK,
};
pub use store::{BankOutput, BankRequest, ImageBank, IMAGES_INPUT};

pub const METADATA_FILENAME: &str = "metadata.json";
pub const NUM_FRAMES_KEY: &str = "num_frames";

/// Characters rejected in path components on at least one mainstream platform.
const INVALID_PATH_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\'];
const REPLACEMENT_CHAR: char = '_';

// ---------------------- Bank identifier ----------------------

/// Bank identifier: a literal key or a structured (JSON) configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum BankId {
    Literal(String),
    Structured(Value),
}

impl BankId {
    pub fn literal<S: Into<String>>(s: S) -> Self {
        BankId::Literal(s.into())
    }

    /// Structured identifier from any serializable value.
    /// A JSON string becomes a literal id. Non-serializable → InvalidBankId.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let v = serde_json::to_value(value)
            .map_err(|e| BankError::InvalidBankId(e.to_string()))?;
        Ok(Self::from_value(v))
    }

    /// Parse a JSON document into a structured identifier.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let v: Value = serde_json::from_str(text)
            .map_err(|e| BankError::InvalidBankId(format!("{}: {}", text, e)))?;
        Ok(Self::from_value(v))
    }

    pub fn from_value(v: Value) -> Self {
        match v {
            Value::String(s) => BankId::Literal(s),
            other => BankId::Structured(other),
        }
    }

    /// "Falsy" identifiers count as not provided when a step id has to be
    /// synthesized: "", null, false, 0 / 0.0, {} and [].
    pub fn is_empty(&self) -> bool {
        match self {
            BankId::Literal(s) => s.is_empty(),
            BankId::Structured(v) => match v {
                Value::Null => true,
                Value::Bool(b) => !b,
                Value::Number(n) => n.as_f64() == Some(0.0),
                Value::String(s) => s.is_empty(),
                Value::Object(m) => m.is_empty(),
                Value::Array(a) => a.is_empty(),
            },
        }
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self)
    }

    /// `bank_config` stored in metadata for a bank of `num_frames` frames:
    /// literal → {num_frames}; structured object → its fields + num_frames
    /// (forced); any other structured value → {num_frames}.
    pub fn bank_config(&self, num_frames: usize) -> Map<String, Value> {
        let mut cfg = match self {
            BankId::Structured(Value::Object(m)) => m.clone(),
            _ => Map::new(),
        };
        cfg.insert(NUM_FRAMES_KEY.to_string(), Value::from(num_frames as u64));
        cfg
    }
}

impl From<&str> for BankId {
    fn from(s: &str) -> Self {
        BankId::Literal(s.to_string())
    }
}

impl From<String> for BankId {
    fn from(s: String) -> Self {
        BankId::Literal(s)
    }
}

impl std::fmt::Display for BankId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BankId::Literal(s) => f.write_str(s),
            BankId::Structured(v) => f.write_str(&canonical_json(v)),
        }
    }
}

// ---------------------- Fingerprint / path ----------------------

/// Compact JSON with object keys sorted recursively.
pub fn canonical_json(v: &Value) -> String {
    let mut out = String::new();
    write_canonical(v, &mut out);
    out
}

fn write_canonical(v: &Value, out: &mut String) {
    match v {
        Value::Object(m) => {
            let mut keys: Vec<&String> = m.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(&m[k.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(a) => {
            out.push('[');
            for (i, item) in a.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Literal → itself; structured → SHA-256 hex (64 chars) of canonical JSON.
pub fn fingerprint(bank_id: &BankId) -> String {
    match bank_id {
        BankId::Literal(s) => s.clone(),
        BankId::Structured(v) => {
            let mut hasher = Sha256::new();
            hasher.update(canonical_json(v).as_bytes());
            hex_encode(&hasher.finalize())
        }
    }
}

/// Fingerprint of an arbitrary serializable value (strings stay literal).
pub fn fingerprint_of<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(BankId::structured(value)?.fingerprint())
}

/// `<cache_root>/<bank_name>/<fingerprint>`, sanitized.
pub fn bank_path(cache_root: &Path, bank_name: &str, bank_id: &BankId) -> PathBuf {
    let mut p = sanitize_path(cache_root);
    p.push(relative_segment(bank_name));
    p.push(relative_segment(&fingerprint(bank_id)));
    p
}

/// Replace characters that are invalid on some platform in every normal
/// component; root/prefix/`.`/`..` components are kept as they are.
pub fn sanitize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::Normal(s) => out.push(sanitize_component(&s.to_string_lossy())),
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn sanitize_component(s: &str) -> String {
    let mut out: String = s
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_PATH_CHARS.contains(&c) {
                REPLACEMENT_CHAR
            } else {
                c
            }
        })
        .collect();
    // Windows не допускает точки/пробелы в конце имени
    let trimmed = out.trim_end_matches(['.', ' ']).len();
    if trimmed < out.len() {
        let tail = out.len() - trimmed;
        out.truncate(trimmed);
        out.extend(std::iter::repeat(REPLACEMENT_CHAR).take(tail));
    }
    out
}

/// User-supplied segment (bank name / fingerprint) as a relative path that
/// cannot escape its parent: roots dropped, `..` replaced, never empty.
fn relative_segment(s: &str) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in Path::new(s).components() {
        match comp {
            Component::Normal(n) => out.push(sanitize_component(&n.to_string_lossy())),
            Component::ParentDir => out.push(REPLACEMENT_CHAR.to_string()),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
        }
    }
    if out.as_os_str().is_empty() {
        out.push(REPLACEMENT_CHAR.to_string());
    }
    out
}

// ---------------------- Metadata ----------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BankMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoder: Option<String>,
    #[serde(default)]
    pub bank_config: Map<String, Value>,
    /// Unknown top-level fields are preserved on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BankMetadata {
    pub fn new(encoder: &str, bank_config: Map<String, Value>) -> Self {
        Self {
            encoder: Some(encoder.to_string()),
            bank_config,
            extra: Map::new(),
        }
    }

    /// Raw `num_frames` value, if present and non-null.
    pub fn num_frames_value(&self) -> Option<&Value> {
        self.bank_config
            .get(NUM_FRAMES_KEY)
            .filter(|v| !v.is_null())
    }

    /// `num_frames` as a frame count (non-negative integer only).
    pub fn num_frames(&self) -> Option<usize> {
        self.num_frames_value()
            .and_then(Value::as_u64)
            .map(|n| n as usize)
    }
}

pub fn metadata_path(bank_path: &Path) -> PathBuf {
    bank_path.join(METADATA_FILENAME)
}

/// Read metadata.json. Absent → NotFound, unparsable → Decode.
pub fn read_bank_metadata(bank_path: &Path) -> Result<BankMetadata> {
    let path = metadata_path(bank_path);
    let bytes = match fs::read(&path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BankError::NotFound(path).into())
        }
        Err(e) => return Err(anyhow::Error::new(e).context(format!("read {}", path.display()))),
    };
    serde_json::from_slice(&bytes).map_err(|e| BankError::decode(&path, e).into())
}

/// Overwrite metadata.json (tmp + rename).
pub fn write_bank_metadata(bank_path: &Path, metadata: &BankMetadata) -> Result<()> {
    let path = metadata_path(bank_path);
    let tmp = path.with_extension("json.tmp");

    let json = serde_json::to_vec(metadata).context("serialize bank metadata")?;
    {
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .with_context(|| format!("open tmp metadata {}", tmp.display()))?;
        f.write_all(&json)?;
        f.flush()?;
    }
    fs::rename(&tmp, &path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Validity check; every error degrades to `false`.
pub fn is_bank_valid(bank_path: &Path) -> bool {
    if !bank_path.is_dir() {
        return false;
    }
    match read_bank_metadata(bank_path) {
        Ok(m) => m.num_frames_value().is_some(),
        Err(e) => {
            debug!("bank {} is not valid: {:#}", bank_path.display(), e);
            false
        }
    }
}

// ---------------------- Listing ----------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankEntry {
    pub bank_id: String,
    pub bank_name: String,
    pub metadata: BankMetadata,
}

impl BankEntry {
    /// "<bank_name>/<bank_id>", the form accepted as a forced bank.
    pub fn key(&self) -> String {
        format!("{}/{}", self.bank_name, self.bank_id)
    }
}

fn subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    for e in fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
        let e = e?;
        let p = e.path();
        if !p.is_dir() {
            continue;
        }
        if let Some(name) = p.file_name().and_then(|s| s.to_str()) {
            out.push((name.to_string(), p.clone()));
        }
    }
    Ok(out)
}

/// All valid banks under `cache_root` (two levels: bank name / bank id).
/// Missing root → empty list. Order is unspecified.
pub fn list_banks(cache_root: &Path) -> Result<Vec<BankEntry>> {
    if !cache_root.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for (bank_name, name_dir) in subdirs(cache_root)? {
        for (bank_id, bank_dir) in subdirs(&name_dir)? {
            if !is_bank_valid(&bank_dir) {
                continue;
            }
            let metadata = read_bank_metadata(&bank_dir)?;
            out.push(BankEntry {
                bank_id,
                bank_name: bank_name.clone(),
                metadata,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_fingerprint_is_identity() {
        for s in ["some-id", "step1", "a b", ""] {
            assert_eq!(fingerprint(&BankId::literal(s)), s);
        }
    }

    #[test]
    fn structured_fingerprint_ignores_key_order() {
        let a = BankId::from_json_str(r#"{"seed": 1, "prompt": "cat", "n": [1, 2]}"#).unwrap();
        let b = BankId::from_json_str(r#"{"n":[1,2],"prompt":"cat","seed":1}"#).unwrap();
        let c = BankId::from_json_str(r#"{"n":[2,1],"prompt":"cat","seed":1}"#).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());

        let fp = a.fingerprint();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(fp, canonical_json(&json!({"seed": 1, "prompt": "cat", "n": [1, 2]})));
    }

    #[test]
    fn json_string_becomes_literal() {
        assert_eq!(BankId::structured("abc").unwrap(), BankId::literal("abc"));
    }

    #[test]
    fn non_serializable_id_is_rejected() {
        use std::collections::HashMap;
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        bad.insert((1, 2), 3);
        let err = BankId::structured(&bad).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BankError>(),
            Some(BankError::InvalidBankId(_))
        ));
    }

    #[test]
    fn bank_config_forces_num_frames() {
        let id = BankId::structured(&json!({"seed": 7, "num_frames": 99})).unwrap();
        let cfg = id.bank_config(3);
        assert_eq!(cfg["seed"], json!(7));
        assert_eq!(cfg["num_frames"], json!(3));
        assert_eq!(BankId::literal("x").bank_config(2), {
            let mut m = Map::new();
            m.insert("num_frames".into(), json!(2));
            m
        });
    }

    #[test]
    fn bank_path_is_sanitized_and_contained() {
        let root = Path::new("/tmp/c");
        assert_eq!(
            bank_path(root, "shots", &BankId::literal("a")),
            PathBuf::from("/tmp/c/shots/a")
        );
        assert_eq!(
            bank_path(root, "sh:ots", &BankId::literal("a?b*")),
            PathBuf::from("/tmp/c/sh_ots/a_b_")
        );
        assert_eq!(
            bank_path(root, "shots", &BankId::literal("../../etc")),
            PathBuf::from("/tmp/c/shots/_/_/etc")
        );
        assert_eq!(
            bank_path(root, "shots", &BankId::literal("/abs")),
            PathBuf::from("/tmp/c/shots/abs")
        );
        assert_eq!(
            bank_path(root, "shots", &BankId::literal("")),
            PathBuf::from("/tmp/c/shots/_")
        );
    }

    #[test]
    fn trailing_dots_are_replaced() {
        assert_eq!(sanitize_component("name. "), "name__");
        assert_eq!(sanitize_component("v1.2"), "v1.2");
    }
}
