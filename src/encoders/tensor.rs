//! tensor: raw f32 frames in a safetensors container, zstd-compressed.
//!
//! Layout of the uncompressed container (safetensors):
//!   u64 LE  header_len
//!   [header_len] JSON header, space-padded to 8-byte alignment:
//!       {"img":{"dtype":"F32","shape":[H,W,C],"data_offsets":[0,H*W*C*4]}}
//!   data: H*W*C f32 LE
//!
//! save: container → temp file → zstd (level 5) stream → <path>.safetensors.zst
//! load: zstd stream → temp file → parse container → field "img"
//!
//! Temp files are `tempfile::NamedTempFile` and are removed on drop, i.e. on
//! every exit path including encode/decode errors.

use anyhow::{Context, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use super::{open_for_read, ImageEncoder};
use crate::error::BankError;
use crate::frames::{element_count, Frame};

pub const TENSOR_ENCODER_NAME: &str = "safetensors";
pub const TENSOR_EXTENSION: &str = ".safetensors.zst";

/// Name of the single field stored in the container.
pub const TENSOR_FIELD: &str = "img";

pub const ZSTD_COMPRESSION_LEVEL: i32 = 5;

const DTYPE_F32: &str = "F32";

#[derive(Debug, Clone, Copy, Default)]
pub struct TensorEncoder;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TensorInfo {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// Serialize a frame as a safetensors container into `w`.
fn write_container<W: Write>(frame: &Frame, w: &mut W) -> Result<()> {
    let nbytes = frame.len() * 4;
    let mut header = BTreeMap::new();
    header.insert(
        TENSOR_FIELD,
        TensorInfo {
            dtype: DTYPE_F32.to_string(),
            shape: frame.shape().to_vec(),
            data_offsets: [0, nbytes],
        },
    );
    let mut json = serde_json::to_vec(&header).context("serialize safetensors header")?;
    // выравнивание данных на 8 байт
    while json.len() % 8 != 0 {
        json.push(b' ');
    }

    w.write_u64::<LittleEndian>(json.len() as u64)?;
    w.write_all(&json)?;
    let mut buf = vec![0u8; nbytes];
    LittleEndian::write_f32_into(frame.data(), &mut buf);
    w.write_all(&buf)?;
    Ok(())
}

/// Parse a safetensors container and extract the "img" field.
fn read_container(bytes: &[u8], origin: &Path) -> Result<Frame> {
    let bad = |reason: String| -> anyhow::Error { BankError::decode(origin, reason).into() };

    if bytes.len() < 8 {
        return Err(bad(format!("container too short ({} B)", bytes.len())));
    }
    let header_len = LittleEndian::read_u64(&bytes[0..8]) as usize;
    let data_start = 8usize
        .checked_add(header_len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| bad(format!("header length {} exceeds container", header_len)))?;

    let header: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..data_start])
            .map_err(|e| bad(format!("header json: {}", e)))?;
    let info_val = header
        .get(TENSOR_FIELD)
        .ok_or_else(|| bad(format!("field '{}' not present", TENSOR_FIELD)))?;
    let info: TensorInfo = serde_json::from_value(info_val.clone())
        .map_err(|e| bad(format!("field '{}': {}", TENSOR_FIELD, e)))?;

    if info.dtype != DTYPE_F32 {
        return Err(bad(format!("unsupported dtype {}", info.dtype)));
    }
    let (h, w, c) = match info.shape.as_slice() {
        [h, w, c] => (*h, *w, *c),
        [h, w] => (*h, *w, 1),
        other => return Err(bad(format!("unsupported shape {:?}", other))),
    };

    let count = element_count(&[h, w, c])
        .ok()
        .filter(|n| n.checked_mul(4).is_some())
        .ok_or_else(|| bad(format!("shape {:?} is too large", info.shape)))?;

    let [begin, end] = info.data_offsets;
    let data = &bytes[data_start..];
    if begin > end || end > data.len() || end - begin != count * 4 {
        return Err(bad(format!(
            "data_offsets [{}, {}] do not match shape {:?} ({} B available)",
            begin,
            end,
            info.shape,
            data.len()
        )));
    }

    let mut values = vec![0f32; count];
    LittleEndian::read_f32_into(&data[begin..end], &mut values);
    Frame::new(h, w, c, values)
}

impl ImageEncoder for TensorEncoder {
    fn name(&self) -> &'static str {
        TENSOR_ENCODER_NAME
    }

    fn extension(&self) -> &'static str {
        TENSOR_EXTENSION
    }

    fn save(&self, frame: &Frame, path_without_extension: &Path) -> Result<()> {
        let path = self.file_path(path_without_extension);

        let mut tmp = NamedTempFile::new().context("create temp file for safetensors")?;
        {
            let mut w = BufWriter::new(tmp.as_file_mut());
            write_container(frame, &mut w)?;
            w.flush()?;
        }
        tmp.as_file_mut().seek(SeekFrom::Start(0))?;

        let out = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        let mut out = BufWriter::new(out);
        zstd::stream::copy_encode(tmp.as_file_mut(), &mut out, ZSTD_COMPRESSION_LEVEL)
            .with_context(|| format!("zstd encode {}", path.display()))?;
        out.flush()
            .with_context(|| format!("flush {}", path.display()))?;
        Ok(())
    }

    fn load(&self, path_without_extension: &Path) -> Result<Frame> {
        let path = self.file_path(path_without_extension);
        let src = open_for_read(&path)?;

        let mut tmp = NamedTempFile::new().context("create temp file for safetensors")?;
        zstd::stream::copy_decode(src, tmp.as_file_mut())
            .map_err(|e| BankError::decode(&path, format!("zstd: {}", e)))?;

        tmp.as_file_mut().seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        tmp.as_file_mut().read_to_end(&mut bytes)?;
        read_container(&bytes, &path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_header_is_aligned_and_parseable() {
        let frame = Frame::new(1, 2, 3, vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.5]).unwrap();
        let mut buf = Vec::new();
        write_container(&frame, &mut buf).unwrap();

        let header_len = LittleEndian::read_u64(&buf[0..8]) as usize;
        assert_eq!(header_len % 8, 0);
        assert_eq!(buf.len(), 8 + header_len + 6 * 4);

        let back = read_container(&buf, Path::new("mem")).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn container_rejects_wrong_dtype() {
        let header = br#"{"img":{"dtype":"F16","shape":[1,1,1],"data_offsets":[0,2]}}"#;
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(header.len() as u64).unwrap();
        buf.extend_from_slice(header);
        buf.extend_from_slice(&[0, 0]);
        let err = read_container(&buf, Path::new("mem")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BankError>(),
            Some(BankError::Decode { .. })
        ));
    }

    #[test]
    fn container_rejects_truncated_data() {
        let frame = Frame::filled(2, 2, 3, 0.5).unwrap();
        let mut buf = Vec::new();
        write_container(&frame, &mut buf).unwrap();
        buf.truncate(buf.len() - 4);
        assert!(read_container(&buf, Path::new("mem")).is_err());
    }

    #[test]
    fn container_rejects_overflowing_shape() {
        for header in [
            &br#"{"img":{"dtype":"F32","shape":[4611686018427387904,4,1],"data_offsets":[0,0]}}"#[..],
            &br#"{"img":{"dtype":"F32","shape":[2305843009213693952,2,1],"data_offsets":[0,0]}}"#[..],
        ] {
            let mut buf = Vec::new();
            buf.write_u64::<LittleEndian>(header.len() as u64).unwrap();
            buf.extend_from_slice(header);
            let err = read_container(&buf, Path::new("mem")).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<BankError>(),
                Some(BankError::Decode { .. })
            ));
        }
    }
}
