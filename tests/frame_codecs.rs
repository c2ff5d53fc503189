use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use oorandom::Rand64;

use ImageBank::encoders::{encoders, get_encoder, with_suffix};
use ImageBank::error::bank_error;
use ImageBank::{BankError, Frame};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("imgbank-codec-{prefix}-{pid}-{t}-{id}"))
}

fn random_frame(rng: &mut Rand64, h: usize, w: usize, c: usize) -> Frame {
    let data = (0..h * w * c).map(|_| rng.rand_float() as f32).collect();
    Frame::new(h, w, c, data).unwrap()
}

#[test]
fn raster_quantization_error_is_bounded() -> Result<()> {
    let root = unique_root("raster");
    fs::create_dir_all(&root)?;
    let enc = get_encoder("webp")?;
    let mut rng = Rand64::new(0xC0FFEE);

    let frame = random_frame(&mut rng, 17, 9, 3);
    let base = root.join("0");
    enc.save(&frame, &base)?;
    assert!(with_suffix(&base, ".webp").is_file());

    let back = enc.load(&base)?;
    assert_eq!(back.shape(), [17, 9, 3]);
    for (a, b) in frame.data().iter().zip(back.data()) {
        assert!((a - b).abs() <= 1.0 / 255.0 + 1e-6, "{} vs {}", a, b);
    }

    // out-of-range values are clamped
    let wild = Frame::new(1, 2, 3, vec![-1.0, 2.0, f32::NAN, 0.5, 1.5, -0.2])?;
    enc.save(&wild, &root.join("1"))?;
    let back = enc.load(&root.join("1"))?;
    assert_eq!(&back.data()[..3], &[0.0, 1.0, 0.0]);
    assert_eq!(back.data()[4], 1.0);
    assert_eq!(back.data()[5], 0.0);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn raster_gray_frames_come_back_as_rgb() -> Result<()> {
    let root = unique_root("gray");
    fs::create_dir_all(&root)?;
    let enc = get_encoder("pil")?;

    let gray = Frame::new(2, 2, 1, vec![0.0, 1.0, 0.2, 0.6])?;
    enc.save(&gray, &root.join("g"))?;
    let back = enc.load(&root.join("g"))?;
    assert_eq!(back.shape(), [2, 2, 3]);
    assert_eq!(&back.data()[3..6], &[1.0, 1.0, 1.0]);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn tensor_round_trip_is_bit_exact() -> Result<()> {
    let root = unique_root("tensor");
    fs::create_dir_all(&root)?;
    let enc = get_encoder("safetensors")?;
    let mut rng = Rand64::new(42);

    for (h, w, c) in [(1, 1, 1), (5, 7, 3), (8, 8, 4)] {
        let mut data = random_frame(&mut rng, h, w, c).into_data();
        // values outside [0,1] survive too
        data[0] = -3.5;
        let frame = Frame::new(h, w, c, data)?;
        let base = root.join(format!("{}x{}x{}", h, w, c));
        enc.save(&frame, &base)?;
        assert!(with_suffix(&base, ".safetensors.zst").is_file());
        let back = enc.load(&base)?;
        assert_eq!(back, frame);
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn missing_frame_file_is_not_found() -> Result<()> {
    let root = unique_root("missing");
    fs::create_dir_all(&root)?;
    for enc in encoders() {
        let err = enc.load(&root.join("absent")).unwrap_err();
        assert!(
            matches!(bank_error(&err), Some(BankError::NotFound(_))),
            "{}: {:#}",
            enc.name(),
            err
        );
    }
    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn garbage_files_fail_to_decode() -> Result<()> {
    let root = unique_root("garbage");
    fs::create_dir_all(&root)?;
    for enc in encoders() {
        let base = root.join(enc.name());
        fs::write(enc.file_path(&base), b"definitely not an image")?;
        let err = enc.load(&base).unwrap_err();
        assert!(
            matches!(bank_error(&err), Some(BankError::Decode { .. })),
            "{}: {:#}",
            enc.name(),
            err
        );
    }
    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn tensor_file_with_oversized_shape_fails_to_decode() -> Result<()> {
    let root = unique_root("oversized");
    fs::create_dir_all(&root)?;
    let enc = get_encoder("safetensors")?;

    let header = br#"{"img":{"dtype":"F32","shape":[4611686018427387904,4,1],"data_offsets":[0,0]}}"#;
    let mut container = Vec::new();
    container.write_u64::<LittleEndian>(header.len() as u64)?;
    container.extend_from_slice(header);

    let base = root.join("0");
    fs::write(enc.file_path(&base), zstd::encode_all(&container[..], 5)?)?;
    let err = enc.load(&base).unwrap_err();
    assert!(
        matches!(bank_error(&err), Some(BankError::Decode { .. })),
        "{:#}",
        err
    );

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
