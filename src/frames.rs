//! frames: in-memory frames and batches (HWC / NHWC, f32) plus split/stack.
//!
//! A `Frame` is one image: height × width × channels, row-major, values
//! normally in [0,1]. An `ImageBatch` is N frames of the same shape stored
//! contiguously (N × H × W × C).
//!
//! Fields are private: `new` checks that the value count matches the shape,
//! so every frame/batch in circulation is consistent.

use anyhow::Result;

use crate::error::BankError;

/// Product of dimensions; overflow → BankError::Shape.
pub fn element_count(dims: &[usize]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| BankError::Shape(format!("shape {:?} overflows usize", dims)).into())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<f32>,
}

impl Frame {
    pub fn new(height: usize, width: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        let expected = element_count(&[height, width, channels])?;
        if data.len() != expected {
            return Err(BankError::Shape(format!(
                "frame {}x{}x{} needs {} values, got {}",
                height,
                width,
                channels,
                expected,
                data.len()
            ))
            .into());
        }
        Ok(Self {
            height,
            width,
            channels,
            data,
        })
    }

    /// Frame filled with a single value.
    pub fn filled(height: usize, width: usize, channels: usize, value: f32) -> Result<Self> {
        let n = element_count(&[height, width, channels])?;
        Self::new(height, width, channels, vec![value; n])
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, self.channels]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Single-frame batch (the "unsqueeze(0)" of the frame).
    pub fn into_batch(self) -> ImageBatch {
        ImageBatch {
            count: 1,
            height: self.height,
            width: self.width,
            channels: self.channels,
            data: self.data,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch {
    count: usize,
    height: usize,
    width: usize,
    channels: usize,
    data: Vec<f32>,
}

impl ImageBatch {
    pub fn new(
        count: usize,
        height: usize,
        width: usize,
        channels: usize,
        data: Vec<f32>,
    ) -> Result<Self> {
        let expected = element_count(&[count, height, width, channels])?;
        if data.len() != expected {
            return Err(BankError::Shape(format!(
                "batch {}x{}x{}x{} needs {} values, got {}",
                count,
                height,
                width,
                channels,
                expected,
                data.len()
            ))
            .into());
        }
        Ok(Self {
            count,
            height,
            width,
            channels,
            data,
        })
    }

    pub fn shape(&self) -> [usize; 4] {
        [self.count, self.height, self.width, self.channels]
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// All values, frame after frame.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Number of frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    // не переполняется: new() уже проверил count*h*w*c
    #[inline]
    fn frame_len(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Borrow the raw values of frame `i` (panics on out-of-range, like slicing).
    pub fn frame_data(&self, i: usize) -> &[f32] {
        let fl = self.frame_len();
        &self.data[i * fl..(i + 1) * fl]
    }
}

/// Split a batch into an ordered sequence of single frames.
pub fn split_images(images: &ImageBatch) -> Vec<Frame> {
    let fl = images.frame_len();
    if fl == 0 {
        return (0..images.count)
            .map(|_| Frame {
                height: images.height,
                width: images.width,
                channels: images.channels,
                data: Vec::new(),
            })
            .collect();
    }
    images
        .data
        .chunks_exact(fl)
        .map(|chunk| Frame {
            height: images.height,
            width: images.width,
            channels: images.channels,
            data: chunk.to_vec(),
        })
        .collect()
}

/// Stack frames into a batch; all frames must share one shape.
///
/// An empty input yields an empty 0×0×0×0 batch.
pub fn stack_frames(frames: &[Frame]) -> Result<ImageBatch> {
    let first = match frames.first() {
        Some(f) => f,
        None => return ImageBatch::new(0, 0, 0, 0, Vec::new()),
    };
    let shape = first.shape();
    let mut data = Vec::with_capacity(frames.len() * first.len());
    for (i, f) in frames.iter().enumerate() {
        if f.shape() != shape {
            return Err(BankError::Shape(format!(
                "frame {} has shape {:?}, expected {:?}",
                i,
                f.shape(),
                shape
            ))
            .into());
        }
        data.extend_from_slice(&f.data);
    }
    ImageBatch::new(frames.len(), shape[0], shape[1], shape[2], data)
}

/// Concatenate batches along the frame dimension (order preserved).
/// Empty batches are skipped; the remaining ones must share H×W×C.
pub fn concat_batches(batches: &[&ImageBatch]) -> Result<ImageBatch> {
    let non_empty: Vec<&ImageBatch> = batches.iter().copied().filter(|b| !b.is_empty()).collect();
    let first = match non_empty.first() {
        Some(b) => *b,
        None => return ImageBatch::new(0, 0, 0, 0, Vec::new()),
    };
    let (h, w, c) = (first.height, first.width, first.channels);
    let total: usize = non_empty.iter().map(|b| b.count).sum();
    let mut data = Vec::with_capacity(total * h * w * c);
    for (i, b) in non_empty.iter().enumerate() {
        if (b.height, b.width, b.channels) != (h, w, c) {
            return Err(BankError::Shape(format!(
                "batch {} has frames {}x{}x{}, expected {}x{}x{}",
                i, b.height, b.width, b.channels, h, w, c
            ))
            .into());
        }
        data.extend_from_slice(&b.data);
    }
    ImageBatch::new(total, h, w, c, data)
}

/// Resolve a Python-style index (negative counts from the end).
pub fn resolve_index(index: i64, len: usize) -> Result<usize> {
    let resolved = if index < 0 {
        (len as i64).checked_add(index)
    } else {
        Some(index)
    };
    match resolved {
        Some(i) if i >= 0 && (i as usize) < len => Ok(i as usize),
        _ => Err(BankError::IndexOutOfRange { index, len }.into()),
    }
}
