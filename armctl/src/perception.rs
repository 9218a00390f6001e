// src/perception.rs
//
// Camera frame handoff between the host's image delivery thread and the
// tick thread.
//
// The producer side (`PerceptionBuffer::ingest_frame`) validates the pixel
// format and the frame size, copies raw bytes into a single staging buffer
// and raises a readiness flag. Rejected frames leave the slot untouched. The consumer side (`PerceptionBuffer::take_into`) clears
// the flag and converts the staged bytes into the fixed policy tensor.
// At most one frame is ever in flight: a newer frame replaces an older
// unconsumed one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::config::PerceptionConfig;
use crate::error::ControlError;
use crate::types::ImageFrame;

/// Only packed 8-bit RGB frames are accepted.
pub const SUPPORTED_BITS_PER_PIXEL: u32 = 24;

const PACKED_RGB_BYTES: usize = 3;

/// Fixed-shape planar tensor handed to the policy agent.
///
/// Element `(c, y, x)` lives at `c * width * height + y * width + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptionTensor {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    data: Vec<f32>,
}

impl PerceptionTensor {
    pub fn new(cfg: PerceptionConfig) -> Self {
        Self {
            width: cfg.width,
            height: cfg.height,
            channels: cfg.channels,
            data: vec![0.0; cfg.tensor_len()],
        }
    }

    #[inline]
    pub fn index(&self, c: usize, y: usize, x: usize) -> usize {
        c * self.width * self.height + y * self.width + x
    }

    pub fn get(&self, c: usize, y: usize, x: usize) -> Option<f32> {
        if c >= self.channels || y >= self.height || x >= self.width {
            return None;
        }
        self.data.get(self.index(c, y, x)).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Raw frame as staged by the producer.
#[derive(Debug, Clone, Default)]
pub struct StagedFrame {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes.
    pub step: u32,
    pub data: Vec<u8>,
}

/// Converts a staged raw frame into the policy tensor layout.
pub trait PixelConverter: Send + Sync {
    fn convert(&self, raw: &StagedFrame, out: &mut PerceptionTensor) -> Result<(), ControlError>;
}

/// Nearest-neighbour resample of packed RGB8 into planar BGR `f32`
/// (values in `0.0..=255.0`).
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanarBgrConverter;

impl PixelConverter for PlanarBgrConverter {
    fn convert(&self, raw: &StagedFrame, out: &mut PerceptionTensor) -> Result<(), ControlError> {
        let (src_w, src_h) = (raw.width as usize, raw.height as usize);
        if src_w == 0 || src_h == 0 {
            return Err(ControlError::Conversion {
                message: format!("empty source frame {}x{}", src_w, src_h),
            });
        }
        if out.channels != 3 {
            return Err(ControlError::Conversion {
                message: format!("planar BGR needs 3 channels, tensor has {}", out.channels),
            });
        }
        let step = raw.step as usize;
        if step < src_w * 3 || raw.data.len() < step * (src_h - 1) + src_w * 3 {
            return Err(ControlError::Conversion {
                message: format!(
                    "staged buffer of {} bytes too short for {}x{} with stride {}",
                    raw.data.len(),
                    src_w,
                    src_h,
                    step
                ),
            });
        }

        let (dst_w, dst_h) = (out.width, out.height);
        let plane = dst_w * dst_h;
        let data = out.as_mut_slice();
        for y in 0..dst_h {
            let sy = y * src_h / dst_h;
            let row = sy * step;
            for x in 0..dst_w {
                let sx = x * src_w / dst_w;
                let px = row + sx * 3;
                let (r, g, b) = (raw.data[px], raw.data[px + 1], raw.data[px + 2]);
                let i = y * dst_w + x;
                data[i] = b as f32;
                data[plane + i] = g as f32;
                data[2 * plane + i] = r as f32;
            }
        }
        Ok(())
    }
}

/// Counters exposed for telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerceptionStats {
    pub frames_staged: u64,
    pub frames_rejected: u64,
    /// Frames overwritten before the tick thread consumed them.
    pub frames_replaced: u64,
}

#[derive(Debug, Default)]
struct FrameInbox {
    staged: Mutex<StagedFrame>,
    ready: AtomicBool,
    staged_count: AtomicU64,
    rejected_count: AtomicU64,
    replaced_count: AtomicU64,
}

impl FrameInbox {
    fn lock(&self) -> MutexGuard<'_, StagedFrame> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared handle to the single-slot frame inbox.
///
/// Cloning yields another handle onto the same slot; the host's image
/// callback holds one and the engine holds another.
#[derive(Debug, Clone, Default)]
pub struct PerceptionBuffer {
    inbox: Arc<FrameInbox>,
}

impl PerceptionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer entry point for a host image message.
    pub fn ingest(&self, frame: &ImageFrame) -> Result<(), ControlError> {
        self.ingest_strided(
            &frame.data,
            frame.width,
            frame.height,
            frame.bytes_per_pixel(),
            Some(frame.step),
        )
    }

    /// Producer entry point for a tightly packed frame.
    pub fn ingest_frame(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    ) -> Result<(), ControlError> {
        self.ingest_strided(data, width, height, bytes_per_pixel, None)
    }

    fn reject(&self, err: ControlError) -> Result<(), ControlError> {
        self.inbox.rejected_count.fetch_add(1, Ordering::Relaxed);
        warn!("[perception] {}", err);
        Err(err)
    }

    /// `step = None` means rows are packed back to back.
    fn ingest_strided(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        step: Option<u32>,
    ) -> Result<(), ControlError> {
        if bytes_per_pixel.checked_mul(8) != Some(SUPPORTED_BITS_PER_PIXEL) {
            return self.reject(ControlError::Format {
                bits_per_pixel: bytes_per_pixel.saturating_mul(8),
            });
        }

        let size_error = |step: u32| ControlError::FrameSize {
            width,
            height,
            step,
            bytes: data.len(),
        };
        let row_bytes = width as usize * PACKED_RGB_BYTES;
        let step = match step {
            Some(step) => step,
            None => match u32::try_from(row_bytes) {
                Ok(step) => step,
                Err(_) => return self.reject(size_error(u32::MAX)),
            },
        };
        let needed = (step as usize)
            .checked_mul(height.saturating_sub(1) as usize)
            .and_then(|n| n.checked_add(row_bytes));
        let fits = matches!(needed, Some(n) if data.len() >= n);
        if width == 0 || height == 0 || (step as usize) < row_bytes || !fits {
            return self.reject(size_error(step));
        }

        let mut staged = self.inbox.lock();
        if staged.data.len() != data.len() {
            let mut fresh = Vec::new();
            if fresh.try_reserve_exact(data.len()).is_err() {
                drop(staged);
                return self.reject(ControlError::Allocation { bytes: data.len() });
            }
            fresh.extend_from_slice(data);
            debug!(
                "[perception] staging buffer sized to {} bytes ({}x{})",
                data.len(),
                width,
                height
            );
            staged.data = fresh;
        } else {
            staged.data.copy_from_slice(data);
        }
        staged.width = width;
        staged.height = height;
        staged.step = step;

        if self.inbox.ready.swap(true, Ordering::AcqRel) {
            self.inbox.replaced_count.fetch_add(1, Ordering::Relaxed);
        }
        self.inbox.staged_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// True when a staged frame has not been consumed yet.
    pub fn is_ready(&self) -> bool {
        self.inbox.ready.load(Ordering::Acquire)
    }

    /// Consume the staged frame into `tensor`.
    ///
    /// Returns `Ok(false)` when no frame was ready. The readiness flag is
    /// cleared before conversion, so a failed conversion still consumes
    /// the frame. The staged bytes are moved out under the lock and
    /// converted after it is released; the buffer is handed back unless a
    /// producer has staged a newer frame in the meantime.
    pub fn take_into(
        &self,
        tensor: &mut PerceptionTensor,
        converter: &dyn PixelConverter,
    ) -> Result<bool, ControlError> {
        if !self.is_ready() {
            return Ok(false);
        }
        let frame = {
            let mut slot = self.inbox.lock();
            // producers raise the flag while holding the lock
            if !self.inbox.ready.swap(false, Ordering::AcqRel) {
                return Ok(false);
            }
            std::mem::take(&mut *slot)
        };
        let converted = converter.convert(&frame, tensor);

        let mut slot = self.inbox.lock();
        if slot.data.is_empty() {
            *slot = frame;
        }
        drop(slot);

        converted.map(|()| true)
    }

    pub fn stats(&self) -> PerceptionStats {
        PerceptionStats {
            frames_staged: self.inbox.staged_count.load(Ordering::Relaxed),
            frames_rejected: self.inbox.rejected_count.load(Ordering::Relaxed),
            frames_replaced: self.inbox.replaced_count.load(Ordering::Relaxed),
        }
    }
}
