//! Raw frame views and channel extraction

use crate::EncodeError;

/// Bytes per pixel in the RGBA input layout
pub const RGBA_BYTES_PER_PIXEL: usize = 4;

/// Bytes per pixel in the packed RGB output
const RGB_BYTES_PER_PIXEL: usize = 3;

/// Pixel format negotiated by the host pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit R, G, B, A (non-premultiplied)
    Rgba,
    Bgra,
    Bgrx,
    Nv12,
    I420,
    Yuy2,
}

impl PixelFormat {
    /// Only non-premultiplied RGBA can be captured
    pub fn is_capturable(&self) -> bool {
        matches!(self, PixelFormat::Rgba)
    }
}

/// Borrowed view of one RGBA frame delivered by the host
///
/// Rows start at `row * stride`; bytes between `width * 4` and `stride`
/// are padding and never read.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    data: &'a [u8],
    stride: usize,
}

impl<'a> RawFrame<'a> {
    /// Create a view over `data` with the given line size in bytes
    pub fn new(data: &'a [u8], stride: usize) -> Self {
        Self { data, stride }
    }

    /// Create a view over tightly packed rows (`stride == width * 4`)
    pub fn packed(data: &'a [u8], width: u32) -> Self {
        Self::new(data, width as usize * RGBA_BYTES_PER_PIXEL)
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Check that the buffer holds `height` rows of `width` RGBA pixels
    pub fn validate(&self, width: u32, height: u32) -> Result<(), EncodeError> {
        if width == 0 || height == 0 {
            return Err(EncodeError::InvalidDimensions { width, height });
        }

        let row_bytes = width as usize * RGBA_BYTES_PER_PIXEL;
        if self.stride < row_bytes {
            return Err(EncodeError::InvalidStride {
                stride: self.stride,
                width,
            });
        }

        // The last row does not need trailing padding
        let expected = (height as usize - 1)
            .checked_mul(self.stride)
            .and_then(|n| n.checked_add(row_bytes))
            .ok_or(EncodeError::BufferTooSmall {
                expected: usize::MAX,
                actual: self.data.len(),
            })?;
        if self.data.len() < expected {
            return Err(EncodeError::BufferTooSmall {
                expected,
                actual: self.data.len(),
            });
        }

        Ok(())
    }

    /// Get the visible RGBA bytes of row `row`
    pub fn row(&self, row: u32, width: u32) -> Option<&'a [u8]> {
        let start = (row as usize).checked_mul(self.stride)?;
        let end = start.checked_add(width as usize * RGBA_BYTES_PER_PIXEL)?;
        self.data.get(start..end)
    }

    /// Drop the alpha channel and pack rows into a contiguous RGB buffer
    pub fn to_rgb(&self, width: u32, height: u32) -> Result<Vec<u8>, EncodeError> {
        self.validate(width, height)?;

        let out_row_bytes = width as usize * RGB_BYTES_PER_PIXEL;
        let mut rgb = vec![0u8; out_row_bytes * height as usize];

        for (y, out_row) in rgb.chunks_exact_mut(out_row_bytes).enumerate() {
            let src = self.row(y as u32, width).ok_or(EncodeError::BufferTooSmall {
                expected: (y + 1).saturating_mul(self.stride),
                actual: self.data.len(),
            })?;

            for (dst, px) in out_row
                .chunks_exact_mut(RGB_BYTES_PER_PIXEL)
                .zip(src.chunks_exact(RGBA_BYTES_PER_PIXEL))
            {
                dst.copy_from_slice(&px[..RGB_BYTES_PER_PIXEL]);
            }
        }

        Ok(rgb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_only_rgba_is_capturable() {
        assert!(PixelFormat::Rgba.is_capturable());
        assert!(!PixelFormat::Bgra.is_capturable());
        assert!(!PixelFormat::Nv12.is_capturable());
    }

    #[test]
    fn test_to_rgb_drops_alpha() {
        let data = [1, 2, 3, 255, 4, 5, 6, 128];
        let frame = RawFrame::packed(&data, 2);

        let rgb = frame.to_rgb(2, 1).unwrap();
        assert_eq!(rgb, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_to_rgb_skips_row_padding() {
        // 1x2 frame, 4 bytes of padding per row
        let data = [
            10, 20, 30, 255, 0xEE, 0xEE, 0xEE, 0xEE,
            40, 50, 60, 255, 0xEE, 0xEE, 0xEE, 0xEE,
        ];
        let frame = RawFrame::new(&data, 8);

        let rgb = frame.to_rgb(1, 2).unwrap();
        assert_eq!(rgb, vec![10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_last_row_needs_no_padding() {
        let data = [
            1, 1, 1, 1, 0, 0, 0, 0,
            2, 2, 2, 2,
        ];
        let frame = RawFrame::new(&data, 8);

        assert!(frame.validate(1, 2).is_ok());
        assert_eq!(frame.to_rgb(1, 2).unwrap(), vec![1, 1, 1, 2, 2, 2]);
    }

    #[test]
    fn test_validate_rejects_short_buffer() {
        let data = [0u8; 15];
        let frame = RawFrame::packed(&data, 2);

        match frame.validate(2, 2) {
            Err(EncodeError::BufferTooSmall { expected, actual }) => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_narrow_stride() {
        let data = [0u8; 64];
        let frame = RawFrame::new(&data, 7);

        assert!(matches!(
            frame.validate(2, 2),
            Err(EncodeError::InvalidStride { stride: 7, width: 2 })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        let data = [0u8; 16];
        let frame = RawFrame::packed(&data, 2);

        assert!(matches!(
            frame.validate(0, 2),
            Err(EncodeError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            frame.validate(2, 0),
            Err(EncodeError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_huge_stride_is_rejected_without_overflow() {
        let data = [0u8; 16];
        let frame = RawFrame::new(&data, usize::MAX - 2);

        assert!(matches!(
            frame.validate(2, 3),
            Err(EncodeError::BufferTooSmall { actual: 16, .. })
        ));
        assert!(matches!(
            frame.to_rgb(2, 3),
            Err(EncodeError::BufferTooSmall { .. })
        ));
        assert!(frame.row(2, 2).is_none());
    }

    fn frame_strategy() -> impl Strategy<Value = (u32, u32, usize, Vec<u8>)> {
        (1u32..16, 1u32..16, 0usize..8).prop_flat_map(|(w, h, pad)| {
            let stride = w as usize * RGBA_BYTES_PER_PIXEL + pad;
            let len = (h as usize - 1) * stride + w as usize * RGBA_BYTES_PER_PIXEL;
            (
                Just(w),
                Just(h),
                Just(stride),
                prop::collection::vec(any::<u8>(), len),
            )
        })
    }

    proptest! {
        #[test]
        fn test_to_rgb_matches_source_pixels((w, h, stride, data) in frame_strategy()) {
            let frame = RawFrame::new(&data, stride);
            let rgb = frame.to_rgb(w, h).unwrap();

            prop_assert_eq!(rgb.len(), (w * h * 3) as usize);
            for y in 0..h as usize {
                for x in 0..w as usize {
                    let src = y * stride + x * RGBA_BYTES_PER_PIXEL;
                    let dst = (y * w as usize + x) * 3;
                    prop_assert_eq!(&rgb[dst..dst + 3], &data[src..src + 3]);
                }
            }
        }
    }
}
