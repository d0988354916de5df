//! AVIF measurement and decoding.
//!
//! The `image` crate's `"avif"` feature only enables the **encoder** (rav1e);
//! its decoder needs the C library dav1d. Decoding goes through `avif-parse`
//! (container) and `rav1d` (pure Rust port of dav1d) instead.
//!
//! Every rav1d handle opened here is released before returning, on success
//! and on every error path.

use super::backend::{BackendError, Dimensions};
use image::DynamicImage;
use std::io::Cursor;

fn parse(bytes: &[u8]) -> Result<avif_parse::AvifData, BackendError> {
    avif_parse::read_avif(&mut Cursor::new(bytes))
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to parse AVIF: {e:?}")))
}

/// Dimensions from container metadata, without decoding any pixels.
pub fn identify_avif(bytes: &[u8]) -> Result<Dimensions, BackendError> {
    let avif = parse(bytes)?;
    let meta = avif.primary_item_metadata().map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to read AVIF metadata: {e:?}"))
    })?;
    Ok(Dimensions {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
    })
}

/// Decode the primary AVIF item to RGB8.
pub fn decode_avif(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::src::lib::{dav1d_close, dav1d_default_settings, dav1d_open};
    use std::mem::MaybeUninit;
    use std::ptr::NonNull;

    let avif = parse(bytes)?;
    let av1_bytes: &[u8] = &avif.primary_item;

    let mut settings = MaybeUninit::<Dav1dSettings>::uninit();
    let settings_ptr = NonNull::new(settings.as_mut_ptr())
        .ok_or_else(|| BackendError::ProcessingFailed("rav1d settings unavailable".into()))?;
    unsafe { dav1d_default_settings(settings_ptr) };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc = unsafe { dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(BackendError::ProcessingFailed(format!(
            "rav1d open failed ({})",
            rc.0
        )));
    }

    let decoded = (|| -> Result<DynamicImage, BackendError> {
        use rav1d::include::dav1d::data::Dav1dData;
        use rav1d::include::dav1d::picture::Dav1dPicture;
        use rav1d::src::lib::{
            dav1d_data_create, dav1d_data_unref, dav1d_get_picture, dav1d_picture_unref,
            dav1d_send_data,
        };

        let mut data = Dav1dData::default();
        let buf_ptr = unsafe { dav1d_data_create(NonNull::new(&mut data), av1_bytes.len()) };
        if buf_ptr.is_null() {
            return Err(BackendError::ProcessingFailed(
                "rav1d data_create failed".into(),
            ));
        }
        unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

        let rc = unsafe { dav1d_send_data(ctx, NonNull::new(&mut data)) };
        if rc.0 != 0 {
            unsafe { dav1d_data_unref(NonNull::new(&mut data)) };
            return Err(BackendError::ProcessingFailed(format!(
                "rav1d send_data failed ({})",
                rc.0
            )));
        }

        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "rav1d get_picture failed ({})",
                rc.0
            )));
        }

        let converted = picture_to_rgb(&pic);
        unsafe { dav1d_picture_unref(NonNull::new(&mut pic)) };
        converted
    })();

    unsafe { dav1d_close(NonNull::new(&mut ctx)) };
    decoded
}

/// Convert a decoded picture to an RGB8 image. Does not release the picture.
fn picture_to_rgb(
    pic: &rav1d::include::dav1d::picture::Dav1dPicture,
) -> Result<DynamicImage, BackendError> {
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };

    let plane = |i: usize| {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(|| BackendError::ProcessingFailed(format!("AVIF plane {i} missing")))
    };

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let layout = pic.p.layout;
    let y_ptr = plane(0)?;

    let planes = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        YuvPlanes {
            y_ptr,
            u_ptr: y_ptr,
            v_ptr: y_ptr,
            y_stride: pic.stride[0],
            uv_stride: 0,
            width,
            height,
            bpc: pic.p.bpc as u32,
            subsampling: (false, false),
            monochrome: true,
        }
    } else {
        let subsampling = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            _ => {
                return Err(BackendError::ProcessingFailed(format!(
                    "Unsupported AVIF pixel layout: {layout}"
                )));
            }
        };
        YuvPlanes {
            y_ptr,
            u_ptr: plane(1)?,
            v_ptr: plane(2)?,
            y_stride: pic.stride[0],
            uv_stride: pic.stride[1],
            width,
            height,
            bpc: pic.p.bpc as u32,
            subsampling,
            monochrome: false,
        }
    };

    image::RgbImage::from_raw(width, height, planes.to_rgb())
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| {
            BackendError::ProcessingFailed("Decoded AVIF buffer has the wrong size".into())
        })
}

/// Borrowed YUV plane pointers from a live rav1d picture.
struct YuvPlanes {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling (horizontal, vertical), e.g. I420 = (true, true)
    subsampling: (bool, bool),
    monochrome: bool,
}

impl YuvPlanes {
    fn to_rgb(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;
        let (ss_x, ss_y) = self.subsampling;

        let mut rgb = Vec::with_capacity((self.width * self.height * 3) as usize);
        for row in 0..self.height {
            for col in 0..self.width {
                let y = read_sample(self.y_ptr, self.y_stride, col, row, self.bpc);
                let pixel = if self.monochrome {
                    let v = (y * scale).clamp(0.0, 255.0) as u8;
                    [v, v, v]
                } else {
                    let (cx, cy) = (
                        if ss_x { col / 2 } else { col },
                        if ss_y { row / 2 } else { row },
                    );
                    let cb = read_sample(self.u_ptr, self.uv_stride, cx, cy, self.bpc) - center;
                    let cr = read_sample(self.v_ptr, self.uv_stride, cx, cy, self.bpc) - center;
                    bt601_to_rgb(y, cb, cr, scale)
                };
                rgb.extend_from_slice(&pixel);
            }
        }
        rgb
    }
}

/// BT.601 YCbCr → RGB, scaled to 8 bits. `cb`/`cr` are already centred.
fn bt601_to_rgb(y: f32, cb: f32, cr: f32, scale: f32) -> [u8; 3] {
    [
        ((y + 1.402 * cr) * scale).clamp(0.0, 255.0) as u8,
        ((y - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0) as u8,
        ((y + 1.772 * cb) * scale).clamp(0.0, 255.0) as u8,
    ]
}

/// Read one sample; 10- and 12-bit planes are stored as u16.
#[inline]
fn read_sample(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        let byte_offset = y as isize * stride + x as isize * 2;
        (unsafe { *(ptr.offset(byte_offset) as *const u16) }) as f32
    }
}
