//! Software rendering for the in-memory surface

pub mod paint;
pub mod raster;

/// An encoded capture and its pixel size.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub png_data: Vec<u8>,
}
