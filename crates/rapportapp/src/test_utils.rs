use crate::api::RapportApi;
use crate::photo::PhotoLimits;
use crate::store::fs_backend::FsBackend;
use crate::store::mem_backend::MemBackend;
use crate::store::{NamespaceNames, Storage};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Filesystem-backed storage in a temporary data directory. The directory
/// lives as long as the env.
pub struct TestEnv {
    _data_dir: TempDir,
    pub storage: Storage,
    pub root: PathBuf,
}

impl TestEnv {
    pub fn with_csv_mirror(csv_mirror: bool) -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let storage = Storage::new(
            Arc::new(FsBackend::new(root.clone())),
            FsBackend::root_handle(),
            NamespaceNames::default(),
            csv_mirror,
            PhotoLimits::default(),
        );
        Self {
            _data_dir: temp_dir,
            storage,
            root,
        }
    }

    pub fn api(&self) -> RapportApi {
        RapportApi::new(self.storage.clone())
    }
}

/// Storage over a fresh in-memory backend, which is also returned for
/// inspection.
pub fn mem_storage() -> (Arc<MemBackend>, Storage) {
    let backend = Arc::new(MemBackend::new());
    let storage = Storage::new(
        backend.clone(),
        MemBackend::root_handle(),
        NamespaceNames::default(),
        false,
        PhotoLimits::default(),
    );
    (backend, storage)
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

/// A PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_to(&mut out, ImageOutputFormat::Png)
        .expect("failed to encode png");
    out.into_inner()
}

/// A JPEG of the given size carrying an EXIF orientation tag.
///
/// The encoder writes no EXIF, so a minimal APP1 segment (big-endian TIFF,
/// one IFD0 entry) is spliced in right after the SOI marker.
pub fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
    let img = gradient(width, height);
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, 90)
        .encode(img.as_raw(), width, height, ColorType::Rgb8)
        .expect("failed to encode jpeg");

    let mut payload = Vec::new();
    payload.extend_from_slice(b"Exif\0\0");
    payload.extend_from_slice(b"MM\0\x2a\0\0\0\x08");
    payload.extend_from_slice(&1u16.to_be_bytes());
    payload.extend_from_slice(&0x0112u16.to_be_bytes());
    payload.extend_from_slice(&3u16.to_be_bytes());
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(&orientation.to_be_bytes());
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(&0u32.to_be_bytes());

    let segment_len = (payload.len() + 2) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + payload.len() + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(&payload);
    out.extend_from_slice(&jpeg[2..]);
    out
}
