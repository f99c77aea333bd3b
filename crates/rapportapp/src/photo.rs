//! # Photo Ingestion
//!
//! Uploaded photos are normalized before they are stored:
//!
//! 1. EXIF orientation is applied, so the stored image is upright.
//! 2. Images larger than the bounds (600 × 800 by default) are scaled down to
//!    fit inside them, keeping the aspect ratio. Smaller images keep their
//!    size.
//! 3. The result is re-encoded as JPEG at a fixed quality (82 by default).
//! 4. It is stored in the asset folder as `{idmeldung}-{suffix}.jpg`, or
//!    `{idmeldung}-m-{suffix}.jpg` for remediation-note photos, where the
//!    suffix is random so parallel uploads for one report never collide.
//!
//! Decoding and encoding are CPU bound and run on the blocking pool.
//!
//! A report holds at most three photos. [`PhotoPipeline::ingest_report`]
//! takes the owner's current row and refuses with `slots-exhausted` before
//! decoding or writing anything when no slot is free. Callers read that row
//! under the `meldungen` lock and keep holding it until the reference is
//! saved, see `commands::photos`.

use crate::error::{RapportError, Result, ValidationError};
use crate::model::{AssetKind, PhotoSlot, ReportId, Row, JPEG_MIME};
use crate::store::backend::Handle;
use crate::store::context::StoreContext;
use exif::{In, Tag};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView};
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoLimits {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
}

impl Default for PhotoLimits {
    fn default() -> Self {
        Self {
            max_width: 600,
            max_height: 800,
            quality: 82,
        }
    }
}

/// A photo written to the asset folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredAsset {
    pub name: String,
    pub handle: Handle,
    /// What goes into the row's photo field.
    pub reference: String,
}

/// EXIF orientation, values 1 to 8.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Normal,
    MirroredHorizontal,
    CW180,
    MirroredVertical,
    MirroredHorizontalAnd270CW,
    CW90,
    MirroredHorizontalAnd90CW,
    CW270,
}

impl From<u32> for Orientation {
    fn from(value: u32) -> Self {
        match value {
            2 => Self::MirroredHorizontal,
            3 => Self::CW180,
            4 => Self::MirroredVertical,
            5 => Self::MirroredHorizontalAnd270CW,
            6 => Self::CW90,
            7 => Self::MirroredHorizontalAnd90CW,
            8 => Self::CW270,
            _ => Self::Normal,
        }
    }
}

impl Orientation {
    /// Orientation tag of the primary image, `Normal` when there is none.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        exif::Reader::new()
            .read_from_container(&mut Cursor::new(bytes))
            .ok()
            .and_then(|exif| {
                exif.get_field(Tag::Orientation, In::PRIMARY)
                    .and_then(|field| field.value.get_uint(0))
            })
            .map(Self::from)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn correct(self, img: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => img,
            Self::MirroredHorizontal => img.fliph(),
            Self::CW180 => img.rotate180(),
            Self::MirroredVertical => img.flipv(),
            Self::MirroredHorizontalAnd270CW => img.fliph().rotate270(),
            Self::CW90 => img.rotate90(),
            Self::MirroredHorizontalAnd90CW => img.fliph().rotate90(),
            Self::CW270 => img.rotate270(),
        }
    }
}

/// Dimensions after fitting `(width, height)` inside the bounds. Never
/// enlarges.
pub fn fit_within(width: u32, height: u32, limits: &PhotoLimits) -> (u32, u32) {
    if width <= limits.max_width && height <= limits.max_height {
        return (width, height);
    }
    let (w, h) = (u64::from(width), u64::from(height));
    let (max_w, max_h) = (u64::from(limits.max_width), u64::from(limits.max_height));

    // Width is the binding side when w/h > max_w/max_h.
    let (new_w, new_h) = if w * max_h > h * max_w {
        (max_w, (h * max_w / w).max(1))
    } else {
        ((w * max_h / h).max(1), max_h)
    };
    // Both are bounded by u32 limits.
    (new_w as u32, new_h as u32)
}

/// Orient, bound and re-encode one uploaded image. Returns JPEG bytes.
pub fn normalize(raw: &[u8], limits: &PhotoLimits) -> Result<Vec<u8>> {
    let orientation = Orientation::from_bytes(raw);
    let img = orientation.correct(image::load_from_memory(raw)?);

    let (width, height) = img.dimensions();
    let (new_w, new_h) = fit_within(width, height, limits);
    let img = if (new_w, new_h) != (width, height) {
        img.resize_exact(new_w, new_h, FilterType::Triangle)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, limits.quality).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    Ok(out)
}

pub fn asset_name(owner: &ReportId, kind: AssetKind) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    match kind {
        AssetKind::Report => format!("{}-{}.jpg", owner, suffix),
        AssetKind::Massnahme => format!("{}-m-{}.jpg", owner, suffix),
    }
}

#[derive(Clone)]
pub struct PhotoPipeline {
    ctx: Arc<StoreContext>,
    limits: PhotoLimits,
}

impl PhotoPipeline {
    pub fn new(ctx: Arc<StoreContext>, limits: PhotoLimits) -> Self {
        Self { ctx, limits }
    }

    /// Store a photo for the report whose current row is `report`. Returns
    /// the slot the reference belongs in.
    #[instrument(skip(self, raw, report), fields(size = raw.len()))]
    pub async fn ingest_report(
        &self,
        raw: Vec<u8>,
        owner: &ReportId,
        report: &Row,
    ) -> Result<(PhotoSlot, StoredAsset)> {
        if raw.is_empty() {
            return Err(ValidationError::EmptyUpload.into());
        }
        let slot = PhotoSlot::first_free(report)
            .ok_or_else(|| ValidationError::SlotsExhausted(owner.to_string()))?;
        let asset = self.store(raw, owner, AssetKind::Report).await?;
        Ok((slot, asset))
    }

    /// Store a remediation-note photo. These live in the note's `mphoto`
    /// field and take no report slot.
    #[instrument(skip(self, raw), fields(size = raw.len()))]
    pub async fn ingest_massnahme(&self, raw: Vec<u8>, owner: &ReportId) -> Result<StoredAsset> {
        if raw.is_empty() {
            return Err(ValidationError::EmptyUpload.into());
        }
        self.store(raw, owner, AssetKind::Massnahme).await
    }

    async fn store(&self, raw: Vec<u8>, owner: &ReportId, kind: AssetKind) -> Result<StoredAsset> {
        let limits = self.limits;
        let jpeg = spawn_blocking(move || normalize(&raw, &limits))
            .await
            .map_err(|e| RapportError::Store(format!("photo task failed: {}", e)))??;

        let name = asset_name(owner, kind);
        let ns = self.ctx.namespace().await?;
        let backend = self.ctx.backend();
        let handle = backend
            .create_file(&ns.asset, &name, jpeg, JPEG_MIME)
            .await?;
        let reference = backend.asset_reference(&handle, &name);
        debug!(%name, %reference, "stored photo");

        Ok(StoredAsset {
            name,
            handle,
            reference,
        })
    }
}
