/*
 * images.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Embedding `{%key%}` and `{%key:WxH%}` images.
//!
//! An image is scaled down to fit its bound with the aspect ratio kept, and
//! never scaled up. The asset is added to the package once per part and an
//! inline drawing replaces the token text.

use crate::diagnostics::{DiagnosticMessageBuilder, IMAGE_ASSET, UNKNOWN_IMAGE};
use crate::error::TemplateResult;
use crate::options::PixelSize;
use crate::render_context::RenderContext;
use crate::runs::empty_run;
use crate::scanner::{paragraph_paths, scan_text};
use crate::text::{ParagraphText, base_properties, insert_runs};
use crate::token::TokenKind;
use docx_package::{Package, PartRef};
use docx_xml::{XmlElement, parse_fragment};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// EMUs per pixel at 96 DPI.
pub const EMU_PER_PIXEL: u64 = 9525;

/// Raster formats Word displays inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
}

impl ImageFormat {
    fn from_image_type(image_type: imagesize::ImageType) -> Option<Self> {
        match image_type {
            imagesize::ImageType::Png => Some(ImageFormat::Png),
            imagesize::ImageType::Jpeg => Some(ImageFormat::Jpeg),
            imagesize::ImageType::Gif => Some(ImageFormat::Gif),
            imagesize::ImageType::Bmp => Some(ImageFormat::Bmp),
            imagesize::ImageType::Tiff => Some(ImageFormat::Tiff),
            _ => None,
        }
    }

    /// File extension of the media part.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Tiff => "image/tiff",
        }
    }
}

/// Problems with a single image asset. These skip the image, never the
/// render.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a recognized image file")]
    Unrecognized,

    #[error("Unsupported image format {0}")]
    Unsupported(String),

    #[error("Image has zero width or height")]
    ZeroSize,
}

/// Natural size and format of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub size: PixelSize,
    pub format: ImageFormat,
}

/// Read the pixel size and format from image bytes.
pub fn probe_image(bytes: &[u8]) -> Result<ImageInfo, ImageError> {
    let image_type = imagesize::image_type(bytes).map_err(|_| ImageError::Unrecognized)?;
    let format = ImageFormat::from_image_type(image_type)
        .ok_or_else(|| ImageError::Unsupported(format!("{:?}", image_type)))?;
    let size = imagesize::blob_size(bytes).map_err(|_| ImageError::Unrecognized)?;
    if size.width == 0 || size.height == 0 {
        return Err(ImageError::ZeroSize);
    }
    let clamp = |v: usize| u32::try_from(v).unwrap_or(u32::MAX);
    Ok(ImageInfo {
        size: PixelSize::new(clamp(size.width), clamp(size.height)),
        format,
    })
}

/// Size of an image scaled to fit `bound`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaled {
    pub scale: f64,
    pub width_px: u32,
    pub height_px: u32,
    pub emu_width: u64,
    pub emu_height: u64,
}

/// Fit `natural` into `bound`, keeping the aspect ratio.
///
/// Images that already fit keep their natural size.
///
/// ```
/// use docx_template::images::compute_placement;
/// use docx_template::options::PixelSize;
///
/// let scaled = compute_placement(PixelSize::new(1000, 500), PixelSize::new(200, 100));
/// assert_eq!((scaled.width_px, scaled.height_px), (200, 100));
/// assert_eq!(scaled.emu_width, 1_905_000);
/// ```
pub fn compute_placement(natural: PixelSize, bound: PixelSize) -> Scaled {
    let (nw, nh) = (f64::from(natural.width), f64::from(natural.height));
    let scale = if natural.width > bound.width || natural.height > bound.height {
        (f64::from(bound.width) / nw).min(f64::from(bound.height) / nh)
    } else {
        1.0
    };
    let width_px = ((nw * scale).round() as u32).max(1);
    let height_px = ((nh * scale).round() as u32).max(1);
    Scaled {
        scale,
        width_px,
        height_px,
        emu_width: u64::from(width_px) * EMU_PER_PIXEL,
        emu_height: u64::from(height_px) * EMU_PER_PIXEL,
    }
}

/// Everything known about one placed image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
    pub path: PathBuf,
    pub requested: PixelSize,
    pub natural: PixelSize,
    pub scaled: Scaled,
    pub part: PartRef,
}

/// Receiver of image media, usually the package being rendered.
pub trait AssetSink {
    /// Store image bytes and relate them to `owner_part`.
    fn register_image(
        &mut self,
        owner_part: &str,
        bytes: Vec<u8>,
        format: ImageFormat,
    ) -> TemplateResult<PartRef>;
}

impl AssetSink for Package {
    fn register_image(
        &mut self,
        owner_part: &str,
        bytes: Vec<u8>,
        format: ImageFormat,
    ) -> TemplateResult<PartRef> {
        Ok(self.add_image_part(owner_part, bytes, format.extension(), format.content_type())?)
    }
}

/// An asset registered for the current part.
#[derive(Debug, Clone)]
struct Registered {
    part: PartRef,
    natural: PixelSize,
}

/// Replace every image token under `root` with an inline drawing.
///
/// Returns the number of images embedded. Unknown keys and unreadable
/// assets leave the token text in place with a warning; only failures to
/// update the package are errors.
pub fn embed_images(
    root: &mut XmlElement,
    sink: &mut dyn AssetSink,
    ctx: &mut RenderContext<'_>,
) -> TemplateResult<usize> {
    let data = ctx.data;
    let existing = max_drawing_id(root);
    ctx.next_drawing_id = ctx.next_drawing_id.max(existing + 1);

    let mut registered: HashMap<PathBuf, Registered> = HashMap::new();
    let mut embedded = 0;

    for path in paragraph_paths(root).into_iter().rev() {
        let Some(paragraph) = root.element_at_mut(&path) else {
            continue;
        };
        let text = ParagraphText::build(paragraph).text;
        for token in scan_text(&text, data).iter().rev() {
            let TokenKind::Image { key, size } = &token.kind else {
                continue;
            };
            let Some(image_path) = data.image(key) else {
                ctx.warn_or_error(
                    UNKNOWN_IMAGE,
                    format!("Unknown image key '{}'", key),
                    Some(&token.raw),
                );
                continue;
            };
            let index = ParagraphText::build(paragraph);
            if !index.maps_span(token.span) || index.run_parent(token.span).is_none() {
                tracing::warn!(token = %token.raw, "image token did not map onto paragraph runs");
                continue;
            }

            let asset = match registered.get(image_path) {
                Some(asset) => asset.clone(),
                None => match load_image(image_path) {
                    Ok((bytes, info)) => {
                        let part = sink.register_image(&ctx.part, bytes, info.format)?;
                        let asset = Registered {
                            part,
                            natural: info.size,
                        };
                        registered.insert(image_path.to_path_buf(), asset.clone());
                        asset
                    }
                    Err(err) => {
                        let diagnostic = DiagnosticMessageBuilder::warning(format!(
                            "Image '{}' was skipped",
                            key
                        ))
                        .with_code(IMAGE_ASSET)
                        .problem(err.to_string())
                        .with_location(ctx.part.clone(), Some(&token.raw))
                        .build();
                        ctx.add_diagnostic(diagnostic);
                        continue;
                    }
                },
            };

            let requested = size.unwrap_or_else(|| ctx.default_image_size());
            let placement = ImagePlacement {
                path: image_path.to_path_buf(),
                requested,
                natural: asset.natural,
                scaled: compute_placement(asset.natural, requested),
                part: asset.part,
            };
            let id = ctx.next_drawing_id;
            let base = base_properties(paragraph, &index, token.span);
            let run = empty_run(base.as_ref()).with_child(drawing(&placement, id, key)?);
            if insert_runs(paragraph, &index, token.span, vec![run]).is_some() {
                ctx.next_drawing_id += 1;
                tracing::debug!(
                    key = %key,
                    path = %placement.path.display(),
                    width = placement.scaled.width_px,
                    height = placement.scaled.height_px,
                    "embedded image"
                );
                embedded += 1;
            }
        }
    }
    Ok(embedded)
}

fn load_image(path: &Path) -> Result<(Vec<u8>, ImageInfo), ImageError> {
    let bytes = std::fs::read(path).map_err(|source| ImageError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let info = probe_image(&bytes)?;
    Ok((bytes, info))
}

/// Largest `wp:docPr` id already used under `root`.
fn max_drawing_id(root: &XmlElement) -> u32 {
    root.find_paths(&|e| e.is("wp:docPr"), true)
        .iter()
        .filter_map(|path| root.element_at(path)?.attr("id")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

/// A `w:drawing` holding an inline picture.
fn drawing(placement: &ImagePlacement, id: u32, description: &str) -> TemplateResult<XmlElement> {
    let (cx, cy) = (placement.scaled.emu_width, placement.scaled.emu_height);
    let xml = format!(
        concat!(
            r#"<w:drawing>"#,
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
            r#"<wp:docPr id="{id}" name="Picture {id}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">"#,
            r#"<a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="Picture {id}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill>"#,
            r#"<a:blip r:embed="{rel}" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/>"#,
            r#"<a:stretch><a:fillRect/></a:stretch>"#,
            r#"</pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#,
        ),
        cx = cx,
        cy = cy,
        id = id,
        rel = placement.part.rel_id,
    );

    let mut elements = parse_fragment(&xml)?;
    let mut drawing = elements.pop().unwrap_or_else(|| XmlElement::new("w:drawing"));
    let doc_pr = drawing
        .find_paths(&|e| e.is("wp:docPr"), false)
        .into_iter()
        .next();
    if let Some(doc_pr) = doc_pr.and_then(|path| drawing.element_at_mut(&path)) {
        doc_pr.set_attr("descr", description);
    }
    Ok(drawing)
}
