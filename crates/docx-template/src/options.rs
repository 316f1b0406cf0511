/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A width and height in logical (96 DPI) pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for PixelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Default bound for body images without an explicit size.
pub const DEFAULT_IMAGE_SIZE: PixelSize = PixelSize::new(400, 300);

/// Default bound for header and footer images without an explicit size.
pub const DEFAULT_HEADER_IMAGE_SIZE: PixelSize = PixelSize::new(104, 83);

/// Options for one render.
///
/// Loaded from TOML by the command-line front end:
///
/// ```toml
/// strict = true
/// image-size = { width = 600, height = 400 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderOptions {
    /// Bound for `{%key%}` images in the document body.
    pub image_size: PixelSize,

    /// Bound for `{%key%}` images in headers and footers.
    pub header_image_size: PixelSize,

    /// Treat unresolved placeholders as errors and fail the render.
    pub strict: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            header_image_size: DEFAULT_HEADER_IMAGE_SIZE,
            strict: false,
        }
    }
}

impl RenderOptions {
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
