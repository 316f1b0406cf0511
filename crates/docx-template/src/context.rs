/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The data a template is rendered against.
//!
//! A [`TemplateContext`] is a set of independent registries, one per kind of
//! value. Every lookup returns an `Option`: an absent key is an ordinary
//! outcome that the passes report as a diagnostic, never a panic.

use crate::error::TemplateResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One row of a table or collection.
///
/// Insertion order is kept so the first row's key order can serve as the
/// column order of a synthesized table.
pub type Row = IndexMap<String, String>;

/// A character that must be rendered in a specific font
/// (e.g. a Wingdings check mark).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialChar {
    #[serde(rename = "char")]
    pub character: char,
    pub font: String,
}

impl SpecialChar {
    pub fn new(character: char, font: impl Into<String>) -> Self {
        Self {
            character,
            font: font.into(),
        }
    }
}

/// Registries of values for one render call.
///
/// Deserializes from JSON:
///
/// ```json
/// {
///   "scalars": { "Name": "Ada" },
///   "tables": { "people": [{ "name": "Ada", "role": "Engineer" }] },
///   "collections": { "items": [{ "label": "First" }] },
///   "images": { "Logo": "logo.png" },
///   "special_chars": { "Check": { "char": "✓", "font": "Segoe UI Symbol" } },
///   "rich_text": { "Notes": "<b>Bold</b> text" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateContext {
    scalars: HashMap<String, String>,
    tables: HashMap<String, Vec<Row>>,
    collections: HashMap<String, Vec<Row>>,
    images: HashMap<String, PathBuf>,
    special_chars: HashMap<String, SpecialChar>,
    rich_text: HashMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a context from JSON text.
    pub fn from_json_str(json: &str) -> TemplateResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a context from a JSON file.
    ///
    /// Relative image paths are resolved against the file's directory.
    pub fn from_json_file(path: &Path) -> TemplateResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut ctx = Self::from_json_str(&text)?;
        if let Some(base) = path.parent() {
            ctx.resolve_image_paths(base);
        }
        Ok(ctx)
    }

    /// Make every relative image path absolute with respect to `base`.
    pub fn resolve_image_paths(&mut self, base: &Path) {
        for path in self.images.values_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn insert_scalar(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.scalars.insert(key.into(), value.into());
        self
    }

    pub fn insert_table(&mut self, name: impl Into<String>, rows: Vec<Row>) -> &mut Self {
        self.tables.insert(name.into(), rows);
        self
    }

    pub fn insert_collection(&mut self, name: impl Into<String>, items: Vec<Row>) -> &mut Self {
        self.collections.insert(name.into(), items);
        self
    }

    pub fn insert_image(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> &mut Self {
        self.images.insert(key.into(), path.into());
        self
    }

    pub fn insert_special_char(&mut self, key: impl Into<String>, value: SpecialChar) -> &mut Self {
        self.special_chars.insert(key.into(), value);
        self
    }

    pub fn insert_rich_text(&mut self, key: impl Into<String>, html: impl Into<String>) -> &mut Self {
        self.rich_text.insert(key.into(), html.into());
        self
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.scalars.get(key).map(String::as_str)
    }

    pub fn table(&self, name: &str) -> Option<&[Row]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    pub fn collection(&self, name: &str) -> Option<&[Row]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    /// Rows for a loop or table region.
    ///
    /// Loops prefer `collections` and tables prefer `tables`; either falls
    /// back to the other registry so one dataset can drive both.
    pub fn rows(&self, name: &str, prefer_tables: bool) -> Option<&[Row]> {
        if prefer_tables {
            self.table(name).or_else(|| self.collection(name))
        } else {
            self.collection(name).or_else(|| self.table(name))
        }
    }

    pub fn image(&self, key: &str) -> Option<&Path> {
        self.images.get(key).map(PathBuf::as_path)
    }

    pub fn special_char(&self, key: &str) -> Option<&SpecialChar> {
        self.special_chars.get(key)
    }

    pub fn rich_text(&self, key: &str) -> Option<&str> {
        self.rich_text.get(key).map(String::as_str)
    }

    pub fn is_special_char(&self, key: &str) -> bool {
        self.special_chars.contains_key(key)
    }

    pub fn is_rich_text(&self, key: &str) -> bool {
        self.rich_text.contains_key(key)
    }
}

/// Build a [`Row`] from `(key, value)` pairs.
///
/// ```
/// use docx_template::context::row;
///
/// let r = row([("a", "1"), ("b", "2")]);
/// assert_eq!(r.keys().collect::<Vec<_>>(), vec!["a", "b"]);
/// ```
pub fn row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
