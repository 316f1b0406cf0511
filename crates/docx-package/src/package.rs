//! In-memory zip package.

use crate::content_types::CONTENT_TYPES_PART;
use crate::relationships::resolve_target;
use crate::{ContentTypes, PackageError, Relationships, Result, rel_types, rels_part_name};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Fallback main document location for packages without a usable `_rels/.rels`.
const DEFAULT_MAIN_PART: &str = "word/document.xml";

/// A single archive entry.
#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
}

/// A media part that was added to the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRef {
    /// Relationship id in the owner part's `.rels` (e.g. `rId12`).
    pub rel_id: String,
    /// Full part name inside the archive (e.g. `word/media/image3.png`).
    pub part_name: String,
}

/// A `.docx` archive held in memory.
///
/// Entries keep their original order and compression method so an
/// unchanged package writes back out equivalently.
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<Part>,
}

impl Package {
    /// Read every entry of a zip archive into memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.push(Part {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
            });
        }

        tracing::debug!(parts = parts.len(), "read package");
        Ok(Self { parts })
    }

    /// Write the package back to zip bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for part in &self.parts {
            let options = SimpleFileOptions::default().compression_method(part.compression);
            writer.start_file(part.name.as_str(), options)?;
            writer.write_all(&part.data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    /// Names of all parts, in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name == name)
    }

    /// Contents of a part, if present.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    /// Contents of a part, or [`PackageError::MissingPart`].
    pub fn require_part(&self, name: &str) -> Result<&[u8]> {
        self.part(name).ok_or_else(|| PackageError::MissingPart {
            name: name.to_string(),
        })
    }

    /// Replace a part's contents, or append a new part.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
            }),
        }
    }

    /// Relationships of a part; empty if it has no `.rels` part.
    pub fn relationships(&self, part_name: &str) -> Result<Relationships> {
        match self.part(&rels_part_name(part_name)) {
            Some(bytes) => Relationships::parse(bytes),
            None => Ok(Relationships::new()),
        }
    }

    /// The content types manifest.
    pub fn content_types(&self) -> Result<ContentTypes> {
        match self.part(CONTENT_TYPES_PART) {
            Some(bytes) => ContentTypes::parse(bytes),
            None => Ok(ContentTypes::new()),
        }
    }

    /// Locate the main document part through the package relationships.
    pub fn main_document_part(&self) -> Result<String> {
        let package_rels = self.relationships("")?;
        if let Some(rel) = package_rels
            .by_type(rel_types::OFFICE_DOCUMENT)
            .into_iter()
            .find(|r| !r.external)
        {
            let name = resolve_target("", &rel.target)?;
            if self.has_part(&name) {
                return Ok(name);
            }
            tracing::warn!(target = %rel.target, "officeDocument relationship points at a missing part");
        }

        if self.has_part(DEFAULT_MAIN_PART) {
            Ok(DEFAULT_MAIN_PART.to_string())
        } else {
            Err(PackageError::MissingPart {
                name: DEFAULT_MAIN_PART.to_string(),
            })
        }
    }

    /// Part names targeted by `source`'s relationships of the given type.
    ///
    /// Targets that do not exist in the archive are skipped.
    pub fn related_parts(&self, source: &str, rel_type: &str) -> Result<Vec<String>> {
        let rels = self.relationships(source)?;
        let mut names = Vec::new();
        for rel in rels.by_type(rel_type) {
            if rel.external {
                continue;
            }
            let name = resolve_target(source, &rel.target)?;
            if !self.has_part(&name) {
                tracing::warn!(source, target = %rel.target, "relationship target not in package");
                continue;
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Add an image media part and relate it to `owner`.
    ///
    /// The media is stored as `<owner dir>/media/imageN.<ext>` with `N`
    /// one past the highest existing image number, related from the owner's
    /// `.rels` part (created if missing), and its extension gets a `Default`
    /// content type if it has none.
    pub fn add_image_part(
        &mut self,
        owner: &str,
        bytes: Vec<u8>,
        extension: &str,
        content_type: &str,
    ) -> Result<PartRef> {
        let extension = extension.to_ascii_lowercase();
        let media_dir = match owner.rsplit_once('/') {
            Some((dir, _)) => format!("{}/media", dir),
            None => "media".to_string(),
        };
        let number = self.next_image_number(&media_dir);
        let file_name = format!("image{}.{}", number, extension);
        let part_name = format!("{}/{}", media_dir, file_name);
        let target = format!("media/{}", file_name);

        self.parts.push(Part {
            name: part_name.clone(),
            data: bytes,
            compression: CompressionMethod::Stored,
        });

        let mut rels = self.relationships(owner)?;
        let rel_id = rels.add(rel_types::IMAGE, &target);
        self.set_part(&rels_part_name(owner), rels.to_bytes()?);

        let mut types = self.content_types()?;
        if types.ensure_default(&extension, content_type) {
            self.set_part(CONTENT_TYPES_PART, types.to_bytes()?);
        }

        tracing::debug!(owner, part = %part_name, rel_id = %rel_id, "added image part");
        Ok(PartRef { rel_id, part_name })
    }

    fn next_image_number(&self, media_dir: &str) -> u32 {
        let prefix = format!("{}/image", media_dir);
        self.parts
            .iter()
            .filter_map(|p| {
                let rest = p.name.strip_prefix(prefix.as_str())?;
                let (digits, _) = rest.split_once('.')?;
                digits.parse::<u32>().ok()
            })
            .max()
            .unwrap_or(0)
            + 1
    }
}
