use std::io::{Cursor, Read, Write};

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::FormatError;

/// In-memory OOXML container. Entries keep their order, compression and
/// timestamps so untouched parts round-trip unchanged.
#[derive(Debug, Clone)]
pub struct OoxmlPackage {
    entries: Vec<PackageEntry>,
}

#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
    /// Set once the part was replaced
    pub modified: bool,
}

impl OoxmlPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
                modified: false,
            });
        }
        debug!("Opened package with {} entries", entries.len());
        Ok(Self { entries })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Part content, or a malformed-document error naming the missing part
    pub fn require_part(&self, name: &str) -> Result<&[u8], FormatError> {
        self.part(name)
            .ok_or_else(|| FormatError::Malformed(format!("missing package part {}", name)))
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn replace_part(&mut self, name: &str, data: Vec<u8>) -> Result<(), FormatError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| FormatError::Malformed(format!("missing package part {}", name)))?;
        entry.data = data;
        entry.modified = true;
        Ok(())
    }

    pub fn is_modified(&self) -> bool {
        self.entries.iter().any(|e| e.modified)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            let mut opts = SimpleFileOptions::default()
                .compression_method(entry.compression)
                .last_modified_time(entry.last_modified);
            if let Some(mode) = entry.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if entry.is_dir || entry.name.ends_with('/') {
                zout.add_directory(entry.name.as_str(), opts)?;
            } else {
                zout.start_file(entry.name.as_str(), opts)?;
                zout.write_all(&entry.data)?;
            }
        }
        Ok(zout.finish()?.into_inner())
    }
}

/// Resolve a relationship target against the directory of its source part
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relationship part describing the links of `part`
pub fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}
