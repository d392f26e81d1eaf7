//! Shared plumbing for Office Open XML documents: the zip package, a small
//! XML tree over quick-xml events, and run-level text editing.

pub mod package;
pub mod runs;
pub mod xml;

pub use package::OoxmlPackage;
pub use xml::{XmlDocument, XmlElement, XmlNode};

use crate::errors::FormatError;

/// Parse one package part into an XML tree
pub fn load_part(package: &OoxmlPackage, name: &str) -> Result<XmlDocument, FormatError> {
    XmlDocument::parse(name, package.require_part(name)?)
}

/// Relationship id to target, for one `.rels` part
pub fn relationships(package: &OoxmlPackage, rels_part: &str) -> Result<Vec<(String, String)>, FormatError> {
    let Some(bytes) = package.part(rels_part) else {
        return Ok(Vec::new());
    };
    let document = XmlDocument::parse(rels_part, bytes)?;
    let root = document.require_root(rels_part)?;
    Ok(root
        .children_named("Relationship")
        .filter_map(|rel| Some((rel.attr("Id")?.to_string(), rel.attr("Target")?.to_string())))
        .collect())
}
