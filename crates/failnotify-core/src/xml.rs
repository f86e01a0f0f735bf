//! Small helpers over `roxmltree` for the tag-name lookups the build server
//! metadata needs.

use std::path::Path;

use roxmltree::{Document, Node};

use crate::domain::error::{NotifyError, Result};

pub(crate) fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(NotifyError::MetadataMissing {
            path: path.to_path_buf(),
        });
    }
    Ok(std::fs::read_to_string(path)?)
}

pub(crate) fn parse<'i>(text: &'i str, origin: &str) -> Result<Document<'i>> {
    Document::parse(text).map_err(|source| NotifyError::MalformedXml {
        origin: origin.to_string(),
        source,
    })
}

/// First element named `name` below `node` (document order, `node` excluded).
pub(crate) fn first<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.descendants()
        .skip(1)
        .find(|n| n.is_element() && n.has_tag_name(name))
}

/// All elements named `name` below `node`.
pub(crate) fn all<'a, 'i: 'a>(
    node: Node<'a, 'i>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'i>> + 'a {
    node.descendants()
        .skip(1)
        .filter(move |n| n.is_element() && n.has_tag_name(name))
}

/// Direct child element named `name`.
pub(crate) fn child<'a, 'i>(node: Node<'a, 'i>, name: &str) -> Option<Node<'a, 'i>> {
    node.children()
        .find(|n| n.is_element() && n.has_tag_name(name))
}

/// Concatenated text content of an element, trimmed.
pub(crate) fn text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Text of the first element named `name`, or a `MissingElement` error.
pub(crate) fn required_text(node: Node<'_, '_>, name: &str, origin: &str) -> Result<String> {
    first(node, name)
        .map(text)
        .ok_or_else(|| NotifyError::missing(origin, name))
}

pub(crate) fn parse_number(value: &str, element: &str, origin: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| NotifyError::InvalidNumber {
        origin: origin.to_string(),
        element: element.to_string(),
        value: value.to_string(),
    })
}
