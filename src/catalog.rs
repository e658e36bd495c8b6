//! Catalog items and their on-disk layout
//!
//! The REST service accepts items described by what they depict (`name`,
//! `source`, `category`) rather than by destination path. This module validates
//! such items and turns them into [`DownloadRequest`]s laid out as
//! `<root>/<source>_<category>/<safe_name>.<ext>`.

use crate::error::{Error, Result};
use crate::fetch::parse_image_url;
use crate::types::DownloadRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

/// Supported data sources and the categories each one provides
pub const SUPPORTED_SOURCES: &[(&str, &[&str])] = &[("wikipedia", &["animals"])];

/// Extensions kept from the source URL; anything else is stored as `jpg`
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "tif", "tiff", "ico", "avif",
];

const DEFAULT_EXTENSION: &str = "jpg";

/// One image to download, as submitted to the REST API
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImageItem {
    /// HTTP(S) URL of the image
    #[schema(example = "https://upload.wikimedia.org/wikipedia/commons/7/73/Lion_waiting_in_Namibia.jpg")]
    pub image_url: String,
    /// What the image depicts; also the identifier reported back
    #[schema(example = "Lion")]
    pub name: String,
    /// Data source the item came from
    #[schema(example = "wikipedia")]
    pub source: String,
    /// Category within the source
    #[schema(example = "animals")]
    pub category: String,
    /// Free-form caller data, not interpreted
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ImageItem {
    /// Build an item without metadata
    pub fn new(
        image_url: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            image_url: image_url.into(),
            name: name.into(),
            source: source.into(),
            category: category.into(),
            metadata: HashMap::new(),
        }
    }

    /// Check URL, name and source/category before anything is dispatched
    pub fn validate(&self) -> Result<()> {
        parse_image_url(&self.image_url).map_err(|e| Error::InvalidRequest(e.to_string()))?;

        if safe_name(&self.name).is_empty() {
            return Err(Error::InvalidRequest(format!(
                "name '{}' does not yield a usable file name",
                self.name
            )));
        }

        validate_source(&self.source, &self.category)
    }

    /// Directory name grouping items of one source and category
    pub fn source_type(&self) -> String {
        format!("{}_{}", self.source, self.category)
    }

    /// Where this item is stored under `root`
    pub fn target_path(&self, root: &Path) -> PathBuf {
        root.join(self.source_type()).join(format!(
            "{}.{}",
            safe_name(&self.name),
            image_extension(&self.image_url)
        ))
    }

    /// Turn the item into a download request rooted at `root`
    pub fn to_request(&self, root: &Path) -> DownloadRequest {
        DownloadRequest::new(self.name.clone(), self.image_url.clone(), self.target_path(root))
    }
}

/// Reject unknown sources and categories a source does not provide
pub fn validate_source(source: &str, category: &str) -> Result<()> {
    let Some((_, categories)) = SUPPORTED_SOURCES.iter().find(|(s, _)| *s == source) else {
        let available: Vec<&str> = SUPPORTED_SOURCES.iter().map(|(s, _)| *s).collect();
        return Err(Error::InvalidRequest(format!(
            "invalid source '{source}', available sources: {}",
            available.join(", ")
        )));
    };

    if !categories.contains(&category) {
        return Err(Error::InvalidRequest(format!(
            "invalid category '{category}' for source '{source}', available categories: {}",
            categories.join(", ")
        )));
    }

    Ok(())
}

/// File-name stem for an item name
///
/// Lowercased, whitespace and path separators become `_`, leading dots are
/// dropped so a name can never address a parent or hidden file.
pub fn safe_name(name: &str) -> String {
    let replaced: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            c if c.is_whitespace() => '_',
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();

    replaced.trim_start_matches('.').to_string()
}

/// Extension of the URL's last path segment if it is a known image type
pub fn image_extension(url: &str) -> &'static str {
    let Ok(parsed) = url::Url::parse(url) else {
        return DEFAULT_EXTENSION;
    };

    let extension = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|segment| Path::new(segment).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    extension
        .and_then(|ext| IMAGE_EXTENSIONS.iter().find(|known| **known == ext).copied())
        .unwrap_or(DEFAULT_EXTENSION)
}
