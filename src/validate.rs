//! Acceptance checks for fetched bodies
//!
//! What counts as a valid image is pluggable. The default, [`SniffingValidator`],
//! inspects magic bytes and only trusts the declared Content-Type when sniffing
//! cannot decide (text-based formats such as SVG).

use crate::error::ItemError;
use crate::fetch::FetchedImage;

/// Predicate deciding whether a fetched body may be written to disk
///
/// A rejection is a permanent failure: the same URL is not fetched again.
pub trait ImageValidator: Send + Sync {
    /// Accept the body or explain why it was rejected
    fn validate(&self, image: &FetchedImage) -> std::result::Result<(), ItemError>;
}

/// Accepts non-empty bodies recognized as images
#[derive(Debug, Clone, Copy, Default)]
pub struct SniffingValidator;

impl ImageValidator for SniffingValidator {
    fn validate(&self, image: &FetchedImage) -> std::result::Result<(), ItemError> {
        if image.bytes.is_empty() {
            return Err(ItemError::EmptyBody);
        }

        match infer::get(&image.bytes) {
            Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(()),
            // Sniffed as something concrete and it is not an image
            Some(kind) => {
                tracing::debug!(sniffed = kind.mime_type(), "Body is not an image");
                Err(ItemError::UnsupportedContent {
                    content_type: Some(kind.mime_type().to_string()),
                })
            }
            None if declares_image(image.content_type.as_deref()) => Ok(()),
            None => Err(ItemError::UnsupportedContent {
                content_type: image.content_type.clone(),
            }),
        }
    }
}

/// Accepts any non-empty body
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyValidator;

impl ImageValidator for NonEmptyValidator {
    fn validate(&self, image: &FetchedImage) -> std::result::Result<(), ItemError> {
        if image.bytes.is_empty() {
            Err(ItemError::EmptyBody)
        } else {
            Ok(())
        }
    }
}

fn declares_image(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}
