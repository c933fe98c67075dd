//! Segmentation collaborator abstraction
//!
//! The model that separates subject from background is external to this
//! crate. It receives the uploaded bytes and returns an encoded image with a
//! transparent background, or fails with a message.

use crate::error::{BgEditError, Result};
use async_trait::async_trait;
use std::future::Future;

/// Trait for segmentation collaborators
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Remove the background from an encoded image
    ///
    /// # Errors
    /// - Model failures
    /// - Unsupported input
    async fn segment(&self, image_bytes: &[u8]) -> Result<Vec<u8>>;

    /// Name used in logs
    fn name(&self) -> &str {
        "segmenter"
    }
}

/// Adapter turning an async closure into a [`Segmenter`]
///
/// # Examples
/// ```rust
/// use imgly_bgedit::{FnSegmenter, Segmenter};
///
/// let segmenter = FnSegmenter::new("echo", |bytes: Vec<u8>| async move {
///     Ok::<_, imgly_bgedit::BgEditError>(bytes)
/// });
/// assert_eq!(segmenter.name(), "echo");
/// ```
pub struct FnSegmenter<F> {
    name: String,
    func: F,
}

impl<F> FnSegmenter<F> {
    pub fn new<S: Into<String>>(name: S, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> Segmenter for FnSegmenter<F>
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>>> + Send,
{
    async fn segment(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        (self.func)(image_bytes.to_vec()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Normalize any collaborator failure into a segmentation error
pub(crate) fn as_segmentation_error(error: BgEditError) -> BgEditError {
    match error {
        BgEditError::Segmentation(_) => error,
        other => BgEditError::segmentation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockSegmenter;

    #[tokio::test]
    async fn test_fn_segmenter_forwards_bytes() {
        let segmenter = FnSegmenter::new("reverse", |mut bytes: Vec<u8>| async move {
            bytes.reverse();
            Ok::<_, BgEditError>(bytes)
        });
        assert_eq!(segmenter.segment(&[1, 2, 3]).await.unwrap(), vec![3, 2, 1]);
        assert_eq!(segmenter.name(), "reverse");
    }

    #[tokio::test]
    async fn test_segmenter_trait_object() {
        let segmenter: Box<dyn Segmenter> =
            Box::new(MockSegmenter::new_failing("no subject found"));
        let err = segmenter.segment(b"bytes").await.unwrap_err();
        assert_eq!(err.to_string(), "Segmentation failed: no subject found");
    }

    #[test]
    fn test_error_normalization() {
        let err = as_segmentation_error(BgEditError::processing("tensor shape mismatch"));
        assert!(matches!(err, BgEditError::Segmentation(ref msg) if msg.contains("tensor shape")));

        let err = as_segmentation_error(BgEditError::segmentation("already tagged"));
        assert_eq!(err.to_string(), "Segmentation failed: already tagged");
    }
}
