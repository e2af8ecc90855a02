//! Attachment inliner: fetches supported text attachments and splices
//! their contents into stored message text; skips binary or oversized
//! ones. Image attachments are never inlined — their URLs are carried
//! separately as `ImageRef`s and surfaced at context-build time.

use crate::config::EngineConfig;
use crate::error::AttachmentError;
use crate::model::{ImageRef, RawAttachment};
use std::time::Duration;

/// Fetches attachment bodies over HTTP with a bounded timeout, matching the
/// "all blocking operations carry a timeout" discipline in spec §5.
pub struct AttachmentInliner {
    client: reqwest::Client,
    max_bytes: u64,
    timeout: Duration,
}

impl AttachmentInliner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            max_bytes: config.attachment_max_bytes,
            timeout: Duration::from_millis(config.attachment_fetch_timeout_ms),
        }
    }

    /// Inline every supported text attachment into `content`, returning the
    /// spliced text plus the image refs for attachments that weren't
    /// inlined (any `image/*` attachment).
    ///
    /// On any fetch failure (timeout, non-2xx, size overflow, decode
    /// error), the attachment is silently skipped — the original content
    /// keeps whatever prior attachments were already inlined.
    pub async fn inline(&self, content: &str, attachments: &[RawAttachment]) -> (String, Vec<ImageRef>) {
        let mut out = content.to_string();
        let mut image_refs = Vec::new();

        for attachment in attachments {
            if attachment.mime_type.starts_with("image/") {
                image_refs.push(ImageRef {
                    url: attachment.url.clone(),
                    filename: attachment.filename.clone(),
                });
                continue;
            }

            if !attachment.mime_type.starts_with("text/") {
                continue;
            }

            if let Some(size) = attachment.size_bytes
                && size > self.max_bytes
            {
                tracing::debug!(
                    filename = %attachment.filename,
                    size,
                    limit = self.max_bytes,
                    "skipping oversized attachment"
                );
                continue;
            }

            match self.fetch_text(attachment).await {
                Ok(body) => {
                    out.push('\n');
                    out.push_str(&format!("[Attachment: {}]\n", attachment.filename));
                    out.push_str(&body);
                }
                Err(error) => {
                    tracing::debug!(filename = %attachment.filename, %error, "attachment fetch failed, skipping");
                }
            }
        }

        (out, image_refs)
    }

    async fn fetch_text(&self, attachment: &RawAttachment) -> Result<String, AttachmentError> {
        let response = tokio::time::timeout(self.timeout, self.client.get(&attachment.url).send())
            .await
            .map_err(|_| AttachmentError::Timeout {
                url: attachment.url.clone(),
            })?
            .map_err(|e| AttachmentError::Other(e.into()))?;

        if !response.status().is_success() {
            return Err(AttachmentError::BadStatus {
                url: attachment.url.clone(),
                status: response.status().as_u16(),
            });
        }

        if let Some(len) = response.content_length()
            && len > self.max_bytes
        {
            return Err(AttachmentError::TooLarge {
                filename: attachment.filename.clone(),
                size: len,
                limit: self.max_bytes,
            });
        }

        let bytes = tokio::time::timeout(self.timeout, response.bytes())
            .await
            .map_err(|_| AttachmentError::Timeout {
                url: attachment.url.clone(),
            })?
            .map_err(|e| AttachmentError::Other(e.into()))?;

        if bytes.len() as u64 > self.max_bytes {
            return Err(AttachmentError::TooLarge {
                filename: attachment.filename.clone(),
                size: bytes.len() as u64,
                limit: self.max_bytes,
            });
        }

        String::from_utf8(bytes.to_vec()).map_err(|_| AttachmentError::Decode {
            filename: attachment.filename.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(mime: &str, size: Option<u64>) -> RawAttachment {
        RawAttachment {
            filename: "notes.txt".into(),
            mime_type: mime.into(),
            url: "https://example.invalid/notes.txt".into(),
            size_bytes: size,
        }
    }

    #[tokio::test]
    async fn image_attachments_are_never_inlined() {
        let config = EngineConfig {
            use_database_storage: false,
            ..Default::default()
        };
        let inliner = AttachmentInliner::new(&config);
        let (content, images) = inliner
            .inline("hi", &[attachment("image/png", Some(10))])
            .await;
        assert_eq!(content, "hi");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].filename, "notes.txt");
    }

    #[tokio::test]
    async fn oversized_declared_size_is_skipped_without_fetching() {
        let config = EngineConfig {
            use_database_storage: false,
            attachment_max_bytes: 4,
            ..Default::default()
        };
        let inliner = AttachmentInliner::new(&config);
        let (content, images) = inliner
            .inline("hi", &[attachment("text/plain", Some(1_000_000))])
            .await;
        assert_eq!(content, "hi");
        assert!(images.is_empty());
    }
}
