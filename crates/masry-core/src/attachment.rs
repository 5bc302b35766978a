//! User input and image attachments

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

/// An image ready to be sent inline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// File name shown in the composer
    pub name: String,
    pub mime_type: String,
    /// `data:<mime>;base64,<payload>`
    pub data_uri: String,
}

impl ImageAttachment {
    /// Read an image file and encode it as a data URI.
    ///
    /// The mime type is guessed from the extension; anything that is not an
    /// `image/*` type is rejected.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        if mime.type_() != mime_guess::mime::IMAGE {
            return Err(Error::NotAnImage {
                path: path.display().to_string(),
                mime: mime.essence_str().to_string(),
            });
        }

        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        tracing::debug!(%name, mime = %mime, size = bytes.len(), "attached image");
        Ok(Self::from_bytes(name, mime.essence_str(), &bytes))
    }

    pub fn from_bytes(name: impl Into<String>, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.to_string(),
            data_uri: format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes)),
        }
    }
}

/// What the user submits for one exchange
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInput {
    pub text: String,
    pub image: Option<ImageAttachment>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }

    /// Text is trimmed; an input with no text and no image is rejected
    pub(crate) fn validated(self) -> Result<Self> {
        let text = self.text.trim().to_string();
        if text.is_empty() && self.image.is_none() {
            return Err(Error::EmptyInput);
        }
        Ok(Self {
            text,
            image: self.image,
        })
    }
}
