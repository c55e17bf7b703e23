//! Raw photo data handed to the pipeline

/// An undecoded field photo
#[derive(Debug, Clone)]
pub struct RawImage {
    /// Display name (usually the file name)
    pub name: String,
    /// Encoded image bytes (JPEG, PNG, ...)
    pub data: Vec<u8>,
}

impl RawImage {
    /// Create a new raw image
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Size of the encoded payload in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
