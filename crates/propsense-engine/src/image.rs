use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageFormat;
use propsense_contracts::failure::PipelineFailure;

/// Raw image bytes plus the MIME type sniffed from their magic bytes.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: &'static str,
}

impl ImagePayload {
    /// Rejects empty input and encodings no vision oracle we call accepts.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PipelineFailure> {
        if bytes.is_empty() {
            return Err(PipelineFailure::empty_input("image bytes are empty"));
        }
        let format = image::guess_format(&bytes)
            .map_err(|_| PipelineFailure::empty_input("unrecognized image encoding"))?;
        let mime_type = match format {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
            other => {
                return Err(PipelineFailure::empty_input(format!(
                    "unsupported image encoding {other:?}"
                )))
            }
        };
        Ok(Self { bytes, mime_type })
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64())
    }
}

#[cfg(test)]
mod tests {
    use propsense_contracts::failure::FailureKind;

    use super::*;

    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn sniffs_jpeg_and_png() {
        let jpeg = ImagePayload::from_bytes(JPEG_HEADER.to_vec()).unwrap();
        assert_eq!(jpeg.mime_type(), "image/jpeg");
        assert!(jpeg.data_url().starts_with("data:image/jpeg;base64,"));

        let png = ImagePayload::from_bytes(PNG_HEADER.to_vec()).unwrap();
        assert_eq!(png.mime_type(), "image/png");
    }

    #[test]
    fn empty_bytes_are_empty_input() {
        let err = ImagePayload::from_bytes(Vec::new()).unwrap_err();
        assert_eq!(err.kind, FailureKind::EmptyInput);
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let err = ImagePayload::from_bytes(b"definitely not an image".to_vec()).unwrap_err();
        assert_eq!(err.kind, FailureKind::EmptyInput);
        assert!(err.detail.contains("encoding"));
    }
}
