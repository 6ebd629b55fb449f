use anyhow::Result;

use crate::error::{messages, StudioError};
use crate::media::{validate_image_file, ImageFile};

/// Where the paste landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteTarget {
    DescriptionField,
    ImageDropZone,
    Elsewhere,
}

/// One typed entry on the clipboard.
pub trait ClipboardItem: Send {
    fn mime_type(&self) -> &str;
    /// The item as a file handle, when the platform can materialize one.
    fn as_file(&self) -> Option<ImageFile>;
    fn read_bytes(&self) -> Result<Vec<u8>>;

    fn is_image(&self) -> bool {
        self.mime_type().trim().to_ascii_lowercase().starts_with("image/")
    }
}

/// Clipboard item backed by bytes already in memory.
#[derive(Debug, Clone)]
pub struct MemoryClipboardItem {
    mime_type: String,
    bytes: Vec<u8>,
    file: Option<ImageFile>,
}

impl MemoryClipboardItem {
    pub fn new(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: ImageFile) -> Self {
        self.file = Some(file);
        self
    }
}

impl ClipboardItem for MemoryClipboardItem {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    fn as_file(&self) -> Option<ImageFile> {
        self.file.clone()
    }

    fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}

#[derive(Default)]
pub struct ClipboardPayload {
    pub files: Vec<ImageFile>,
    pub items: Vec<Box<dyn ClipboardItem>>,
}

impl ClipboardPayload {
    pub fn has_image_data(&self) -> bool {
        !self.files.is_empty() || self.items.iter().any(|item| item.is_image())
    }
}

pub struct PasteEvent {
    pub target: PasteTarget,
    pub payload: ClipboardPayload,
    default_prevented: bool,
}

impl PasteEvent {
    pub fn new(target: PasteTarget, payload: ClipboardPayload) -> Self {
        Self {
            target,
            payload,
            default_prevented: false,
        }
    }

    /// Suppresses the host's own paste handling, text included.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

#[derive(Debug)]
pub enum PasteOutcome {
    /// No image involved; the host handles the paste as usual.
    Passthrough,
    Rejected(StudioError),
    Accepted(ImageFile),
}

/// Pulls an image out of a paste, trying the direct file handle, then the
/// first image item as a file, then that item's raw bytes.
pub fn extract_from_paste(event: &mut PasteEvent, max_bytes: u64) -> PasteOutcome {
    if !event.payload.has_image_data() {
        return PasteOutcome::Passthrough;
    }
    event.prevent_default();
    if event.target == PasteTarget::DescriptionField {
        return PasteOutcome::Rejected(StudioError::Extraction(
            messages::DESCRIPTION_FIELD_PASTE.to_string(),
        ));
    }

    let Some(file) = first_image_file(&event.payload) else {
        return PasteOutcome::Rejected(StudioError::Extraction(
            messages::EXTRACTION_FAILED.to_string(),
        ));
    };
    match validate_image_file(&file, max_bytes) {
        Ok(()) => PasteOutcome::Accepted(file),
        Err(err) => PasteOutcome::Rejected(StudioError::Extraction(err.to_string())),
    }
}

fn first_image_file(payload: &ClipboardPayload) -> Option<ImageFile> {
    if let Some(file) = payload.files.first() {
        return Some(file.clone());
    }
    let item = payload.items.iter().find(|item| item.is_image())?;
    if let Some(file) = item.as_file() {
        return Some(file);
    }
    let bytes = item.read_bytes().ok().filter(|bytes| !bytes.is_empty())?;
    let mime_type = item.mime_type().trim().to_ascii_lowercase();
    let name = format!(
        "pasted-image.{}",
        mime_type.strip_prefix("image/").unwrap_or("png")
    );
    Some(ImageFile::from_bytes(name, mime_type, bytes))
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;
    use crate::media::MAX_IMAGE_BYTES;

    struct Unreadable;

    impl ClipboardItem for Unreadable {
        fn mime_type(&self) -> &str {
            "image/png"
        }

        fn as_file(&self) -> Option<ImageFile> {
            None
        }

        fn read_bytes(&self) -> Result<Vec<u8>> {
            bail!("clipboard owner went away")
        }
    }

    fn items(items: Vec<Box<dyn ClipboardItem>>) -> ClipboardPayload {
        ClipboardPayload {
            files: Vec::new(),
            items,
        }
    }

    fn rejection(outcome: PasteOutcome) -> String {
        match outcome {
            PasteOutcome::Rejected(err) => err.to_string(),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn description_field_rejects_images_and_suppresses_text() {
        let mut payload = items(vec![
            Box::new(MemoryClipboardItem::new("text/plain", b"hello".to_vec())),
            Box::new(MemoryClipboardItem::new("image/png", vec![1, 2, 3])),
        ]);
        payload.files.push(ImageFile::from_bytes("a.png", "image/png", vec![1]));
        let mut event = PasteEvent::new(PasteTarget::DescriptionField, payload);

        let outcome = extract_from_paste(&mut event, MAX_IMAGE_BYTES);
        assert_eq!(rejection(outcome), messages::DESCRIPTION_FIELD_PASTE);
        assert!(event.default_prevented());
    }

    #[test]
    fn text_only_paste_passes_through() {
        for target in [PasteTarget::DescriptionField, PasteTarget::ImageDropZone] {
            let mut event = PasteEvent::new(
                target,
                items(vec![Box::new(MemoryClipboardItem::new(
                    "text/plain",
                    b"blue ceramic mug".to_vec(),
                ))]),
            );
            assert!(matches!(
                extract_from_paste(&mut event, MAX_IMAGE_BYTES),
                PasteOutcome::Passthrough
            ));
            assert!(!event.default_prevented());
        }
    }

    #[test]
    fn direct_file_wins_over_items() {
        let mut payload = items(vec![Box::new(MemoryClipboardItem::new(
            "image/gif",
            vec![9, 9],
        ))]);
        payload
            .files
            .push(ImageFile::from_bytes("shot.jpg", "image/jpeg", vec![1, 2]));
        let mut event = PasteEvent::new(PasteTarget::Elsewhere, payload);

        match extract_from_paste(&mut event, MAX_IMAGE_BYTES) {
            PasteOutcome::Accepted(file) => assert_eq!(file.name(), "shot.jpg"),
            other => panic!("expected accepted file, got {other:?}"),
        }
        assert!(event.default_prevented());
    }

    #[test]
    fn item_file_handle_then_raw_bytes() -> anyhow::Result<()> {
        let handle = ImageFile::from_bytes("handle.webp", "image/webp", vec![7]);
        let mut event = PasteEvent::new(
            PasteTarget::ImageDropZone,
            items(vec![
                Box::new(MemoryClipboardItem::new("text/html", b"<img>".to_vec())),
                Box::new(MemoryClipboardItem::new("image/webp", vec![7]).with_file(handle)),
            ]),
        );
        match extract_from_paste(&mut event, MAX_IMAGE_BYTES) {
            PasteOutcome::Accepted(file) => assert_eq!(file.name(), "handle.webp"),
            other => panic!("expected accepted file, got {other:?}"),
        }

        let mut event = PasteEvent::new(
            PasteTarget::ImageDropZone,
            items(vec![Box::new(MemoryClipboardItem::new("image/png", vec![4, 5, 6]))]),
        );
        match extract_from_paste(&mut event, MAX_IMAGE_BYTES) {
            PasteOutcome::Accepted(file) => {
                assert_eq!(file.name(), "pasted-image.png");
                assert_eq!(file.mime_type(), "image/png");
                assert_eq!(file.read_bytes()?, vec![4, 5, 6]);
            }
            other => panic!("expected accepted file, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn unusable_items_report_generic_failure() {
        let mut event = PasteEvent::new(
            PasteTarget::ImageDropZone,
            items(vec![Box::new(Unreadable)]),
        );
        assert_eq!(
            rejection(extract_from_paste(&mut event, MAX_IMAGE_BYTES)),
            messages::EXTRACTION_FAILED
        );
    }

    #[test]
    fn extracted_file_is_validated() {
        let mut event = PasteEvent::new(
            PasteTarget::ImageDropZone,
            items(vec![Box::new(MemoryClipboardItem::new("image/png", vec![0; 32]))]),
        );
        assert!(matches!(
            extract_from_paste(&mut event, 16),
            PasteOutcome::Rejected(StudioError::Extraction(message))
                if message == messages::IMAGE_TOO_LARGE
        ));

        let mut event = PasteEvent::new(
            PasteTarget::ImageDropZone,
            items(vec![Box::new(MemoryClipboardItem::new("image/tiff", vec![1]))]),
        );
        assert_eq!(
            rejection(extract_from_paste(&mut event, MAX_IMAGE_BYTES)),
            messages::UNSUPPORTED_FORMAT
        );
    }
}
