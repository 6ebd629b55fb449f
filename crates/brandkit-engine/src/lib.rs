mod avatar;
mod cancel;
mod clipboard;
mod config;
mod download;
mod encoder;
mod error;
mod media;
mod providers;
mod studio;

pub use avatar::describe_avatar;
pub use cancel::CancelToken;
pub use clipboard::{
    extract_from_paste, ClipboardItem, ClipboardPayload, MemoryClipboardItem, PasteEvent,
    PasteOutcome, PasteTarget,
};
pub use config::{ProviderKind, StudioConfig};
pub use download::collect_archive_entries;
pub use encoder::{
    DataUrlStrategy, EncodeInput, EncodeStrategy, ImageEncoder, PreviewRasterStrategy,
    StreamedBytesStrategy,
};
pub use error::{messages, StrategyFailure, StudioError};
pub use media::{
    decode_data_url, validate_image_file, EncodedPayload, ImageFile, Preview,
    ACCEPTED_IMAGE_MIME_TYPES, MAX_IMAGE_BYTES,
};
pub use providers::{
    build_service, Candidate, CandidatePart, DryrunProvider, GeminiProvider, GenerativeService,
    Modality, ServiceRequest, ServiceResponse,
};
pub use studio::{RunReport, Studio, StudioSnapshot};

fn map_object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}
