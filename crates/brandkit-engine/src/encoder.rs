use std::io::{self, Cursor};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::write::EncoderStringWriter;
use base64::Engine as _;
use brandkit_contracts::events::EventWriter;
use image::{imageops, DynamicImage, ImageFormat, RgbaImage};
use serde_json::json;

use crate::error::{StrategyFailure, StudioError};
use crate::map_object;
use crate::media::{EncodedPayload, ImageFile, Preview};

const FALLBACK_MIME: &str = "image/png";

pub struct EncodeInput<'a> {
    pub file: &'a ImageFile,
    pub preview: Option<&'a Preview>,
}

impl EncodeInput<'_> {
    fn declared_mime(&self) -> String {
        let mime = self.file.mime_type().trim();
        if mime.is_empty() {
            FALLBACK_MIME.to_string()
        } else {
            mime.to_string()
        }
    }
}

pub trait EncodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn encode(&self, input: &EncodeInput<'_>) -> Result<EncodedPayload>;
}

/// Reads the whole file and builds a base64 data URL, keeping its payload.
pub struct DataUrlStrategy;

impl EncodeStrategy for DataUrlStrategy {
    fn name(&self) -> &'static str {
        "data-url"
    }

    fn encode(&self, input: &EncodeInput<'_>) -> Result<EncodedPayload> {
        let bytes = input.file.read_bytes()?;
        if bytes.is_empty() {
            bail!("file produced no bytes");
        }
        let mime_type = input.declared_mime();
        let url = format!("data:{mime_type};base64,{}", BASE64.encode(&bytes));
        let data = url
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or_default();
        if data.is_empty() {
            bail!("data URL carried no payload");
        }
        Ok(EncodedPayload {
            data: data.to_string(),
            mime_type,
        })
    }
}

/// Redraws the preview bitmap onto a blank RGBA surface of the same natural
/// size and encodes the surface as PNG.
pub struct PreviewRasterStrategy;

impl EncodeStrategy for PreviewRasterStrategy {
    fn name(&self) -> &'static str {
        "preview-raster"
    }

    fn encode(&self, input: &EncodeInput<'_>) -> Result<EncodedPayload> {
        let Some(preview) = input.preview else {
            bail!("no preview available");
        };
        let (width, height) = preview.dimensions();
        if width == 0 || height == 0 {
            bail!("preview has no pixels");
        }
        let mut surface = RgbaImage::new(width, height);
        imageops::overlay(&mut surface, &preview.image().to_rgba8(), 0, 0);

        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(surface)
            .write_to(&mut png, ImageFormat::Png)
            .context("preview PNG encode failed")?;
        Ok(EncodedPayload {
            data: BASE64.encode(png.into_inner()),
            mime_type: FALLBACK_MIME.to_string(),
        })
    }
}

/// Streams the raw bytes through a chunked base64 writer.
pub struct StreamedBytesStrategy;

impl EncodeStrategy for StreamedBytesStrategy {
    fn name(&self) -> &'static str {
        "streamed-bytes"
    }

    fn encode(&self, input: &EncodeInput<'_>) -> Result<EncodedPayload> {
        let mut reader = input.file.open()?;
        let mut writer = EncoderStringWriter::new(&BASE64);
        let copied = io::copy(&mut reader, &mut writer).context("raw byte read failed")?;
        let data = writer.into_inner();
        if copied == 0 || data.is_empty() {
            bail!("raw read produced no bytes");
        }
        Ok(EncodedPayload {
            data,
            mime_type: input.declared_mime(),
        })
    }
}

/// Ordered fallback chain; the first strategy that succeeds wins.
pub struct ImageEncoder {
    strategies: Vec<Box<dyn EncodeStrategy>>,
    budget: Option<Duration>,
}

impl Default for ImageEncoder {
    fn default() -> Self {
        Self::with_strategies(vec![
            Box::new(DataUrlStrategy),
            Box::new(PreviewRasterStrategy),
            Box::new(StreamedBytesStrategy),
        ])
    }
}

impl ImageEncoder {
    pub fn with_strategies(strategies: Vec<Box<dyn EncodeStrategy>>) -> Self {
        Self {
            strategies,
            budget: None,
        }
    }

    /// Caps the total time spent across strategies. Checked between
    /// strategies only; a strategy already running is never interrupted.
    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    pub fn encode(
        &self,
        file: &ImageFile,
        preview: Option<&Preview>,
        events: &EventWriter,
    ) -> Result<EncodedPayload, StudioError> {
        if file.is_empty() {
            return Err(StudioError::InvalidInput);
        }

        let input = EncodeInput { file, preview };
        let started = Instant::now();
        let mut attempts: Vec<StrategyFailure> = Vec::new();

        for strategy in &self.strategies {
            if let Some(budget) = self.budget {
                if !attempts.is_empty() && started.elapsed() >= budget {
                    attempts.push(StrategyFailure {
                        strategy: strategy.name(),
                        reason: format!("skipped: encoding budget of {budget:?} exhausted"),
                    });
                    break;
                }
            }

            match strategy.encode(&input) {
                Ok(payload) => return Ok(payload),
                Err(err) => {
                    let failure = StrategyFailure {
                        strategy: strategy.name(),
                        reason: format!("{err:#}"),
                    };
                    events.record(
                        "encode_strategy_failed",
                        map_object(json!({
                            "file": file.name(),
                            "strategy": failure.strategy,
                            "reason": failure.reason,
                        })),
                    );
                    attempts.push(failure);
                }
            }
        }

        Err(StudioError::Encoding { attempts })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, bail};
    use base64::Engine as _;

    use super::*;
    use crate::media::test_support::png_bytes;

    struct Recording {
        name: &'static str,
        succeed: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl EncodeStrategy for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn encode(&self, _input: &EncodeInput<'_>) -> Result<EncodedPayload> {
            self.calls.lock().unwrap().push(self.name);
            if !self.succeed {
                return Err(anyhow!("{} unavailable", self.name));
            }
            Ok(EncodedPayload {
                data: self.name.to_string(),
                mime_type: "image/png".to_string(),
            })
        }
    }

    fn chain(outcomes: &[bool]) -> (ImageEncoder, Arc<Mutex<Vec<&'static str>>>) {
        let names = ["first", "second", "third"];
        let calls = Arc::new(Mutex::new(Vec::new()));
        let strategies = outcomes
            .iter()
            .zip(names)
            .map(|(succeed, name)| {
                Box::new(Recording {
                    name,
                    succeed: *succeed,
                    calls: Arc::clone(&calls),
                }) as Box<dyn EncodeStrategy>
            })
            .collect();
        (ImageEncoder::with_strategies(strategies), calls)
    }

    fn sample_file() -> ImageFile {
        ImageFile::from_bytes("bottle.png", "image/png", png_bytes(3, 3))
    }

    #[test]
    fn first_success_short_circuits_the_chain() {
        let (encoder, calls) = chain(&[true, true, true]);
        let payload = encoder
            .encode(&sample_file(), None, &EventWriter::disabled("s"))
            .unwrap();
        assert_eq!(payload.data, "first");
        assert_eq!(*calls.lock().unwrap(), vec!["first"]);
    }

    #[test]
    fn later_strategies_run_only_after_earlier_failures() {
        let (encoder, calls) = chain(&[false, true, true]);
        let payload = encoder
            .encode(&sample_file(), None, &EventWriter::disabled("s"))
            .unwrap();
        assert_eq!(payload.data, "second");
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);

        let (encoder, calls) = chain(&[false, false, true]);
        let payload = encoder
            .encode(&sample_file(), None, &EventWriter::disabled("s"))
            .unwrap();
        assert_eq!(payload.data, "third");
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn exhaustion_reports_every_abandoned_cause() {
        let (encoder, _) = chain(&[false, false, false]);
        let err = encoder
            .encode(&sample_file(), None, &EventWriter::disabled("s"))
            .unwrap_err();
        let StudioError::Encoding { attempts } = err else {
            panic!("expected encoding error");
        };
        let names: Vec<&str> = attempts.iter().map(|failure| failure.strategy).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(attempts[1].reason, "second unavailable");
    }

    #[test]
    fn empty_input_fails_before_any_strategy() {
        let (encoder, calls) = chain(&[true, true, true]);
        let empty = ImageFile::from_bytes("empty.png", "image/png", Vec::new());
        let err = encoder
            .encode(&empty, None, &EventWriter::disabled("s"))
            .unwrap_err();
        assert_eq!(err, StudioError::InvalidInput);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn exhausted_budget_stops_the_chain() {
        let (encoder, calls) = chain(&[false, true, true]);
        let encoder = encoder.with_budget(Some(Duration::ZERO));
        let err = encoder
            .encode(&sample_file(), None, &EventWriter::disabled("s"))
            .unwrap_err();
        assert_eq!(*calls.lock().unwrap(), vec!["first"]);
        let StudioError::Encoding { attempts } = err else {
            panic!("expected encoding error");
        };
        assert_eq!(attempts.len(), 2);
        assert!(attempts[1].reason.contains("budget"));
    }

    #[test]
    fn failures_are_written_to_the_event_log() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events = EventWriter::new(temp.path().join("events.jsonl"), "s");
        let (encoder, _) = chain(&[false, true]);
        encoder.encode(&sample_file(), None, &events)?;

        let content = std::fs::read_to_string(temp.path().join("events.jsonl"))?;
        let event: serde_json::Value = serde_json::from_str(content.lines().next().unwrap_or(""))?;
        assert_eq!(event["type"], "encode_strategy_failed");
        assert_eq!(event["strategy"], "first");
        Ok(())
    }

    #[test]
    fn default_chain_uses_data_url_for_readable_files() -> anyhow::Result<()> {
        let bytes = png_bytes(2, 2);
        let file = ImageFile::from_bytes("bottle.png", "image/png", bytes.clone());
        let payload = ImageEncoder::default().encode(&file, None, &EventWriter::disabled("s"))?;
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(BASE64.decode(payload.data)?, bytes);
        Ok(())
    }

    #[test]
    fn default_chain_falls_back_to_preview_when_file_vanishes() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("photo.jpg");
        std::fs::write(&path, png_bytes(6, 4))?;
        let file = ImageFile::from_path(&path)?;
        let preview = Preview::from_file(&file)?;
        std::fs::remove_file(&path)?;

        let payload =
            ImageEncoder::default().encode(&file, Some(&preview), &EventWriter::disabled("s"))?;
        assert_eq!(payload.mime_type, "image/png");
        let decoded = image::load_from_memory(&BASE64.decode(payload.data)?)?;
        assert_eq!((decoded.width(), decoded.height()), (6, 4));
        Ok(())
    }

    #[test]
    fn streamed_strategy_matches_one_shot_encoding() -> anyhow::Result<()> {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let file = ImageFile::from_bytes("raw.gif", "image/gif", bytes.clone());
        let input = EncodeInput {
            file: &file,
            preview: None,
        };
        let payload = StreamedBytesStrategy.encode(&input)?;
        assert_eq!(payload.data, BASE64.encode(&bytes));
        assert_eq!(payload.mime_type, "image/gif");

        if PreviewRasterStrategy.encode(&input).is_ok() {
            bail!("preview strategy must fail without a preview");
        }
        Ok(())
    }
}
