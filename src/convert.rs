//! Document conversion collaborator (presentation file -> slide images)
//!
//! Conversion runs the external LibreOffice binary (`soffice --headless
//! --convert-to png`) in a scratch directory and collects one PNG per slide.
//! The collaborator sits behind the [`SlideConverter`] trait so the pipeline
//! can run with a stub in tests and degrade gracefully when no binary is
//! installed.

use crate::config::ConverterConfig;
use crate::error::DecomposeError;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::process::Command;

/// One rasterized slide produced by conversion
#[derive(Clone, Debug)]
pub struct SlideImage {
    /// 1-based slide number within the source file
    pub index: u32,
    /// Encoded PNG bytes
    pub bytes: Vec<u8>,
}

/// Converts one presentation file into an ordered sequence of slide images.
///
/// Implementations must be independently invocable per file with no shared
/// mutable state across calls.
#[async_trait]
pub trait SlideConverter: Send + Sync {
    /// Convert `bytes` (a .ppt/.pptx upload named `file_name`) into slides,
    /// ordered by slide number.
    async fn convert(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> std::result::Result<Vec<SlideImage>, DecomposeError>;

    /// Whether this converter can actually produce slides
    fn available(&self) -> bool;

    /// Implementation name for logging and capability reporting
    fn name(&self) -> &'static str;
}

/// CLI-based converter using an external LibreOffice binary
pub struct CliSlideConverter {
    binary_path: PathBuf,
}

impl CliSlideConverter {
    /// Create a new CLI converter with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find soffice in PATH
    pub fn from_path() -> Option<Self> {
        which::which("soffice").ok().map(Self::new)
    }
}

#[async_trait]
impl SlideConverter for CliSlideConverter {
    async fn convert(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> std::result::Result<Vec<SlideImage>, DecomposeError> {
        let failed = |reason: String| DecomposeError::ConversionFailed {
            file: file_name.to_string(),
            reason,
        };

        let scratch = tempfile::tempdir()
            .map_err(|e| failed(format!("failed to create scratch directory: {e}")))?;

        // Basename only — the upload name must not steer the write path
        let safe_name = Path::new(file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pptx".to_string());
        let input_path = scratch.path().join(&safe_name);
        tokio::fs::write(&input_path, bytes)
            .await
            .map_err(|e| failed(format!("failed to stage upload: {e}")))?;

        let out_dir = scratch.path().join("slides");
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| failed(format!("failed to create output directory: {e}")))?;

        let output = Command::new(&self.binary_path)
            .arg("--headless")
            .arg("--convert-to")
            .arg("png")
            .arg("--outdir")
            .arg(&out_dir)
            .arg(&input_path)
            .output()
            .await
            .map_err(|e| failed(format!("failed to execute soffice: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "soffice exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let mut png_paths: Vec<PathBuf> = std::fs::read_dir(&out_dir)
            .map_err(|e| failed(format!("failed to list slides: {e}")))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("png"))
                    .unwrap_or(false)
            })
            .collect();

        // Slide order comes from the converter's file naming (page1, page2,
        // page10...), so a plain lexicographic sort would interleave pages
        png_paths.sort_by_cached_key(|p| {
            natural_key(
                &p.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
        });

        if png_paths.is_empty() {
            return Err(failed("no slides were exported".to_string()));
        }

        let mut slides = Vec::with_capacity(png_paths.len());
        for (i, path) in png_paths.iter().enumerate() {
            let bytes = std::fs::read(path)
                .map_err(|e| failed(format!("failed to read slide {}: {e}", i + 1)))?;
            slides.push(SlideImage {
                index: (i + 1) as u32,
                bytes,
            });
        }

        tracing::debug!(
            file = file_name,
            slides = slides.len(),
            "presentation converted"
        );

        Ok(slides)
    }

    fn available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "cli-soffice"
    }
}

/// Fallback converter used when no soffice binary is configured or found.
///
/// Rejects every presentation file with a `ConversionFailed` marker so image
/// uploads in the same batch still proceed.
pub struct UnavailableConverter;

#[async_trait]
impl SlideConverter for UnavailableConverter {
    async fn convert(
        &self,
        file_name: &str,
        _bytes: &[u8],
    ) -> std::result::Result<Vec<SlideImage>, DecomposeError> {
        Err(DecomposeError::ConversionFailed {
            file: file_name.to_string(),
            reason: "presentation conversion unavailable: LibreOffice (soffice) was not found"
                .to_string(),
        })
    }

    fn available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Select a converter implementation from configuration.
///
/// Explicit path wins; otherwise PATH discovery if enabled; otherwise the
/// unavailable fallback.
pub fn converter_from_config(config: &ConverterConfig) -> Arc<dyn SlideConverter> {
    if let Some(ref path) = config.soffice_path {
        Arc::new(CliSlideConverter::new(path.clone()))
    } else if config.search_path {
        CliSlideConverter::from_path()
            .map(|c| Arc::new(c) as Arc<dyn SlideConverter>)
            .unwrap_or_else(|| Arc::new(UnavailableConverter))
    } else {
        Arc::new(UnavailableConverter)
    }
}

/// Digit-aware sort key component
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalPart {
    Num(u64),
    Text(String),
}

static NUM_RE: OnceLock<Regex> = OnceLock::new();

/// Split a file stem into alternating text/number parts so "page2" sorts
/// before "page10".
fn natural_key(stem: &str) -> Vec<NaturalPart> {
    #[allow(clippy::expect_used)] // pattern is a literal, cannot fail to compile
    let re = NUM_RE.get_or_init(|| Regex::new(r"\d+").expect("literal regex"));

    let mut parts = Vec::new();
    let mut last_end = 0;
    for m in re.find_iter(stem) {
        if m.start() > last_end {
            parts.push(NaturalPart::Text(stem[last_end..m.start()].to_lowercase()));
        }
        // Absurdly long digit runs won't fit u64; fall back to text ordering
        match m.as_str().parse::<u64>() {
            Ok(n) => parts.push(NaturalPart::Num(n)),
            Err(_) => parts.push(NaturalPart::Text(m.as_str().to_string())),
        }
        last_end = m.end();
    }
    if last_end < stem.len() {
        parts.push(NaturalPart::Text(stem[last_end..].to_lowercase()));
    }
    parts
}
