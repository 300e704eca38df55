//! Asset decomposition — uploaded files into a flat, ordered task list.
//!
//! Each uploaded file yields one task (plain image) or one task per slide
//! (presentation). The task list preserves upload order and slide order
//! within a file; that ordering is the sole ordering contract the rest of
//! the pipeline honors. A file that cannot be decomposed is rejected as a
//! whole with a typed warning and the remaining files proceed.

use crate::config::ImageConfig;
use crate::convert::SlideConverter;
use crate::error::DecomposeError;
use crate::imageprep::prepare_image;
use crate::types::{BatchWarning, Task, UploadedFile};
use std::path::Path;
use std::sync::Arc;

/// Image extensions accepted for plain uploads
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Presentation extensions routed through the conversion collaborator
const PRESENTATION_EXTENSIONS: &[&str] = &["ppt", "pptx"];

/// Strip any client-supplied directory components from an upload name
pub(crate) fn sanitize_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "upload".to_string())
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Decompose a batch of uploads into tasks plus per-file rejection warnings.
///
/// Task indices are assigned in (file order, slide order) and are final:
/// downstream output order is restored by these indices.
pub(crate) async fn decompose_files(
    files: &[UploadedFile],
    instructions: &Arc<str>,
    converter: &dyn SlideConverter,
    image_config: &ImageConfig,
) -> (Vec<Task>, Vec<BatchWarning>) {
    let mut tasks: Vec<Task> = Vec::new();
    let mut warnings: Vec<BatchWarning> = Vec::new();

    for file in files {
        let name = sanitize_file_name(&file.name);
        let extension = extension_of(&name);

        if PRESENTATION_EXTENSIONS.contains(&extension.as_str()) {
            match decompose_presentation(file, &name, instructions, converter, image_config, &mut tasks)
                .await
            {
                Ok(slide_count) => {
                    tracing::debug!(file = %name, slides = slide_count, "presentation decomposed");
                }
                Err(err) => {
                    tracing::warn!(file = %name, error = %err, "presentation rejected");
                    warnings.push(err.into());
                }
            }
        } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            match prepare_image(
                &name,
                &file.bytes,
                image_config.max_side,
                image_config.jpeg_quality,
            ) {
                Ok(image) => {
                    tasks.push(Task {
                        index: tasks.len(),
                        source_name: name,
                        slide: None,
                        image,
                        instructions: Arc::clone(instructions),
                    });
                }
                Err(err) => {
                    tracing::warn!(file = %name, error = %err, "image rejected");
                    warnings.push(err.into());
                }
            }
        } else {
            let err = DecomposeError::UnsupportedFileType {
                file: name.clone(),
                extension,
            };
            tracing::warn!(file = %name, error = %err, "upload rejected");
            warnings.push(err.into());
        }
    }

    (tasks, warnings)
}

/// Convert one presentation and append one task per slide.
///
/// All-or-nothing per file: a slide that fails to decode rejects the whole
/// file (the converter produced something unusable), never a partial deck.
async fn decompose_presentation(
    file: &UploadedFile,
    name: &str,
    instructions: &Arc<str>,
    converter: &dyn SlideConverter,
    image_config: &ImageConfig,
    tasks: &mut Vec<Task>,
) -> Result<usize, DecomposeError> {
    let slides = converter.convert(name, &file.bytes).await?;

    let mut prepared = Vec::with_capacity(slides.len());
    for slide in &slides {
        let image = prepare_image(
            name,
            &slide.bytes,
            image_config.max_side,
            image_config.jpeg_quality,
        )
        .map_err(|e| DecomposeError::ConversionFailed {
            file: name.to_string(),
            reason: format!("slide {} was not a readable image: {e}", slide.index),
        })?;
        prepared.push((slide.index, image));
    }

    let slide_count = prepared.len();
    for (slide_index, image) in prepared {
        tasks.push(Task {
            index: tasks.len(),
            source_name: name.to_string(),
            slide: Some(slide_index),
            image,
            instructions: Arc::clone(instructions),
        });
    }

    Ok(slide_count)
}
