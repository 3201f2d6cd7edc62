/**
 * Upload Routes
 * Multipart image/video uploads streamed to the flat upload directory
 */
use axum::{
    extract::{multipart::Field, multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::auth::AuthUser;
use crate::config::UploadConfig;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Public prefix the static file service is mounted on.
pub const PUBLIC_PREFIX: &str = "/api/uploads";

/// Bytes buffered before the file is created, enough for every signature below.
const SNIFF_LEN: usize = 16;

const IMAGE_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp", "svg"];
const IMAGE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "mov", "avi", "mkv"];
const VIDEO_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/webm",
    "video/ogg",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-matroska",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn field_name(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => IMAGE_EXTENSIONS,
            MediaKind::Video => VIDEO_EXTENSIONS,
        }
    }

    fn mime_types(self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => IMAGE_MIME_TYPES,
            MediaKind::Video => VIDEO_MIME_TYPES,
        }
    }

    fn max_bytes(self, config: &UploadConfig) -> u64 {
        match self {
            MediaKind::Image => config.image_max_bytes,
            MediaKind::Video => config.video_max_bytes,
        }
    }

    fn rejection(self) -> AppError {
        AppError::UnsupportedFileType(match self {
            MediaKind::Image => "Only images are allowed (jpeg, jpg, png, gif, webp, svg)".into(),
            MediaKind::Video => "Only videos are allowed (mp4, webm, ogg, mov, avi, mkv)".into(),
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Decides whether an upload is accepted.
///
/// `accepts_declared` runs on the client-supplied name and MIME type before
/// anything is written. `accepts_content` runs on the first bytes of the body.
pub trait UploadValidator: Send + Sync {
    fn accepts_declared(&self, kind: MediaKind, file_name: &str, content_type: &str) -> bool;

    fn accepts_content(&self, _kind: MediaKind, _head: &[u8]) -> bool {
        true
    }
}

/// Default filter: extension OR declared MIME type must be on the allow-list.
///
/// Both values come from the client, so a mislabeled file passes. This is a
/// convenience filter, not a security boundary.
#[derive(Debug, Default)]
pub struct DeclaredTypeFilter;

impl UploadValidator for DeclaredTypeFilter {
    fn accepts_declared(&self, kind: MediaKind, file_name: &str, content_type: &str) -> bool {
        let ext_ok = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| kind.extensions().contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        let mime = content_type.to_ascii_lowercase();
        let mime_ok = kind.mime_types().contains(&mime.trim());
        ext_ok || mime_ok
    }
}

/// Declared-type filter plus a signature check on the leading bytes.
#[derive(Debug, Default)]
pub struct MagicByteValidator;

impl UploadValidator for MagicByteValidator {
    fn accepts_declared(&self, kind: MediaKind, file_name: &str, content_type: &str) -> bool {
        DeclaredTypeFilter.accepts_declared(kind, file_name, content_type)
    }

    fn accepts_content(&self, kind: MediaKind, head: &[u8]) -> bool {
        sniff(head) == Some(kind)
    }
}

/// Identifies a known image or video signature.
fn sniff(head: &[u8]) -> Option<MediaKind> {
    match head {
        // JPEG
        [0xFF, 0xD8, 0xFF, ..] => Some(MediaKind::Image),
        // PNG
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(MediaKind::Image),
        // GIF8
        [0x47, 0x49, 0x46, 0x38, ..] => Some(MediaKind::Image),
        // RIFF....WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some(MediaKind::Image),
        // RIFF....AVI
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x41, 0x56, 0x49, 0x20, ..] => Some(MediaKind::Video),
        // ISO base media (mp4, mov): ....ftyp
        [_, _, _, _, 0x66, 0x74, 0x79, 0x70, ..] => Some(MediaKind::Video),
        // EBML (webm, mkv)
        [0x1A, 0x45, 0xDF, 0xA3, ..] => Some(MediaKind::Video),
        // OggS
        [0x4F, 0x67, 0x67, 0x53, ..] => Some(MediaKind::Video),
        _ => {
            let text = String::from_utf8_lossy(head);
            let text = text.trim_start_matches('\u{feff}').trim_start();
            if text.starts_with("<svg") || text.starts_with("<?xml") {
                Some(MediaKind::Image)
            } else {
                None
            }
        }
    }
}

static DECLARED_TYPE_FILTER: DeclaredTypeFilter = DeclaredTypeFilter;
static MAGIC_BYTE_VALIDATOR: MagicByteValidator = MagicByteValidator;

pub fn validator_for(config: &UploadConfig) -> &'static dyn UploadValidator {
    if config.sniff_content {
        &MAGIC_BYTE_VALIDATOR
    } else {
        &DECLARED_TYPE_FILTER
    }
}

// ============================================================================
// Storage
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// `<unix millis>-<6 chars [a-z0-9]>` plus the original extension when it is
/// purely alphanumeric.
pub fn generate_file_name(original: &str) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect();

    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    format!(
        "{}-{}{}",
        chrono::Utc::now().timestamp_millis(),
        suffix,
        ext
    )
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File exceeds the upload size limit".into())
    } else {
        AppError::Validation(format!("Invalid multipart data: {}", err.body_text()))
    }
}

fn too_large(kind: MediaKind, max_bytes: u64) -> AppError {
    let label = match kind {
        MediaKind::Image => "Image",
        MediaKind::Video => "Video",
    };
    AppError::PayloadTooLarge(format!(
        "{label} exceeds the {} MB limit",
        max_bytes / (1024 * 1024)
    ))
}

/// Streams the field body to `path`, enforcing `max_bytes`.
///
/// The leading bytes are buffered and checked before the file is created.
/// Any failure after creation removes the partial file.
async fn write_field(
    field: &mut Field<'_>,
    path: &Path,
    kind: MediaKind,
    max_bytes: u64,
    validator: &dyn UploadValidator,
) -> AppResult<u64> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    let mut pending = Vec::new();
    let mut finished = false;

    while head.len() < SNIFF_LEN {
        match field.chunk().await.map_err(multipart_error)? {
            Some(chunk) => {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
                pending.extend_from_slice(&chunk[take..]);
            }
            None => {
                finished = true;
                break;
            }
        }
    }

    let mut written = (head.len() + pending.len()) as u64;
    if written > max_bytes {
        return Err(too_large(kind, max_bytes));
    }
    if !validator.accepts_content(kind, &head) {
        return Err(AppError::UnsupportedFileType(
            "File content does not match an allowed type".into(),
        ));
    }

    let mut file = tokio::fs::File::create(path).await?;
    let result = async {
        file.write_all(&head).await?;
        file.write_all(&pending).await?;

        if !finished {
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                written += chunk.len() as u64;
                if written > max_bytes {
                    return Err(too_large(kind, max_bytes));
                }
                file.write_all(&chunk).await?;
            }
        }

        file.flush().await?;
        Ok::<u64, AppError>(written)
    }
    .await;

    if result.is_err() {
        drop(file);
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial upload");
        }
    }
    result
}

async fn handle_upload(
    state: &AppState,
    mut multipart: Multipart,
    kind: MediaKind,
) -> AppResult<Json<UploadResponse>> {
    let config = &state.config.upload;
    let validator = validator_for(config);

    let mut field = loop {
        match multipart.next_field().await.map_err(multipart_error)? {
            Some(field) if field.name() == Some(kind.field_name()) => break field,
            Some(_) => continue,
            None => {
                return Err(AppError::Validation(format!(
                    "No {} received",
                    kind.field_name()
                )))
            }
        }
    };

    let original_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();
    if !validator.accepts_declared(kind, &original_name, &content_type) {
        tracing::warn!(
            file = %original_name,
            content_type = %content_type,
            "upload rejected by type filter"
        );
        return Err(kind.rejection());
    }

    tokio::fs::create_dir_all(&config.dir).await?;
    let file_name = generate_file_name(&original_name);
    let path: PathBuf = config.dir.join(&file_name);

    let size = write_field(&mut field, &path, kind, kind.max_bytes(config), validator).await?;

    tracing::info!(
        file = %file_name,
        original = %original_name,
        size,
        kind = kind.field_name(),
        "file uploaded"
    );

    Ok(Json(UploadResponse {
        url: format!("{PUBLIC_PREFIX}/{file_name}"),
        kind: (kind == MediaKind::Video).then(|| "video".to_string()),
    }))
}

/// POST /api/upload (multipart field `image`)
pub async fn upload_image(
    State(state): State<AppState>,
    _user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    handle_upload(&state, multipart, MediaKind::Image).await
}

/// POST /api/upload/video (multipart field `video`)
pub async fn upload_video(
    State(state): State<AppState>,
    _user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    handle_upload(&state, multipart, MediaKind::Video).await
}
