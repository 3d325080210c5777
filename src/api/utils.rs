//! Pure helpers for HTTP request processing.

use crate::api::error::ApiError;

/// Parse and validate the upload Content-Type.
///
/// Accepts `text/csv` (optionally with a charset parameter). Everything
/// else — including `application/vnd.ms-excel` exports that are not
/// actually CSV — is refused up front.
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type.parse().map_err(|_| {
        ApiError::UnsupportedMediaType(format!("invalid Content-Type: {content_type}"))
    })?;

    if media_type.type_() != mime::TEXT || media_type.subtype() != mime::CSV {
        return Err(ApiError::UnsupportedMediaType(format!(
            "Content-Type must be text/csv, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// Validate that body size does not exceed the maximum allowed size.
pub fn validate_body_size(data: &[u8], max_size: usize) -> Result<(), ApiError> {
    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

/// Reduce a client-supplied filename to a safe storage name.
///
/// Path separators and other shell-hostile characters collapse to
/// underscores, leading dots are stripped, and an empty result falls back
/// to "upload". The original name is kept separately for display.
pub fn sanitize_filename(filename: &str) -> String {
    // Only the final path component counts; clients sometimes send full
    // paths, and "../" must never reach the filesystem layer.
    let base = filename
        .rsplit(['/', '\\'])
        .find(|component| !component.is_empty())
        .unwrap_or("");

    let mut sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    while sanitized.starts_with('.') {
        sanitized.remove(0);
    }

    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    }
}

/// Whether a filename carries one of the accepted spreadsheet extensions.
pub fn has_allowed_extension(filename: &str, allowed: &[String]) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, extension)| {
            allowed
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(extension))
        })
        .unwrap_or(false)
}
