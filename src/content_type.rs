use std::path::Path;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// MIME type for a file extension. Case-insensitive; unknown extensions map
/// to `application/octet-stream`.
pub fn for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => OCTET_STREAM,
    }
}

/// MIME type derived from the extension of `path`.
pub fn for_path(path: impl AsRef<Path>) -> &'static str {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(for_extension)
        .unwrap_or(OCTET_STREAM)
}
