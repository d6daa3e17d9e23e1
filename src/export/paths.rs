use std::path::{Path, PathBuf};

/// Maps a mime type to a file extension
///
/// Only the three image types the service hands out are known. Anything
/// else returns `None` and the file is saved without an extension.
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "image/gif" => Some("gif"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

/// Makes a board title usable as a single directory name
///
/// Path separators and control characters become `_`, and titles that
/// would resolve to the export root or its parent become `_`.
pub fn sanitize_board_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Builds `{export_dir}/{board}/{pin_id}[.ext]`
pub fn destination_path(
    export_dir: &Path,
    board_title: &str,
    pin_id: u64,
    mime_type: &str,
) -> PathBuf {
    let file_name = match extension_for_mime(mime_type) {
        Some(ext) => format!("{}.{}", pin_id, ext),
        None => pin_id.to_string(),
    };
    export_dir
        .join(sanitize_board_title(board_title))
        .join(file_name)
}

/// Joins a CDN base and an asset key
pub fn asset_url(cdn_base: &str, key: &str) -> String {
    if cdn_base.ends_with('/') {
        format!("{}{}", cdn_base, key)
    } else {
        format!("{}/{}", cdn_base, key)
    }
}
