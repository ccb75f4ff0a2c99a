//! On-disk naming for cached sounds.
//!
//! Final files are `sound_<id>.<ext>` with the id escaped by [`encode_id`];
//! in-progress downloads are `sound_<id>.<ext>.<uuid>.part` in the same
//! directory so the final rename never crosses a filesystem boundary.

use std::path::{Path, PathBuf};

use crate::protocol_constants::{
    CACHE_FILE_PREFIX, DEFAULT_AUDIO_EXTENSION, MAX_EXTENSION_LEN, PARTIAL_FILE_SUFFIX,
};

/// Encodes a track id as a file-name component.
///
/// `[A-Za-z0-9-]` pass through; every other byte, `_` included, becomes
/// `_XX` (uppercase hex). `_` only ever starts an escape, so distinct ids
/// always map to distinct names.
pub fn encode_id(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("_{:02X}", byte));
        }
    }
    encoded
}

/// Derives the file extension from the URL path, falling back to `mp3`.
///
/// Query strings and fragments are ignored. Extensions that are not short
/// alphanumeric tokens are treated as absent.
pub fn extension_from_url(url: &str) -> String {
    let last_segment = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default();

    match last_segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_ascii_lowercase()
        }
        _ => DEFAULT_AUDIO_EXTENSION.to_string(),
    }
}

/// File name of the completed cache entry for a track.
pub fn file_name(id: &str, url: &str) -> String {
    format!(
        "{}{}.{}",
        CACHE_FILE_PREFIX,
        encode_id(id),
        extension_from_url(url)
    )
}

/// Unique temporary path next to `final_path`.
pub fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(
        ".{}.{}",
        uuid::Uuid::new_v4().simple(),
        PARTIAL_FILE_SUFFIX
    ));
    final_path.with_file_name(name)
}

/// Returns true if `name` is an in-progress download written by this cache.
pub fn is_partial_name(name: &str) -> bool {
    name.starts_with(CACHE_FILE_PREFIX) && name.ends_with(&format!(".{}", PARTIAL_FILE_SUFFIX))
}
