//! Content-based MIME detection.
//!
//! The MIME type of an upload is always derived from its bytes, never from the content type
//! the client declared. Signature matching is delegated to `infer`, after two checks for types
//! it has no matcher for (SVG documents and Sun/NeXT `.snd` audio). Content nothing recognises
//! falls back to a small classification of empty, textual and binary data.

use crate::constants::SNIFF_LIMIT_BYTES;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const EMPTY_MIME: &str = "application/x-empty";
const TEXT_MIME: &str = "text/plain";
const BINARY_MIME: &str = "application/octet-stream";
const SVG_MIME: &str = "image/svg+xml";
const SUN_AUDIO_MIME: &str = "audio/basic";

const SUN_AUDIO_MAGIC: &[u8] = b".snd";

/// Detects the MIME type of the file at `path` from its leading bytes.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or read.
pub fn detect_mime(path: &Path) -> std::io::Result<String> {
    let mut head = Vec::new();
    File::open(path)?
        .take(SNIFF_LIMIT_BYTES)
        .read_to_end(&mut head)?;

    Ok(mime_for_bytes(&head).to_owned())
}

fn mime_for_bytes(head: &[u8]) -> &'static str {
    if head.starts_with(SUN_AUDIO_MAGIC) {
        return SUN_AUDIO_MIME;
    }

    // Checked before `infer`, which reports an SVG with an XML prolog as `text/xml`.
    if is_svg(head) {
        return SVG_MIME;
    }

    if let Some(kind) = infer::get(head) {
        return kind.mime_type();
    }

    if head.is_empty() {
        EMPTY_MIME
    } else if looks_like_text(head) {
        TEXT_MIME
    } else {
        BINARY_MIME
    }
}

// The sniff window may cut a multi-byte sequence in half; only an error inside the window counts.
fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }

    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

/// True when the first element of a textual document is `<svg`.
///
/// A byte-order mark, XML declarations, processing instructions, comments and a doctype may
/// precede it.
fn is_svg(head: &[u8]) -> bool {
    if !looks_like_text(head) {
        return false;
    }

    let text = String::from_utf8_lossy(head);
    let mut rest = text.trim_start_matches('\u{feff}').trim_start();

    loop {
        let (after, terminator) = if let Some(after) = rest.strip_prefix("<?") {
            (after, "?>")
        } else if let Some(after) = rest.strip_prefix("<!--") {
            (after, "-->")
        } else if let Some(after) = rest.strip_prefix("<!") {
            (after, ">")
        } else {
            break;
        };

        let Some(end) = after.find(terminator) else {
            return false;
        };
        rest = after[end + terminator.len()..].trim_start();
    }

    rest.strip_prefix("<svg")
        .and_then(|tag| tag.chars().next())
        .is_some_and(|c| c.is_whitespace() || c == '>' || c == '/')
}
