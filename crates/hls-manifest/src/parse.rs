// Dual-strategy playlist parsing.
//
// The structured strategy understands the playlist grammar via m3u8-rs. The
// fallback scans line by line and resolves references by hand, so playlists
// that are technically invalid but still list one URI per content line are
// recovered. Both strategies must agree on well-formed input.

use crate::encryption::{EncryptionDescriptor, EncryptionMethod};
use crate::error::ParseError;
use crate::segment::{ByteRange, SegmentManifest, SegmentRef};
use m3u8_rs::{KeyMethod, Playlist, parse_playlist_res};
use tracing::debug;
use url::Url;

/// Parses playlist text into an ordered, fully resolved segment manifest.
///
/// The structured parser runs first; if it rejects the input or yields zero
/// segments, the line-scan fallback takes over. Unsupported encryption and
/// unresolvable references are hard errors from either strategy — a playlist
/// is never silently treated as cleartext.
pub fn parse(playlist_text: &str, base_uri: &Url) -> Result<SegmentManifest, ParseError> {
    if let Some(manifest) = parse_structured(playlist_text, base_uri)?
        && !manifest.is_empty()
    {
        return Ok(manifest);
    }

    debug!(base = %base_uri, "structured parse yielded no segments, falling back to line scan");
    let manifest = parse_fallback(playlist_text, base_uri)?;
    if manifest.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(manifest)
}

/// Structured strategy. `Ok(None)` means the grammar was rejected or the
/// input is a master playlist; both hand over to the fallback.
pub(crate) fn parse_structured(
    text: &str,
    base: &Url,
) -> Result<Option<SegmentManifest>, ParseError> {
    let playlist = match parse_playlist_res(text.as_bytes()) {
        Ok(Playlist::MediaPlaylist(pl)) => pl,
        Ok(Playlist::MasterPlaylist(_)) => return Ok(None),
        Err(_) => return Ok(None),
    };

    let mut segments = Vec::with_capacity(playlist.segments.len());
    let mut encryption: Option<EncryptionDescriptor> = None;
    for (index, segment) in playlist.segments.iter().enumerate() {
        if encryption.is_none()
            && let Some(key) = segment.key.as_ref()
        {
            encryption = descriptor_from_key(key, base)?;
        }

        let byte_range = segment.byte_range.as_ref().and_then(|br| {
            // A BYTERANGE without an explicit offset would need inference
            // from the previous entry; such playlists are out of scope.
            br.offset.map(|offset| ByteRange {
                offset,
                length: br.length,
            })
        });

        segments.push(SegmentRef {
            index: index as u32,
            uri: join_reference(base, &segment.uri)?,
            byte_range,
        });
    }

    Ok(Some(SegmentManifest {
        segments,
        encryption,
    }))
}

/// Fallback strategy: every non-comment, non-empty line is a segment URI.
/// `#EXT-X-KEY` lines are still honored so an encrypted-but-malformed
/// playlist does not come back as cleartext.
pub(crate) fn parse_fallback(text: &str, base: &Url) -> Result<SegmentManifest, ParseError> {
    let mut segments = Vec::new();
    let mut encryption: Option<EncryptionDescriptor> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(attrs) = line.strip_prefix("#EXT-X-KEY:") {
            if encryption.is_none() {
                encryption = descriptor_from_attributes(attrs, base)?;
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        segments.push(SegmentRef {
            index: segments.len() as u32,
            uri: resolve_reference(base, line)?,
            byte_range: None,
        });
    }

    Ok(SegmentManifest {
        segments,
        encryption,
    })
}

fn descriptor_from_key(
    key: &m3u8_rs::Key,
    base: &Url,
) -> Result<Option<EncryptionDescriptor>, ParseError> {
    match &key.method {
        KeyMethod::None => Ok(None),
        KeyMethod::AES128 => {
            let uri = key.uri.as_deref().filter(|u| !u.is_empty()).ok_or_else(|| {
                ParseError::UnsupportedEncryption {
                    method: "AES-128 without key URI".to_string(),
                }
            })?;
            Ok(Some(EncryptionDescriptor {
                method: EncryptionMethod::Aes128,
                key_uri: join_reference(base, uri)?,
                iv: key.iv.clone(),
                keyformat: key.keyformat.clone(),
                keyformatversions: key.keyformatversions.clone(),
            }))
        }
        KeyMethod::SampleAES => Err(ParseError::UnsupportedEncryption {
            method: "SAMPLE-AES".to_string(),
        }),
        KeyMethod::Other(name) => Err(ParseError::UnsupportedEncryption {
            method: name.clone(),
        }),
    }
}

fn descriptor_from_attributes(
    attrs: &str,
    base: &Url,
) -> Result<Option<EncryptionDescriptor>, ParseError> {
    let mut method: Option<String> = None;
    let mut uri: Option<String> = None;
    let mut iv: Option<String> = None;
    let mut keyformat: Option<String> = None;
    let mut keyformatversions: Option<String> = None;

    for part in split_attributes(attrs) {
        let Some((k, v)) = part.split_once('=') else {
            continue;
        };
        let name = k.trim();
        let mut value = v.trim();
        if let Some(stripped) = value.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            value = stripped;
        }

        if name.eq_ignore_ascii_case("METHOD") {
            method = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("URI") {
            uri = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("IV") {
            iv = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("KEYFORMAT") {
            keyformat = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("KEYFORMATVERSIONS") {
            keyformatversions = Some(value.to_string());
        }
    }

    match method.as_deref() {
        None | Some("NONE") => Ok(None),
        Some("AES-128") => {
            let uri = uri.filter(|u| !u.is_empty()).ok_or_else(|| {
                ParseError::UnsupportedEncryption {
                    method: "AES-128 without key URI".to_string(),
                }
            })?;
            Ok(Some(EncryptionDescriptor {
                method: EncryptionMethod::Aes128,
                key_uri: resolve_reference(base, &uri)?,
                iv,
                keyformat,
                keyformatversions,
            }))
        }
        Some(other) => Err(ParseError::UnsupportedEncryption {
            method: other.to_string(),
        }),
    }
}

/// Splits an attribute list on commas, keeping quoted values intact.
fn split_attributes(attrs: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = Vec::new();
    let mut in_quotes = false;
    let mut start = 0usize;
    for (idx, ch) in attrs.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(attrs[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < attrs.len() {
        parts.push(attrs[start..].trim());
    }
    parts.retain(|p| !p.is_empty());
    parts
}

/// Reference resolution for the structured strategy, via the url crate.
fn join_reference(base: &Url, reference: &str) -> Result<String, ParseError> {
    base.join(reference)
        .map(|u| u.to_string())
        .map_err(|e| ParseError::UnresolvableUri {
            uri: reference.to_string(),
            reason: e.to_string(),
        })
}

/// Hand-rolled reference resolution for the fallback strategy, covering the
/// three forms a playlist line can take: absolute, root-relative (`/path`)
/// and relative (`seg.ts`, `../seg.ts`). Must agree with [`join_reference`]
/// on well-formed input.
fn resolve_reference(base: &Url, reference: &str) -> Result<String, ParseError> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Ok(reference.to_string());
    }

    let authority = base.authority();
    if authority.is_empty() {
        return Err(ParseError::UnresolvableUri {
            uri: reference.to_string(),
            reason: format!("base URI `{base}` has no authority"),
        });
    }

    // Query/fragment suffixes pass through untouched; dot-segment removal
    // applies to the path only.
    let (path_part, suffix) = match reference.find(['?', '#']) {
        Some(pos) => (&reference[..pos], &reference[pos..]),
        None => (reference, ""),
    };

    let combined = if path_part.starts_with('/') {
        path_part.to_string()
    } else {
        let base_path = base.path();
        let dir = match base_path.rfind('/') {
            Some(pos) => &base_path[..=pos],
            None => "/",
        };
        format!("{dir}{path_part}")
    };

    Ok(format!(
        "{}://{}{}{}",
        base.scheme(),
        authority,
        remove_dot_segments(&combined),
        suffix
    ))
}

/// RFC 3986 dot-segment removal over an absolute path. `..` saturates at the
/// root, matching url::Url::join.
fn remove_dot_segments(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." => {}
            ".." => {
                if out.len() > 1 {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out.join("/")
}
