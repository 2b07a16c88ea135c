use axum::http::HeaderValue;
use serde::Serialize;

use crate::extractor::SourceFormat;

const DEFAULT_CONTAINER: &str = "mp4";

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatKind {
    Video,
    Audio,
}

/// One entry of the `/formats` listing.
#[derive(Serialize, Clone, Debug)]
pub struct VideoFormat {
    pub itag: u32,
    pub quality: String,
    #[serde(rename = "type")]
    pub kind: FormatKind,
    pub resolution: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

impl From<&SourceFormat> for VideoFormat {
    fn from(format: &SourceFormat) -> Self {
        let kind = if format.has_audio && format.has_video {
            FormatKind::Video
        } else {
            FormatKind::Audio
        };

        Self {
            itag: format.itag,
            quality: format
                .quality_label
                .clone()
                .unwrap_or_else(|| "Audio only".to_string()),
            kind,
            resolution: format
                .resolution
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            mime_type: format.mime_type.clone(),
        }
    }
}

/// Replaces every character that is not an ASCII alphanumeric, `_`,
/// whitespace, `.` or `-` with `_`.
///
/// Control characters count as unsafe even when they are whitespace, so the
/// result can always be placed in a header value.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric()
                || matches!(c, '_' | '.' | '-')
                || (c.is_whitespace() && !c.is_control())
            {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `Content-Disposition` value offering the stream as `<title>.<container>`.
pub fn content_disposition(title: &str, container: Option<&str>) -> HeaderValue {
    let container = container
        .filter(|container| !container.is_empty())
        .unwrap_or(DEFAULT_CONTAINER);
    let value = format!(
        "attachment; filename=\"{}.{}\"",
        sanitize_title(title),
        sanitize_title(container)
    );
    // sanitized text holds no control bytes; non-ASCII whitespace is legal opaque bytes
    HeaderValue::from_bytes(value.as_bytes())
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::extractor::stub::format;

    #[test]
    fn sanitizes_header_unsafe_characters() {
        assert_eq!(sanitize_title("My:Video/Title?.mp4"), "My_Video_Title_.mp4");
        assert_eq!(sanitize_title("a \"quoted\" name"), "a _quoted_ name");
        assert_eq!(sanitize_title("line\nbreak\ttab"), "line_break_tab");
        assert_eq!(sanitize_title("café"), "caf_");
        assert_eq!(sanitize_title(""), "");
    }

    #[test]
    fn keeps_allowed_characters() {
        let title = "Already_safe title-1.2";
        assert_eq!(sanitize_title(title), title);
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(title in any::<String>()) {
            let once = sanitize_title(&title);
            prop_assert_eq!(sanitize_title(&once), once);
        }

        #[test]
        fn sanitize_preserves_char_count(title in any::<String>()) {
            prop_assert_eq!(sanitize_title(&title).chars().count(), title.chars().count());
        }
    }

    #[test]
    fn disposition_uses_container_or_mp4() {
        assert_eq!(
            content_disposition("Test Video", Some("webm")),
            "attachment; filename=\"Test Video.webm\""
        );
        assert_eq!(
            content_disposition("Test Video", None),
            "attachment; filename=\"Test Video.mp4\""
        );
        assert_eq!(
            content_disposition("a/b", Some("")),
            "attachment; filename=\"a_b.mp4\""
        );
    }

    proptest! {
        #[test]
        fn disposition_keeps_every_sanitized_title(title in any::<String>()) {
            let value = content_disposition(&title, Some("webm"));
            let expected = format!("attachment; filename=\"{}.webm\"", sanitize_title(&title));
            prop_assert_eq!(value.as_bytes(), expected.as_bytes());
        }
    }

    #[test]
    fn disposition_allows_non_ascii_whitespace() {
        let value = content_disposition("Test\u{a0}Video", Some("mp4"));
        assert_eq!(
            value.as_bytes(),
            "attachment; filename=\"Test\u{a0}Video.mp4\"".as_bytes()
        );
    }

    #[test]
    fn projects_source_format() {
        let muxed = VideoFormat::from(&SourceFormat {
            quality_label: Some("720p".into()),
            resolution: Some("1280x720".into()),
            ..format(22, true, true)
        });
        assert_eq!(muxed.kind, FormatKind::Video);
        assert_eq!(muxed.quality, "720p");
        assert_eq!(muxed.resolution, "1280x720");

        let video_only = VideoFormat::from(&format(137, false, true));
        assert_eq!(video_only.kind, FormatKind::Audio);
        assert_eq!(video_only.quality, "Audio only");
        assert_eq!(video_only.resolution, "N/A");
    }

    #[test]
    fn serializes_with_listing_field_names() {
        let json = serde_json::to_value(VideoFormat::from(&format(140, true, false))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "itag": 140,
                "quality": "Audio only",
                "type": "Audio",
                "resolution": "N/A",
                "mimeType": "video/mp4",
            })
        );
    }
}
