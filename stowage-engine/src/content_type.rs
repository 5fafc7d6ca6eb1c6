use std::path::Path;

use serde::Serialize;

// Logical grouping for the signed-URL request; the wire MIME type is inferred separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Other,
}

impl ContentKind {
    pub fn from_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" | "svg" | "heic" => ContentKind::Image,
            "mp4" | "mov" | "mkv" | "avi" | "webm" => ContentKind::Video,
            "mp3" | "wav" | "flac" | "ogg" | "m4a" => ContentKind::Audio,
            "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "odt" | "txt" | "md"
            | "csv" => ContentKind::Document,
            "zip" | "tar" | "gz" | "bz2" | "xz" | "7z" | "rar" => ContentKind::Archive,
            _ => ContentKind::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Image => "image",
            ContentKind::Video => "video",
            ContentKind::Audio => "audio",
            ContentKind::Document => "document",
            ContentKind::Archive => "archive",
            ContentKind::Other => "other",
        }
    }
}

pub fn wire_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_known_extensions() {
        assert_eq!(ContentKind::from_name("cat.png"), ContentKind::Image);
        assert_eq!(ContentKind::from_name("clip.mp4"), ContentKind::Video);
        assert_eq!(ContentKind::from_name("song.flac"), ContentKind::Audio);
        assert_eq!(ContentKind::from_name("report.pdf"), ContentKind::Document);
        assert_eq!(ContentKind::from_name("backup.tar"), ContentKind::Archive);
        assert_eq!(ContentKind::from_name("mystery.qqq"), ContentKind::Other);
        assert_eq!(ContentKind::from_name("no_extension"), ContentKind::Other);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(ContentKind::from_name("PHOTO.JPG"), ContentKind::Image);
    }

    #[test]
    fn wire_type_falls_back_to_octet_stream() {
        assert_eq!(wire_content_type("cat.png"), "image/png");
        assert_eq!(wire_content_type("mystery.qqq"), "application/octet-stream");
    }
}
