use anyhow::{Result, anyhow};
use std::path::Path;

/// Maximum upload size: 100 MB
pub const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validates upload size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<()> {
    if size > max_size {
        return Err(anyhow!(ValidationError {
            code: "FILE_TOO_LARGE",
            message: format!(
                "File size exceeds maximum allowed {} bytes ({} MB)",
                max_size,
                max_size / 1024 / 1024
            ),
        }));
    }
    Ok(())
}

/// Accepts any `video/*` content type, parameters ignored
pub fn validate_video_mime(content_type: Option<&str>) -> Result<mime::Mime> {
    let invalid = || {
        anyhow!(ValidationError {
            code: "INVALID_MIME_TYPE",
            message: "Invalid file type. Only video files are allowed.".to_string(),
        })
    };

    let parsed: mime::Mime = content_type
        .ok_or_else(invalid)?
        .trim()
        .parse()
        .map_err(|_| invalid())?;

    if parsed.type_() == mime::VIDEO {
        Ok(parsed)
    } else {
        Err(invalid())
    }
}

/// Sanitizes filename to prevent path traversal and injection attacks
/// Returns the sanitized filename or an error if the name is invalid
pub fn sanitize_filename(filename: &str) -> Result<String> {
    // Only the last component survives; both separators count
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("");

    if name.is_empty() || name == "." || name == ".." {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        }));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Leave room for the stamp and "rotated_" prefixes within NAME_MAX
    let sanitized = if sanitized.len() > 200 {
        let mut end = 200;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(anyhow!(ValidationError {
            code: "HIDDEN_FILE",
            message: "Hidden files (starting with '.') are not allowed".to_string(),
        }));
    }

    Ok(sanitized)
}

/// File stem used to derive the transcoded output name
pub fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("video")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(1024, MAX_UPLOAD_SIZE).is_ok());
        assert!(validate_file_size(MAX_UPLOAD_SIZE, MAX_UPLOAD_SIZE).is_ok());
        assert!(validate_file_size(MAX_UPLOAD_SIZE + 1, MAX_UPLOAD_SIZE).is_err());
    }

    #[test]
    fn test_validate_video_mime() {
        assert!(validate_video_mime(Some("video/mp4")).is_ok());
        assert!(validate_video_mime(Some("video/quicktime")).is_ok());
        assert!(validate_video_mime(Some("video/webm; codecs=vp9")).is_ok());

        assert!(validate_video_mime(Some("image/png")).is_err());
        assert!(validate_video_mime(Some("application/octet-stream")).is_err());
        assert!(validate_video_mime(Some("not a mime")).is_err());
        assert!(validate_video_mime(None).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("clip.mp4").unwrap(), "clip.mp4");
        assert_eq!(sanitize_filename("my clip.mov").unwrap(), "my clip.mov");
        assert_eq!(
            sanitize_filename("clip<script>.mp4").unwrap(),
            "clip_script_.mp4"
        );
        assert_eq!(sanitize_filename("日本語.mp4").unwrap(), "日本語.mp4");

        // Path traversal
        assert_eq!(sanitize_filename("../../../etc/passwd").unwrap(), "passwd");
        assert_eq!(
            sanitize_filename("..\\..\\windows\\system32").unwrap(),
            "system32"
        );

        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename(".hidden.mp4").is_err());
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("holiday.mp4"), "holiday");
        assert_eq!(file_stem("archive.tar.mov"), "archive.tar");
        assert_eq!(file_stem("noext"), "noext");
    }
}
