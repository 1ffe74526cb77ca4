//! MIME inference for media artifacts, keyed on the URL's file extension.

/// The three media categories the upstream can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    /// The data-map key that selects this kind (`_image` etc.).
    #[must_use]
    pub const fn data_key(&self) -> &'static str {
        match self {
            Self::Image => "_image",
            Self::Audio => "_audio",
            Self::Video => "_video",
        }
    }

    /// The nested field holding the media URL (`imageUrl` etc.).
    #[must_use]
    pub const fn url_field(&self) -> &'static str {
        match self {
            Self::Image => "imageUrl",
            Self::Audio => "audioUrl",
            Self::Video => "videoUrl",
        }
    }

    /// Capitalized label used in the text fallback, e.g. `[Image: <url>]`.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Audio => "Audio",
            Self::Video => "Video",
        }
    }

    /// Filename used when the URL has no usable final path segment.
    #[must_use]
    pub const fn default_name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// MIME type used when the extension is unknown.
    #[must_use]
    pub const fn default_mime(&self) -> &'static str {
        match self {
            Self::Image => "image/jpeg",
            Self::Audio => "audio/mpeg",
            Self::Video => "video/mp4",
        }
    }

    pub const ALL: [Self; 3] = [Self::Image, Self::Audio, Self::Video];
}

/// Strips a query string (and fragment) from a URL.
#[must_use]
pub fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

fn extension(url: &str) -> Option<String> {
    let path = strip_query(url);
    let segment = path.rsplit('/').next()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Infers the MIME type from the URL's extension, case-insensitively and
/// ignoring any query string. Unknown extensions fall back to the kind's
/// default.
#[must_use]
pub fn infer_mime(url: &str, kind: MediaKind) -> String {
    let Some(ext) = extension(url) else {
        return kind.default_mime().to_string();
    };
    let mime = match kind {
        MediaKind::Image => match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            "bmp" => "image/bmp",
            "ico" => "image/x-icon",
            _ => kind.default_mime(),
        },
        MediaKind::Audio => match ext.as_str() {
            "mp3" => "audio/mpeg",
            "ogg" => "audio/ogg",
            "wav" => "audio/wav",
            "m4a" => "audio/mp4",
            "aac" => "audio/aac",
            "flac" => "audio/flac",
            "webm" => "audio/webm",
            _ => kind.default_mime(),
        },
        MediaKind::Video => match ext.as_str() {
            "mp4" | "m4v" => "video/mp4",
            "webm" => "video/webm",
            "ogg" => "video/ogg",
            "avi" => "video/x-msvideo",
            "mov" => "video/quicktime",
            "mkv" => "video/x-matroska",
            _ => kind.default_mime(),
        },
    };
    mime.to_string()
}

/// Extracts a filename from the URL's final path segment, stripping any
/// query string; falls back to the kind's literal default name.
#[must_use]
pub fn file_name(url: &str, kind: MediaKind) -> String {
    strip_query(url)
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(str::to_string)
        .unwrap_or_else(|| kind.default_name().to_string())
}
