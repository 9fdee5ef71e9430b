use std::fmt::Display;

/// Every format tubely accepts, with the one MIME type and file extension it maps to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum MediaFormat {
    Mp4,
    Png,
    Jpeg,
}

/// What an upload is for. Each kind accepts its own fixed set of formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UploadKind {
    Video,
    Thumbnail,
}

const VIDEO_FORMATS: &[MediaFormat] = &[MediaFormat::Mp4];
const THUMBNAIL_FORMATS: &[MediaFormat] = &[MediaFormat::Png, MediaFormat::Jpeg];

impl MediaFormat {
    pub(crate) fn media_type(self) -> mime::Mime {
        match self {
            Self::Mp4 => crate::formats::mimes::video_mp4(),
            Self::Png => mime::IMAGE_PNG,
            Self::Jpeg => mime::IMAGE_JPEG,
        }
    }

    pub(crate) const fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub(crate) fn from_extension(ext: &str) -> Option<Self> {
        [Self::Mp4, Self::Png, Self::Jpeg]
            .into_iter()
            .find(|format| format.extension() == ext)
    }
}

impl UploadKind {
    pub(crate) const fn formats(self) -> &'static [MediaFormat] {
        match self {
            Self::Video => VIDEO_FORMATS,
            Self::Thumbnail => THUMBNAIL_FORMATS,
        }
    }

    /// Match a declared content type against this kind's formats, ignoring MIME parameters
    pub(crate) fn format_for(self, content_type: &mime::Mime) -> Option<MediaFormat> {
        self.formats()
            .iter()
            .copied()
            .find(|format| format.media_type().essence_str() == content_type.essence_str())
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Thumbnail => "thumbnail",
        }
    }
}

impl Display for UploadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

pub(crate) mod mimes {
    pub(crate) fn video_mp4() -> mime::Mime {
        "video/mp4".parse().expect("valid mime")
    }
}
