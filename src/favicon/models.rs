//! Data types shared by the favicon discovery, selection and caching stages

use serde::{Deserialize, Serialize};

/// Where a candidate icon reference was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconSourceKind {
    /// `{origin}/favicon.ico` answered a HEAD probe
    DefaultFavicon,
    /// `<link rel="icon">`
    IconLink,
    /// `<link rel="apple-touch-icon">`
    AppleTouchIcon,
    /// `<link rel="mask-icon">`, always a vector
    MaskIcon,
    /// `<link rel="shortcut icon">`
    ShortcutIcon,
    /// `<meta name="twitter:image">`
    TwitterImage,
    /// `<meta name="theme-color">`, carries a colour and no resource
    ThemeColor,
}

/// A discovered, not yet fetched reference to a possible favicon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateIcon {
    source_url: Option<String>,
    pub declared_type: Option<String>,
    pub declared_size_hint: Option<(u32, u32)>,
    theme_color: Option<String>,
    source_kind: IconSourceKind,
    pub score: i32,
}

impl CandidateIcon {
    /// Candidate backed by a fetchable resource
    pub fn resource(source_kind: IconSourceKind, source_url: impl Into<String>) -> Self {
        debug_assert!(source_kind != IconSourceKind::ThemeColor);
        Self {
            source_url: Some(source_url.into()),
            declared_type: None,
            declared_size_hint: None,
            theme_color: None,
            source_kind,
            score: 0,
        }
    }

    /// Colour-only candidate from `<meta name="theme-color">`
    pub fn theme_color(color: impl Into<String>) -> Self {
        Self {
            source_url: None,
            declared_type: None,
            declared_size_hint: None,
            theme_color: Some(color.into()),
            source_kind: IconSourceKind::ThemeColor,
            score: 0,
        }
    }

    pub fn with_declared_type(mut self, declared_type: Option<String>) -> Self {
        self.declared_type = declared_type.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_size_hint(mut self, size: Option<(u32, u32)>) -> Self {
        self.declared_size_hint = size;
        self
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn theme_color_value(&self) -> Option<&str> {
        self.theme_color.as_deref()
    }

    pub fn source_kind(&self) -> IconSourceKind {
        self.source_kind
    }

    pub fn declared_width(&self) -> Option<u32> {
        self.declared_size_hint.map(|(w, _)| w)
    }

    /// Whether the candidate can be downloaded at all
    pub fn is_fetchable(&self) -> bool {
        self.source_kind != IconSourceKind::ThemeColor
            && self.source_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Outcome of running discovery and selection for one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub target_url: String,
    pub domain: String,
    pub candidates: Vec<CandidateIcon>,
    pub best: Option<CandidateIcon>,
    pub success: bool,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Raw icon bytes as downloaded
#[derive(Debug, Clone)]
pub struct FetchedIcon {
    /// URL after redirects
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: bytes::Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_color_is_never_fetchable() {
        let c = CandidateIcon::theme_color("#ff0000");
        assert!(!c.is_fetchable());
        assert_eq!(c.source_url(), None);
        assert_eq!(c.theme_color_value(), Some("#ff0000"));
    }

    #[test]
    fn test_blank_url_is_not_fetchable() {
        let c = CandidateIcon::resource(IconSourceKind::IconLink, "  ");
        assert!(!c.is_fetchable());
    }

    #[test]
    fn test_builder_drops_blank_type() {
        let c = CandidateIcon::resource(IconSourceKind::IconLink, "https://a/f.png")
            .with_declared_type(Some(" ".into()))
            .with_size_hint(Some((32, 32)));
        assert_eq!(c.declared_type, None);
        assert_eq!(c.declared_width(), Some(32));
    }

    #[test]
    fn test_serializes_kind_in_snake_case() {
        let c = CandidateIcon::resource(IconSourceKind::AppleTouchIcon, "https://a/a.png");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["source_kind"], "apple_touch_icon");
    }
}
