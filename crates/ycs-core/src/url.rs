//! URL helpers and page classification
//!
//! These functions work on string slices without allocating. Input may be a
//! full `href` or a bare path such as `/watch?v=...`.

// =============================================================================
// Slicing
// =============================================================================

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    let colon_pos = bytes.iter().position(|&b| b == b':')?;
    // A colon after the first '/' belongs to the path, not a scheme
    if let Some(slash) = bytes.iter().position(|&b| b == b'/') {
        if slash < colon_pos {
            return None;
        }
    }

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

/// Extract the host (without port or userinfo).
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    let mut host_end = bytes.len();
    for (i, &b) in bytes[scheme_end..].iter().enumerate() {
        if b == b'/' || b == b'?' || b == b'#' {
            host_end = scheme_end + i;
            break;
        }
    }

    let mut host = &url[scheme_end..host_end];
    if let Some(at_pos) = host.rfind('@') {
        host = &host[at_pos + 1..];
    }
    if let Some(colon) = host.find(':') {
        host = &host[..colon];
    }
    Some(host)
}

/// Extract the path portion of a URL or path.
#[inline]
pub fn extract_path(url: &str) -> &str {
    let start = match get_scheme_end(url) {
        Some(scheme_end) => {
            let bytes = url.as_bytes();
            let mut path_start = None;
            for (i, &b) in bytes[scheme_end..].iter().enumerate() {
                if b == b'/' {
                    path_start = Some(scheme_end + i);
                    break;
                }
                if b == b'?' || b == b'#' {
                    return "/";
                }
            }
            match path_start {
                Some(pos) => pos,
                None => return "/",
            }
        }
        None => 0,
    };

    let rest = &url[start..];
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    let path = &rest[..end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// True for youtube.com and its subdomains (www, m, music).
pub fn is_youtube_url(url: &str) -> bool {
    match extract_host(url) {
        Some(host) => {
            let host = host.trim_end_matches('.').to_ascii_lowercase();
            host == "youtube.com" || host.ends_with(".youtube.com")
        }
        None => false,
    }
}

// =============================================================================
// Page classification
// =============================================================================

/// Kind of YouTube page, derived from the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Home,
    Subscriptions,
    Trending,
    Channel,
    Search,
    History,
    Playlist,
    Watch,
    Shorts,
    Embed,
    Other,
}

impl PageKind {
    pub fn classify(url: &str) -> Self {
        let path = extract_path(url);

        if path.contains("/@") {
            return Self::Channel;
        }
        if path.starts_with("/shorts") {
            return Self::Shorts;
        }
        if path.starts_with("/embed") {
            return Self::Embed;
        }

        match path {
            "/" => Self::Home,
            "/feed/subscriptions" => Self::Subscriptions,
            "/feed/trending" => Self::Trending,
            "/results" => Self::Search,
            "/feed/history" => Self::History,
            "/playlist" => Self::Playlist,
            "/watch" => Self::Watch,
            _ => Self::Other,
        }
    }

    /// Pages whose main content is a rich grid of video items.
    pub fn is_grid(self) -> bool {
        matches!(self, Self::Home | Self::Subscriptions | Self::Trending | Self::Channel)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Subscriptions => "Subscriptions",
            Self::Trending => "Trending",
            Self::Channel => "Channel",
            Self::Search => "Search",
            Self::History => "History",
            Self::Playlist => "Playlist",
            Self::Watch => "Watch",
            Self::Shorts => "Shorts",
            Self::Embed => "Embed",
            Self::Other => "Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_path() {
        assert_eq!(extract_path("https://www.youtube.com/watch?v=abc"), "/watch");
        assert_eq!(extract_path("https://www.youtube.com/"), "/");
        assert_eq!(extract_path("https://www.youtube.com"), "/");
        assert_eq!(extract_path("https://www.youtube.com?x=1"), "/");
        assert_eq!(extract_path("/shorts/xyz#t"), "/shorts/xyz");
        assert_eq!(extract_path(""), "/");
    }

    #[test]
    fn test_extract_host() {
        assert_eq!(extract_host("https://www.youtube.com/watch"), Some("www.youtube.com"));
        assert_eq!(extract_host("https://user@m.youtube.com:443/"), Some("m.youtube.com"));
        assert_eq!(extract_host("/watch?v=1"), None);
    }

    #[test]
    fn test_is_youtube_url() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=1"));
        assert!(is_youtube_url("https://youtube.com/"));
        assert!(!is_youtube_url("https://notyoutube.com/"));
        assert!(!is_youtube_url("https://youtube.com.evil.net/"));
    }

    #[test]
    fn test_classify() {
        assert_eq!(PageKind::classify("https://www.youtube.com/"), PageKind::Home);
        assert_eq!(PageKind::classify("https://www.youtube.com/feed/subscriptions"), PageKind::Subscriptions);
        assert_eq!(PageKind::classify("https://www.youtube.com/@chan/videos"), PageKind::Channel);
        assert_eq!(PageKind::classify("https://www.youtube.com/watch?v=1"), PageKind::Watch);
        assert_eq!(PageKind::classify("https://www.youtube.com/shorts/abc"), PageKind::Shorts);
        assert_eq!(PageKind::classify("https://www.youtube.com/results?search_query=x"), PageKind::Search);
        assert_eq!(PageKind::classify("https://www.youtube.com/embed/1"), PageKind::Embed);
        assert_eq!(PageKind::classify("https://www.youtube.com/gaming"), PageKind::Other);
        assert!(PageKind::Trending.is_grid());
        assert!(!PageKind::Watch.is_grid());
    }
}
