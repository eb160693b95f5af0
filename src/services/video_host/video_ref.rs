use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VideoRefError {
    #[error("video reference is empty")]
    Empty,

    #[error("no numeric video id in '{0}'")]
    NoNumericId(String),
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Extracts the numeric video id from a stored video link.
///
/// Accepts absolute links (`https://vimeo.com/123456`), private links with a
/// trailing hash (`https://vimeo.com/123456/abcdef01`) and API uris
/// (`/videos/123456`). Only used for rows written before the id was stored
/// alongside the link.
pub fn parse_video_id(reference: &str) -> Result<u64, VideoRefError> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return Err(VideoRefError::Empty);
    }

    let path = match url::Url::parse(trimmed) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let candidate = match segments.as_slice() {
        [.., last] if is_numeric(last) => *last,
        [.., id, token] if is_numeric(id) && !is_numeric(token) => *id,
        _ => return Err(VideoRefError::NoNumericId(trimmed.to_string())),
    };

    candidate
        .parse()
        .map_err(|_| VideoRefError::NoNumericId(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_link() {
        assert_eq!(parse_video_id("https://vimeo.com/76979871"), Ok(76979871));
        assert_eq!(parse_video_id("https://vimeo.com/76979871/"), Ok(76979871));
    }

    #[test]
    fn test_private_link_with_hash() {
        assert_eq!(
            parse_video_id("https://vimeo.com/76979871/a1b2c3d4e5"),
            Ok(76979871)
        );
    }

    #[test]
    fn test_api_uri_and_query() {
        assert_eq!(parse_video_id("/videos/42"), Ok(42));
        assert_eq!(parse_video_id("https://vimeo.com/42?share=copy"), Ok(42));
    }

    #[test]
    fn test_malformed_references() {
        assert_eq!(parse_video_id("   "), Err(VideoRefError::Empty));
        assert!(matches!(
            parse_video_id("https://vimeo.com/channels/staffpicks"),
            Err(VideoRefError::NoNumericId(_))
        ));
        assert!(parse_video_id("https://vimeo.com/").is_err());
        assert!(parse_video_id("https://vimeo.com/99999999999999999999999").is_err());
    }
}
