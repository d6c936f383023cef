//! `Retry-After` header parsing

use std::time::{Duration, SystemTime};

use chrono::DateTime;
use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Absolute time the server asked clients to wait until.
///
/// An integer value is a delay in seconds from `now`. Anything else is read
/// as an HTTP date. Unparsable values yield `None`.
pub fn retry_after_hint(headers: &HeaderMap, now: SystemTime) -> Option<SystemTime> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return now.checked_add(Duration::from_secs(seconds));
    }

    DateTime::parse_from_rfc2822(value).ok().map(SystemTime::from)
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use reqwest::header::HeaderValue;

    use super::*;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_delta_seconds() {
        let now = UNIX_EPOCH + Duration::from_secs(1_000);
        assert_eq!(retry_after_hint(&headers("120"), now), Some(now + Duration::from_secs(120)));
        assert_eq!(retry_after_hint(&headers(" 0 "), now), Some(now));
    }

    #[test]
    fn test_http_date() {
        let hint = retry_after_hint(&headers("Wed, 21 Oct 2015 07:28:00 GMT"), SystemTime::now());
        assert_eq!(hint, Some(UNIX_EPOCH + Duration::from_secs(1_445_412_480)));
    }

    #[test]
    fn test_missing_or_invalid() {
        let now = SystemTime::now();
        assert_eq!(retry_after_hint(&HeaderMap::new(), now), None);
        assert_eq!(retry_after_hint(&headers("soon"), now), None);
        assert_eq!(retry_after_hint(&headers("-5"), now), None);
    }
}
