pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

/// Extracts `{note_id}` from a URL shaped like `.../api/notes/{note_id}/data...`.
///
/// The host app issues relative URLs without a leading slash, so we only look for the
/// `api/notes/` marker and never anchor on the start of the string.
pub(crate) fn note_id_from_save_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("api/notes/")?;
    let (raw_id, tail) = rest.split_once('/')?;
    if raw_id.trim().is_empty() || !tail.starts_with("data") {
        return None;
    }

    // Keep the raw segment if it is not valid percent-encoding.
    let id = urlencoding::decode(raw_id)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw_id.to_string());
    Some(id)
}

/// Seconds with one decimal, for user-facing durations.
pub(crate) fn format_secs(ms: i64) -> String {
    format!("{:.1}", ms as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_id_from_relative_save_url() {
        assert_eq!(
            note_id_from_save_url("api/notes/abc123/data").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_note_id_from_absolute_save_url_with_query() {
        assert_eq!(
            note_id_from_save_url("http://localhost:8080/api/notes/x9/data?v=2").as_deref(),
            Some("x9")
        );
    }

    #[test]
    fn test_note_id_is_percent_decoded() {
        assert_eq!(
            note_id_from_save_url("api/notes/a%20b/data").as_deref(),
            Some("a b")
        );
    }

    #[test]
    fn test_note_id_rejects_other_shapes() {
        assert!(note_id_from_save_url("api/notes/abc123").is_none());
        assert!(note_id_from_save_url("api/notes//data").is_none());
        assert!(note_id_from_save_url("api/notes/abc123/attributes").is_none());
        assert!(note_id_from_save_url("api/tree").is_none());
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(3000), "3.0");
        assert_eq!(format_secs(4260), "4.3");
        assert_eq!(format_secs(10_000), "10.0");
    }
}
