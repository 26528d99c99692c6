use crate::api::SaveRequest;
use crate::util::note_id_from_save_url;
use reqwest::Method;

/// Decides which outgoing calls are saves worth tracking.
///
/// `None` means "not a save": the call passes through untouched. `Some(target)` names the
/// resource being saved (used for ids and logs only).
pub trait SaveMatcher {
    fn target_of(&self, request: &SaveRequest) -> Option<String>;
}

impl<F> SaveMatcher for F
where
    F: Fn(&SaveRequest) -> Option<String>,
{
    fn target_of(&self, request: &SaveRequest) -> Option<String> {
        self(request)
    }
}

/// `PUT .../api/notes/{id}/data`, the note content save endpoint.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoteDataSaves;

impl SaveMatcher for NoteDataSaves {
    fn target_of(&self, request: &SaveRequest) -> Option<String> {
        if request.method != Method::PUT {
            return None;
        }
        if !(request.url.contains("api/notes/") && request.url.contains("/data")) {
            return None;
        }
        Some(note_id_from_save_url(&request.url).unwrap_or_else(|| "unknown".to_string()))
    }
}
