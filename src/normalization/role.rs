use super::extract::is_null_field;

/// Category synonyms folded onto a single play-method.
const PLAY_METHOD_SYNONYMS: [(&str, &str); 1] = [("actress", "actor")];

/// Normalize a principals `category` into a play-method ("Actress " -> "actor").
pub fn normalize_play_method(category: &str) -> Option<String> {
    if is_null_field(category) {
        return None;
    }
    let lowered = category.trim().to_lowercase();
    let folded = PLAY_METHOD_SYNONYMS
        .iter()
        .find(|(from, _)| *from == lowered)
        .map(|(_, to)| (*to).to_string());
    Some(folded.unwrap_or(lowered))
}

/// Clean a principals `characters` cell (`["Tony Stark","Iron Man"]`) into a display string.
///
/// Bracket and quote list syntax is removed, separators are collapsed to ", " and
/// self-appearances ("Self", "Self - Host") are treated as carrying no role.
pub fn clean_characters(raw: &str) -> Option<String> {
    if is_null_field(raw) {
        return None;
    }
    let unbracketed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let unquoted: String = unbracketed.chars().filter(|c| *c != '"' && *c != '\'').collect();
    let without_self = unquoted.replace("Self -", "");

    let joined = without_self
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    match joined.as_str() {
        "" | "Self" => None,
        _ => Some(joined),
    }
}

/// A `job` cell is used verbatim when present.
pub fn clean_job(raw: &str) -> Option<String> {
    if is_null_field(raw) {
        return None;
    }
    Some(raw.trim().to_string())
}

/// Role title for a principal: cleaned characters first, then the job, else nothing.
pub fn role_title(characters: Option<&str>, job: Option<&str>) -> Option<String> {
    characters
        .and_then(clean_characters)
        .or_else(|| job.and_then(clean_job))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_actress_into_actor() {
        assert_eq!(normalize_play_method("actress").as_deref(), Some("actor"));
        assert_eq!(normalize_play_method(" Actor ").as_deref(), Some("actor"));
        assert_eq!(normalize_play_method("director").as_deref(), Some("director"));
        assert_eq!(normalize_play_method("\\N"), None);
    }

    #[test]
    fn strips_list_syntax_from_characters() {
        assert_eq!(
            clean_characters(r#"["Tony Stark","Iron Man"]"#).as_deref(),
            Some("Tony Stark, Iron Man")
        );
        assert_eq!(clean_characters(r#"["Paul Atreides"]"#).as_deref(), Some("Paul Atreides"));
    }

    #[test]
    fn self_appearances_carry_no_role() {
        assert_eq!(clean_characters(r#"["Self"]"#), None);
        assert_eq!(clean_characters(r#"["Self - Host"]"#).as_deref(), Some("Host"));
        assert_eq!(clean_characters("[]"), None);
    }

    #[test]
    fn falls_back_to_job() {
        assert_eq!(
            role_title(Some("\\N"), Some("screenplay")).as_deref(),
            Some("screenplay")
        );
        assert_eq!(role_title(None, Some("\\N")), None);
        assert_eq!(
            role_title(Some(r#"["Chani"]"#), Some("ignored")).as_deref(),
            Some("Chani")
        );
    }
}
