use crate::layout::Mode;

/// Parses a comma-separated case list as given on the command line. Order is
/// preserved (the first case is the master); duplicates are collapsed to
/// their first occurrence.
pub fn parse_case_list(value: &str) -> Result<Vec<String>, String> {
    let mut case_ids = Vec::new();
    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if !case_ids.iter().any(|existing| existing == token) {
            case_ids.push(token.to_string());
        }
    }

    if case_ids.is_empty() {
        return Err("no cases selected. Pass --cases as a comma-separated list, e.g. 001,002.".to_string());
    }
    Ok(case_ids)
}

pub fn parse_mode(value: &str) -> Result<Mode, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "side-by-side" | "sidebyside" | "sbs" => Ok(Mode::SideBySide),
        "grid" => Ok(Mode::Grid),
        "blink" => Ok(Mode::Blink),
        "animated" | "animation" => Ok(Mode::Animated),
        other => Err(format!(
            "unknown mode '{other}'. Use side-by-side, grid, blink, or animated."
        )),
    }
}

/// Precondition checks that must reject a request before any dataset work
/// begins. Everything past this point treats missing data as recoverable.
pub fn validate_selection(
    case_ids: &[String],
    variable: &str,
    view: Option<&str>,
    mode: Option<Mode>,
) -> Result<(), String> {
    if case_ids.is_empty() {
        return Err("no cases selected.".to_string());
    }
    if variable.trim().is_empty() {
        return Err("no variable selected.".to_string());
    }
    if let Some(view) = view {
        if view.trim().is_empty() {
            return Err("no view selected.".to_string());
        }
    }
    if mode == Some(Mode::Blink) && case_ids.len() != 2 {
        return Err(format!(
            "blink comparison needs exactly two cases, got {}.",
            case_ids.len()
        ));
    }
    Ok(())
}
