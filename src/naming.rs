use std::fmt;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Ordering key for frames within one view. Numeric keys always sort before
/// lexical ones, so a directory of consistently numbered files orders by a
/// single comparison and stray digit-less names fall to the end.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortKey {
    Number(u64),
    Text(String),
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Number(value) => write!(f, "{value}"),
            SortKey::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub view: String,
    pub sort_key: SortKey,
}

pub fn is_supported_image(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, extension)| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| extension.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Extracts `(view, sort key)` from a filename following the producing
/// toolchain's underscore convention: the fourth token names the camera view
/// on long names, the last token on short ones. Never fails; malformed names
/// fall back to the `Default` view and a lexical key.
pub fn parse_name(filename: &str) -> ParsedName {
    let stem = strip_extension(filename);
    let tokens = stem.split('_').collect::<Vec<_>>();

    let raw_view = if tokens.len() > 3 {
        tokens[3]
    } else {
        tokens.last().copied().unwrap_or_default()
    };
    let view = if raw_view.trim().is_empty() {
        "Default".to_string()
    } else {
        raw_view.to_string()
    };

    ParsedName {
        view,
        sort_key: extract_sort_key(stem),
    }
}

// A run of exactly 6 digits wins wherever it appears in the stem, even when
// it is a case id or mesh count rather than the sequence number; the naming
// convention does not guarantee otherwise and we deliberately don't guess.
fn extract_sort_key(stem: &str) -> SortKey {
    let runs = digit_runs(stem);

    if let Some(run) = runs.iter().find(|run| run.len() == 6) {
        if let Ok(value) = run.parse::<u64>() {
            return SortKey::Number(value);
        }
    }

    if let Some(run) = runs.last() {
        if let Ok(value) = run.parse::<u64>() {
            return SortKey::Number(value);
        }
    }

    SortKey::Text(stem.to_string())
}

fn digit_runs(stem: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = None;

    for (index, byte) in stem.bytes().enumerate() {
        if byte.is_ascii_digit() {
            if start.is_none() {
                start = Some(index);
            }
        } else if let Some(run_start) = start.take() {
            runs.push(&stem[run_start..index]);
        }
    }
    if let Some(run_start) = start {
        runs.push(&stem[run_start..]);
    }

    runs
}

fn strip_extension(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}
