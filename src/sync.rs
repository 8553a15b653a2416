use crate::dataset::Dataset;
use crate::index::FrameDescriptor;

/// One case's contribution to a synchronized frame set. `frame` is `None`
/// when the case has no data for the requested view; that is a normal
/// outcome the caller renders as a placeholder, not an error.
#[derive(Debug, Clone)]
pub struct ResolvedFrame<'a> {
    pub case_id: &'a str,
    pub frame: Option<&'a FrameDescriptor>,
}

/// Resolves the frame each case actually shows at `position`. Sequences
/// shorter than the requested position freeze on their last frame; there is
/// no wraparound and no out-of-range failure, whatever the position.
pub fn resolve<'a>(
    dataset: &'a Dataset,
    case_ids: &'a [String],
    view: &str,
    position: usize,
) -> Vec<ResolvedFrame<'a>> {
    case_ids
        .iter()
        .map(|case_id| {
            let frame = dataset
                .case(case_id)
                .and_then(|case| case.sequence(view))
                .and_then(|sequence| {
                    let clamped = position.min(sequence.len().saturating_sub(1));
                    sequence.get(clamped)
                });
            ResolvedFrame {
                case_id: case_id.as_str(),
                frame,
            }
        })
        .collect()
}

/// Views present in every selected case, in the first case's (sorted) view
/// order. Offering only this intersection guarantees a chosen view resolves
/// for every case; views that exist on only some cases are hidden entirely.
pub fn common_views(dataset: &Dataset, case_ids: &[String]) -> Vec<String> {
    let mut ids = case_ids.iter();
    let Some(first) = ids.next() else {
        return Vec::new();
    };

    let mut views = dataset
        .case(first)
        .map(|case| case.views().map(str::to_string).collect::<Vec<_>>())
        .unwrap_or_default();

    for case_id in ids {
        let Some(case) = dataset.case(case_id) else {
            return Vec::new();
        };
        views.retain(|view| case.contains_view(view));
    }

    views
}

/// The timeline length of the designated master case (by convention the
/// first selected case) for one view. Positions offered to the user are
/// bounded by this length.
pub fn master_len(dataset: &Dataset, case_ids: &[String], view: &str) -> usize {
    case_ids
        .first()
        .and_then(|case_id| dataset.case(case_id))
        .and_then(|case| case.sequence(view))
        .map(Vec::len)
        .unwrap_or(0)
}
