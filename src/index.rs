use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use serde::Serialize;

use crate::naming::{self, SortKey};
use crate::scan;

/// One image file's resolved metadata. `source_path` always points at the
/// original full-resolution asset; `display_raster` is only present after
/// dataset assembly has materialized the downsampled copy.
#[derive(Debug, Clone)]
pub struct FrameDescriptor {
    pub view: String,
    pub sort_key: SortKey,
    pub source_path: PathBuf,
    pub display_raster: Option<RgbaImage>,
}

pub type ViewSequence = Vec<FrameDescriptor>;

#[derive(Debug, Clone, Default)]
pub struct CaseIndex {
    views: BTreeMap<String, ViewSequence>,
}

impl CaseIndex {
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn views(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    pub fn contains_view(&self, view: &str) -> bool {
        self.views.contains_key(view)
    }

    pub fn sequence(&self, view: &str) -> Option<&ViewSequence> {
        self.views.get(view)
    }

    pub(crate) fn sequences_mut(&mut self) -> impl Iterator<Item = &mut ViewSequence> {
        self.views.values_mut()
    }

    pub(crate) fn prune_empty_views(&mut self) {
        self.views.retain(|_, sequence| !sequence.is_empty());
    }
}

/// Groups one case's image files per view and orders each view's sequence
/// ascending by sort key. The sort is stable, so files with equal keys keep
/// the lexical enumeration order of the listing. An absent variable
/// directory is a normal condition and yields an empty index.
pub fn build_case_index(base: &Path, case_id: &str, variable: &str) -> CaseIndex {
    let dir = scan::images_dir(base, case_id, variable);
    let mut views: BTreeMap<String, ViewSequence> = BTreeMap::new();

    for filename in scan::list_image_files(&dir) {
        let parsed = naming::parse_name(&filename);
        views.entry(parsed.view.clone()).or_default().push(FrameDescriptor {
            view: parsed.view,
            sort_key: parsed.sort_key,
            source_path: dir.join(&filename),
            display_raster: None,
        });
    }

    for sequence in views.values_mut() {
        sequence.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
    }

    CaseIndex { views }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseSummary {
    pub case: String,
    pub variable: String,
    pub views: Vec<ViewSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewSummary {
    pub view: String,
    pub frames: usize,
    pub first_key: String,
    pub last_key: String,
}

pub fn summarize(case_id: &str, variable: &str, index: &CaseIndex) -> CaseSummary {
    let views = index
        .views
        .iter()
        .map(|(view, sequence)| ViewSummary {
            view: view.clone(),
            frames: sequence.len(),
            first_key: sequence
                .first()
                .map(|frame| frame.sort_key.to_string())
                .unwrap_or_default(),
            last_key: sequence
                .last()
                .map(|frame| frame.sort_key.to_string())
                .unwrap_or_default(),
        })
        .collect();

    CaseSummary {
        case: case_id.to_string(),
        variable: variable.to_string(),
        views,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture_case(root: &Path, case_id: &str, variable: &str, files: &[&str]) {
        let dir = scan::images_dir(root, case_id, variable);
        fs::create_dir_all(&dir).expect("fixture dirs");
        for file in files {
            fs::write(dir.join(file), b"x").expect("fixture file");
        }
    }

    #[test]
    fn groups_files_per_view() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(
            root.path(),
            "001",
            "slices_U",
            &[
                "flow_slice_U_FRONT_000002.png",
                "flow_slice_U_FRONT_000001.png",
                "flow_slice_U_TOP_000001.png",
            ],
        );

        let index = build_case_index(root.path(), "001", "slices_U");
        assert_eq!(index.views().collect::<Vec<_>>(), vec!["FRONT", "TOP"]);
        assert_eq!(index.sequence("FRONT").map(Vec::len), Some(2));
        assert_eq!(index.sequence("TOP").map(Vec::len), Some(1));
    }

    #[test]
    fn sequences_are_non_decreasing_by_sort_key() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(
            root.path(),
            "001",
            "slices_U",
            &[
                "flow_slice_U_FRONT_000030.png",
                "flow_slice_U_FRONT_000005.png",
                "flow_slice_U_FRONT_000020.png",
            ],
        );

        let index = build_case_index(root.path(), "001", "slices_U");
        let sequence = index.sequence("FRONT").expect("FRONT view");
        let keys = sequence.iter().map(|frame| &frame.sort_key).collect::<Vec<_>>();
        assert!(keys.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn equal_keys_keep_lexical_file_order() {
        // Both stems parse to view TOP with sort key 2; the stable sort must
        // keep the listing's lexical order.
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(
            root.path(),
            "001",
            "surface_p",
            &["seq2_y_TOP.png", "run2_x_TOP.png"],
        );

        let index = build_case_index(root.path(), "001", "surface_p");
        let sequence = index.sequence("TOP").expect("TOP view");
        let names = sequence
            .iter()
            .map(|frame| frame.source_path.file_name().and_then(|n| n.to_str()).unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["run2_x_TOP.png", "seq2_y_TOP.png"]);
    }

    #[test]
    fn absent_directory_yields_an_empty_index() {
        let root = tempfile::tempdir().expect("tempdir");
        let index = build_case_index(root.path(), "999", "slices_U");
        assert!(index.is_empty());
    }

    #[test]
    fn descriptors_carry_the_original_source_path() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(root.path(), "001", "slices_U", &["flow_slice_U_FRONT_000001.png"]);

        let index = build_case_index(root.path(), "001", "slices_U");
        let frame = &index.sequence("FRONT").expect("FRONT view")[0];
        assert!(frame.source_path.ends_with(
            Path::new("001")
                .join("postProcessing")
                .join("images")
                .join("slices_U")
                .join("flow_slice_U_FRONT_000001.png")
        ));
        assert!(frame.display_raster.is_none());
    }

    #[test]
    fn summary_reports_counts_and_key_ranges() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(
            root.path(),
            "001",
            "slices_U",
            &[
                "flow_slice_U_FRONT_000010.png",
                "flow_slice_U_FRONT_000002.png",
            ],
        );

        let index = build_case_index(root.path(), "001", "slices_U");
        let summary = summarize("001", "slices_U", &index);
        assert_eq!(summary.views.len(), 1);
        assert_eq!(summary.views[0].frames, 2);
        assert_eq!(summary.views[0].first_key, "2");
        assert_eq!(summary.views[0].last_key, "10");
    }
}
