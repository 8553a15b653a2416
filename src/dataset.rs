use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;

use crate::codec;
use crate::index::{self, CaseIndex};

pub const DEFAULT_MAX_DISPLAY_WIDTH: u32 = 1200;
const DEFAULT_CACHE_CAPACITY: usize = 4;

/// The inputs one load operation is keyed on. Any change to any field means
/// a different dataset; datasets are never patched in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub base_path: PathBuf,
    pub case_ids: Vec<String>,
    pub variable: String,
    pub max_display_width: u32,
}

#[derive(Debug, Default)]
pub struct Dataset {
    cases: BTreeMap<String, CaseIndex>,
    dropped_frames: usize,
}

impl Dataset {
    pub fn case(&self, case_id: &str) -> Option<&CaseIndex> {
        self.cases.get(case_id)
    }

    pub fn dropped_frames(&self) -> usize {
        self.dropped_frames
    }

    pub fn is_empty(&self) -> bool {
        self.cases.values().all(CaseIndex::is_empty)
    }
}

/// Indexes every selected case without touching pixel data. Used by the
/// listing commands and by export, where only paths and ordering matter.
pub fn assemble_metadata_only(selection: &Selection) -> Dataset {
    let mut cases = BTreeMap::new();
    for case_id in &selection.case_ids {
        cases.insert(
            case_id.clone(),
            index::build_case_index(&selection.base_path, case_id, &selection.variable),
        );
    }
    Dataset {
        cases,
        dropped_frames: 0,
    }
}

/// Indexes and materializes display rasters for every selected case. Cases
/// are independent, so materialization runs on one worker per stripe of the
/// case list. A frame whose decode fails is dropped from its sequence and
/// counted; one bad asset never aborts the rest of the load.
pub fn assemble(selection: &Selection) -> Dataset {
    let case_count = selection.case_ids.len();
    if case_count == 0 {
        return Dataset::default();
    }

    let worker_count = assembly_worker_count(case_count);
    let slots: Mutex<Vec<Option<(CaseIndex, usize)>>> =
        Mutex::new((0..case_count).map(|_| None).collect());

    thread::scope(|scope| {
        for worker_id in 0..worker_count {
            let slots = &slots;
            scope.spawn(move || {
                for case_position in (worker_id..case_count).step_by(worker_count) {
                    let case_id = &selection.case_ids[case_position];
                    let mut case_index = index::build_case_index(
                        &selection.base_path,
                        case_id,
                        &selection.variable,
                    );
                    let dropped =
                        materialize_case(&mut case_index, selection.max_display_width);
                    if let Ok(mut guard) = slots.lock() {
                        guard[case_position] = Some((case_index, dropped));
                    }
                }
            });
        }
    });

    let slots = slots
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let mut cases = BTreeMap::new();
    let mut dropped_frames = 0;
    for (position, slot) in slots.into_iter().enumerate() {
        let Some((case_index, dropped)) = slot else {
            continue;
        };
        cases.insert(selection.case_ids[position].clone(), case_index);
        dropped_frames += dropped;
    }

    if dropped_frames > 0 {
        log::warn!("dataset assembly dropped {dropped_frames} unreadable frame(s)");
    }

    Dataset {
        cases,
        dropped_frames,
    }
}

fn materialize_case(case_index: &mut CaseIndex, max_width: u32) -> usize {
    let mut dropped = 0;
    for sequence in case_index.sequences_mut() {
        sequence.retain_mut(|frame| match codec::decode_and_resize(&frame.source_path, max_width) {
            Ok(raster) => {
                frame.display_raster = Some(raster);
                true
            }
            Err(error) => {
                log::warn!("{error}; frame dropped");
                dropped += 1;
                false
            }
        });
    }
    // A view whose every frame failed to decode must not survive as an
    // empty sequence.
    case_index.prune_empty_views();
    dropped
}

fn assembly_worker_count(case_count: usize) -> usize {
    let auto_workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .clamp(1, 4);

    let configured = configured_assembly_workers().unwrap_or(auto_workers);
    configured.clamp(1, 16).min(case_count.max(1))
}

fn configured_assembly_workers() -> Option<usize> {
    static CONFIG: OnceLock<Option<usize>> = OnceLock::new();

    *CONFIG.get_or_init(|| {
        let raw = std::env::var("CASEVIEW_ASSEMBLY_WORKERS").ok()?;
        let value = raw.trim().parse::<usize>().ok()?;
        if value == 0 {
            return None;
        }
        Some(value)
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    base_path: PathBuf,
    case_ids: Vec<String>,
    variable: String,
    max_display_width: u32,
}

impl CacheKey {
    fn for_selection(selection: &Selection) -> Self {
        let mut case_ids = selection.case_ids.clone();
        case_ids.sort();
        case_ids.dedup();

        CacheKey {
            base_path: normalize_base(&selection.base_path),
            case_ids,
            variable: selection.variable.clone(),
            max_display_width: selection.max_display_width,
        }
    }
}

fn normalize_base(base: &Path) -> PathBuf {
    base.canonicalize().unwrap_or_else(|_| base.to_path_buf())
}

/// Bounded most-recently-used store of assembled datasets. Materialization
/// (decode + resample) dominates load time, so an unchanged selection must
/// never re-scan the filesystem.
#[derive(Debug)]
pub struct DatasetCache {
    entries: Vec<(CacheKey, Arc<Dataset>)>,
    capacity: usize,
}

impl DatasetCache {
    pub fn new(capacity: usize) -> Self {
        DatasetCache {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_or_assemble(&mut self, selection: &Selection) -> Arc<Dataset> {
        let key = CacheKey::for_selection(selection);

        if let Some(position) = self.entries.iter().position(|(entry_key, _)| *entry_key == key) {
            let entry = self.entries.remove(position);
            let dataset = Arc::clone(&entry.1);
            self.entries.push(entry);
            log::debug!("dataset cache hit for variable {}", selection.variable);
            return dataset;
        }

        let dataset = Arc::new(assemble(selection));
        if self.entries.len() >= self.capacity {
            self.entries.remove(0);
        }
        self.entries.push((key, Arc::clone(&dataset)));
        dataset
    }
}

/// Explicit request-scoped load state: which selection is current, whether a
/// dataset is loaded at all, and a version that bumps on every effective
/// selection change. Replacement is atomic; readers holding the previous
/// `Arc` keep a coherent dataset.
#[derive(Debug)]
pub struct Session {
    cache: DatasetCache,
    current: Option<(CacheKey, Arc<Dataset>)>,
    version: u64,
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            cache: DatasetCache::new(DEFAULT_CACHE_CAPACITY),
            current: None,
            version: 0,
        }
    }

    pub fn load(&mut self, selection: &Selection) -> Arc<Dataset> {
        let key = CacheKey::for_selection(selection);
        let changed = self
            .current
            .as_ref()
            .map(|(current_key, _)| *current_key != key)
            .unwrap_or(true);

        let dataset = self.cache.get_or_assemble(selection);
        if changed {
            self.version += 1;
            self.current = Some((key, Arc::clone(&dataset)));
        }
        dataset
    }

    pub fn loaded(&self) -> bool {
        self.current.is_some()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn dataset(&self) -> Option<Arc<Dataset>> {
        self.current.as_ref().map(|(_, dataset)| Arc::clone(dataset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan;
    use image::RgbaImage;
    use std::fs;

    fn write_png(path: &Path, width: u32, height: u32) {
        let raster = RgbaImage::from_pixel(width, height, image::Rgba([40, 90, 160, 255]));
        raster.save(path).expect("fixture png should save");
    }

    fn fixture_case(root: &Path, case_id: &str, variable: &str, files: &[&str]) {
        let dir = scan::images_dir(root, case_id, variable);
        fs::create_dir_all(&dir).expect("fixture dirs");
        for file in files {
            write_png(&dir.join(file), 64, 32);
        }
    }

    fn selection(root: &Path, case_ids: &[&str]) -> Selection {
        Selection {
            base_path: root.to_path_buf(),
            case_ids: case_ids.iter().map(|id| id.to_string()).collect(),
            variable: "slices_U".to_string(),
            max_display_width: 48,
        }
    }

    #[test]
    fn assembly_materializes_display_rasters() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(root.path(), "001", "slices_U", &["s_U_x_FRONT_000001.png"]);

        let dataset = assemble(&selection(root.path(), &["001"]));
        let frame = &dataset
            .case("001")
            .and_then(|case| case.sequence("FRONT"))
            .expect("FRONT sequence")[0];
        let raster = frame.display_raster.as_ref().expect("materialized raster");
        assert_eq!(raster.width(), 48);
        assert_eq!(dataset.dropped_frames(), 0);
    }

    #[test]
    fn metadata_only_assembly_leaves_rasters_unset() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(root.path(), "001", "slices_U", &["s_U_x_FRONT_000001.png"]);

        let dataset = assemble_metadata_only(&selection(root.path(), &["001"]));
        let frame = &dataset
            .case("001")
            .and_then(|case| case.sequence("FRONT"))
            .expect("FRONT sequence")[0];
        assert!(frame.display_raster.is_none());
    }

    #[test]
    fn corrupt_frames_are_dropped_not_fatal() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(root.path(), "001", "slices_U", &["s_U_x_FRONT_000001.png"]);
        let dir = scan::images_dir(root.path(), "001", "slices_U");
        fs::write(dir.join("s_U_x_FRONT_000002.png"), b"not a png").expect("corrupt file");

        let dataset = assemble(&selection(root.path(), &["001"]));
        assert_eq!(dataset.dropped_frames(), 1);
        let sequence = dataset
            .case("001")
            .and_then(|case| case.sequence("FRONT"))
            .expect("FRONT sequence");
        assert_eq!(sequence.len(), 1);
    }

    #[test]
    fn a_view_of_only_corrupt_frames_disappears() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(root.path(), "001", "slices_U", &["s_U_x_FRONT_000001.png"]);
        let dir = scan::images_dir(root.path(), "001", "slices_U");
        fs::write(dir.join("s_U_x_TOP_000001.png"), b"not a png").expect("corrupt file");

        let dataset = assemble(&selection(root.path(), &["001"]));
        let case = dataset.case("001").expect("case index");
        assert!(case.contains_view("FRONT"));
        assert!(!case.contains_view("TOP"));
    }

    #[test]
    fn assembly_is_idempotent_for_unchanged_inputs() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(
            root.path(),
            "001",
            "slices_U",
            &["s_U_x_FRONT_000002.png", "s_U_x_FRONT_000001.png"],
        );

        let first = assemble(&selection(root.path(), &["001"]));
        let second = assemble(&selection(root.path(), &["001"]));

        let paths = |dataset: &Dataset| {
            dataset
                .case("001")
                .and_then(|case| case.sequence("FRONT"))
                .expect("FRONT sequence")
                .iter()
                .map(|frame| frame.source_path.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(paths(&first), paths(&second));
    }

    #[test]
    fn cache_returns_the_same_dataset_for_the_same_selection() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(root.path(), "001", "slices_U", &["s_U_x_FRONT_000001.png"]);

        let mut cache = DatasetCache::new(2);
        let first = cache.get_or_assemble(&selection(root.path(), &["001"]));
        let second = cache.get_or_assemble(&selection(root.path(), &["001"]));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_key_ignores_case_order() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(root.path(), "001", "slices_U", &["s_U_x_FRONT_000001.png"]);
        fixture_case(root.path(), "002", "slices_U", &["s_U_x_FRONT_000001.png"]);

        let mut cache = DatasetCache::new(2);
        let first = cache.get_or_assemble(&selection(root.path(), &["001", "002"]));
        let second = cache.get_or_assemble(&selection(root.path(), &["002", "001"]));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn cache_evicts_least_recently_used_entry() {
        let root = tempfile::tempdir().expect("tempdir");
        for case_id in ["001", "002", "003"] {
            fixture_case(root.path(), case_id, "slices_U", &["s_U_x_FRONT_000001.png"]);
        }

        let mut cache = DatasetCache::new(2);
        let first = cache.get_or_assemble(&selection(root.path(), &["001"]));
        cache.get_or_assemble(&selection(root.path(), &["002"]));
        // Touch 001 so 002 becomes the eviction candidate.
        cache.get_or_assemble(&selection(root.path(), &["001"]));
        cache.get_or_assemble(&selection(root.path(), &["003"]));

        assert_eq!(cache.len(), 2);
        let retained = cache.get_or_assemble(&selection(root.path(), &["001"]));
        assert!(Arc::ptr_eq(&first, &retained));
    }

    #[test]
    fn session_version_bumps_only_on_selection_change() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(root.path(), "001", "slices_U", &["s_U_x_FRONT_000001.png"]);
        fixture_case(root.path(), "002", "slices_U", &["s_U_x_FRONT_000001.png"]);

        let mut session = Session::new();
        assert!(!session.loaded());

        let loaded = session.load(&selection(root.path(), &["001"]));
        assert!(session.loaded());
        assert_eq!(session.version(), 1);
        let current = session.dataset().expect("current dataset");
        assert!(Arc::ptr_eq(&loaded, &current));

        session.load(&selection(root.path(), &["001"]));
        assert_eq!(session.version(), 1);

        session.load(&selection(root.path(), &["001", "002"]));
        assert_eq!(session.version(), 2);
    }

    #[test]
    fn missing_case_directory_still_loads_the_rest() {
        let root = tempfile::tempdir().expect("tempdir");
        fixture_case(root.path(), "001", "slices_U", &["s_U_x_FRONT_000001.png"]);

        let dataset = assemble(&selection(root.path(), &["001", "404"]));
        assert!(dataset.case("001").is_some_and(|case| !case.is_empty()));
        assert!(dataset.case("404").is_some_and(CaseIndex::is_empty));
    }
}
