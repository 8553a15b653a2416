use anyhow::{bail, Result};

use crate::dataset::Dataset;
use crate::sync::{self, ResolvedFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    SideBySide,
    Grid,
    Blink,
    Animated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub columns: usize,
    pub rows: usize,
}

/// Column policy shared by the tiled modes: fewer than four tiles read best
/// in two columns, four or more in three.
pub fn grid_shape(tile_count: usize) -> GridShape {
    let columns = if tile_count < 4 { 2 } else { 3 };
    GridShape {
        columns,
        rows: tile_count.max(1).div_ceil(columns),
    }
}

/// The shape handed to the rendering collaborator: already-resolved frames
/// plus a layout hint. No I/O happens here.
#[derive(Debug, Clone)]
pub enum RenderInput<'a> {
    Tiled {
        shape: GridShape,
        tiles: Vec<ResolvedFrame<'a>>,
    },
    Blink {
        frames: [ResolvedFrame<'a>; 2],
        active: usize,
    },
}

pub fn prepare(mode: Mode, resolved: Vec<ResolvedFrame<'_>>, active: usize) -> Result<RenderInput<'_>> {
    match mode {
        Mode::SideBySide | Mode::Grid | Mode::Animated => Ok(RenderInput::Tiled {
            shape: grid_shape(resolved.len()),
            tiles: resolved,
        }),
        Mode::Blink => {
            let frames: [ResolvedFrame; 2] = match <[ResolvedFrame; 2]>::try_from(resolved) {
                Ok(frames) => frames,
                Err(resolved) => bail!(
                    "blink comparison needs exactly two cases, got {}",
                    resolved.len()
                ),
            };
            Ok(RenderInput::Blink {
                frames,
                active: active.min(1),
            })
        }
    }
}

/// Pre-builds the whole animation: one synchronized frame set per timeline
/// position of the master case, so scrubbing later needs no further
/// resolution work.
pub fn prepare_animation<'a>(
    dataset: &'a Dataset,
    case_ids: &'a [String],
    view: &str,
) -> Vec<RenderInput<'a>> {
    let timeline = sync::master_len(dataset, case_ids, view);
    (0..timeline)
        .map(|position| {
            let resolved = sync::resolve(dataset, case_ids, view, position);
            RenderInput::Tiled {
                shape: grid_shape(resolved.len()),
                tiles: resolved,
            }
        })
        .collect()
}
