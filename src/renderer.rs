use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use crate::layout::{GridShape, RenderInput};
use crate::sync::ResolvedFrame;

const BACKGROUND: Rgba<u8> = Rgba([14, 17, 23, 255]);
const FALLBACK_CELL: (u32, u32) = (320, 240);

/// Composites one comparison sheet. Every tile gets an equal cell; rasters
/// are scaled to fit and centered, and a case with no frame for the view
/// keeps its slot as a dark placeholder tile.
pub fn render_sheet(input: &RenderInput<'_>) -> RgbaImage {
    match input {
        RenderInput::Tiled { shape, tiles } => render_tiled(*shape, tiles),
        RenderInput::Blink { frames, active } => {
            let pair = render_blink(frames);
            let [first, second] = pair;
            if *active == 0 {
                first
            } else {
                second
            }
        }
    }
}

/// Blink output: both rasters letterboxed into a common cell so the pair
/// can be flicked between without any spatial jump.
pub fn render_blink(frames: &[ResolvedFrame<'_>; 2]) -> [RgbaImage; 2] {
    let (cell_width, cell_height) = cell_size(frames.iter());
    let render_one = |slot: &ResolvedFrame<'_>| {
        let mut sheet = RgbaImage::from_pixel(cell_width, cell_height, BACKGROUND);
        if let Some(raster) = slot.frame.and_then(|frame| frame.display_raster.as_ref()) {
            blit_fitted(&mut sheet, raster, 0, 0, cell_width, cell_height);
        }
        sheet
    };
    [render_one(&frames[0]), render_one(&frames[1])]
}

pub fn animation_frame_name(position: usize) -> String {
    format!("frame_{position:06}.png")
}

pub fn save_sheet(path: &Path, sheet: &RgbaImage) -> Result<()> {
    sheet
        .save(path)
        .with_context(|| format!("failed to save sheet: {}", path.display()))
}

fn render_tiled(shape: GridShape, tiles: &[ResolvedFrame<'_>]) -> RgbaImage {
    let (cell_width, cell_height) = cell_size(tiles.iter());
    let sheet_width = cell_width * shape.columns.max(1) as u32;
    let sheet_height = cell_height * shape.rows.max(1) as u32;
    let mut sheet = RgbaImage::from_pixel(sheet_width, sheet_height, BACKGROUND);

    for (index, tile) in tiles.iter().enumerate() {
        let Some(raster) = tile.frame.and_then(|frame| frame.display_raster.as_ref()) else {
            continue;
        };
        let column = (index % shape.columns.max(1)) as u32;
        let row = (index / shape.columns.max(1)) as u32;
        blit_fitted(
            &mut sheet,
            raster,
            column * cell_width,
            row * cell_height,
            cell_width,
            cell_height,
        );
    }

    sheet
}

fn cell_size<'a, 'f: 'a>(tiles: impl Iterator<Item = &'a ResolvedFrame<'f>>) -> (u32, u32) {
    let mut width = 0;
    let mut height = 0;
    for tile in tiles {
        if let Some(raster) = tile.frame.and_then(|frame| frame.display_raster.as_ref()) {
            width = width.max(raster.width());
            height = height.max(raster.height());
        }
    }
    if width == 0 || height == 0 {
        FALLBACK_CELL
    } else {
        (width, height)
    }
}

// Nearest-neighbour blit, scaled to fit the cell and centered. Display
// rasters are already downsampled to the display budget, so a resampling
// filter buys nothing here.
fn blit_fitted(
    sheet: &mut RgbaImage,
    raster: &RgbaImage,
    cell_x: u32,
    cell_y: u32,
    cell_width: u32,
    cell_height: u32,
) {
    let source_width = raster.width().max(1);
    let source_height = raster.height().max(1);

    let scale = (cell_width as f32 / source_width as f32)
        .min(cell_height as f32 / source_height as f32);
    let draw_width = ((source_width as f32 * scale).round() as u32).clamp(1, cell_width);
    let draw_height = ((source_height as f32 * scale).round() as u32).clamp(1, cell_height);

    let base_x = cell_x + (cell_width - draw_width) / 2;
    let base_y = cell_y + (cell_height - draw_height) / 2;

    for y in 0..draw_height {
        let source_y = ((y as u64 * source_height as u64) / draw_height as u64) as u32;
        let source_y = source_y.min(source_height - 1);
        for x in 0..draw_width {
            let source_x = ((x as u64 * source_width as u64) / draw_width as u64) as u32;
            let source_x = source_x.min(source_width - 1);
            sheet.put_pixel(base_x + x, base_y + y, *raster.get_pixel(source_x, source_y));
        }
    }
}
