//! Table export: rasterizes parsed markdown tables to PNG files named
//! `NIP-Table-<unix-ms>.png`.
//!
//! Export is best effort. Failures are logged and never reach the transcript.

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result, bail};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::config::ExportConfig;
use crate::markdown::{Table, extract_tables};

/// Environment variable naming a font file to draw with.
pub const FONT_ENV_VAR: &str = "NIPBOT_FONT";

/// Hangul-capable fonts tried when nothing is configured.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/nanum/NanumGothic.ttf",
    "/usr/share/fonts/nanum/NanumGothic.ttf",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/System/Library/Fonts/AppleSDGothicNeo.ttc",
    "/Library/Fonts/AppleGothic.ttf",
    "C:\\Windows\\Fonts\\malgun.ttf",
];

const OUTER_PADDING: u32 = 20;
const CELL_PADDING_X: u32 = 12;
const CELL_PADDING_Y: u32 = 8;
const FONT_SIZE: f32 = 20.0;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([203, 213, 225]);
const HEADER_FILL: Rgb<u8> = Rgb([239, 246, 255]);
const HEADER_TEXT: Rgb<u8> = Rgb([30, 64, 175]);
const BODY_TEXT: Rgb<u8> = Rgb([30, 41, 59]);

/// File name for a table exported at `unix_millis`.
pub fn export_file_name(unix_millis: i64) -> String {
    format!("NIP-Table-{unix_millis}.png")
}

/// Text measurement used by the layout.
pub trait MeasureText {
    /// Width and height in pixels of `text` on a single line.
    fn measure(&self, text: &str) -> (u32, u32);
}

/// Measures with a loaded font.
pub struct GlyphMeasure<'a> {
    font: &'a FontVec,
    scale: PxScale,
}

impl<'a> GlyphMeasure<'a> {
    pub fn new(font: &'a FontVec) -> Self {
        Self {
            font,
            scale: PxScale::from(FONT_SIZE),
        }
    }
}

impl MeasureText for GlyphMeasure<'_> {
    fn measure(&self, text: &str) -> (u32, u32) {
        text_size(self.scale, self.font, text)
    }
}

/// Pixel geometry of a rasterized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub column_widths: Vec<u32>,
    pub row_height: u32,
    pub rows: usize,
    pub width: u32,
    pub height: u32,
}

impl TableLayout {
    /// Left edge of column `index`.
    fn column_x(&self, index: usize) -> u32 {
        OUTER_PADDING + self.column_widths[..index].iter().sum::<u32>()
    }

    fn row_y(&self, index: usize) -> u32 {
        OUTER_PADDING + self.row_height * u32::try_from(index).unwrap_or(u32::MAX)
    }
}

/// Computes the layout for `rows` (header first, all rows equally wide).
pub fn layout_table(rows: &[Vec<String>], measure: &impl MeasureText) -> Result<TableLayout> {
    let columns = rows.first().map_or(0, Vec::len);
    if columns == 0 {
        bail!("table has no cells");
    }

    let mut column_widths = vec![0u32; columns];
    let mut text_height = FONT_SIZE.ceil() as u32;
    for row in rows {
        for (column, cell) in row.iter().enumerate().take(columns) {
            let (w, h) = measure.measure(cell);
            column_widths[column] = column_widths[column].max(w + 2 * CELL_PADDING_X);
            text_height = text_height.max(h);
        }
    }

    let row_height = text_height + 2 * CELL_PADDING_Y;
    let row_count = u32::try_from(rows.len()).context("too many rows")?;
    Ok(TableLayout {
        width: 2 * OUTER_PADDING + column_widths.iter().sum::<u32>(),
        height: 2 * OUTER_PADDING + row_height * row_count,
        column_widths,
        row_height,
        rows: rows.len(),
    })
}

/// Draws `table` onto a white canvas.
pub fn rasterize_table(table: &Table, font: &FontVec) -> Result<RgbImage> {
    let rows = table.plain_rows();
    let measure = GlyphMeasure::new(font);
    let layout = layout_table(&rows, &measure)?;

    let mut canvas = RgbImage::from_pixel(layout.width, layout.height, BACKGROUND);
    let header_rect = Rect::at(OUTER_PADDING as i32, OUTER_PADDING as i32)
        .of_size(layout.width - 2 * OUTER_PADDING, layout.row_height);
    draw_filled_rect_mut(&mut canvas, header_rect, HEADER_FILL);

    for (row_index, row) in rows.iter().enumerate() {
        let y = layout.row_y(row_index);
        let color = if row_index == 0 { HEADER_TEXT } else { BODY_TEXT };
        for (column, cell) in row.iter().enumerate() {
            let x = layout.column_x(column);
            let cell_rect =
                Rect::at(x as i32, y as i32).of_size(layout.column_widths[column], layout.row_height);
            draw_hollow_rect_mut(&mut canvas, cell_rect, GRID);
            if !cell.is_empty() {
                draw_text_mut(
                    &mut canvas,
                    color,
                    (x + CELL_PADDING_X) as i32,
                    (y + CELL_PADDING_Y) as i32,
                    measure.scale,
                    font,
                    cell,
                );
            }
        }
    }

    Ok(canvas)
}

/// Encodes an RGB image as PNG bytes.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    use image::ImageEncoder as _;
    use image::codecs::png::{CompressionType, FilterType, PngEncoder};

    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Default, FilterType::Adaptive);
    let (w, h) = image.dimensions();
    encoder
        .write_image(image.as_raw(), w, h, image::ExtendedColorType::Rgb8)
        .context("Failed to encode table image")?;
    Ok(buf)
}

/// Picks the font file: config, then `NIPBOT_FONT`, then known system fonts.
pub fn resolve_font_path(config: &ExportConfig) -> Option<PathBuf> {
    resolve_font_path_with(config, |key| std::env::var(key).ok(), Path::exists)
}

fn resolve_font_path_with<E, X>(config: &ExportConfig, env: E, exists: X) -> Option<PathBuf>
where
    E: Fn(&str) -> Option<String>,
    X: Fn(&Path) -> bool,
{
    let explicit = config
        .font_path
        .as_deref()
        .map(str::to_string)
        .or_else(|| env(FONT_ENV_VAR))
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    SYSTEM_FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|candidate| exists(candidate.as_path()))
}

/// Writes table images into an output directory.
pub struct TableExporter {
    font: FontVec,
    output_dir: PathBuf,
}

impl TableExporter {
    pub fn new(font: FontVec, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            font,
            output_dir: output_dir.into(),
        }
    }

    /// Loads the configured font.
    ///
    /// # Errors
    /// Returns an error if no font is found or the file is not a usable font.
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        let Some(font_path) = resolve_font_path(config) else {
            bail!(
                "No Hangul-capable font found; set export.font_path in config.toml or {FONT_ENV_VAR}"
            );
        };
        let data = fs::read(&font_path)
            .with_context(|| format!("Failed to read font {}", font_path.display()))?;
        let font = FontVec::try_from_vec(data)
            .with_context(|| format!("Invalid font file {}", font_path.display()))?;
        tracing::debug!(font = %font_path.display(), "loaded export font");
        Ok(Self::new(font, config.effective_output_dir()))
    }

    /// Rasterizes `table` and writes it to a fresh `NIP-Table-*.png`.
    pub fn export(&self, table: &Table) -> Result<PathBuf> {
        let image = rasterize_table(table, &self.font)?;
        let png = encode_png(&image)?;

        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create directory {}", self.output_dir.display())
        })?;
        let path = next_free_path(&self.output_dir, chrono::Utc::now().timestamp_millis());
        fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "exported table image");
        Ok(path)
    }

    /// Exports every table, logging and skipping failures.
    pub fn export_all(&self, tables: &[Table]) -> Vec<PathBuf> {
        tables
            .iter()
            .filter_map(|table| match self.export(table) {
                Ok(path) => Some(path),
                Err(err) => {
                    tracing::error!(error = %format!("{err:#}"), "table export failed");
                    None
                }
            })
            .collect()
    }
}

// Tables exported within the same millisecond get the next free stamp.
fn next_free_path(dir: &Path, mut millis: i64) -> PathBuf {
    loop {
        let path = dir.join(export_file_name(millis));
        if !path.exists() {
            return path;
        }
        millis += 1;
    }
}

/// Exports every table found in `markdown`. Returns the written files;
/// failures are logged only.
pub fn export_tables(markdown: &str, config: &ExportConfig) -> Vec<PathBuf> {
    let tables = extract_tables(markdown);
    if tables.is_empty() {
        return Vec::new();
    }
    match TableExporter::from_config(config) {
        Ok(exporter) => exporter.export_all(&tables),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "table export unavailable");
            Vec::new()
        }
    }
}
