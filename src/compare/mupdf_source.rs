//! MuPDF-backed page text and page rendering

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::debug;
use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, Page, Pixmap, TextPageFlags};

use super::extract::{FontSpec, PageSource, PageText, TextRun};
use super::operation::DocumentInput;
use super::preview::PageRenderer;
use super::types::{PagePreview, PageSize};
use crate::error::{CompareError, Result};

/// An open PDF read through MuPDF
pub struct MupdfSource {
    doc: Document,
    page_count: usize,
}

impl MupdfSource {
    pub fn open(path: &Path) -> Result<Self> {
        let doc = Document::open(path.to_string_lossy().as_ref())?;
        let page_count = usize::try_from(doc.page_count()?).unwrap_or(0);
        debug!("Opened {} ({page_count} pages)", path.display());
        Ok(Self { doc, page_count })
    }

    fn load(&self, index: usize) -> Result<Page> {
        let index = i32::try_from(index).map_err(|_| CompareError::extraction("page index overflow"))?;
        Ok(self.doc.load_page(index)?)
    }
}

impl PageSource for MupdfSource {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_text(&self, index: usize) -> Result<PageText> {
        let page = self.load(index)?;
        let bounds = page.bounds()?;
        let size = PageSize {
            width: bounds.x1 - bounds.x0,
            height: bounds.y1 - bounds.y0,
        };
        let text_page = page.to_text_page(TextPageFlags::empty())?;

        let mut runs = Vec::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            let lines: Vec<_> = block.lines().collect();
            let last = lines.len().saturating_sub(1);
            for (i, line) in lines.iter().enumerate() {
                let glyphs: Vec<Glyph> = line
                    .chars()
                    .filter_map(|ch| {
                        ch.char().map(|c| Glyph {
                            ch: c,
                            origin: (ch.origin().x - bounds.x0, ch.origin().y - bounds.y0),
                            size: ch.size(),
                        })
                    })
                    .collect();
                let line_end = line.bounds().x1 - bounds.x0;
                if let Some(mut run) = line_run(&glyphs, line_end) {
                    run.hard_break = i == last;
                    runs.push(run);
                }
            }
        }

        Ok(PageText { size, runs })
    }
}

#[derive(Clone, Copy, Debug)]
struct Glyph {
    ch: char,
    origin: (f32, f32),
    size: f32,
}

/// Build a run from the glyphs of one line; advances come from the
/// distance between successive origins
fn line_run(glyphs: &[Glyph], line_end_x: f32) -> Option<TextRun> {
    let first = glyphs.first()?;
    let last = glyphs.last()?;
    let font_size = glyphs
        .iter()
        .map(|g| g.size)
        .filter(|s| s.is_finite() && *s > 0.0)
        .fold(0.0f32, f32::max);
    if font_size <= 0.0 {
        return None;
    }

    let span = (last.origin.0 - first.origin.0, last.origin.1 - first.origin.1);
    let span_len = span.0.hypot(span.1);
    let direction = if span_len > 1e-3 {
        (span.0 / span_len, span.1 / span_len)
    } else {
        (1.0, 0.0)
    };

    let mut advances: Vec<f32> = glyphs
        .windows(2)
        .map(|pair| {
            let dx = pair[1].origin.0 - pair[0].origin.0;
            let dy = pair[1].origin.1 - pair[0].origin.1;
            dx * direction.0 + dy * direction.1
        })
        .collect();
    let known: Vec<f32> = advances.iter().copied().filter(|a| *a > 0.0).collect();
    let mean = if known.is_empty() {
        font_size * 0.5
    } else {
        known.iter().sum::<f32>() / known.len() as f32
    };
    let tail = if direction.1.abs() < 0.01 && line_end_x > last.origin.0 {
        line_end_x - last.origin.0
    } else {
        mean
    };
    advances.push(tail);

    let width: f32 = advances.iter().filter(|a| **a > 0.0).sum();
    Some(TextRun {
        text: glyphs.iter().map(|g| g.ch).collect(),
        origin: first.origin,
        direction,
        width,
        height: font_size,
        font: FontSpec {
            size: font_size,
            ..FontSpec::default()
        },
        hard_break: false,
        advances: Some(advances),
    })
}

/// A PDF on disk, opened fresh on whichever thread extracts it
#[derive(Clone, Debug)]
pub struct PdfFile {
    path: PathBuf,
    name: String,
}

impl PdfFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self { path, name }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentInput for PdfFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn PageSource + '_>> {
        Ok(Box::new(MupdfSource::open(&self.path)?))
    }
}

/// Renders PDF pages to PNG files
pub struct MupdfRenderer {
    source: MupdfSource,
    scale: f32,
}

impl MupdfRenderer {
    pub fn open(path: &Path, scale: f32) -> Result<Self> {
        Ok(Self {
            source: MupdfSource::open(path)?,
            scale: if scale.is_finite() && scale > 0.0 { scale } else { 1.0 },
        })
    }
}

impl PageRenderer for MupdfRenderer {
    fn page_count(&self) -> usize {
        self.source.page_count
    }

    fn render(&mut self, page_number: usize, dir: &Path) -> Result<PagePreview> {
        let page = self.source.load(page_number.saturating_sub(1))?;
        let rgb = Colorspace::device_rgb();
        let pixmap = page.to_pixmap(&Matrix::new_scale(self.scale, self.scale), &rgb, false, false)?;
        let path = dir.join(format!("page-{page_number}.png"));
        write_png(&pixmap, &path)?;
        Ok(PagePreview {
            page_number,
            width: pixmap.width() as f32,
            height: pixmap.height() as f32,
            url: path.display().to_string(),
            // bounds are already in the displayed orientation
            rotation: 0,
        })
    }
}

fn write_png(pixmap: &Pixmap, path: &Path) -> Result<()> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(CompareError::extraction(format!("unsupported pixmap with {n} channels")));
    }
    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(CompareError::extraction("pixmap buffer size mismatch"));
    }

    let mut rgb = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row = &samples[y * stride..y * stride + row_bytes];
        if n == 3 {
            rgb.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                rgb.extend_from_slice(&px[..3]);
            }
        }
    }

    let writer = BufWriter::new(File::create(path)?);
    let mut encoder = png::Encoder::new(writer, pixmap.width(), pixmap.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&rgb)?;
    Ok(())
}
