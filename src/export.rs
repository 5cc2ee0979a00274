//! Snapshot export of rendered slides.
//!
//! Every export clones each `.slide-editor` into a standalone snapshot, waits for
//! fonts, then drains an ordered task list: one blocking rasterization at a time,
//! each awaited before the next starts. The results are packaged as a zip of PNG
//! images or as a multi-page PDF.

use std::collections::VecDeque;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::css::{self, Rgb, StyleMap};
use crate::dom::{Document, NodeId};
use crate::fonts::FontBook;
use crate::preview::{Preview, TOOLBAR_CLASS};
use crate::rendering::layout::LayoutOptions;
use crate::rendering::{render_slide, Screenshot};
use crate::{Error, Result, ToolConfig, Viewport};

pub const ARCHIVE_NAME: &str = "slides.zip";
pub const PDF_NAME: &str = "slides.pdf";

/// Archive entry name for the 0-based slide `index`.
pub fn image_name(index: usize) -> String {
    format!("slide-{:02}.png", index + 1)
}

/// Zip archive of one PNG per slide
#[derive(Debug, Clone)]
pub struct ImageArchive {
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
    pub entries: Vec<String>,
}

/// One PDF page per slide
#[derive(Debug, Clone)]
pub struct PdfExport {
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// A standalone copy of one slide, ready to rasterize off the editing thread.
#[derive(Debug, Clone)]
pub struct SnapshotTask {
    pub index: usize,
    doc: Document,
    root: NodeId,
}

impl SnapshotTask {
    /// Clone `editor` out of the preview and neutralize editor-only state. The
    /// copy is pinned to the `viewport` canvas.
    pub fn capture(preview: &Preview, index: usize, editor: NodeId, viewport: Viewport) -> Self {
        let mut doc = Document::new();
        let root = doc.import(preview.document(), editor);
        let doc_root = doc.root();
        doc.append_child(doc_root, root);

        for toolbar in doc.elements_with_class(root, TOOLBAR_CLASS) {
            doc.detach(toolbar);
        }
        doc.set_attr(root, "contenteditable", "false");
        doc.merge_style(
            root,
            &StyleMap::parse(&format!(
                "transform: none; width: {}px; min-height: {}px",
                viewport.width, viewport.height
            )),
        );
        Self { index, doc, root }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn render(&self, options: &LayoutOptions, background: Rgb) -> Result<Screenshot> {
        render_slide(&self.doc, self.root, options, background)
    }
}

/// Clears the in-flight flag when an export finishes or is dropped.
struct ExportGuard(Arc<AtomicBool>);

impl Drop for ExportGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Exports preview slides to images or PDF.
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    config: ToolConfig,
    fonts: FontBook,
    busy: Arc<AtomicBool>,
}

impl ExportPipeline {
    pub fn new(config: ToolConfig) -> Self {
        Self::with_fonts(config, FontBook::builtin())
    }

    pub fn with_fonts(config: ToolConfig, fonts: FontBook) -> Self {
        Self {
            config,
            fonts,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<ExportGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::ExportInProgress)?;
        Ok(ExportGuard(self.busy.clone()))
    }

    /// Device-pixel layout options for the configured canvas.
    pub fn layout_options(&self, preview: &Preview) -> LayoutOptions {
        let ss = self.config.supersample.max(1);
        let params = preview.params();
        LayoutOptions {
            width: self.config.viewport.width * ss,
            height: self.config.viewport.height * ss,
            scale: ss as f32,
            font_scale: params.font_scale,
            density: params.density,
            ..LayoutOptions::default()
        }
    }

    /// Snapshot every slide in display order.
    pub async fn snapshot(&self, preview: &Preview) -> Result<Vec<Screenshot>> {
        if preview.is_empty() {
            return Err(Error::ExportError("no slides rendered".into()));
        }
        self.fonts.ready().await;

        let options = self.layout_options(preview);
        let viewport = self.config.viewport;
        let background = css::parse_color(&self.config.background).unwrap_or(Rgb::WHITE);
        let mut queue: VecDeque<SnapshotTask> = preview
            .editors()
            .iter()
            .enumerate()
            .map(|(i, editor)| SnapshotTask::capture(preview, i, *editor, viewport))
            .collect();

        let mut shots = Vec::with_capacity(queue.len());
        while let Some(task) = queue.pop_front() {
            debug!("rasterizing slide {}", task.index + 1);
            let shot =
                tokio::task::spawn_blocking(move || task.render(&options, background)).await??;
            shots.push(shot);
        }
        Ok(shots)
    }

    /// Export every slide as a PNG entry of [`ARCHIVE_NAME`].
    pub async fn export_images(&self, preview: &Preview) -> Result<ImageArchive> {
        let _guard = self.begin()?;
        let shots = self.snapshot(preview).await?;
        let archive = tokio::task::spawn_blocking(move || build_archive(&shots)).await??;
        info!(
            "exported {} slide image(s) into {}",
            archive.entries.len(),
            archive.file_name
        );
        Ok(archive)
    }

    /// Export every slide as one page of [`PDF_NAME`].
    pub async fn export_pdf(&self, preview: &Preview) -> Result<PdfExport> {
        let _guard = self.begin()?;
        let shots = self.snapshot(preview).await?;
        let viewport = self.config.viewport;
        let ss = self.config.supersample.max(1);
        let pdf =
            tokio::task::spawn_blocking(move || build_pdf(&shots, viewport, ss)).await??;
        info!("exported {} PDF page(s) into {}", pdf.page_count, pdf.file_name);
        Ok(pdf)
    }
}

fn build_archive(shots: &[Screenshot]) -> Result<ImageArchive> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let mut entries = Vec::with_capacity(shots.len());
    for (i, shot) in shots.iter().enumerate() {
        let name = image_name(i);
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&shot.png_data)?;
        entries.push(name);
    }
    let bytes = zip.finish()?.into_inner();
    Ok(ImageArchive {
        file_name: ARCHIVE_NAME,
        bytes,
        entries,
    })
}

fn px_to_mm(px: u32) -> printpdf::Mm {
    printpdf::Mm(px as f32 * 25.4 / 96.0)
}

fn raw_image(shot: &Screenshot) -> printpdf::RawImage {
    printpdf::RawImage {
        pixels: printpdf::RawImageData::U8(shot.rgb_pixels()),
        width: shot.width as usize,
        height: shot.height as usize,
        data_format: printpdf::RawImageFormat::RGB8,
        tag: Vec::new(),
    }
}

/// One viewport-sized page per image, in the given order.
fn pdf_pages(
    images: &[printpdf::XObjectId],
    viewport: Viewport,
    supersample: u32,
) -> Vec<printpdf::PdfPage> {
    use printpdf::{Op, PdfPage, XObjectTransform};

    images
        .iter()
        .map(|id| {
            // Placing the image at 96 dpi per supersample step maps it onto the page.
            let ops = vec![Op::UseXobject {
                id: id.clone(),
                transform: XObjectTransform {
                    dpi: Some(96.0 * supersample as f32),
                    ..Default::default()
                },
            }];
            PdfPage::new(px_to_mm(viewport.width), px_to_mm(viewport.height), ops)
        })
        .collect()
}

fn build_pdf(shots: &[Screenshot], viewport: Viewport, supersample: u32) -> Result<PdfExport> {
    use printpdf::{PdfDocument, PdfSaveOptions};

    let mut doc = PdfDocument::new("Slides");
    let images: Vec<_> = shots.iter().map(|shot| doc.add_image(&raw_image(shot))).collect();
    let pages = pdf_pages(&images, viewport, supersample);
    let page_count = pages.len();
    let mut warnings = Vec::new();
    let bytes = doc
        .with_pages(pages)
        .save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        debug!("pdf writer reported {} warning(s)", warnings.len());
    }
    if bytes.is_empty() {
        return Err(Error::ExportError("pdf writer produced no output".into()));
    }
    Ok(PdfExport {
        file_name: PDF_NAME,
        bytes,
        page_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract_slides, ExtractOptions};
    use crate::selection::{Boundary, Range};
    use crate::DisplayParams;

    fn preview_of(raw: &str) -> Preview {
        let ex = extract_slides(raw, &ExtractOptions::default()).unwrap();
        let mut p = Preview::new(DisplayParams::default());
        p.render(&ex.slides);
        p
    }

    fn small_config() -> ToolConfig {
        ToolConfig {
            viewport: crate::Viewport {
                width: 160,
                height: 90,
            },
            supersample: 1,
            ..ToolConfig::default()
        }
    }

    #[test]
    fn image_names_are_zero_padded() {
        assert_eq!(image_name(0), "slide-01.png");
        assert_eq!(image_name(9), "slide-10.png");
        assert_eq!(image_name(119), "slide-120.png");
    }

    #[test]
    fn snapshot_strips_editor_state() {
        let mut p = preview_of(r#"<div class="slide" style="transform: scale(0.5)">A</div>"#);
        let text = p.document().children(p.editors()[0])[0];
        p.show_toolbar(&Range::caret(Boundary::new(text, 0), p.generation()));
        let task = SnapshotTask::capture(&p, 0, p.editors()[0], Viewport::default());
        let html = task.document().to_html(task.root());
        assert!(!html.contains(TOOLBAR_CLASS));
        assert!(html.contains(r#"contenteditable="false""#));
        assert!(html.contains("transform: none; width: 1280px; min-height: 720px"));
        // The live preview is untouched.
        assert_eq!(p.document().attr(p.editors()[0], "contenteditable"), Some("true"));
    }

    #[test]
    fn snapshot_takes_canvas_size_from_viewport() {
        let p = preview_of(r#"<div class="slide">A</div>"#);
        let viewport = Viewport {
            width: 1920,
            height: 1080,
        };
        let task = SnapshotTask::capture(&p, 0, p.editors()[0], viewport);
        let style = task.document().style(task.root());
        assert_eq!(style.get("width"), Some("1920px"));
        assert_eq!(style.get("min-height"), Some("1080px"));
        assert_eq!(style.get("transform"), Some("none"));
    }

    #[tokio::test]
    async fn empty_preview_is_rejected() {
        let p = Preview::new(DisplayParams::default());
        let pipeline = ExportPipeline::new(small_config());
        assert!(matches!(
            pipeline.export_images(&p).await,
            Err(Error::ExportError(_))
        ));
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn concurrent_export_is_rejected() {
        let p = preview_of(r#"<div class="slide">A</div>"#);
        let (book, loader) = FontBook::pending();
        let pipeline = ExportPipeline::with_fonts(small_config(), book);

        let (pipeline_ref, preview_ref) = (&pipeline, &p);
        let first = pipeline.export_images(&p);
        let second = async move {
            tokio::task::yield_now().await;
            let rejected = pipeline_ref.export_pdf(preview_ref).await;
            loader.finish();
            rejected
        };
        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.unwrap().entries, vec!["slide-01.png"]);
        assert!(matches!(second, Err(Error::ExportInProgress)));
        assert!(!pipeline.is_busy());
    }

    #[tokio::test]
    async fn pdf_has_one_page_per_slide() {
        let p = preview_of(
            r#"<div class="slide">A</div><div class="slide">B</div><div class="slide">C</div>"#,
        );
        let pdf = ExportPipeline::new(small_config())
            .export_pdf(&p)
            .await
            .unwrap();
        assert_eq!(pdf.page_count, 3);
        assert_eq!(pdf.file_name, "slides.pdf");
        assert!(pdf.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn pdf_pages_follow_viewport_and_image_order() {
        let images: Vec<printpdf::XObjectId> =
            (0..3).map(|_| printpdf::XObjectId::new()).collect();
        let pages = pdf_pages(&images, Viewport::default(), 2);
        assert_eq!(pages.len(), 3);
        for (page, image) in pages.iter().zip(&images) {
            // 1280x720 CSS pixels at 96 dpi is 960x540 points.
            assert!((page.media_box.width.0 - 960.0).abs() < 0.5, "{:?}", page.media_box);
            assert!((page.media_box.height.0 - 540.0).abs() < 0.5, "{:?}", page.media_box);
            assert!(matches!(
                page.ops.as_slice(),
                [printpdf::Op::UseXobject { id, .. }] if id == image
            ));
        }
    }

    #[tokio::test]
    async fn snapshots_keep_slide_order() {
        let p = preview_of(concat!(
            r#"<div class="slide" style="background: #ff0000">A</div>"#,
            r#"<div class="slide" style="background: #00ff00">B</div>"#,
            r#"<div class="slide" style="background: #0000ff">C</div>"#,
        ));
        let shots = ExportPipeline::new(small_config()).snapshot(&p).await.unwrap();
        let corners: Vec<[u8; 3]> = shots
            .iter()
            .map(|s| {
                let px = s.rgba.get_pixel(s.width - 1, s.height - 1).0;
                [px[0], px[1], px[2]]
            })
            .collect();
        assert_eq!(corners, vec![[0xff, 0, 0], [0, 0xff, 0], [0, 0, 0xff]]);
    }

    #[tokio::test]
    async fn oversized_font_still_exports() {
        let p = preview_of(
            r#"<div class="slide"><p style="font-size: 1e12px">A</p><p>B</p></div>"#,
        );
        let pipeline = ExportPipeline::new(small_config());
        let archive = pipeline.export_images(&p).await.unwrap();
        assert_eq!(archive.entries, vec!["slide-01.png"]);
        let pdf = pipeline.export_pdf(&p).await.unwrap();
        assert_eq!(pdf.page_count, 1);
    }
}
