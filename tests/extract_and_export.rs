use std::io::{Cursor, Read};

use htmlslides::export::ExportPipeline;
use htmlslides::extract::{extract_slides, ExtractOptions};
use htmlslides::preview::Preview;
use htmlslides::{DisplayParams, ToolConfig};

fn preview_for(raw: &str) -> Preview {
    let extraction = extract_slides(raw, &ExtractOptions::default()).expect("extract");
    let mut preview = Preview::new(DisplayParams::default());
    preview.render(&extraction.slides);
    preview
}

#[test]
fn marker_elements_become_script_free_slides_in_order() {
    let raw = r#"
        <section class="slide"><h1>One</h1><script>alert(1)</script></section>
        <p>between</p>
        <div class="slide"><p>Two</p></div>
        <div class="slide" onclick="steal()"><a href="javascript:void(0)">Three</a></div>
    "#;
    let ex = extract_slides(raw, &ExtractOptions::default()).unwrap();
    let texts: Vec<String> = ex.slides.iter().map(|s| s.text().trim().to_string()).collect();
    assert_eq!(texts, vec!["One", "Two", "Three"]);
    for slide in &ex.slides {
        let html = slide.to_html();
        assert!(!html.contains("<script"), "{}", html);
        assert!(!html.contains("onclick"), "{}", html);
        assert!(!html.contains("javascript:"), "{}", html);
    }
    assert_eq!(ex.sanitized.scripts, 1);
}

#[test]
fn unmarked_body_is_one_synthetic_slide() {
    let ex = extract_slides("<h1>Title</h1><p>Body</p>", &ExtractOptions::default()).unwrap();
    assert_eq!(ex.slides.len(), 1);
    assert!(ex.slides[0].is_synthetic());
    assert!(ex.diagnostic.is_none());
}

#[test]
fn blank_input_yields_nothing() {
    for raw in ["", "   \n\t  "] {
        let ex = extract_slides(raw, &ExtractOptions::default()).unwrap();
        assert!(ex.is_empty());
        assert!(ex.diagnostic.is_none());
    }
}

#[test]
fn custom_marker_class() {
    let opts = ExtractOptions {
        marker_class: "page".into(),
        ..ExtractOptions::default()
    };
    let ex = extract_slides(
        r#"<div class="page">A</div><div class="slide">B</div><div class="page">C</div>"#,
        &opts,
    )
    .unwrap();
    assert_eq!(ex.slides.len(), 2);
}

#[test]
fn rerender_reproduces_extraction() {
    let raw = r#"<div class="slide"><p>Alpha</p></div><div class="slide"><p>Beta</p></div>"#;
    let a = preview_for(raw).to_html();
    let b = preview_for(raw).to_html();
    assert_eq!(a, b);

    let first: Vec<String> = extract_slides(raw, &ExtractOptions::default())
        .unwrap()
        .slides
        .iter()
        .map(|s| s.fingerprint())
        .collect();
    let second: Vec<String> = extract_slides(raw, &ExtractOptions::default())
        .unwrap()
        .slides
        .iter()
        .map(|s| s.fingerprint())
        .collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn two_slides_export_to_two_images_at_double_resolution() {
    let preview = preview_for(r#"<div class="slide">A</div><div class="slide">B</div>"#);
    let pipeline = ExportPipeline::new(ToolConfig::default());
    let archive = pipeline.export_images(&preview).await.unwrap();
    assert_eq!(archive.file_name, "slides.zip");
    assert_eq!(archive.entries, vec!["slide-01.png", "slide-02.png"]);

    let mut zip = zip::ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
    assert_eq!(zip.len(), 2);
    for (i, name) in ["slide-01.png", "slide-02.png"].iter().enumerate() {
        let mut entry = zip.by_index(i).unwrap();
        assert_eq!(entry.name(), *name);
        let mut png = Vec::new();
        entry.read_to_end(&mut png).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (2560, 1440));
    }
}

#[tokio::test]
async fn two_slides_export_to_two_page_pdf() {
    let preview = preview_for(r#"<div class="slide">A</div><div class="slide">B</div>"#);
    let config = ToolConfig {
        supersample: 1,
        ..ToolConfig::default()
    };
    let pdf = ExportPipeline::new(config).export_pdf(&preview).await.unwrap();
    assert_eq!(pdf.page_count, 2);
    assert!(pdf.bytes.starts_with(b"%PDF"));
}
