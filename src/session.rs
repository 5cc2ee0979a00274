//! Editing session: the state behind one editor window and its handlers.
//!
//! Handlers never return errors. Failures of external collaborators (storage,
//! clipboard, prompt loading) degrade to no-ops; user mistakes come back as
//! [`Feedback`] for the UI to surface.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::export::ExportPipeline;
use crate::extract::extract_slides;
use crate::fonts::FontBook;
use crate::preview::Preview;
use crate::selection::{Range, SelectionState};
use crate::style::{self, Applied, StylePatch, ToolbarState, COLOR_SWATCHES};
use crate::{DisplayParams, Error, Result, ToolConfig};

pub const MARKUP_KEY: &str = "html-slide-tool:html";
pub const COMPANION_URL_KEY: &str = "html-slide-tool:companionUrl";

/// Persistent string storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-memory store, used by tests and the CLI
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// Source of the generator prompt text
pub trait PromptSource {
    fn load(&self) -> Result<String>;
}

impl PromptSource for String {
    fn load(&self) -> Result<String> {
        Ok(self.clone())
    }
}

pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// What the UI should do after a handler ran
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    Nothing,
    /// Slides were rebuilt from the markup
    Rendered { slides: usize },
    /// Soft warning about the markup
    Diagnostic(String),
    /// Short transient confirmation
    Toast(String),
    /// A user-facing failure message
    Error(String),
    /// Result of a style handler
    Styled(Applied),
    /// A finished export to hand to the user
    Download {
        file_name: &'static str,
        bytes: Vec<u8>,
    },
    /// No companion URL is saved yet; ask for one
    ShowCompanionSetup { prefill: String },
    OpenUrl(String),
}

pub struct Session {
    config: ToolConfig,
    store: Box<dyn KeyValueStore + Send>,
    clipboard: Box<dyn Clipboard + Send>,
    markup: String,
    companion_url: String,
    prompt: String,
    preview: Preview,
    selection: SelectionState,
    exporter: ExportPipeline,
}

impl Session {
    /// Restore persisted state and load the prompt once. Renders immediately
    /// when restored markup is non-blank.
    pub fn new(
        config: ToolConfig,
        store: Box<dyn KeyValueStore + Send>,
        prompt: &dyn PromptSource,
        clipboard: Box<dyn Clipboard + Send>,
    ) -> Self {
        Self::with_fonts(config, store, prompt, clipboard, FontBook::builtin())
    }

    pub fn with_fonts(
        config: ToolConfig,
        store: Box<dyn KeyValueStore + Send>,
        prompt: &dyn PromptSource,
        clipboard: Box<dyn Clipboard + Send>,
        fonts: FontBook,
    ) -> Self {
        let prompt = prompt.load().unwrap_or_else(|e| {
            warn!("prompt unavailable: {}", e);
            String::new()
        });
        let markup = store.get(MARKUP_KEY).unwrap_or_default();
        let companion_url = store.get(COMPANION_URL_KEY).unwrap_or_default();
        let mut session = Self {
            preview: Preview::new(config.display),
            exporter: ExportPipeline::with_fonts(config.clone(), fonts),
            config,
            store,
            clipboard,
            markup,
            companion_url,
            prompt,
            selection: SelectionState::new(),
        };
        if !session.markup.trim().is_empty() {
            session.render();
        }
        session
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn companion_url(&self) -> &str {
        &self.companion_url
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The markup text changed.
    pub fn input(&mut self, markup: &str) -> Feedback {
        self.markup = markup.to_string();
        if let Err(e) = self.store.set(MARKUP_KEY, markup) {
            warn!("could not persist markup: {}", e);
        }
        Feedback::Nothing
    }

    /// Rebuild the preview from the current markup. Edits are discarded.
    pub fn render(&mut self) -> Feedback {
        let extraction = match extract_slides(&self.markup, &self.config.extract_options()) {
            Ok(ex) => ex,
            Err(e) => return Feedback::Error(e.to_string()),
        };
        self.selection.clear();
        self.preview.render(&extraction.slides);
        info!("rendered {} slide(s)", extraction.slides.len());
        match extraction.diagnostic {
            Some(d) => Feedback::Diagnostic(d.to_string()),
            None => Feedback::Rendered {
                slides: extraction.slides.len(),
            },
        }
    }

    /// Empty the markup and the preview. The companion URL is kept.
    pub fn clear(&mut self) -> Feedback {
        self.markup.clear();
        self.preview.clear();
        self.selection.clear();
        if let Err(e) = self.store.remove(MARKUP_KEY) {
            warn!("could not clear stored markup: {}", e);
        }
        Feedback::Nothing
    }

    pub fn set_edit_mode(&mut self, editable: bool) -> Feedback {
        self.preview.set_edit_mode(editable);
        if !editable {
            self.selection.clear();
        }
        Feedback::Nothing
    }

    pub fn set_display(&mut self, params: DisplayParams) -> Feedback {
        if let Err(e) = params.validate() {
            return Feedback::Error(e.to_string());
        }
        self.preview.set_display(params);
        Feedback::Nothing
    }

    /// The user selected `range`. Selections outside the editable slides or
    /// while editing is off are ignored.
    pub fn select(&mut self, range: Range) -> Feedback {
        if !self.preview.edit_mode()
            || range.generation != self.preview.generation()
            || !range.is_valid_in(self.preview.document())
            || !self.preview.is_editable_scope(range.start.node)
        {
            return Feedback::Nothing;
        }
        self.selection.select(range);
        self.preview.show_toolbar(&range);
        Feedback::Nothing
    }

    /// Focus moved to a toolbar control.
    pub fn blur(&mut self) -> Feedback {
        self.selection.blur();
        Feedback::Nothing
    }

    pub fn apply_font_size(&mut self, px: f32) -> Feedback {
        self.apply(StylePatch::new().font_size_px(px))
    }

    pub fn apply_color(&mut self, color: &str) -> Feedback {
        self.apply(StylePatch::new().color(color))
    }

    pub fn pick_swatch(&mut self, index: usize) -> Feedback {
        match COLOR_SWATCHES.get(index) {
            Some(color) => self.apply_color(color),
            None => Feedback::Nothing,
        }
    }

    fn apply(&mut self, patch: Result<StylePatch>) -> Feedback {
        let patch = match patch {
            Ok(p) => p,
            Err(e) => return Feedback::Error(e.to_string()),
        };
        let applied = style::apply_selection_style(&mut self.preview, &mut self.selection, &patch);
        debug!("style patch result: {:?}", applied);
        Feedback::Styled(applied)
    }

    pub fn toolbar_state(&self) -> Option<ToolbarState> {
        style::toolbar_state(&self.preview, &self.selection)
    }

    pub async fn export_images(&self) -> Feedback {
        match self.exporter.export_images(&self.preview).await {
            Ok(archive) => Feedback::Download {
                file_name: archive.file_name,
                bytes: archive.bytes,
            },
            Err(e) => export_failed(e),
        }
    }

    pub async fn export_pdf(&self) -> Feedback {
        match self.exporter.export_pdf(&self.preview).await {
            Ok(pdf) => Feedback::Download {
                file_name: pdf.file_name,
                bytes: pdf.bytes,
            },
            Err(e) => export_failed(e),
        }
    }

    /// Copy the generator prompt. A missing prompt or a clipboard failure does
    /// nothing.
    pub fn copy_prompt(&mut self) -> Feedback {
        if self.prompt.is_empty() {
            return Feedback::Nothing;
        }
        match self.clipboard.write_text(&self.prompt) {
            Ok(()) => Feedback::Toast("Copied".to_string()),
            Err(e) => {
                debug!("clipboard write failed: {}", e);
                Feedback::Nothing
            }
        }
    }

    /// Persist the companion URL. An empty value forgets it.
    pub fn save_companion_url(&mut self, value: &str) -> Feedback {
        let value = value.trim();
        if value.is_empty() {
            self.companion_url.clear();
            if let Err(e) = self.store.remove(COMPANION_URL_KEY) {
                warn!("could not clear companion URL: {}", e);
            }
            return Feedback::Nothing;
        }
        let url = match validate_companion_url(value) {
            Ok(url) => url,
            Err(e) => return Feedback::Error(e.to_string()),
        };
        if let Err(e) = self.store.set(COMPANION_URL_KEY, &url) {
            warn!("could not persist companion URL: {}", e);
        }
        self.companion_url = url;
        Feedback::Nothing
    }

    /// Open the companion page, or ask for its URL when none is saved.
    pub fn open_companion(&self) -> Feedback {
        if self.companion_url.is_empty() {
            return Feedback::ShowCompanionSetup {
                prefill: String::new(),
            };
        }
        Feedback::OpenUrl(self.companion_url.clone())
    }
}

fn export_failed(e: Error) -> Feedback {
    warn!("export failed: {}", e);
    Feedback::Error(e.to_string())
}

/// Accept absolute `http`/`https` URLs only.
pub fn validate_companion_url(value: &str) -> Result<String> {
    let url = url::Url::parse(value).map_err(|e| Error::InvalidUrl(format!("{}: {}", value, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url.to_string()),
        scheme => Err(Error::InvalidUrl(format!(
            "{}: unsupported scheme {:?}",
            value, scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Boundary;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedClipboard(Arc<Mutex<Vec<String>>>);

    impl Clipboard for SharedClipboard {
        fn write_text(&mut self, text: &str) -> Result<()> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct DeniedClipboard;

    impl Clipboard for DeniedClipboard {
        fn write_text(&mut self, _: &str) -> Result<()> {
            Err(Error::Other("permission denied".into()))
        }
    }

    struct MissingPrompt;

    impl PromptSource for MissingPrompt {
        fn load(&self) -> Result<String> {
            Err(Error::Other("not found".into()))
        }
    }

    fn session_with(store: MemoryStore) -> Session {
        Session::new(
            ToolConfig::default(),
            Box::new(store),
            &"Write slides".to_string(),
            Box::new(SharedClipboard::default()),
        )
    }

    #[test]
    fn restores_and_renders_saved_markup() {
        let mut store = MemoryStore::default();
        store.set(MARKUP_KEY, r#"<div class="slide">A</div>"#).unwrap();
        store.set(COMPANION_URL_KEY, "https://example.com/").unwrap();
        let s = session_with(store);
        assert_eq!(s.preview().len(), 1);
        assert_eq!(s.companion_url(), "https://example.com/");
        assert_eq!(s.open_companion(), Feedback::OpenUrl("https://example.com/".into()));
    }

    #[test]
    fn clear_keeps_companion_url() {
        let mut s = session_with(MemoryStore::default());
        s.input(r#"<div class="slide">A</div>"#);
        assert_eq!(s.render(), Feedback::Rendered { slides: 1 });
        assert_eq!(s.save_companion_url(" https://example.com/app "), Feedback::Nothing);
        s.clear();
        assert!(s.markup().is_empty());
        assert!(s.preview().is_empty());
        assert_eq!(s.store.get(MARKUP_KEY), None);
        assert_eq!(s.store.get(COMPANION_URL_KEY).as_deref(), Some("https://example.com/app"));
    }

    #[test]
    fn companion_url_validation() {
        let mut s = session_with(MemoryStore::default());
        assert!(matches!(s.open_companion(), Feedback::ShowCompanionSetup { .. }));
        assert!(matches!(s.save_companion_url("javascript:alert(1)"), Feedback::Error(_)));
        assert!(matches!(s.save_companion_url("not a url"), Feedback::Error(_)));
        assert!(s.companion_url().is_empty());
    }

    #[test]
    fn copy_prompt_outcomes() {
        let clip = SharedClipboard::default();
        let mut s = Session::new(
            ToolConfig::default(),
            Box::new(MemoryStore::default()),
            &"Write slides".to_string(),
            Box::new(clip.clone()),
        );
        assert_eq!(s.copy_prompt(), Feedback::Toast("Copied".into()));
        assert_eq!(clip.0.lock().unwrap().as_slice(), ["Write slides"]);

        let mut missing = Session::new(
            ToolConfig::default(),
            Box::new(MemoryStore::default()),
            &MissingPrompt,
            Box::new(SharedClipboard::default()),
        );
        assert_eq!(missing.prompt(), "");
        assert_eq!(missing.copy_prompt(), Feedback::Nothing);

        let mut denied = Session::new(
            ToolConfig::default(),
            Box::new(MemoryStore::default()),
            &"p".to_string(),
            Box::new(DeniedClipboard),
        );
        assert_eq!(denied.copy_prompt(), Feedback::Nothing);
    }

    #[test]
    fn missing_markers_surface_as_diagnostic() {
        let config = ToolConfig {
            require_markers: true,
            ..ToolConfig::default()
        };
        let mut s = Session::new(
            config,
            Box::new(MemoryStore::default()),
            &String::new(),
            Box::new(SharedClipboard::default()),
        );
        s.input("<p>no markers</p>");
        assert!(matches!(s.render(), Feedback::Diagnostic(_)));
    }

    #[test]
    fn selection_outside_or_while_locked_is_ignored() {
        let mut s = session_with(MemoryStore::default());
        s.input(r#"<div class="slide"><p>Hello</p></div>"#);
        s.render();
        let doc = s.preview().document();
        let p = doc.find_tag(s.preview().editors()[0], "p").unwrap();
        let text = doc.children(p)[0];
        let range = Range::new(Boundary::new(text, 0), Boundary::new(text, 5), s.preview().generation());

        s.set_edit_mode(false);
        s.select(range);
        assert_eq!(s.selection().resolve(range.generation), None);

        s.set_edit_mode(true);
        s.select(range);
        assert_eq!(s.selection().resolve(range.generation), Some(range));
        assert!(s.preview().toolbar().is_some());
        assert_eq!(
            s.toolbar_state(),
            Some(ToolbarState {
                font_size_px: 16,
                color: "#111111".into()
            })
        );
    }

    #[test]
    fn swatch_out_of_range_does_nothing() {
        let mut s = session_with(MemoryStore::default());
        assert_eq!(s.pick_swatch(COLOR_SWATCHES.len()), Feedback::Nothing);
        assert_eq!(
            s.pick_swatch(0),
            Feedback::Styled(Applied::Ignored(style::Miss::NoSelection))
        );
    }

    #[tokio::test]
    async fn export_without_slides_reports_error() {
        let s = session_with(MemoryStore::default());
        assert!(matches!(s.export_images().await, Feedback::Error(_)));
    }
}
