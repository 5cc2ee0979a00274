//! Font faces for the rasterizer and the readiness gate exports wait on.

use embedded_graphics::mono_font::{ascii, MonoFont};
use log::warn;
use std::borrow::Cow;
use tokio::sync::watch;

const REGULAR: [&MonoFont<'static>; 6] = [
    &ascii::FONT_6X10,
    &ascii::FONT_7X13,
    &ascii::FONT_8X13,
    &ascii::FONT_9X15,
    &ascii::FONT_9X18,
    &ascii::FONT_10X20,
];

const BOLD: [&MonoFont<'static>; 5] = [
    &ascii::FONT_6X13_BOLD,
    &ascii::FONT_7X13_BOLD,
    &ascii::FONT_8X13_BOLD,
    &ascii::FONT_9X15_BOLD,
    &ascii::FONT_9X18_BOLD,
];

/// Largest cell height, in device pixels, a face is scaled up to.
pub const MAX_FACE_PX: f32 = 8192.0;

/// A mono font drawn at an integer scale.
#[derive(Clone, Copy)]
pub struct FontFace {
    pub font: &'static MonoFont<'static>,
    pub scale: u32,
}

impl FontFace {
    /// Horizontal advance per character, in device pixels.
    pub fn advance(&self) -> u32 {
        (self.font.character_size.width + self.font.character_spacing).saturating_mul(self.scale)
    }

    pub fn height(&self) -> u32 {
        self.font.character_size.height.saturating_mul(self.scale)
    }

    pub fn text_width(&self, text: &str) -> u32 {
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        chars.saturating_mul(self.advance())
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("cell", &self.font.character_size)
            .field("scale", &self.scale)
            .finish()
    }
}

/// Pick the face whose scaled cell height is closest to `px` device pixels.
/// Ties go to the larger native font. Sizes are clamped to `1..=MAX_FACE_PX`.
pub fn select_face(px: f32, bold: bool) -> FontFace {
    let candidates: &[&'static MonoFont<'static>] = if bold { &BOLD } else { &REGULAR };
    let target = if px.is_nan() { 1.0 } else { px.clamp(1.0, MAX_FACE_PX) };
    let mut best = FontFace {
        font: candidates[0],
        scale: 1,
    };
    let mut best_err = f32::MAX;
    for font in candidates.iter().copied() {
        let h = font.character_size.height as f32;
        let scale = (target / h).round().max(1.0) as u32;
        let err = (h * scale as f32 - target).abs();
        if err <= best_err {
            best_err = err;
            best = FontFace { font, scale };
        }
    }
    best
}

/// Replace typographic characters the ASCII faces cannot draw.
pub fn normalize_for_mono(text: &str) -> Cow<'_, str> {
    if text.is_ascii() {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{00A0}' | '\u{3000}' => out.push(' '),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2026}' => out.push_str("..."),
            '\u{2022}' | '\u{30FB}' => out.push('*'),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Font registry handle. Exports await [`FontBook::ready`] so snapshots never
/// capture fallback faces while fonts are still loading.
#[derive(Debug, Clone)]
pub struct FontBook {
    ready: watch::Receiver<bool>,
}

/// Signals that pending fonts finished loading.
#[derive(Debug)]
pub struct FontLoader {
    tx: watch::Sender<bool>,
}

impl FontLoader {
    pub fn finish(self) {
        let _ = self.tx.send(true);
    }
}

impl Default for FontBook {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FontBook {
    /// Built-in faces only: ready immediately.
    pub fn builtin() -> Self {
        let (_tx, ready) = watch::channel(true);
        Self { ready }
    }

    /// A book whose fonts are still loading until the returned loader finishes.
    pub fn pending() -> (Self, FontLoader) {
        let (tx, ready) = watch::channel(false);
        (Self { ready }, FontLoader { tx })
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until fonts settle. A loader dropped without finishing counts as
    /// settled; the built-in faces are used.
    pub async fn ready(&self) {
        let mut rx = self.ready.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                warn!("font loader went away before finishing; using built-in faces");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn selects_scaled_face_close_to_target() {
        let face = select_face(32.0, false);
        assert!((face.height() as f32 - 32.0).abs() <= 3.0, "{:?}", face);
        let tiny = select_face(4.0, false);
        assert_eq!(tiny.scale, 1);
        let bold = select_face(26.0, true);
        assert!(BOLD
            .iter()
            .any(|f| f.character_size == bold.font.character_size));
    }

    #[test]
    fn extreme_sizes_are_clamped() {
        for px in [1e12, f32::INFINITY, f32::MAX] {
            let face = select_face(px, false);
            assert!(face.height() as f32 <= MAX_FACE_PX + 20.0, "{:?}", face);
        }
        assert_eq!(select_face(f32::NAN, true).scale, 1);
        let wide = FontFace {
            font: REGULAR[5],
            scale: u32::MAX,
        };
        assert_eq!(wide.text_width("abc"), u32::MAX);
    }

    #[test]
    fn normalizes_typography() {
        assert_eq!(normalize_for_mono("a\u{2014}b \u{201C}c\u{201D}"), "a-b \"c\"");
        assert!(matches!(normalize_for_mono("plain"), Cow::Borrowed(_)));
    }

    #[tokio::test]
    async fn ready_waits_for_loader() {
        let (book, loader) = FontBook::pending();
        assert!(!book.is_ready());
        let waiter = {
            let book = book.clone();
            tokio::spawn(async move { book.ready().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        loader.finish();
        waiter.await.unwrap();
        assert!(book.is_ready());
    }

    #[tokio::test]
    async fn builtin_and_dropped_loaders_do_not_block() {
        FontBook::builtin().ready().await;
        let (book, loader) = FontBook::pending();
        drop(loader);
        book.ready().await;
    }
}
