//! Arabic-capable UI font.
//!
//! egui's bundled fonts carry no Arabic glyphs.  At startup the font named by
//! `ui.font_path` (or the first system font found from a short list) is
//! loaded and placed first in the proportional family, with the bundled
//! fonts kept behind it for Latin text and emoji.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eframe::egui;

/// Key of the loaded font in [`egui::FontDefinitions::font_data`].
pub const FONT_NAME: &str = "arabic";

/// Looked up in order after the configured path.  Missing files are skipped.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/noto/NotoSansArabic-Regular.ttf",
    "/usr/share/fonts/noto/NotoSansArabic-Regular.ttf",
    "/usr/share/fonts/google-noto/NotoSansArabic-Regular.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "C:\\Windows\\Fonts\\tahoma.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
];

/// Paths to try, the configured one first.
pub fn candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
        .collect()
}

/// Read the first candidate that exists and is non-empty.
pub fn load_first(candidates: &[PathBuf]) -> Option<(PathBuf, Vec<u8>)> {
    candidates.iter().find_map(|path| match std::fs::read(path) {
        Ok(bytes) if !bytes.is_empty() => Some((path.clone(), bytes)),
        Ok(_) => None,
        Err(e) => {
            log::trace!("fonts: skipping {}: {e}", path.display());
            None
        }
    })
}

/// Default definitions with `bytes` as the preferred proportional font and
/// a fallback for monospace.
pub fn definitions_with(bytes: Vec<u8>) -> egui::FontDefinitions {
    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert(FONT_NAME.to_owned(), Arc::new(egui::FontData::from_owned(bytes)));
    fonts
        .families
        .entry(egui::FontFamily::Proportional)
        .or_default()
        .insert(0, FONT_NAME.to_owned());
    fonts
        .families
        .entry(egui::FontFamily::Monospace)
        .or_default()
        .push(FONT_NAME.to_owned());
    fonts
}

/// Install an Arabic-capable font on `ctx`.  Returns `false` (and keeps the
/// bundled fonts) when none could be read.
pub fn install(ctx: &egui::Context, configured: Option<&Path>) -> bool {
    match load_first(&candidates(configured)) {
        Some((path, bytes)) => {
            log::info!("fonts: using {}", path.display());
            ctx.set_fonts(definitions_with(bytes));
            true
        }
        None => {
            log::warn!("fonts: no Arabic-capable font found; set ui.font_path in settings.toml");
            false
        }
    }
}
