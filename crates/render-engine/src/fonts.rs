//! Font loading and the per-family typeface registry.
//!
//! Layout and rasterization only see the [`Typeface`] trait. The registry
//! resolves a style's font family to a typeface once and caches it; a
//! family that cannot be loaded falls back to the configured default font
//! with a warning instead of failing the job.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use rusttype::{point, Font, Scale};
use subburn_common::config::RenderConfig;
use subburn_common::error::{SubburnError, SubburnResult};

/// Vertical font metrics at a given pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    /// Distance from baseline to the top of the tallest glyph.
    pub ascent: f32,
    /// Distance from baseline to the bottom of the lowest glyph (positive).
    pub descent: f32,
}

/// A font that can measure and draw a single line of text.
pub trait Typeface: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Vertical metrics at `px`.
    fn line_metrics(&self, px: f32) -> LineMetrics;

    /// Advance width of `text` laid out on one line at `px`.
    fn measure(&self, text: &str, px: f32) -> f32;

    /// Draw `text` with its pen starting at `(x, baseline)`.
    ///
    /// `plot` receives pixel coordinates and a coverage value in `[0, 1]`.
    fn draw(&self, text: &str, px: f32, x: f32, baseline: f32, plot: &mut dyn FnMut(i32, i32, f32));
}

/// TrueType/OpenType face backed by `rusttype`.
pub struct RusttypeFace {
    name: String,
    font: Font<'static>,
}

impl RusttypeFace {
    /// Load a face from a font file.
    pub fn load(path: &Path) -> SubburnResult<Self> {
        let data = std::fs::read(path).map_err(|e| {
            SubburnError::resource(format!("Failed to read font {}: {e}", path.display()))
        })?;
        let font = Font::try_from_vec(data).ok_or_else(|| {
            SubburnError::resource(format!("Unsupported font file {}", path.display()))
        })?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, font })
    }
}

impl Typeface for RusttypeFace {
    fn name(&self) -> &str {
        &self.name
    }

    fn line_metrics(&self, px: f32) -> LineMetrics {
        let v = self.font.v_metrics(Scale::uniform(px));
        LineMetrics {
            ascent: v.ascent,
            descent: -v.descent,
        }
    }

    fn measure(&self, text: &str, px: f32) -> f32 {
        self.font
            .layout(text, Scale::uniform(px), point(0.0, 0.0))
            .last()
            .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
    }

    fn draw(&self, text: &str, px: f32, x: f32, baseline: f32, plot: &mut dyn FnMut(i32, i32, f32)) {
        for glyph in self
            .font
            .layout(text, Scale::uniform(px), point(x, baseline))
        {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, coverage| {
                    plot(bb.min.x + gx as i32, bb.min.y + gy as i32, coverage);
                });
            }
        }
    }
}

const DEFAULT_KEY: &str = "\u{0}default";

/// Thread-safe, lazily populated typeface cache keyed by font family.
pub struct FontRegistry {
    fonts_dir: Option<PathBuf>,
    default_font: PathBuf,
    faces: RwLock<HashMap<String, Arc<dyn Typeface>>>,
}

impl FontRegistry {
    pub fn new(fonts_dir: Option<PathBuf>, default_font: PathBuf) -> Self {
        Self {
            fonts_dir,
            default_font,
            faces: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.fonts_dir.clone(), config.default_font.clone())
    }

    /// Register an already-loaded face for `family`.
    pub fn with_face(self, family: &str, face: Arc<dyn Typeface>) -> Self {
        self.faces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(family.to_string(), face);
        self
    }

    /// Register an already-loaded face as the fallback.
    pub fn with_default_face(self, face: Arc<dyn Typeface>) -> Self {
        self.with_face(DEFAULT_KEY, face)
    }

    /// Resolve `family` to a typeface, falling back to the default font.
    ///
    /// Only fails when the default font itself cannot be loaded.
    pub fn resolve(&self, family: &str) -> SubburnResult<Arc<dyn Typeface>> {
        if let Some(face) = self.cached(family) {
            return Ok(face);
        }

        let face = match self.load_family(family) {
            Ok(face) => {
                tracing::debug!(family, face = face.name(), "Loaded font");
                face
            }
            Err(err) => {
                tracing::warn!(
                    family,
                    error = %err,
                    fallback = %self.default_font.display(),
                    "Font unavailable, using default font"
                );
                self.default_face()?
            }
        };

        let mut faces = self.faces.write().unwrap_or_else(PoisonError::into_inner);
        Ok(faces
            .entry(family.to_string())
            .or_insert_with(|| face)
            .clone())
    }

    /// Whether the fallback font can be loaded.
    pub fn default_available(&self) -> bool {
        self.default_face().is_ok()
    }

    fn cached(&self, key: &str) -> Option<Arc<dyn Typeface>> {
        self.faces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn default_face(&self) -> SubburnResult<Arc<dyn Typeface>> {
        if let Some(face) = self.cached(DEFAULT_KEY) {
            return Ok(face);
        }
        let face: Arc<dyn Typeface> = Arc::new(RusttypeFace::load(&self.default_font)?);
        let mut faces = self.faces.write().unwrap_or_else(PoisonError::into_inner);
        Ok(faces
            .entry(DEFAULT_KEY.to_string())
            .or_insert_with(|| face)
            .clone())
    }

    fn load_family(&self, family: &str) -> SubburnResult<Arc<dyn Typeface>> {
        let candidates = font_candidates(self.fonts_dir.as_deref(), family);
        let path = candidates
            .iter()
            .find(|path| path.is_file())
            .ok_or_else(|| {
                SubburnError::resource(format!("No font file found for family {family:?}"))
            })?;
        Ok(Arc::new(RusttypeFace::load(path)?))
    }
}

/// File names tried for a family, in order.
fn font_candidates(fonts_dir: Option<&Path>, family: &str) -> Vec<PathBuf> {
    let direct = Path::new(family);
    let mut candidates = Vec::new();
    if direct.extension().is_some() {
        candidates.push(direct.to_path_buf());
    }

    if let Some(dir) = fonts_dir {
        let stems = [
            family.to_string(),
            family.replace(' ', ""),
            family.replace(' ', "-"),
            family.replace(' ', "_"),
        ];
        for stem in stems {
            for ext in ["ttf", "otf"] {
                let path = dir.join(format!("{stem}.{ext}"));
                if !candidates.contains(&path) {
                    candidates.push(path);
                }
            }
        }
    }

    candidates
}
