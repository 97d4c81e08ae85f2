//! Caption rasterization into transparent RGBA images.

use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use subburn_common::error::SubburnResult;
use subburn_cue_model::cue::SubCue;
use subburn_cue_model::style::Style;

use crate::fonts::Typeface;
use crate::layout::{BoxSize, LayoutMetrics};

/// Render one (sub-)cue's box and text.
///
/// The canvas is `canvas_override` when given, otherwise the layout's own
/// box. With an override, each line is centered in the override box so
/// text of varying length stays centered inside a constant-size frame.
/// Pixels outside the box and glyphs are fully transparent.
pub fn rasterize(
    sub_cue: &SubCue,
    style: &Style,
    layout: &LayoutMetrics,
    canvas_override: Option<BoxSize>,
    face: &dyn Typeface,
) -> RgbaImage {
    let canvas = canvas_override.unwrap_or_else(|| layout.box_size());
    let mut image = RgbaImage::from_pixel(canvas.width, canvas.height, Rgba([0, 0, 0, 0]));

    if let Some(bg) = style.bg_color.with_opacity(style.bg_opacity) {
        if bg[3] > 0 {
            let radius = layout
                .corner_radius
                .min(canvas.width.min(canvas.height) as f64 / 2.0);
            fill_rounded_rect(&mut image, radius.round() as u32, Rgba(bg));
        }
    }

    let Some(text_color) = style.text_color.with_opacity(1.0) else {
        return image;
    };

    let px = layout.font_size as f32;
    for (i, line) in layout.lines.iter().enumerate() {
        if line.text.is_empty() {
            continue;
        }
        let x = (canvas.width as f64 - line.width) / 2.0;
        let baseline =
            layout.padding + i as f64 * layout.line_height as f64 + layout.baseline_offset;
        face.draw(
            &line.text,
            px,
            x as f32,
            baseline as f32,
            &mut |gx, gy, coverage| blend(&mut image, gx, gy, text_color, coverage),
        );
    }

    tracing::trace!(
        sub_cue = %sub_cue.id,
        width = canvas.width,
        height = canvas.height,
        lines = layout.lines.len(),
        "Rasterized caption"
    );

    image
}

/// Write a rasterized caption as PNG.
pub fn save_png(image: &RgbaImage, path: &Path) -> SubburnResult<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Fill the whole canvas with a rounded rectangle: two overlapping rects
/// for the straight edges and a circle in each corner.
fn fill_rounded_rect(image: &mut RgbaImage, radius: u32, color: Rgba<u8>) {
    let (w, h) = image.dimensions();
    let r = radius.min(w / 2).min(h / 2);

    if r == 0 {
        draw_filled_rect_mut(image, Rect::at(0, 0).of_size(w, h), color);
        return;
    }

    if w > 2 * r {
        draw_filled_rect_mut(image, Rect::at(r as i32, 0).of_size(w - 2 * r, h), color);
    }
    if h > 2 * r {
        draw_filled_rect_mut(image, Rect::at(0, r as i32).of_size(w, h - 2 * r), color);
    }

    let ri = r as i32;
    let right = w as i32 - 1 - ri;
    let bottom = h as i32 - 1 - ri;
    for center in [(ri, ri), (right, ri), (ri, bottom), (right, bottom)] {
        draw_filled_circle_mut(image, center, ri, color);
    }
}

/// Source-over blend of `color` at `coverage` onto the pixel at `(x, y)`.
fn blend(image: &mut RgbaImage, x: i32, y: i32, color: [u8; 4], coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= image.width() || y as u32 >= image.height() {
        return;
    }
    let coverage = coverage.clamp(0.0, 1.0);
    if coverage <= 0.0 {
        return;
    }

    let dst = image.get_pixel_mut(x as u32, y as u32);
    let src_a = color[3] as f32 / 255.0 * coverage;
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }

    for c in 0..3 {
        let src = color[c] as f32 / 255.0;
        let existing = dst[c] as f32 / 255.0;
        let out = (src * src_a + existing * dst_a * (1.0 - src_a)) / out_a;
        dst[c] = (out * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::test_support::BlockFace;
    use crate::layout::{compute_layout, FrameSize};
    use subburn_cue_model::color::Color;
    use subburn_cue_model::cue::Cue;

    fn sub(text: &str) -> SubCue {
        SubCue::whole(&Cue::new("c1", text, 0.0, 1.0))
    }

    #[test]
    fn test_image_matches_layout_box_and_has_transparent_corners() {
        let style = Style {
            border_radius: 10.0,
            ..Style::default()
        };
        let layout =
            compute_layout("Hallo Welt", &style, FrameSize::new(1280, 720), &BlockFace).unwrap();
        let image = rasterize(&sub("Hallo Welt"), &style, &layout, None, &BlockFace);

        assert_eq!(image.dimensions(), (layout.box_width, layout.box_height));
        assert_eq!(image.get_pixel(0, 0)[3], 0);
        let center = image.get_pixel(layout.box_width / 2, 2);
        assert_eq!(center[3], (0.6f64 * 255.0).round() as u8);
    }

    #[test]
    fn test_transparent_background_leaves_only_text() {
        let style = Style {
            bg_color: Color::Transparent,
            ..Style::default()
        };
        let layout = compute_layout("ab", &style, FrameSize::new(640, 360), &BlockFace).unwrap();
        let image = rasterize(&sub("ab"), &style, &layout, None, &BlockFace);

        let opaque = image.pixels().filter(|p| p[3] == 255).count();
        let clear = image.pixels().filter(|p| p[3] == 0).count();
        assert!(opaque > 0);
        assert_eq!(opaque + clear, image.pixels().count());
        assert_eq!(image.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_override_canvas_centers_shorter_text() {
        let style = Style {
            bg_color: Color::Transparent,
            ..Style::default()
        };
        let frame = FrameSize::new(640, 360);
        let full = compute_layout("aaaaaaaa", &style, frame, &BlockFace).unwrap();
        let part = compute_layout("aa", &style, frame, &BlockFace).unwrap();
        let image = rasterize(&sub("aa"), &style, &part, Some(full.box_size()), &BlockFace);

        assert_eq!(image.dimensions(), (full.box_width, full.box_height));

        let columns: Vec<u32> = (0..image.width())
            .filter(|&x| (0..image.height()).any(|y| image.get_pixel(x, y)[3] > 0))
            .collect();
        let left = *columns.first().unwrap() as i64;
        let right = (image.width() - 1 - *columns.last().unwrap()) as i64;
        assert!((left - right).abs() <= 3, "left={left} right={right}");
    }

    #[test]
    fn test_blend_over_background() {
        let mut image = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        blend(&mut image, 0, 0, [255, 255, 255, 255], 0.5);
        let p = image.get_pixel(0, 0);
        assert_eq!(p[3], 255);
        assert!((p[0] as i32 - 128).abs() <= 1);
        blend(&mut image, 5, 5, [255, 255, 255, 255], 1.0);
    }

    #[test]
    fn test_png_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cue.png");
        let image = RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 4]));
        save_png(&image, &path).unwrap();
        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([1, 2, 3, 4]));
    }
}
