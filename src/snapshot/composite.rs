//! CPU composition of a page into a print-quality image.
//!
//! Flattening draws the background, every stroke and every text note into a
//! tiny-skia pixmap at a multiple of the surface size. Glyphs come from
//! fontdue; without a font the note's background box is still drawn.

use bevy::prelude::*;
use image::RgbaImage;
use thiserror::Error;
use tiny_skia::{
    IntSize, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

use crate::editor::draw::StrokePath;
use crate::editor::text::{note_half_size, TextNote};

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("invalid composite dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("background has invalid dimensions {width}x{height}")]
    InvalidBackground { width: u32, height: u32 },
}

/// Map a surface point (center origin, Y up) to pixel coordinates in an
/// output image of `surface_size * multiplier`
pub fn surface_to_pixel(point: Vec2, surface_size: Vec2, multiplier: f32) -> Vec2 {
    Vec2::new(
        (point.x + surface_size.x / 2.0) * multiplier,
        (surface_size.y / 2.0 - point.y) * multiplier,
    )
}

fn rgba8(color: Color) -> [u8; 4] {
    let srgba = color.to_srgba();
    [
        (srgba.red * 255.0) as u8,
        (srgba.green * 255.0) as u8,
        (srgba.blue * 255.0) as u8,
        (srgba.alpha * 255.0) as u8,
    ]
}

fn paint_for(color: Color) -> Paint<'static> {
    let [r, g, b, a] = rgba8(color);
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn draw_background(pixmap: &mut Pixmap, background: &RgbaImage) -> Result<(), ComposeError> {
    let (bg_w, bg_h) = background.dimensions();
    let size = IntSize::from_wh(bg_w, bg_h).ok_or(ComposeError::InvalidBackground {
        width: bg_w,
        height: bg_h,
    })?;
    let bg_pixmap = Pixmap::from_vec(background.as_raw().clone(), size).ok_or(
        ComposeError::InvalidBackground {
            width: bg_w,
            height: bg_h,
        },
    )?;

    // Independent X/Y factors stretch the background to fill exactly
    let scale_x = pixmap.width() as f32 / bg_w as f32;
    let scale_y = pixmap.height() as f32 / bg_h as f32;
    pixmap.draw_pixmap(
        0,
        0,
        bg_pixmap.as_ref(),
        &PixmapPaint::default(),
        Transform::from_scale(scale_x, scale_y),
        None,
    );
    Ok(())
}

fn draw_stroke(pixmap: &mut Pixmap, stroke: &StrokePath, surface_size: Vec2, multiplier: f32) {
    if stroke.points.len() < 2 {
        return;
    }

    let mut builder = PathBuilder::new();
    let first = surface_to_pixel(stroke.points[0], surface_size, multiplier);
    builder.move_to(first.x, first.y);
    for point in &stroke.points[1..] {
        let p = surface_to_pixel(*point, surface_size, multiplier);
        builder.line_to(p.x, p.y);
    }
    let Some(path) = builder.finish() else {
        return;
    };

    let skia_stroke = Stroke {
        width: stroke.stroke_width * multiplier,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    pixmap.stroke_path(
        &path,
        &paint_for(stroke.color),
        &skia_stroke,
        Transform::identity(),
        None,
    );
}

/// Blend a fontdue coverage bitmap into the pixmap at `(origin_x, origin_y)`
fn blend_glyph(
    pixmap: &mut Pixmap,
    coverage: &[u8],
    glyph_width: usize,
    glyph_height: usize,
    origin_x: i32,
    origin_y: i32,
    color: [u8; 4],
) {
    let width = pixmap.width() as i32;
    let height = pixmap.height() as i32;
    let data = pixmap.data_mut();

    for gy in 0..glyph_height as i32 {
        let py = origin_y + gy;
        if py < 0 || py >= height {
            continue;
        }
        for gx in 0..glyph_width as i32 {
            let px = origin_x + gx;
            if px < 0 || px >= width {
                continue;
            }
            let cov = coverage[(gy as usize) * glyph_width + gx as usize] as u32;
            if cov == 0 {
                continue;
            }
            let idx = ((py * width + px) * 4) as usize;
            for channel in 0..3 {
                let src = color[channel] as u32 * cov / 255;
                let dst = data[idx + channel] as u32 * (255 - cov) / 255;
                data[idx + channel] = (src + dst) as u8;
            }
            let alpha = cov + data[idx + 3] as u32 * (255 - cov) / 255;
            data[idx + 3] = alpha.min(255) as u8;
        }
    }
}

fn draw_note(
    pixmap: &mut Pixmap,
    position: Vec2,
    note: &TextNote,
    surface_size: Vec2,
    multiplier: f32,
    font: Option<&fontdue::Font>,
) {
    let center = surface_to_pixel(position, surface_size, multiplier);
    let half = note_half_size(&note.content, note.font_size) * multiplier;

    if let Some(rect) = tiny_skia::Rect::from_xywh(
        center.x - half.x,
        center.y - half.y,
        half.x * 2.0,
        half.y * 2.0,
    ) {
        pixmap.fill_rect(rect, &paint_for(note.background), Transform::identity(), None);
    }

    let Some(font) = font else {
        return;
    };

    let px = note.font_size * multiplier;
    let color = rgba8(note.color);
    let mut pen_x = center.x - half.x + px * 0.15;
    let baseline = center.y + px * 0.35;

    for ch in note.content.chars() {
        let (metrics, coverage) = font.rasterize(ch, px);
        blend_glyph(
            pixmap,
            &coverage,
            metrics.width,
            metrics.height,
            (pen_x + metrics.xmin as f32) as i32,
            (baseline - metrics.ymin as f32 - metrics.height as f32) as i32,
            color,
        );
        pen_x += metrics.advance_width;
    }
}

/// Compose background, strokes and notes into an image of
/// `surface_size * multiplier`
pub fn compose(
    background: &RgbaImage,
    surface_size: Vec2,
    multiplier: f32,
    strokes: &[&StrokePath],
    notes: &[(Vec2, &TextNote)],
    font: Option<&fontdue::Font>,
) -> Result<RgbaImage, ComposeError> {
    let width = (surface_size.x * multiplier).round().max(1.0) as u32;
    let height = (surface_size.y * multiplier).round().max(1.0) as u32;

    let mut pixmap =
        Pixmap::new(width, height).ok_or(ComposeError::InvalidDimensions { width, height })?;

    draw_background(&mut pixmap, background)?;

    for stroke in strokes {
        draw_stroke(&mut pixmap, stroke, surface_size, multiplier);
    }
    for (position, note) in notes {
        draw_note(&mut pixmap, *position, note, surface_size, multiplier, font);
    }

    let data = pixmap.take();
    RgbaImage::from_raw(width, height, data)
        .ok_or(ComposeError::InvalidDimensions { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_background(width: u32, height: u32, pixel: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba(pixel))
    }

    fn changed_pixels(composed: &RgbaImage, reference: &RgbaImage) -> usize {
        composed
            .pixels()
            .zip(reference.pixels())
            .filter(|(a, b)| a != b)
            .count()
    }

    #[test]
    fn test_surface_to_pixel_centers() {
        let surface = Vec2::new(100.0, 60.0);
        assert_eq!(
            surface_to_pixel(Vec2::ZERO, surface, 2.0),
            Vec2::new(100.0, 60.0)
        );
        // Top-left corner of the surface maps to the image origin
        assert_eq!(
            surface_to_pixel(Vec2::new(-50.0, 30.0), surface, 2.0),
            Vec2::ZERO
        );
    }

    #[test]
    fn test_background_stretched_to_fill() {
        let background = solid_background(2, 2, [200, 10, 10, 255]);
        let out = compose(&background, Vec2::new(4.0, 4.0), 1.0, &[], &[], None)
            .expect("compose succeeds");

        assert_eq!(out.dimensions(), (4, 4));
        assert_eq!(out.get_pixel(0, 0).0, [200, 10, 10, 255]);
        assert_eq!(out.get_pixel(3, 3).0, [200, 10, 10, 255]);
    }

    #[test]
    fn test_multiplier_scales_output() {
        let background = solid_background(4, 4, [255, 255, 255, 255]);
        let out = compose(&background, Vec2::new(4.0, 4.0), 5.0, &[], &[], None)
            .expect("compose succeeds");
        assert_eq!(out.dimensions(), (20, 20));
    }

    #[test]
    fn test_stroke_marks_pixels() {
        let surface = Vec2::new(32.0, 32.0);
        let background = solid_background(32, 32, [255, 255, 255, 255]);
        let plain = compose(&background, surface, 1.0, &[], &[], None).expect("compose succeeds");

        let stroke = StrokePath {
            points: vec![Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0)],
            color: Color::srgb(0.0, 0.0, 0.0),
            stroke_width: 2.0,
        };
        let inked = compose(&background, surface, 1.0, &[&stroke], &[], None)
            .expect("compose succeeds");

        assert!(changed_pixels(&inked, &plain) > 0);
    }

    #[test]
    fn test_note_box_drawn_without_font() {
        let surface = Vec2::new(64.0, 64.0);
        let background = solid_background(64, 64, [255, 255, 255, 255]);
        let plain = compose(&background, surface, 1.0, &[], &[], None).expect("compose succeeds");

        let note = TextNote::new("hi".to_string());
        let noted = compose(
            &background,
            surface,
            1.0,
            &[],
            &[(Vec2::ZERO, &note)],
            None,
        )
        .expect("compose succeeds");

        assert!(changed_pixels(&noted, &plain) > 0);
    }

    #[test]
    fn test_degenerate_surface_still_composes() {
        // max(1.0) keeps dimensions valid even for a degenerate surface
        let background = solid_background(1, 1, [0, 0, 0, 255]);
        let out = compose(&background, Vec2::ZERO, 5.0, &[], &[], None);
        assert!(out.is_ok());
    }

    #[test]
    fn test_compose_error_display() {
        let err = ComposeError::InvalidDimensions {
            width: 0,
            height: 4,
        };
        assert_eq!(err.to_string(), "invalid composite dimensions 0x4");
    }
}
