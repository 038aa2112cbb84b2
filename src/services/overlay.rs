//! 截图标注
//!
//! 在截图上为违规元素叠加半透明色块、实线边框和严重程度标签。
//! 坐标以截图区域为原点，按截图实际像素与 CSS 像素的比例换算。
//! PNG 编解码用 `image`，绘制在 `tiny_skia::Pixmap` 上完成。

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use tiny_skia::{Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::browser::Rect;
use crate::error::{AppResult, EvidenceError};
use crate::models::Impact;

/// 色块透明度
const FILL_ALPHA: f32 = 0.3;
/// 边框宽度（截图像素）
const BORDER_PX: f32 = 3.0;
/// 标签字体放大倍数
const GLYPH_SCALE: f32 = 2.0;
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const LABEL_PADDING: f32 = 3.0;

/// 标注截图
///
/// # 参数
/// - `png`: 截图区域的 PNG
/// - `element`: 元素相对截图区域的位置（CSS 像素，不含留白）
/// - `region`: 截图区域（CSS 像素）
/// - `impact`: 严重程度，决定颜色和标签
pub fn highlight(png: &[u8], element: Rect, region: Rect, impact: Impact) -> AppResult<Vec<u8>> {
    if region.is_empty() {
        return Err(EvidenceError::EmptyRegion {
            width: region.width,
            height: region.height,
        }
        .into());
    }

    let decoded = image::load_from_memory(png)
        .map_err(|e| EvidenceError::ImageDecodeFailed { source: e })?
        .to_rgba8();
    let mut pixmap = to_pixmap(&decoded)?;

    let scale_x = pixmap.width() as f64 / region.width;
    let scale_y = pixmap.height() as f64 / region.height;
    let left = (element.x * scale_x).round().max(0.0) as f32;
    let top = (element.y * scale_y).round().max(0.0) as f32;
    let right = ((element.x + element.width) * scale_x).round().max(0.0) as f32;
    let bottom = ((element.y + element.height) * scale_y).round().max(0.0) as f32;

    let style = impact.style();
    fill_box(&mut pixmap, left, top, right, bottom, paint(style.rgb, FILL_ALPHA));
    stroke_box(&mut pixmap, left, top, right, bottom, paint(style.rgb, 1.0));
    draw_label(&mut pixmap, left, top, impact);

    encode_png(&from_pixmap(&pixmap))
}

/// 纯色画笔，关闭抗锯齿以保证像素边界清晰
fn paint(rgb: [u8; 3], alpha: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    let alpha = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    paint.set_color_rgba8(rgb[0], rgb[1], rgb[2], alpha);
    paint.anti_alias = false;
    paint
}

fn fill_box(pixmap: &mut Pixmap, left: f32, top: f32, right: f32, bottom: f32, paint: Paint) {
    if let Some(rect) = tiny_skia::Rect::from_ltrb(left, top, right, bottom) {
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }
}

/// 边框画在元素内侧
fn stroke_box(pixmap: &mut Pixmap, left: f32, top: f32, right: f32, bottom: f32, paint: Paint) {
    let inset = BORDER_PX / 2.0;
    let Some(rect) =
        tiny_skia::Rect::from_ltrb(left + inset, top + inset, right - inset, bottom - inset)
    else {
        // 元素比边框还窄时直接涂满
        fill_box(pixmap, left, top, right, bottom, paint);
        return;
    };
    let path = PathBuilder::from_rect(rect);
    let stroke = Stroke {
        width: BORDER_PX,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

/// 标签放在元素上方；上方空间不够时放在元素内部左上角
fn draw_label(pixmap: &mut Pixmap, left: f32, top: f32, impact: Impact) {
    let text = impact.as_str().to_ascii_uppercase();
    let advance = (GLYPH_WIDTH + 1) as f32 * GLYPH_SCALE;
    let label_width = text.chars().count() as f32 * advance + LABEL_PADDING * 2.0;
    let label_height = GLYPH_HEIGHT as f32 * GLYPH_SCALE + LABEL_PADDING * 2.0;
    let label_top = if top >= label_height { top - label_height } else { top };

    let style = impact.style();
    fill_box(
        pixmap,
        left,
        label_top,
        left + label_width,
        label_top + label_height,
        paint(style.rgb, 1.0),
    );

    let foreground = paint(style.label_rgb, 1.0);
    let mut cursor_x = left + LABEL_PADDING;
    let cursor_y = label_top + LABEL_PADDING;
    for ch in text.chars() {
        draw_glyph(pixmap, cursor_x, cursor_y, glyph(ch), &foreground);
        cursor_x += advance;
    }
}

fn draw_glyph(pixmap: &mut Pixmap, x: f32, y: f32, rows: [u8; 7], paint: &Paint) {
    for (row_index, row) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if row & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            let px = x + col as f32 * GLYPH_SCALE;
            let py = y + row_index as f32 * GLYPH_SCALE;
            if let Some(cell) = tiny_skia::Rect::from_xywh(px, py, GLYPH_SCALE, GLYPH_SCALE) {
                pixmap.fill_rect(cell, paint, Transform::identity(), None);
            }
        }
    }
}

fn to_pixmap(rgba: &RgbaImage) -> AppResult<Pixmap> {
    let (width, height) = rgba.dimensions();
    let mut pixmap =
        Pixmap::new(width, height).ok_or(EvidenceError::CanvasFailed { width, height })?;
    for (src, dst) in rgba
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
    {
        let alpha = src[3];
        dst[0] = premultiply(src[0], alpha);
        dst[1] = premultiply(src[1], alpha);
        dst[2] = premultiply(src[2], alpha);
        dst[3] = alpha;
    }
    Ok(pixmap)
}

fn from_pixmap(pixmap: &Pixmap) -> RgbaImage {
    let mut raw = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        raw.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), raw)
        .unwrap_or_else(|| RgbaImage::new(pixmap.width(), pixmap.height()))
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    let product = channel as u16 * alpha as u16 + 127;
    ((product + (product >> 8)) >> 8) as u8
}

fn encode_png(canvas: &RgbaImage) -> AppResult<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            canvas.as_raw(),
            canvas.width(),
            canvas.height(),
            ColorType::Rgba8.into(),
        )
        .map_err(|e| EvidenceError::ImageEncodeFailed { source: e })?;
    Ok(out)
}

/// 5x7 点阵字形，仅覆盖严重程度名称用到的字母
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        _ => [0; 7],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn white_png(width: u32, height: u32) -> Vec<u8> {
        let canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        encode_png(&canvas).unwrap()
    }

    #[test]
    fn test_highlight_tints_element_only() {
        let region = Rect::new(0.0, 0.0, 120.0, 80.0);
        let element = Rect::new(30.0, 30.0, 60.0, 30.0);
        let png = highlight(&white_png(120, 80), element, region, Impact::Critical).unwrap();

        let out = image::load_from_memory(&png).unwrap().to_rgba8();
        // 元素中心：红色调
        let center = out.get_pixel(60, 45);
        assert!(center[0] > center[1]);
        assert!(center[1] < 255);
        // 留白区域保持原样
        assert_eq!(out.get_pixel(2, 78), &Rgba([255, 255, 255, 255]));
        // 边框为不透明的严重程度颜色
        assert_eq!(out.get_pixel(31, 45), &Rgba([220, 38, 38, 255]));
    }

    #[test]
    fn test_highlight_scales_to_device_pixels() {
        // 截图是 2 倍像素
        let region = Rect::new(0.0, 0.0, 60.0, 40.0);
        let element = Rect::new(20.0, 25.0, 20.0, 10.0);
        let png = highlight(&white_png(120, 80), element, region, Impact::Minor).unwrap();
        let out = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!((out.width(), out.height()), (120, 80));
        let center = out.get_pixel(60, 60);
        assert!(center[1] > center[0]);
    }

    #[test]
    fn test_highlight_rejects_garbage() {
        let region = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(highlight(b"not a png", region, region, Impact::Serious).is_err());
        let empty = Rect::new(0.0, 0.0, 0.0, 10.0);
        assert!(highlight(&white_png(1, 1), region, empty, Impact::Serious).is_err());
    }

    #[test]
    fn test_label_drawn_above_element() {
        let region = Rect::new(0.0, 0.0, 200.0, 100.0);
        let element = Rect::new(40.0, 60.0, 100.0, 30.0);
        let png = highlight(&white_png(200, 100), element, region, Impact::Serious).unwrap();
        let out = image::load_from_memory(&png).unwrap().to_rgba8();
        // 标签底色在元素上方
        let label = out.get_pixel(41, 41);
        assert_eq!(label[3], 255);
        assert_ne!(label, &Rgba([255, 255, 255, 255]));
        // 标签右侧保持原样
        assert_eq!(out.get_pixel(195, 41), &Rgba([255, 255, 255, 255]));
    }
}
