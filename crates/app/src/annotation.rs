//! Drawing primitives for annotated frames: detection boxes, confidence
//! labels, and the frame-level overlays. Text uses a tiny built-in 5x7 glyph
//! set so the crate stays free of font rasterisation dependencies.

use detect_core::Detection;
use image::{Rgb, RgbImage};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_BG: Rgb<u8> = Rgb([0, 0, 0]);
const INFO_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Draw one rectangle and confidence label per detection.
pub fn annotate_detections(image: &mut RgbImage, detections: &[Detection]) {
    for det in detections {
        let [left, top, right, bottom] = det.bbox_xyxy;
        draw_rectangle(
            image,
            left.round() as i32,
            top.round() as i32,
            right.round() as i32,
            bottom.round() as i32,
            BOX_COLOR,
        );
    }

    for det in detections {
        let label = format!("FACE {:.0}%", det.score * 100.0);
        let label_x = det.bbox_xyxy[0].round() as i32;
        let label_y = (det.bbox_xyxy[1].round() as i32 - 12).max(0);
        draw_banner(image, label_x, label_y, &label, BOX_COLOR);
    }
}

/// Draw the frame-level detection count in the top-left corner.
pub fn draw_count_overlay(image: &mut RgbImage, count: usize) {
    draw_banner(image, 4, 4, &format!("FACES {count}"), BOX_COLOR);
}

/// Draw the running frame counter used by the serial preview.
pub fn draw_frame_counter(image: &mut RgbImage, frame_number: u64) {
    draw_banner(image, 4, 16, &format!("FRAME {frame_number:06}"), INFO_COLOR);
}

/// Filled background strip with text on top.
fn draw_banner(image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let text_width = text.chars().count() as i32 * 6;
    fill_rect(image, x, y, x + text_width + 3, y + 8, LABEL_BG);
    draw_label(image, x + 2, y + 1, text, color);
}

fn draw_rectangle(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let left = left.clamp(0, width.saturating_sub(1));
    let right = right.clamp(0, width.saturating_sub(1));
    let top = top.clamp(0, height.saturating_sub(1));
    let bottom = bottom.clamp(0, height.saturating_sub(1));

    for x in left..=right {
        *image.get_pixel_mut(x as u32, top as u32) = color;
        *image.get_pixel_mut(x as u32, bottom as u32) = color;
    }
    for y in top..=bottom {
        *image.get_pixel_mut(left as u32, y as u32) = color;
        *image.get_pixel_mut(right as u32, y as u32) = color;
    }
}

fn fill_rect(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let left = left.clamp(0, width.saturating_sub(1));
    let right = right.clamp(0, width.saturating_sub(1));
    let top = top.clamp(0, height.saturating_sub(1));
    let bottom = bottom.clamp(0, height.saturating_sub(1));

    for y in top..=bottom {
        for x in left..=right {
            *image.get_pixel_mut(x as u32, y as u32) = color;
        }
    }
}

fn draw_label(image: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                let py = y + row as i32;
                if py < 0 || py >= height {
                    continue;
                }
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        let px = x + col;
                        if px >= 0 && px < width {
                            *image.get_pixel_mut(px as u32, py as u32) = color;
                        }
                    }
                }
            }
        }
        x += 6;
    }
}

/// Glyphs for the characters the overlays actually emit.
fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'A' => Some([
            0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'C' => Some([
            0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110,
        ]),
        'E' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'F' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000,
        ]),
        'M' => Some([
            0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001,
        ]),
        'R' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001,
        ]),
        'S' => Some([
            0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '0' => Some([
            0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110,
        ]),
        '1' => Some([
            0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        '2' => Some([
            0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111,
        ]),
        '3' => Some([
            0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110,
        ]),
        '4' => Some([
            0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010,
        ]),
        '5' => Some([
            0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '6' => Some([
            0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110,
        ]),
        '7' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000,
        ]),
        '8' => Some([
            0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110,
        ]),
        '9' => Some([
            0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100,
        ]),
        '%' => Some([
            0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0b00000,
        ]),
        ' ' => Some([0, 0, 0, 0, 0, 0, 0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([0, 0, 0]))
    }

    fn detection(bbox_xyxy: [f32; 4], score: f32) -> Detection {
        Detection {
            bbox_xyxy,
            score,
            class_id: 0,
        }
    }

    #[test]
    fn draws_box_edges() {
        let mut image = blank(64, 64);
        annotate_detections(&mut image, &[detection([10.0, 20.0, 30.0, 40.0], 0.9)]);

        assert_eq!(*image.get_pixel(10, 20), BOX_COLOR);
        assert_eq!(*image.get_pixel(30, 40), BOX_COLOR);
        assert_eq!(*image.get_pixel(20, 20), BOX_COLOR);
        // interior stays untouched
        assert_eq!(*image.get_pixel(20, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn clamps_boxes_exceeding_image_bounds() {
        let mut image = blank(32, 32);
        annotate_detections(&mut image, &[detection([-15.0, -15.0, 200.0, 200.0], 0.7)]);

        // bottom edge and right edge land on the last row/column
        assert_eq!(*image.get_pixel(0, 31), BOX_COLOR);
        assert_eq!(*image.get_pixel(31, 20), BOX_COLOR);
    }

    #[test]
    fn count_overlay_paints_pixels() {
        let mut image = blank(128, 32);
        let before = image.clone();
        draw_count_overlay(&mut image, 3);
        assert_ne!(image, before);
    }

    #[test]
    fn frame_counter_paints_pixels() {
        let mut image = blank(128, 32);
        let before = image.clone();
        draw_frame_counter(&mut image, 42);
        assert_ne!(image, before);
    }

    #[test]
    fn overlays_survive_tiny_images() {
        let mut image = blank(4, 4);
        annotate_detections(&mut image, &[detection([0.0, 0.0, 10.0, 10.0], 0.5)]);
        draw_count_overlay(&mut image, 1);
        draw_frame_counter(&mut image, 1);
    }
}
