//! Terminal rendering of a chart screenshot using upper half blocks: each
//! cell shows two vertically stacked pixels (foreground on top, background
//! below).

use image::{RgbaImage, imageops::FilterType};
use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

const HALF_BLOCK: &str = "▀";

/// Scale `img` to fit `cols` × `rows` cells, keeping its aspect ratio.
pub fn raster_lines(img: &RgbaImage, cols: u16, rows: u16) -> Vec<Line<'static>> {
    let (w, h) = fit(img.width(), img.height(), cols as u32, rows as u32 * 2);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let scaled = image::imageops::resize(img, w, h, FilterType::Triangle);

    (0..h)
        .step_by(2)
        .map(|y| {
            let spans: Vec<Span<'static>> = (0..w)
                .map(|x| {
                    let top = rgb(scaled.get_pixel(x, y));
                    let bottom = if y + 1 < h {
                        rgb(scaled.get_pixel(x, y + 1))
                    } else {
                        Color::Reset
                    };
                    Span::styled(HALF_BLOCK, Style::default().fg(top).bg(bottom))
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn rgb(p: &image::Rgba<u8>) -> Color {
    let [r, g, b, a] = p.0;
    // Transparent pixels are composited onto white, as a browser page would be.
    let blend = |c: u8| ((c as u16 * a as u16 + 255 * (255 - a as u16)) / 255) as u8;
    Color::Rgb(blend(r), blend(g), blend(b))
}

/// Largest size with the source aspect ratio inside `max_w` × `max_h`.
fn fit(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 || max_w == 0 || max_h == 0 {
        return (0, 0);
    }
    let scale = f64::min(max_w as f64 / src_w as f64, max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).floor() as u32).clamp(1, max_w);
    let h = ((src_h as f64 * scale).floor() as u32).clamp(1, max_h);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_keeps_aspect_ratio() {
        assert_eq!(fit(200, 100, 40, 40), (40, 20));
        assert_eq!(fit(100, 200, 40, 40), (20, 40));
        assert_eq!(fit(10, 10, 0, 5), (0, 0));
    }

    #[test]
    fn two_pixel_rows_per_line() {
        let mut img = RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]));
        for x in 0..4 {
            for y in 2..4 {
                img.put_pixel(x, y, image::Rgba([0, 0, 255, 255]));
            }
        }
        let lines = raster_lines(&img, 4, 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].spans.len(), 4);
        let cell = &lines[1].spans[0];
        assert_eq!(cell.content, HALF_BLOCK);
        assert_eq!(cell.style.fg, Some(Color::Rgb(0, 0, 255)));
    }

    #[test]
    fn transparent_pixels_render_white() {
        assert_eq!(
            rgb(&image::Rgba([0, 0, 0, 0])),
            Color::Rgb(255, 255, 255)
        );
    }
}
