use image::RgbaImage;

use crate::model::Rect;

/// Copy `src` into `canvas` with its top-left at `(dx, dy)`.
///
/// Pixels are replaced, not alpha-blended, so transparent source pixels stay
/// transparent on the canvas. Pixels falling outside the canvas are dropped.
pub fn blit_rgba(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    for yy in 0..sh {
        if dy + yy >= ch {
            break;
        }
        for xx in 0..sw {
            if dx + xx >= cw {
                break;
            }
            canvas.put_pixel(dx + xx, dy + yy, *src.get_pixel(xx, yy));
        }
    }
}

/// Copy the `rect` region out of `canvas`. Returns `None` when the rectangle is
/// empty or not fully inside the canvas.
pub fn crop_rgba(canvas: &RgbaImage, rect: &Rect) -> Option<RgbaImage> {
    let (cw, ch) = canvas.dimensions();
    if rect.w == 0 || rect.h == 0 {
        return None;
    }
    let bounds = Rect::new(0, 0, cw, ch);
    let fits = (rect.x as u64 + rect.w as u64) <= cw as u64
        && (rect.y as u64 + rect.h as u64) <= ch as u64
        && bounds.contains(rect);
    if !fits {
        return None;
    }
    Some(image::imageops::crop_imm(canvas, rect.x, rect.y, rect.w, rect.h).to_image())
}
