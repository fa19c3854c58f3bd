use super::RgbaData;

const BG_COLOR: [u8; 4] = [64, 64, 64, 255];
const BORDER_COLOR: [u8; 4] = [96, 96, 96, 255];
const TEXT_COLOR: [u8; 4] = [220, 220, 220, 255];

/// Largest placeholder we are willing to allocate
const MAX_SIDE: u32 = 1024;

/// 3x5 digit glyphs, one row per entry, high bit is the left column.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

const FALLBACK_PREFIX: &str = "fallback:";

/// Cache key under which the fallback for `index` is stored.
pub fn fallback_key(index: usize) -> String {
    format!("{FALLBACK_PREFIX}{index}")
}

pub fn is_fallback_key(key: &str) -> bool {
    key.starts_with(FALLBACK_PREFIX)
}

/// Placeholder shown when an item's image can't be loaded: dark gray with a
/// border and the 1-based item number in the middle.
pub fn fallback_image(index: usize, width: u32, height: u32) -> RgbaData {
    let w = width.clamp(8, MAX_SIDE);
    let h = height.clamp(8, MAX_SIDE);
    let mut data = vec![0u8; (w * h * 4) as usize];

    for i in 0..(w * h) as usize {
        data[i * 4..i * 4 + 4].copy_from_slice(&BG_COLOR);
    }

    for y in 0..h {
        for x in 0..w {
            if x < 2 || x >= w - 2 || y < 2 || y >= h - 2 {
                let idx = ((y * w + x) * 4) as usize;
                data[idx..idx + 4].copy_from_slice(&BORDER_COLOR);
            }
        }
    }

    let label = (index + 1).to_string();
    let glyph_count = label.len() as u32;
    // each glyph is 3 cells wide plus one cell gap
    let cells_w = glyph_count * 4 - 1;
    let scale = ((w / 2) / cells_w).min((h / 3) / 5).max(1);
    let text_w = cells_w * scale;
    let text_h = 5 * scale;
    let origin_x = w.saturating_sub(text_w) / 2;
    let origin_y = h.saturating_sub(text_h) / 2;

    for (n, ch) in label.bytes().enumerate() {
        let glyph = &DIGITS[(ch - b'0') as usize];
        let glyph_x = origin_x + n as u32 * 4 * scale;
        for (row, bits) in glyph.iter().enumerate() {
            for col in 0..3u32 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = glyph_x + col * scale + dx;
                        let y = origin_y + row as u32 * scale + dy;
                        if x < w && y < h {
                            let idx = ((y * w + x) * 4) as usize;
                            data[idx..idx + 4].copy_from_slice(&TEXT_COLOR);
                        }
                    }
                }
            }
        }
    }

    RgbaData::new(data, w, h)
}
