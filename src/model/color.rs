/// A packed `0xAARRGGBB` color.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Color(pub u32);

/// Contrast ratio above which light text stays legible on a color.
pub const LIGHT_TEXT_CONTRAST_THRESHOLD: f32 = 3.0;

impl Color {
    pub const WHITE: Color = Color(0xFFFF_FFFF);
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const TRANSPARENT: Color = Color(0);

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Color {
        Color(0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub const fn alpha(self) -> u8 { (self.0 >> 24) as u8 }
    pub const fn red(self) -> u8 { (self.0 >> 16) as u8 }
    pub const fn green(self) -> u8 { (self.0 >> 8) as u8 }
    pub const fn blue(self) -> u8 { self.0 as u8 }

    pub fn to_rgba(self) -> [u8; 4] { [self.red(), self.green(), self.blue(), self.alpha()] }

    /// Relative luminance of the sRGB channels, ignoring alpha.
    pub fn relative_luminance(self) -> f32 {
        0.2126 * linearize(self.red())
            + 0.7152 * linearize(self.green())
            + 0.0722 * linearize(self.blue())
    }

    /// Whether white text reads well on top of this color.
    pub fn use_light_text(self) -> bool {
        contrast_between(self, Color::WHITE) > LIGHT_TEXT_CONTRAST_THRESHOLD
    }
}

fn linearize(channel: u8) -> f32 {
    let c = channel as f32 / 255.0;
    if c < 0.03928 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
}

/// Contrast ratio between a background and a foreground color.
pub fn contrast_between(bg: Color, fg: Color) -> f32 {
    let bg_l = bg.relative_luminance();
    let fg_l = fg.relative_luminance();
    ((fg_l + 0.05) / (bg_l + 0.05)).abs()
}
