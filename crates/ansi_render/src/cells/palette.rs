/// Number of colors per palette half.
pub const PALETTE_SIZE: usize = 8;

pub type Rgb = [u8; 3];

/// The 16 ANSI colors: eight normal entries and their eight bright counterparts.
///
/// Foregrounds of bold cells come from the bright half, backgrounds always from the normal half.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    normal: [Rgb; PALETTE_SIZE],
    bold: [Rgb; PALETTE_SIZE],
}

impl Palette {
    pub fn new(normal: [Rgb; PALETTE_SIZE], bold: [Rgb; PALETTE_SIZE]) -> Self {
        Self { normal, bold }
    }

    /// Classic VGA text mode colors.
    pub fn vga() -> Self {
        Self::new(
            [
                [0, 0, 0],
                [170, 0, 0],
                [0, 170, 0],
                [170, 85, 0],
                [0, 0, 170],
                [170, 0, 170],
                [0, 170, 170],
                [170, 170, 170],
            ],
            [
                [85, 85, 85],
                [255, 85, 85],
                [85, 255, 85],
                [255, 255, 85],
                [85, 85, 255],
                [255, 85, 255],
                [85, 255, 255],
                [255, 255, 255],
            ],
        )
    }

    /// xterm's default 16 colors.
    pub fn xterm() -> Self {
        Self::new(
            [
                [0, 0, 0],
                [128, 0, 0],
                [0, 128, 0],
                [128, 128, 0],
                [0, 0, 128],
                [128, 0, 128],
                [0, 128, 128],
                [192, 192, 192],
            ],
            [
                [128, 128, 128],
                [255, 0, 0],
                [0, 255, 0],
                [255, 255, 0],
                [0, 0, 255],
                [255, 0, 255],
                [0, 255, 255],
                [255, 255, 255],
            ],
        )
    }

    pub fn normal(&self) -> &[Rgb; PALETTE_SIZE] {
        &self.normal
    }

    pub fn bold(&self) -> &[Rgb; PALETTE_SIZE] {
        &self.bold
    }

    /// Foreground color, bright when `bold` is set.
    #[inline]
    pub fn foreground(&self, index: usize, bold: bool) -> Rgb {
        if bold {
            self.bold[index]
        } else {
            self.normal[index]
        }
    }

    #[inline]
    pub fn background(&self, index: usize) -> Rgb {
        self.normal[index]
    }

    /// All 16 colors, normal half first.
    pub fn iter(&self) -> impl Iterator<Item = Rgb> + '_ {
        self.normal.iter().chain(self.bold.iter()).copied()
    }
}

/// Color between `background` at `t == 0.0` and `foreground` at `t == 1.0`.
///
/// The offset from the background is truncated toward zero, so the result never leaves the
/// span between both colors.
#[inline]
pub fn mix(background: Rgb, foreground: Rgb, t: f32) -> Rgb {
    let mut out = background;
    for (channel, fg) in out.iter_mut().zip(foreground) {
        let delta = (f32::from(fg) - f32::from(*channel)) * t;
        *channel = (i32::from(*channel) + delta as i32) as u8;
    }
    out
}

impl Default for Palette {
    fn default() -> Self {
        Self::vga()
    }
}
