//! Rectangles, points and the content-transform affine used by block render.

/// A block's laid-out rectangle in surface coordinates, plus its resolved
/// content box — this is the `hotspot` used for pointer hit-testing and the
/// `blocks[i]` entry in state reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub content_width: i32,
    pub content_height: i32,
}

impl BlockBox {
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One of the eight 90°-rotation/flip combinations a block's content bitmap
/// can be shown under. `Rotate90`/`Rotate270` (and their flipped variants)
/// are "odd quartered": content width/height swap before layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentTransform {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    FlipHorizontal,
    FlipVertical,
    FlipRotate90,
    FlipRotate270,
}

impl ContentTransform {
    pub fn from_wire(n: i64) -> Self {
        match n {
            1 => Self::Rotate90,
            2 => Self::Rotate180,
            3 => Self::Rotate270,
            4 => Self::FlipHorizontal,
            5 => Self::FlipRotate90,
            6 => Self::FlipVertical,
            7 => Self::FlipRotate270,
            _ => Self::Normal,
        }
    }

    /// Odd-quartered transforms swap width/height during layout.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Self::Rotate90 | Self::Rotate270 | Self::FlipRotate90 | Self::FlipRotate270
        )
    }
}

/// Nine-point placement of a content bitmap within a block's interior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentAnchor {
    TopLeft,
    TopCenter,
    TopRight,
    #[default]
    LeftCenter,
    Center,
    RightCenter,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl ContentAnchor {
    pub fn from_wire(n: i64) -> Self {
        match n {
            0 => Self::TopLeft,
            1 => Self::TopCenter,
            2 => Self::TopRight,
            3 => Self::LeftCenter,
            4 => Self::Center,
            5 => Self::RightCenter,
            6 => Self::BottomLeft,
            7 => Self::BottomCenter,
            8 => Self::BottomRight,
            _ => Self::LeftCenter,
        }
    }

    /// Compute the top-left offset to place a `(w, h)` box inside an
    /// `(into_w, into_h)` interior.
    pub fn offset_within(self, into_w: i32, into_h: i32, w: i32, h: i32) -> (i32, i32) {
        let x = match self {
            Self::TopLeft | Self::LeftCenter | Self::BottomLeft => 0,
            Self::TopCenter | Self::Center | Self::BottomCenter => (into_w - w) / 2,
            Self::TopRight | Self::RightCenter | Self::BottomRight => into_w - w,
        };
        let y = match self {
            Self::TopLeft | Self::TopCenter | Self::TopRight => 0,
            Self::LeftCenter | Self::Center | Self::RightCenter => (into_h - h) / 2,
            Self::BottomLeft | Self::BottomCenter | Self::BottomRight => into_h - h,
        };
        (x, y)
    }
}

/// Surface-level placement of a block along its surface's main axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    Left,
    Right,
    Center,
    Top,
    Bottom,
    None,
}

impl Anchor {
    pub fn from_wire(n: i64) -> Self {
        match n {
            0 => Self::Left,
            1 => Self::Right,
            2 => Self::Center,
            3 => Self::Top,
            4 => Self::Bottom,
            5 => Self::None,
            _ => Self::Left,
        }
    }
}
