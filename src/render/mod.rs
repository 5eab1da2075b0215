pub mod window;

pub use window::MinifbRenderer;

/// 背景 (RGB)
pub const BACKGROUND_COLOR: u32 = 0xFFFFFF;

/// 現在位置マーカー (RGB)
pub const MARKER_COLOR: u32 = 0xFF0000;
pub const MARKER_RADIUS: i32 = 25;

/// 軌跡 (RGB)
pub const TRAIL_COLOR: u32 = 0xFF0000;
pub const TRAIL_RADIUS: i32 = 5;
