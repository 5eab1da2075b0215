use anyhow::Result;
use minifb::{Key, KeyRepeat, MouseButton, Window, WindowOptions};

use crate::mapping::MappedPosition;
use crate::orchestrator::InputEvent;
use crate::osc::DisplaySize;
use crate::render::{BACKGROUND_COLOR, MARKER_COLOR, MARKER_RADIUS, TRAIL_COLOR, TRAIL_RADIUS};
use crate::trail::TrailBuffer;

/// minifbを使用したオペレーター用レンダラー
pub struct MinifbRenderer {
    window: Window,
    title: String,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    fullscreen: bool,
    mouse_was_down: bool,
}

impl MinifbRenderer {
    /// ウィンドウを作成
    pub fn new(title: &str, width: usize, height: usize, fullscreen: bool) -> Result<Self> {
        let window = open_window(title, width, height, fullscreen)?;
        Ok(Self {
            window,
            title: title.to_string(),
            buffer: vec![BACKGROUND_COLOR; width * height],
            width,
            height,
            fullscreen,
            mouse_was_down: false,
        })
    }

    /// ウィンドウが開いているか
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    pub fn size(&self) -> DisplaySize {
        DisplaySize::new(self.width as u32, self.height as u32)
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// キー・マウス入力をコアのイベントに変換
    /// [A] 軌跡クリア、左クリック フルスクリーン切替
    pub fn poll_input(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();
        if self.window.is_key_pressed(Key::A, KeyRepeat::No) {
            events.push(InputEvent::ClearTrail);
        }
        let mouse_down = self.window.get_mouse_down(MouseButton::Left);
        if mouse_down && !self.mouse_was_down {
            events.push(InputEvent::ToggleFullscreen);
        }
        self.mouse_was_down = mouse_down;
        events
    }

    /// minifbは実行中に装飾を変えられないので作り直す
    pub fn set_fullscreen(&mut self, fullscreen: bool) -> Result<()> {
        if fullscreen == self.fullscreen {
            return Ok(());
        }
        self.window = open_window(&self.title, self.width, self.height, fullscreen)?;
        self.fullscreen = fullscreen;
        self.mouse_was_down = true;
        Ok(())
    }

    /// 背景、軌跡、今回の位置の順に描く
    pub fn draw(&mut self, trail: &TrailBuffer, positions: &[(usize, MappedPosition)]) {
        self.buffer.fill(BACKGROUND_COLOR);

        for (_, p) in positions {
            self.draw_circle(p.x as i32, p.y as i32, MARKER_RADIUS, MARKER_COLOR);
        }
        for point in trail.points() {
            let [x, y] = point.position;
            self.draw_circle(x as i32, y as i32, TRAIL_RADIUS, TRAIL_COLOR);
        }
    }

    /// バッファをウィンドウに表示
    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)?;
        Ok(())
    }

    /// 円を描画（塗りつぶし）
    fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, color: u32) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.set_pixel(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// ピクセルをセット（境界チェック付き）
    fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.buffer[y as usize * self.width + x as usize] = color;
        }
    }
}

fn open_window(title: &str, width: usize, height: usize, fullscreen: bool) -> Result<Window> {
    let window = Window::new(
        title,
        width,
        height,
        WindowOptions {
            resize: false,
            borderless: fullscreen,
            topmost: fullscreen,
            ..WindowOptions::default()
        },
    )?;
    Ok(window)
}
