use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::skeleton::JointType;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("[stage] {axis}: source range [{low}, {high}] is empty")]
    DegenerateSource { axis: &'static str, low: f32, high: f32 },
    #[error("[window] size {width}x{height} must be non-zero")]
    EmptyWindow { width: u32, height: u32 },
    #[error("{field} must be greater than zero")]
    ZeroRate { field: &'static str },
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub osc: OscConfig,
    #[serde(default)]
    pub stage: StageConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
}

/// 送信失敗時の扱い
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SendFailurePolicy {
    /// 最初の失敗でソケットを閉じて終了する
    #[default]
    Shutdown,
    /// ログだけ出して送信を続ける
    LogAndContinue,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OscConfig {
    /// バインドするローカルアドレス
    #[serde(default = "default_local_host")]
    pub local_host: String,
    #[serde(default = "default_local_port")]
    pub local_port: u16,
    /// 送信先 (host:port)。実行中は変更しない。
    #[serde(default = "default_destination")]
    pub destination: String,
    #[serde(default = "default_address_prefix")]
    pub address_prefix: String,
    #[serde(default)]
    pub on_send_error: SendFailurePolicy,
}

fn default_local_host() -> String { "0.0.0.0".to_string() }
fn default_local_port() -> u16 { 10000 }
fn default_destination() -> String { "10.0.1.2:10001".to_string() }
fn default_address_prefix() -> String { "/pos/front".to_string() }

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            local_host: default_local_host(),
            local_port: default_local_port(),
            destination: default_destination(),
            address_prefix: default_address_prefix(),
            on_send_error: SendFailurePolicy::default(),
        }
    }
}

/// ウィンドウ寸法に対する比率 + ピクセルオフセット
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct AxisTarget {
    pub fraction: f32,
    #[serde(default)]
    pub offset: f32,
}

impl AxisTarget {
    pub const fn new(fraction: f32, offset: f32) -> Self {
        Self { fraction, offset }
    }
}

/// ステージ形状から決まるキャリブレーション定数
#[derive(Debug, Deserialize, Clone)]
pub struct StageConfig {
    /// 送信対象の関節
    #[serde(default)]
    pub joint: JointType,
    /// センサーx範囲（メートル）
    #[serde(default = "default_x_source")]
    pub x_source: [f32; 2],
    /// x_source[0] の写像先。カメラとステージの左右を合わせるため x は反転している。
    #[serde(default = "default_x_target_low")]
    pub x_target_low: AxisTarget,
    #[serde(default = "default_x_target_high")]
    pub x_target_high: AxisTarget,
    /// センサーz（奥行き）範囲（メートル）
    #[serde(default = "default_z_source")]
    pub z_source: [f32; 2],
    /// 手前（ダウンステージ）側
    #[serde(default = "default_z_target_low")]
    pub z_target_low: AxisTarget,
    /// 奥（アップステージ）側
    #[serde(default = "default_z_target_high")]
    pub z_target_high: AxisTarget,
}

fn default_x_source() -> [f32; 2] { [-2.45, 2.45] }
fn default_x_target_low() -> AxisTarget { AxisTarget::new(0.67, 50.0) }
fn default_x_target_high() -> AxisTarget { AxisTarget::new(0.33, 50.0) }
fn default_z_source() -> [f32; 2] { [-0.5, 5.0] }
fn default_z_target_low() -> AxisTarget { AxisTarget::new(1.0, -20.0) }
fn default_z_target_high() -> AxisTarget { AxisTarget::new(0.35, 0.0) }

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            joint: JointType::default(),
            x_source: default_x_source(),
            x_target_low: default_x_target_low(),
            x_target_high: default_x_target_high(),
            z_source: default_z_source(),
            z_target_low: default_z_target_low(),
            z_target_high: default_z_target_high(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fullscreen")]
    pub fullscreen: bool,
}

fn default_title() -> String { "Stage Tracker".to_string() }
fn default_width() -> u32 { 1920 }
fn default_height() -> u32 { 1080 }
fn default_fullscreen() -> bool { true }

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
            fullscreen: default_fullscreen(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
}

fn default_target_fps() -> u32 { 60 }

impl Default for AppConfig {
    fn default() -> Self {
        Self { target_fps: default_target_fps() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    /// false ならウィンドウなしで送信だけ行う
    #[serde(default = "default_view")]
    pub view: bool,
}

fn default_view() -> bool { true }

impl Default for DebugConfig {
    fn default() -> Self {
        Self { view: default_view() }
    }
}

/// シミュレーションセンサーの設定
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    #[serde(default = "default_rate_hz")]
    pub rate_hz: u32,
    #[serde(default = "default_tracked_bodies")]
    pub tracked_bodies: usize,
    /// 周期的にトラッキングを失うボディを混ぜる
    #[serde(default)]
    pub dropout: bool,
}

fn default_rate_hz() -> u32 { 30 }
fn default_tracked_bodies() -> usize { 1 }

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            rate_hz: default_rate_hz(),
            tracked_bodies: default_tracked_bodies(),
            dropout: false,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// ファイルがなければデフォルト値を使う。あるのに読めない・不正な場合はエラー。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ranges = [("x_source", self.stage.x_source), ("z_source", self.stage.z_source)];
        for (axis, [low, high]) in ranges {
            if low == high || !low.is_finite() || !high.is_finite() {
                return Err(ConfigError::DegenerateSource { axis, low, high });
            }
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::EmptyWindow {
                width: self.window.width,
                height: self.window.height,
            });
        }
        if self.app.target_fps == 0 {
            return Err(ConfigError::ZeroRate { field: "[app] target_fps" });
        }
        if self.sensor.rate_hz == 0 {
            return Err(ConfigError::ZeroRate { field: "[sensor] rate_hz" });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_stage() {
        let config = Config::default();
        assert_eq!(config.osc.local_port, 10000);
        assert_eq!(config.osc.destination, "10.0.1.2:10001");
        assert_eq!(config.osc.address_prefix, "/pos/front");
        assert_eq!(config.osc.on_send_error, SendFailurePolicy::Shutdown);
        assert_eq!(config.stage.joint, JointType::SpineMid);
        assert_eq!(config.stage.x_source, [-2.45, 2.45]);
        assert_eq!(config.stage.z_source, [-0.5, 5.0]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.window.height, 1080);
        assert_eq!(config.app.target_fps, 60);
        assert!(config.debug.view);
        assert_eq!(config.sensor.rate_hz, 30);
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
            [osc]
            destination = "127.0.0.1:9000"
            on_send_error = "log_and_continue"

            [stage]
            joint = "head"
            z_target_low = { fraction = 1.0, offset = -40.0 }

            [window]
            width = 1280
            height = 720
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.osc.destination, "127.0.0.1:9000");
        assert_eq!(config.osc.local_port, 10000);
        assert_eq!(config.osc.on_send_error, SendFailurePolicy::LogAndContinue);
        assert_eq!(config.stage.joint, JointType::Head);
        assert_eq!(config.stage.z_target_low, AxisTarget::new(1.0, -40.0));
        assert_eq!(config.stage.z_target_high, AxisTarget::new(0.35, 0.0));
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn test_validate_rejects_degenerate_source() {
        let mut config = Config::default();
        config.stage.z_source = [1.0, 1.0];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DegenerateSource { axis: "z_source", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = Config::default();
        config.window.height = 0;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyWindow { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_fps() {
        let mut config = Config::default();
        config.app.target_fps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRate { .. })));
    }

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.toml", name, std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/stage_tracker.toml").unwrap();
        assert_eq!(config.osc.local_port, 10000);
    }

    #[test]
    fn test_load_or_default_reads_existing_file() {
        let path = write_temp("stage_tracker_valid", "[osc]\nlocal_port = 12000\n");
        let config = Config::load_or_default(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(config.unwrap().osc.local_port, 12000);
    }

    #[test]
    fn test_load_or_default_rejects_unparsable_file() {
        let path = write_temp("stage_tracker_broken", "[osc\nlocal_port = \"x\"\n");
        let result = Config::load_or_default(&path);
        fs::remove_file(&path).unwrap();
        // 既存ファイルが壊れていたらデフォルトに戻さない
        assert!(result.is_err());
    }

    #[test]
    fn test_load_or_default_rejects_invalid_values() {
        let path = write_temp("stage_tracker_invalid", "[app]\ntarget_fps = 0\n");
        let result = Config::load_or_default(&path);
        fs::remove_file(&path).unwrap();
        let err = result.unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::ZeroRate { .. })));
    }
}
