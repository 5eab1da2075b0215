use crate::config::{AxisTarget, StageConfig};
use crate::skeleton::Joint;

/// 表示ピクセル空間の位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappedPosition {
    pub x: f32,
    pub y: f32,
}

impl MappedPosition {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 値を [source_low, source_high] から [target_low, target_high] へ線形変換する。
///
/// クランプしないので範囲外の値は外挿される。
/// source_low == source_high は呼び出し側のバグ。
pub fn map_range(value: f32, source_low: f32, source_high: f32, target_low: f32, target_high: f32) -> f32 {
    debug_assert!(
        source_low != source_high,
        "degenerate source range [{source_low}, {source_high}]"
    );
    // target_low + (value - source_low) * (target_high - target_low) / (source_high - source_low)
    // と同値。t の形にすると両端で丸め誤差が出ない。
    let t = (value - source_low) / (source_high - source_low);
    (1.0 - t) * target_low + t * target_high
}

/// 1軸分のキャリブレーション済み範囲
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMapping {
    pub source: (f32, f32),
    pub target: (f32, f32),
}

impl AxisMapping {
    pub fn new(source: (f32, f32), target: (f32, f32)) -> Self {
        Self { source, target }
    }

    pub fn map(&self, value: f32) -> f32 {
        map_range(value, self.source.0, self.source.1, self.target.0, self.target.1)
    }
}

/// センサー空間 → ステージ表示空間の変換。起動時に一度だけ計算し、以後不変。
///
/// センサーx → 表示x、センサーz(奥行き) → 表示y。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageCalibration {
    pub x: AxisMapping,
    pub y: AxisMapping,
}

impl StageCalibration {
    pub fn from_window(config: &StageConfig, width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        let resolve = |t: &AxisTarget, dim: f32| t.fraction * dim + t.offset;

        Self {
            x: AxisMapping::new(
                (config.x_source[0], config.x_source[1]),
                (resolve(&config.x_target_low, w), resolve(&config.x_target_high, w)),
            ),
            y: AxisMapping::new(
                (config.z_source[0], config.z_source[1]),
                (resolve(&config.z_target_low, h), resolve(&config.z_target_high, h)),
            ),
        }
    }

    pub fn map_joint(&self, joint: &Joint) -> MappedPosition {
        MappedPosition::new(self.x.map(joint.x()), self.y.map(joint.z()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_range_endpoints_exact() {
        assert_eq!(map_range(-2.45, -2.45, 2.45, 1336.4, 683.6), 1336.4);
        assert_eq!(map_range(2.45, -2.45, 2.45, 1336.4, 683.6), 683.6);
        assert_eq!(map_range(-0.5, -0.5, 5.0, 1060.0, 378.0), 1060.0);
        assert_eq!(map_range(5.0, -0.5, 5.0, 1060.0, 378.0), 378.0);
    }

    #[test]
    fn test_map_range_midpoint() {
        let v = map_range(5.0, 0.0, 10.0, 100.0, 200.0);
        assert!((v - 150.0).abs() < 1e-4);
    }

    #[test]
    fn test_map_range_within_target_bounds() {
        let (a1, a2, b1, b2) = (-0.5f32, 5.0f32, 1060.0f32, 378.0f32);
        for i in 0..=100 {
            let v = a1 + (a2 - a1) * i as f32 / 100.0;
            let m = map_range(v, a1, a2, b1, b2);
            assert!(m <= b1 + 1e-3 && m >= b2 - 1e-3, "v={v} mapped to {m}");
        }
    }

    #[test]
    fn test_map_range_monotonic_increasing() {
        let mut prev = map_range(0.0, 0.0, 1.0, 0.0, 640.0);
        for i in 1..=50 {
            let cur = map_range(i as f32 / 50.0, 0.0, 1.0, 0.0, 640.0);
            assert!(cur > prev);
            prev = cur;
        }
    }

    #[test]
    fn test_map_range_monotonic_inverted() {
        let mut prev = map_range(-2.45, -2.45, 2.45, 1336.4, 683.6);
        for i in 1..=50 {
            let v = -2.45 + 4.9 * i as f32 / 50.0;
            let cur = map_range(v, -2.45, 2.45, 1336.4, 683.6);
            assert!(cur < prev, "v={v}: {cur} !< {prev}");
            prev = cur;
        }
    }

    #[test]
    fn test_map_range_extrapolates() {
        // 範囲外はクランプされない
        let below = map_range(-1.0, 0.0, 1.0, 0.0, 100.0);
        let above = map_range(2.0, 0.0, 1.0, 0.0, 100.0);
        assert!((below + 100.0).abs() < 1e-4);
        assert!((above - 200.0).abs() < 1e-4);
    }

    #[test]
    fn test_calibration_default_stage() {
        let cal = StageCalibration::from_window(&StageConfig::default(), 1920, 1080);
        assert!((cal.x.target.0 - (1920.0 * 0.67 + 50.0)).abs() < 1e-3);
        assert!((cal.x.target.1 - (1920.0 * 0.33 + 50.0)).abs() < 1e-3);
        assert!((cal.y.target.0 - 1060.0).abs() < 1e-3);
        assert!((cal.y.target.1 - 1080.0 * 0.35).abs() < 1e-3);
        assert_eq!(cal.x.source, (-2.45, 2.45));
        assert_eq!(cal.y.source, (-0.5, 5.0));
    }

    #[test]
    fn test_map_joint_uses_x_and_z() {
        let cal = StageCalibration::from_window(&StageConfig::default(), 1920, 1080);
        // y(高さ)は無視される
        let a = cal.map_joint(&Joint::new([0.0, 0.0, 2.25]));
        let b = cal.map_joint(&Joint::new([0.0, 1.7, 2.25]));
        assert_eq!(a, b);
        // カメラ中央 → x範囲の中点
        let mid_x = (cal.x.target.0 + cal.x.target.1) / 2.0;
        assert!((a.x - mid_x).abs() < 1e-3);
        // z=2.25 は [-0.5, 5.0] のちょうど中点
        let mid_y = (cal.y.target.0 + cal.y.target.1) / 2.0;
        assert!((a.y - mid_y).abs() < 1e-3);
    }
}
