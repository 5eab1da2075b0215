use std::collections::BTreeMap;
use std::time::Duration;

use super::JointType;

/// Kinect v2 が同時に扱えるボディスロット数
pub const BODY_COUNT: usize = 6;

/// センサー空間の関節 (メートル、センサー中心)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    pub position: [f32; 3],
}

impl Joint {
    pub fn new(position: [f32; 3]) -> Self {
        Self { position }
    }

    pub fn x(&self) -> f32 {
        self.position[0]
    }

    pub fn y(&self) -> f32 {
        self.position[1]
    }

    /// センサーからの奥行き
    pub fn z(&self) -> f32 {
        self.position[2]
    }
}

/// フレーム内のボディ1体
///
/// `index` はフレーム内の到着順で、フレームをまたいだ同一性は持たない。
/// `joints` は `tracked` が true のときだけ意味を持つ。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Body {
    pub index: usize,
    pub tracked: bool,
    pub joints: BTreeMap<u32, Joint>,
}

impl Body {
    pub fn untracked(index: usize) -> Self {
        Self {
            index,
            tracked: false,
            joints: BTreeMap::new(),
        }
    }

    pub fn tracked(index: usize) -> Self {
        Self {
            index,
            tracked: true,
            joints: BTreeMap::new(),
        }
    }

    pub fn with_joint(mut self, joint: JointType, position: [f32; 3]) -> Self {
        self.joints.insert(joint.id(), Joint::new(position));
        self
    }

    pub fn joint(&self, id: u32) -> Option<&Joint> {
        self.joints.get(&id)
    }
}

/// センサーから届く骨格フレーム。更新のたびに丸ごと置き換えられる。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SkeletalFrame {
    pub bodies: Vec<Body>,
    /// センサー開始からの経過時間
    pub timestamp: Duration,
}

impl SkeletalFrame {
    pub fn new(bodies: Vec<Body>, timestamp: Duration) -> Self {
        Self { bodies, timestamp }
    }

    pub fn tracked_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.tracked).count()
    }
}
