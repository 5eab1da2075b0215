use crate::mapping::MappedPosition;

/// 軌跡の1点（表示ピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailPoint {
    pub position: [f32; 2],
}

impl From<MappedPosition> for TrailPoint {
    fn from(p: MappedPosition) -> Self {
        Self { position: [p.x, p.y] }
    }
}

/// オペレーター向けの軌跡表示用バッファ
///
/// 短いセッションでの目視確認用なので上限・間引きはない。
/// クリアされるまで単調に伸びる。
#[derive(Debug, Default)]
pub struct TrailBuffer {
    points: Vec<TrailPoint>,
}

impl TrailBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: TrailPoint) {
        self.points.push(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// 古い順
    pub fn points(&self) -> &[TrailPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
