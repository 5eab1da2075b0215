use std::sync::{Arc, Mutex, MutexGuard};

use crate::skeleton::SkeletalFrame;

/// IDとフレームの組。同じロックの下で読むので必ず対応している。
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// 1始まり。publishごとに増える。
    pub id: u64,
    pub frame: Arc<SkeletalFrame>,
}

#[derive(Default)]
struct Slot {
    next_id: u64,
    latest: Option<FrameSnapshot>,
}

struct Shared {
    slot: Mutex<Slot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // 中身は Arc の差し替えだけなので poison されても整合している
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// センサースレッド側。最新フレームを上書きする（last-write-wins）。
pub struct FrameWriter {
    shared: Arc<Shared>,
}

/// tickループ側。毎tick一貫したスナップショットを1つ読む。
#[derive(Clone)]
pub struct FrameReader {
    shared: Arc<Shared>,
}

/// 容量1・上書き型のフレーム受け渡し口を作る
pub fn frame_slot() -> (FrameWriter, FrameReader) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::default()),
    });
    (
        FrameWriter {
            shared: Arc::clone(&shared),
        },
        FrameReader { shared },
    )
}

impl FrameWriter {
    pub fn publish(&self, frame: SkeletalFrame) {
        // Arc の確保はロックの外で
        let frame = Arc::new(frame);
        let mut slot = self.shared.lock();
        slot.next_id += 1;
        let id = slot.next_id;
        slot.latest = Some(FrameSnapshot { id, frame });
    }
}

impl FrameReader {
    /// 最後に届いたフレームのID。まだ何も届いていなければ0。
    pub fn frame_id(&self) -> u64 {
        self.shared.lock().latest.as_ref().map_or(0, |s| s.id)
    }

    /// 最新フレームとそのID。センサーが次を書くまで同じフレームが返る。
    /// 初回フレーム到着前のみNone。
    pub fn latest(&self) -> Option<FrameSnapshot> {
        self.shared.lock().latest.clone()
    }
}
