//! 深度センサードライバの代役
//!
//! ドライバのコールバックと同じく、専用スレッドから合成した骨格フレームを書き込む。

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use super::FrameWriter;
use crate::config::SensorConfig;
use crate::skeleton::{Body, JointType, SkeletalFrame, BODY_COUNT};

/// ステージ1周の秒数
const LAP_SECS: f32 = 12.0;
/// dropout時、1周のうちトラッキングが外れる割合
const DROPOUT_SHARE: f32 = 0.25;

pub struct SimulatedSensor {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SimulatedSensor {
    pub fn start(config: &SensorConfig, writer: FrameWriter) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let running_ref = Arc::clone(&running);
        let tracked = config.tracked_bodies.min(BODY_COUNT);
        let dropout = config.dropout;
        let interval = Duration::from_secs_f64(1.0 / config.rate_hz.max(1) as f64);

        if config.tracked_bodies > BODY_COUNT {
            log::warn!(
                "[sensor] tracked_bodies={} exceeds {} body slots, clamping",
                config.tracked_bodies,
                BODY_COUNT
            );
        }

        let handle = thread::Builder::new()
            .name("sensor".to_string())
            .spawn(move || {
                let start = Instant::now();
                while running_ref.load(Ordering::Relaxed) {
                    let t0 = Instant::now();
                    writer.publish(synthesize(start.elapsed(), tracked, dropout));
                    let elapsed = t0.elapsed();
                    if elapsed < interval {
                        thread::sleep(interval - elapsed);
                    }
                }
            })
            .context("failed to spawn sensor thread")?;

        log::info!(
            "[sensor] simulated: {} tracked bod{} at {} Hz{}",
            tracked,
            if tracked == 1 { "y" } else { "ies" },
            config.rate_hz,
            if dropout { " (dropout)" } else { "" }
        );

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("[sensor] thread panicked");
            }
        }
    }
}

impl Drop for SimulatedSensor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 時刻 `t` のフレームを作る。`tracked` 以降のスロットは空きスロットと同じく未トラッキング。
pub fn synthesize(t: Duration, tracked: usize, dropout: bool) -> SkeletalFrame {
    let secs = t.as_secs_f32();
    let bodies = (0..BODY_COUNT)
        .map(|slot| {
            if slot >= tracked {
                return Body::untracked(slot);
            }
            let phase = slot as f32 / tracked.max(1) as f32;
            let lap = (secs / LAP_SECS + phase).fract();

            // 複数人のとき、最後の1人だけ周回の一部で外れる
            if dropout && tracked > 1 && slot == tracked - 1 && lap < DROPOUT_SHARE {
                return Body::untracked(slot);
            }

            let angle = lap * TAU;
            let x = 1.8 * angle.sin();
            let z = 2.25 + 2.0 * angle.cos();
            Body::tracked(slot)
                .with_joint(JointType::SpineBase, [x, -0.3, z])
                .with_joint(JointType::SpineMid, [x, 0.0, z])
                .with_joint(JointType::SpineShoulder, [x, 0.35, z])
                .with_joint(JointType::Head, [x, 0.6, z])
        })
        .collect();

    SkeletalFrame::new(bodies, t)
}
