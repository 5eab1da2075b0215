use crate::config::{Config, SendFailurePolicy};
use crate::mapping::{MappedPosition, StageCalibration};
use crate::osc::{DisplaySize, PositionEncoder};
use crate::sensor::FrameReader;
use crate::skeleton::BodySelector;
use crate::trail::TrailBuffer;
use crate::transport::{
    ConnectionState, FailureOutcome, OscTransport, SendError, TransportError,
};

/// 描画ループから呼ばれるライフサイクル
pub trait Lifecycle {
    type Report;
    type Error;

    /// ループ開始前に一度だけ。ここだけがブロック・失敗し得る。
    fn initialize(&mut self) -> Result<(), Self::Error>;
    fn tick(&mut self) -> Result<Self::Report, Self::Error>;
    fn terminate(&mut self);
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("fatal send failure: {0}")]
    SendFailed(SendError),
}

impl PipelineError {
    /// プロセス終了コード (2: bind失敗, 3: 送信失敗)
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Transport(TransportError::Bind { .. } | TransportError::Resolve { .. }) => 2,
            _ => 3,
        }
    }
}

/// ウィンドウ側から転送される入力
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    ClearTrail,
    ToggleFullscreen,
}

/// 1tick分の結果
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// 処理したフレームのID (0 = まだフレームなし)
    pub frame_id: u64,
    /// (チャンネル番号, 表示座標)
    pub positions: Vec<(usize, MappedPosition)>,
    pub sent: usize,
}

/// フレーム → 選択 → 座標変換 → OSC送信 を毎tick回す
pub struct Orchestrator {
    frames: FrameReader,
    selector: BodySelector,
    calibration: StageCalibration,
    encoder: PositionEncoder,
    display: DisplaySize,
    trail: TrailBuffer,
    transport: OscTransport,
    policy: SendFailurePolicy,
}

impl Orchestrator {
    /// キャリブレーションはここで一度だけ計算する
    pub fn new(config: &Config, display: DisplaySize, frames: FrameReader) -> Self {
        Self {
            frames,
            selector: BodySelector::new(config.stage.joint),
            calibration: StageCalibration::from_window(&config.stage, display.width, display.height),
            encoder: PositionEncoder::new(&config.osc.address_prefix),
            display,
            trail: TrailBuffer::new(),
            transport: OscTransport::new(config.osc.clone()),
            policy: config.osc.on_send_error,
        }
    }

    pub fn calibration(&self) -> &StageCalibration {
        &self.calibration
    }

    pub fn trail(&self) -> &TrailBuffer {
        &self.trail
    }

    pub fn transport(&self) -> &OscTransport {
        &self.transport
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn display(&self) -> DisplaySize {
        self.display
    }

    /// 正規化に使う表示サイズだけを更新する（キャリブレーションは固定）
    pub fn set_display_size(&mut self, display: DisplaySize) {
        if display.width == 0 || display.height == 0 {
            return;
        }
        self.display = display;
    }

    /// コアで処理したら true。フルスクリーン切替は呼び出し側の担当。
    pub fn handle_input(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::ClearTrail => {
                self.trail.clear();
                true
            }
            InputEvent::ToggleFullscreen => false,
        }
    }

    /// 送信スレッドからの失敗をこのスレッドで処理する
    fn drain_failures(&mut self) -> Result<(), PipelineError> {
        for failure in self.transport.poll_failures() {
            if self.transport.record_failure(&failure, self.policy) == FailureOutcome::Closed {
                return Err(PipelineError::SendFailed(failure));
            }
        }
        Ok(())
    }
}

impl Lifecycle for Orchestrator {
    type Report = TickReport;
    type Error = PipelineError;

    fn initialize(&mut self) -> Result<(), PipelineError> {
        self.transport.bind()?;
        Ok(())
    }

    fn tick(&mut self) -> Result<TickReport, PipelineError> {
        self.drain_failures()?;

        // IDとフレームは同じスナップショットから取る
        let Some(snapshot) = self.frames.latest() else {
            return Ok(TickReport::default());
        };

        let mut report = TickReport {
            frame_id: snapshot.id,
            ..TickReport::default()
        };

        for selection in self.selector.select(&snapshot.frame) {
            let mapped = self.calibration.map_joint(&selection.joint);
            let msg = self.encoder.encode(selection.index, mapped, self.display);
            self.transport.send(&msg)?;

            // 送信キューに載ったものだけ軌跡とレポートに残す
            self.trail.push(mapped.into());
            report.positions.push((selection.index, mapped));
            report.sent += 1;
        }

        Ok(report)
    }

    fn terminate(&mut self) {
        self.transport.close();
    }
}
