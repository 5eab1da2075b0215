use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use stage_tracker::config::Config;
#[cfg(feature = "desktop")]
use stage_tracker::orchestrator::InputEvent;
use stage_tracker::orchestrator::{Lifecycle, Orchestrator, PipelineError};
use stage_tracker::osc::DisplaySize;
#[cfg(feature = "desktop")]
use stage_tracker::render::MinifbRenderer;
use stage_tracker::sensor::{frame_slot, SimulatedSensor};

const CONFIG_PATH: &str = "stage_tracker.toml";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            match e.downcast_ref::<PipelineError>() {
                Some(pipeline) => ExitCode::from(pipeline.exit_code()),
                None => ExitCode::FAILURE,
            }
        }
    }
}

fn run() -> Result<()> {
    // 設定ファイルがあるのに不正なら終了コード1で止める
    let config = Config::load_or_default(CONFIG_PATH)?;

    log::info!("Stage Tracker {}", env!("CARGO_PKG_VERSION"));
    log::info!(
        "OSC: {}:{} -> {} {}/<n> (on send error: {:?})",
        config.osc.local_host,
        config.osc.local_port,
        config.osc.destination,
        config.osc.address_prefix,
        config.osc.on_send_error
    );
    log::info!(
        "Window: {}x{} joint={:?} target_fps={}",
        config.window.width,
        config.window.height,
        config.stage.joint,
        config.app.target_fps
    );

    let display = DisplaySize::new(config.window.width, config.window.height);
    let (writer, reader) = frame_slot();
    let mut orchestrator = Orchestrator::new(&config, display, reader);

    // bind失敗は致命的、ループには入らない
    orchestrator.initialize().with_context(|| {
        format!(
            "Error binding {}:{} (destination {})",
            config.osc.local_host, config.osc.local_port, config.osc.destination
        )
    })?;
    let transport = orchestrator.transport();
    if let (Some(local), Some(destination)) = (transport.local_addr(), transport.destination()) {
        log::info!("sending {}/<n> from {} to {}", config.osc.address_prefix, local, destination);
    }

    let mut sensor = SimulatedSensor::start(&config.sensor, writer)?;

    let result = run_loop(&config, &mut orchestrator);

    sensor.stop();
    orchestrator.terminate();
    log::info!("Shutting down...");
    result
}

fn run_loop(config: &Config, orchestrator: &mut Orchestrator) -> Result<()> {
    #[cfg(feature = "desktop")]
    let mut renderer = if config.debug.view {
        Some(MinifbRenderer::new(
            &config.window.title,
            config.window.width as usize,
            config.window.height as usize,
            config.window.fullscreen,
        )?)
    } else {
        None
    };

    let frame_duration = Duration::from_secs_f64(1.0 / config.app.target_fps as f64);

    // FPS計測
    let mut tick_count = 0u32;
    let mut sent_count = 0usize;
    let mut fps_timer = Instant::now();

    loop {
        let loop_start = Instant::now();

        #[cfg(feature = "desktop")]
        if let Some(ref mut r) = renderer {
            if !r.is_open() {
                break;
            }
            // 入力はtickより先に反映する
            for event in r.poll_input() {
                if !orchestrator.handle_input(event) && event == InputEvent::ToggleFullscreen {
                    let fullscreen = !r.is_fullscreen();
                    r.set_fullscreen(fullscreen)?;
                    // 正規化に使う表示サイズを実ウィンドウに合わせる
                    let size = r.size();
                    orchestrator.set_display_size(size);
                    log::info!("fullscreen: {} ({}x{})", fullscreen, size.width, size.height);
                }
            }
        }

        let report = orchestrator.tick()?;
        sent_count += report.sent;

        #[cfg(feature = "desktop")]
        if let Some(ref mut r) = renderer {
            r.draw(orchestrator.trail(), &report.positions);
            r.update()?;
        }

        // ログ（1秒に1回）
        tick_count += 1;
        let elapsed = fps_timer.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            let head = report
                .positions
                .first()
                .map(|(_, p)| format!(" first=({:.0}, {:.0})", p.x, p.y))
                .unwrap_or_default();
            log::info!(
                "FPS: {:.1} | frame {} | bodies {} | sent {} | trail {}{}",
                tick_count as f32 / elapsed,
                report.frame_id,
                report.positions.len(),
                sent_count,
                orchestrator.trail().len(),
                head
            );
            tick_count = 0;
            sent_count = 0;
            fps_timer = Instant::now();
        }

        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }

    Ok(())
}
