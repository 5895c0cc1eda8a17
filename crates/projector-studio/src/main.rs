use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use winit::dpi::LogicalSize;

use projector_engine::OverlayConfig;
use projector_engine::device::GpuInit;
use projector_engine::feed::{FeedWorker, NoTracking};
use projector_engine::frame::OverlayApp;
use projector_engine::logging::{LoggingConfig, init_logging};
use projector_engine::render::{CpuRenderer, PngSnapshot};
use projector_engine::scene::Scene;
use projector_engine::service::OverlayService;
use projector_engine::window::{HeadlessConfig, HeadlessRuntime, Runtime, RuntimeConfig, ShutdownSignal};

const WIDTH: u32 = 1920;
const HEIGHT: u32 = 1080;
const FEED_RATE_HZ: u32 = 100;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let headless = args.iter().any(|a| a == "--headless");
    let mut config = OverlayConfig::default();
    if args.iter().any(|a| a == "--profile") {
        config.profile_interval = Some(Duration::from_secs(5));
    }
    let scene = Arc::new(Scene::with_history_capacity(config.history_capacity));
    let service = Arc::new(OverlayService::new(Arc::clone(&scene)));
    populate(&service)?;

    let shutdown = ShutdownSignal::new();
    let feed = FeedWorker::spawn(Arc::clone(&scene), NoTracking, FEED_RATE_HZ);
    let app = OverlayApp::new(Arc::clone(&service), &config, shutdown.clone()).with_feed(feed);
    let font = load_font();
    if font.is_none() {
        log::warn!("no system font found; labels will be skipped");
    }

    if headless {
        run_headless(app, &config, font, &shutdown)
    } else {
        let runtime = RuntimeConfig {
            title: "Projector Overlay".to_string(),
            initial_size: LogicalSize::new(WIDTH as f64, HEIGHT as f64),
            fullscreen: true,
        };
        Runtime::run(
            runtime,
            GpuInit::default(),
            config,
            shutdown,
            move |renderer| {
                if let Some(bytes) = &font {
                    renderer.load_font(bytes).context("font rejected by the text rasterizer")?;
                }
                Ok(())
            },
            app,
        )
    }
}

fn run_headless(
    mut app: OverlayApp,
    config: &OverlayConfig,
    font: Option<Vec<u8>>,
    shutdown: &ShutdownSignal,
) -> Result<()> {
    let out = PathBuf::from("frames");
    std::fs::create_dir_all(&out).with_context(|| format!("cannot create {}", out.display()))?;

    let mut renderer = CpuRenderer::new(WIDTH, HEIGHT, config)
        .with_sink(PngSnapshot::new(&out, config.frame_rate_hz.into()));
    if let Some(bytes) = &font {
        renderer.load_font(bytes).context("font rejected by the text rasterizer")?;
    }

    let headless = HeadlessConfig {
        frame_rate_hz: config.frame_rate_hz,
        max_frames: Some(u64::from(config.frame_rate_hz) * 5),
    };
    let frames = HeadlessRuntime::run(&headless, &mut renderer, &mut app, shutdown)
        .context("headless run failed")?;
    log::info!("rendered {frames} frames into {}", out.display());
    Ok(())
}

/// Default calibration plus a small demo layout, sent through the same
/// command surface an external client would use.
fn populate(service: &OverlayService) -> Result<()> {
    let requests = [
        json!({
            "action": "create_field",
            "name": "screen",
            "world_points": [[0.0, 0.0], [4.0, 0.0], [4.0, 3.0], [0.0, 3.0]],
            "local_points": [[0, HEIGHT], [WIDTH, HEIGHT], [WIDTH, 0], [0, 0]],
        }),
        json!({
            "action": "create_field",
            "name": "table",
            "world_points": [[0.5, 0.5], [2.5, 0.5], [2.5, 1.7], [0.5, 1.7]],
            "local_points": [[0, 0], [100, 0], [100, 60], [0, 60]],
        }),
        json!({
            "action": "set_field_background_color",
            "field": "table",
            "color": [20, 50, 20],
            "alpha": 160,
        }),
        json!({
            "action": "create_drawing",
            "id": "table_zone",
            "field": "table",
            "type": "box",
            "center": [50, 30],
            "width": 90,
            "height": 50,
            "style": { "color": [40, 160, 40, 90] },
            "z": -1,
        }),
        json!({
            "action": "create_entity",
            "id": "robot_1",
            "pose": { "position": [2.0, 1.5], "orientation": 0.0 },
            "style": { "shape": { "kind": "triangle" }, "color": [255, 140, 0] },
        }),
    ];

    for request in requests {
        let response = service.handle(request);
        if response["status"] != "success" {
            anyhow::bail!("demo setup failed: {response}");
        }
    }
    Ok(())
}

fn load_font() -> Option<Vec<u8>> {
    [
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    ]
    .iter()
    .find_map(|p| std::fs::read(p).ok())
}
