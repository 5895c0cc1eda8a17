use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::OverlayConfig;
use crate::core::{App, AppControl, FrameCtx};
use crate::error::{OverlayError, Result};
use crate::feed::FeedHandle;
use crate::input::InputRequest;
use crate::render::Renderer;
use crate::service::OverlayService;
use crate::window::ShutdownSignal;

use super::{FrameComposer, FrameProfiler, FrameStats};

/// The projector overlay as a runtime app.
///
/// Each frame takes the current scene snapshot, composes it and presents.
/// Teardown order: request gate closed, in-flight requests drained, feed
/// stopped, final frame presented. The runtime then releases the renderer.
pub struct OverlayApp {
    service: Arc<OverlayService>,
    composer: FrameComposer,
    profiler: FrameProfiler,
    feed: Option<FeedHandle>,
    shutdown: ShutdownSignal,
    drain_timeout: Duration,
    /// Set while the screen field is missing so the warning is logged once.
    screen_missing: bool,
    last_stats: FrameStats,
}

impl OverlayApp {
    pub fn new(service: Arc<OverlayService>, config: &OverlayConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            service,
            composer: FrameComposer::new(config),
            profiler: FrameProfiler::new(config.profile_interval, config.profile_window),
            feed: None,
            shutdown,
            drain_timeout: config.drain_timeout,
            screen_missing: false,
            last_stats: FrameStats::default(),
        }
    }

    /// Hands over a running tracking feed; it is stopped during teardown.
    pub fn with_feed(mut self, feed: Option<FeedHandle>) -> Self {
        self.feed = feed;
        self
    }

    pub fn service(&self) -> &Arc<OverlayService> {
        &self.service
    }

    pub fn composer(&self) -> &FrameComposer {
        &self.composer
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn profiler(&self) -> &FrameProfiler {
        &self.profiler
    }

    fn draw(&mut self, renderer: &mut dyn Renderer, now: Instant) -> Result<()> {
        let started = Instant::now();
        let snapshot = self.service.scene().snapshot();
        let composed = self.composer.compose(&snapshot, renderer, now);
        let compose_time = started.elapsed();
        match composed {
            Ok(stats) => {
                if self.screen_missing {
                    log::info!("screen field available, rendering scene");
                    self.screen_missing = false;
                }
                self.last_stats = stats;
            }
            Err(OverlayError::TransformUnavailable { .. }) => {
                if !self.screen_missing {
                    log::warn!("no 'screen' field registered; presenting background only");
                    self.screen_missing = true;
                }
                self.last_stats = FrameStats::default();
            }
            Err(e) => return Err(e),
        }

        let presenting = Instant::now();
        let presented = renderer.present();
        self.profiler.record(started, compose_time, presenting.elapsed());
        match presented {
            Err(e) if !e.is_fatal() => {
                log::debug!("present skipped: {e}");
                Ok(())
            }
            other => other,
        }
    }
}

impl App for OverlayApp {
    fn on_input(&mut self, request: InputRequest) -> AppControl {
        match request {
            InputRequest::ToggleGrid => {
                self.composer.toggle_grid();
                AppControl::Continue
            }
            InputRequest::ToggleFields => {
                self.composer.toggle_fields();
                AppControl::Continue
            }
            InputRequest::Shutdown => {
                self.shutdown.raise();
                AppControl::Exit
            }
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
        if self.shutdown.is_raised() {
            return Ok(AppControl::Exit);
        }
        self.draw(&mut *ctx.renderer, ctx.time.now)?;
        Ok(AppControl::Continue)
    }

    fn on_shutdown(&mut self, renderer: &mut dyn Renderer) {
        log::info!("overlay shutting down");
        if !self.service.shutdown(self.drain_timeout) {
            log::warn!("continuing teardown with requests still in flight");
        }
        if let Some(feed) = self.feed.take() {
            feed.stop();
        }
        if let Err(e) = self.draw(renderer, Instant::now()) {
            log::warn!("final frame failed: {e}");
        }
    }
}
