use std::time::Instant;

use crate::core::{App, AppControl, FrameCtx};
use crate::error::Result;
use crate::render::Renderer;
use crate::time::{FrameClock, FramePacer};

use super::ShutdownSignal;

#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub frame_rate_hz: u32,
    /// Stop after this many frames; `None` runs until shutdown.
    pub max_frames: Option<u64>,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self { frame_rate_hz: crate::config::DEFAULT_FRAME_RATE_HZ, max_frames: None }
    }
}

/// Runs an app without a window, e.g. against the CPU backend.
pub struct HeadlessRuntime;

impl HeadlessRuntime {
    /// Blocks until the app exits, the signal is raised or the frame budget is
    /// spent. Returns the number of frames produced.
    ///
    /// Init failures and fatal frame errors are returned after teardown.
    pub fn run<A, R>(
        config: &HeadlessConfig,
        renderer: &mut R,
        app: &mut A,
        shutdown: &ShutdownSignal,
    ) -> Result<u64>
    where
        A: App + ?Sized,
        R: Renderer,
    {
        renderer.init()?;
        let (w, h) = renderer.size();
        log::info!("headless runtime started ({w}x{h} @ {} Hz)", config.frame_rate_hz);

        let mut clock = FrameClock::new();
        let mut pacer = FramePacer::new(config.frame_rate_hz);
        let mut frames = 0u64;
        let mut outcome = Ok(());

        while !shutdown.is_raised() && config.max_frames.is_none_or(|max| frames < max) {
            let wait = pacer.remaining(Instant::now());
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
            let time = clock.tick();
            pacer.advance(time.now);

            let mut ctx = FrameCtx { renderer: &mut *renderer, time };
            let control = app.on_frame(&mut ctx);
            frames += 1;
            match control {
                Ok(AppControl::Continue) => {}
                Ok(AppControl::Exit) => break,
                Err(e) if e.is_fatal() => {
                    log::error!("frame {frames} failed: {e}");
                    outcome = Err(e);
                    break;
                }
                Err(e) => log::warn!("frame {frames}: {e}"),
            }
        }

        app.on_shutdown(renderer);
        renderer.shutdown();
        log::info!("headless runtime stopped after {frames} frames");
        outcome.map(|()| frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlayConfig;
    use crate::coords::Rgba;
    use crate::error::OverlayError;
    use crate::render::CpuRenderer;

    #[derive(Default)]
    struct Counting {
        frames: u64,
        shut_down: bool,
        exit_after: Option<u64>,
        fail_with: Option<OverlayError>,
    }

    impl App for Counting {
        fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
            self.frames += 1;
            ctx.renderer.clear(Rgba::white());
            ctx.renderer.present()?;
            if let Some(e) = self.fail_with.take() {
                return Err(e);
            }
            Ok(match self.exit_after {
                Some(n) if self.frames >= n => AppControl::Exit,
                _ => AppControl::Continue,
            })
        }

        fn on_shutdown(&mut self, renderer: &mut dyn Renderer) {
            // still usable here
            assert!(renderer.present().is_ok());
            self.shut_down = true;
        }
    }

    fn fast(max_frames: Option<u64>) -> HeadlessConfig {
        HeadlessConfig { frame_rate_hz: 1000, max_frames }
    }

    #[test]
    fn runs_until_frame_budget() {
        let mut r = CpuRenderer::new(8, 8, &OverlayConfig::default());
        let mut app = Counting::default();
        let n = HeadlessRuntime::run(&fast(Some(3)), &mut r, &mut app, &ShutdownSignal::new()).unwrap();
        assert_eq!(n, 3);
        assert_eq!(app.frames, 3);
        assert!(app.shut_down);
        // three frames plus the final present, then the renderer is gone
        assert_eq!(r.frame_count(), 4);
        assert!(r.frame().is_none());
    }

    #[test]
    fn app_exit_stops_the_loop() {
        let mut r = CpuRenderer::new(8, 8, &OverlayConfig::default());
        let mut app = Counting { exit_after: Some(2), ..Counting::default() };
        let n = HeadlessRuntime::run(&fast(None), &mut r, &mut app, &ShutdownSignal::new()).unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn raised_signal_skips_frames() {
        let mut r = CpuRenderer::new(8, 8, &OverlayConfig::default());
        let mut app = Counting::default();
        let signal = ShutdownSignal::new();
        signal.raise();
        let n = HeadlessRuntime::run(&fast(None), &mut r, &mut app, &signal).unwrap();
        assert_eq!(n, 0);
        assert!(app.shut_down);
    }

    #[test]
    fn fatal_frame_error_is_returned_after_teardown() {
        let mut r = CpuRenderer::new(8, 8, &OverlayConfig::default());
        let mut app = Counting {
            fail_with: Some(OverlayError::RenderBackend("device lost".into())),
            ..Counting::default()
        };
        let err = HeadlessRuntime::run(&fast(Some(10)), &mut r, &mut app, &ShutdownSignal::new()).unwrap_err();
        assert!(err.is_fatal());
        assert!(app.shut_down);
    }

    #[test]
    fn non_fatal_frame_errors_keep_running() {
        let mut r = CpuRenderer::new(8, 8, &OverlayConfig::default());
        let mut app = Counting {
            fail_with: Some(OverlayError::skipped("bad draw")),
            ..Counting::default()
        };
        let n = HeadlessRuntime::run(&fast(Some(3)), &mut r, &mut app, &ShutdownSignal::new()).unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn zero_sized_renderer_fails_init() {
        let mut r = CpuRenderer::new(0, 8, &OverlayConfig::default());
        let mut app = Counting::default();
        let err = HeadlessRuntime::run(&fast(Some(1)), &mut r, &mut app, &ShutdownSignal::new()).unwrap_err();
        assert!(matches!(err, OverlayError::RenderBackend(_)));
        assert_eq!(app.frames, 0);
    }
}
