use anyhow::{Context, Result, anyhow};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Fullscreen, Window, WindowId};

use crate::config::OverlayConfig;
use crate::core::{App as CoreApp, AppControl, FrameCtx};
use crate::device::GpuInit;
use crate::input::translate_window_event;
use crate::render::{GpuRenderer, Renderer};
use crate::time::{FrameClock, FramePacer};

use super::ShutdownSignal;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Borderless fullscreen on the current monitor, the usual projector setup.
    pub fullscreen: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "projector overlay".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            fullscreen: false,
        }
    }
}

/// Entry point for the windowed runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the projector window and drives `app` until shutdown.
    ///
    /// `prepare` runs once on the freshly created renderer before `init`,
    /// e.g. to load a font.
    pub fn run<A>(
        config: RuntimeConfig,
        gpu_init: GpuInit,
        overlay: OverlayConfig,
        shutdown: ShutdownSignal,
        prepare: impl FnMut(&mut GpuRenderer<'_>) -> Result<()> + 'static,
        app: A,
    ) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState {
            config,
            gpu_init,
            overlay,
            shutdown,
            prepare: Box::new(prepare),
            app,
            entry: None,
            started: false,
            exit_requested: false,
            fatal: None,
        };

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.fatal.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,
    pacer: FramePacer,

    window: Window,

    #[borrows(window)]
    #[covariant]
    renderer: GpuRenderer<'this>,
}

type Prepare = Box<dyn FnMut(&mut GpuRenderer<'_>) -> Result<()>>;

struct AppState<A>
where
    A: CoreApp + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    overlay: OverlayConfig,
    shutdown: ShutdownSignal,
    prepare: Prepare,
    app: A,

    entry: Option<WindowEntry>,
    started: bool,
    exit_requested: bool,
    /// Error that ended the run; returned from `Runtime::run`.
    fatal: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let mut attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);
        if self.config.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let overlay = &self.overlay;
        let mut entry = WindowEntryBuilder {
            clock: FrameClock::default(),
            pacer: FramePacer::new(overlay.frame_rate_hz),
            window,
            renderer_builder: |w| GpuRenderer::new(w, gpu_init, overlay),
        }
        .build();

        let prepare = &mut self.prepare;
        entry.with_renderer_mut(|r| -> Result<()> {
            prepare(r)?;
            r.init().context("renderer initialization failed")?;
            Ok(())
        })?;

        self.entry = Some(entry);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal.get_or_insert(err);
        self.teardown(event_loop);
    }

    /// App shutdown hook, renderer release, window close. Runs once.
    fn teardown(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        if let Some(mut entry) = self.entry.take() {
            let app = &mut self.app;
            entry.with_renderer_mut(|r| {
                app.on_shutdown(r);
                r.shutdown();
            });
        }
        event_loop.exit();
    }

    fn handle_control(&mut self, event_loop: &ActiveEventLoop, control: AppControl) {
        if control == AppControl::Exit {
            self.shutdown.raise();
            self.teardown(event_loop);
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };

        let app = &mut self.app;
        let result = entry.with_mut(|fields| {
            let time = fields.clock.tick();
            fields.pacer.advance(time.now);
            fields.window.pre_present_notify();
            let mut ctx = FrameCtx { renderer: fields.renderer, time };
            app.on_frame(&mut ctx)
        });

        match result {
            Ok(control) => self.handle_control(event_loop, control),
            Err(e) if e.is_fatal() => self.fail(event_loop, anyhow!(e).context("render loop failed")),
            Err(e) => log::warn!("frame failed: {e}"),
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        self.started = true;

        if let Err(e) = self.create_window_entry(event_loop) {
            self.fail(event_loop, e);
            return;
        }
        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        if self.shutdown.is_raised() {
            self.teardown(event_loop);
            return;
        }

        // Fixed-rate loop: sleep until the pacer deadline, then redraw.
        if let Some(entry) = &self.entry {
            let now = std::time::Instant::now();
            let deadline = entry.with_pacer(|p| p.next_deadline());
            if entry.with_pacer(|p| p.is_due(now)) {
                entry.with_window(|w| w.request_redraw());
            }
            event_loop.set_control_flow(ControlFlow::WaitUntil(deadline.max(now)));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if let Some(request) = translate_window_event(&event) {
            log::debug!("input request: {request}");
            let control = self.app.on_input(request);
            self.handle_control(event_loop, control);
            if self.exit_requested {
                return;
            }
        }

        match &event {
            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_renderer_mut(|r| r.resize(*new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.entry.as_mut() {
                    let new_size = entry.with_window(|w| w.inner_size());
                    entry.with_renderer_mut(|r| r.resize(new_size));
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }

    fn exiting(&mut self, event_loop: &ActiveEventLoop) {
        // Covers loop exits not initiated by us (e.g. platform termination).
        if self.entry.is_some() {
            self.teardown(event_loop);
        }
    }
}
