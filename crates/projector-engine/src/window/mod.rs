//! Runtimes driving an [`App`](crate::core::App).
//!
//! - [`Runtime`]: winit window + GPU backend, paced with `ControlFlow::WaitUntil`
//! - [`HeadlessRuntime`]: any [`Renderer`](crate::render::Renderer) in a paced
//!   loop on the calling thread
//!
//! Both stop when the [`ShutdownSignal`] is raised and follow the same
//! teardown: `App::on_shutdown` with the renderer still alive, then
//! `Renderer::shutdown`.

mod headless;
mod runtime;
mod signal;

pub use headless::{HeadlessConfig, HeadlessRuntime};
pub use runtime::{Runtime, RuntimeConfig};
pub use signal::ShutdownSignal;
