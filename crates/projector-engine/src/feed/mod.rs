//! Optional tracking feed.
//!
//! A [`TrackingSource`] reports whether it is usable once at startup. When it
//! is, a [`FeedWorker`] polls it on its own thread and writes tracked poses
//! into the scene; otherwise nothing is spawned and the overlay runs on
//! manual poses only.

mod source;
mod worker;

pub use source::{NoTracking, ScriptedSource, TrackedSample, TrackingSource};
pub use worker::{FeedHandle, FeedWorker};
