use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::scene::{Scene, TrackedUpdate};
use crate::time::FramePacer;

use super::TrackingSource;

/// Background poller for an available tracking source.
pub struct FeedWorker;

impl FeedWorker {
    /// Starts polling `source` at `rate_hz`. Returns `None` without spawning
    /// anything when the source reports itself unavailable.
    pub fn spawn<S>(scene: Arc<Scene>, mut source: S, rate_hz: u32) -> Option<FeedHandle>
    where
        S: TrackingSource + 'static,
    {
        if !source.available() {
            log::info!("tracking source '{}' unavailable; running on manual poses", source.name());
            return None;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let name = source.name().to_string();
        let spawned = std::thread::Builder::new()
            .name(format!("feed-{name}"))
            .spawn(move || {
                let mut pacer = FramePacer::new(rate_hz);
                let mut frames = 0u64;
                while !flag.load(Ordering::Acquire) {
                    let batch: Vec<TrackedUpdate> = source.poll().iter().map(|s| s.to_update()).collect();
                    scene.apply_tracked_poses(&batch);
                    frames += 1;

                    pacer.advance(Instant::now());
                    // Sleep in short steps so `stop` is honored promptly.
                    while !flag.load(Ordering::Acquire) {
                        let left = pacer.remaining(Instant::now());
                        if left.is_zero() {
                            break;
                        }
                        std::thread::sleep(left.min(Duration::from_millis(20)));
                    }
                }
                frames
            });

        match spawned {
            Ok(thread) => {
                log::info!("tracking feed '{name}' started at {rate_hz} Hz");
                Some(FeedHandle { name, stop, thread: Some(thread) })
            }
            Err(e) => {
                log::warn!("tracking feed '{name}' could not start: {e}");
                None
            }
        }
    }
}

/// Owner of a running feed thread. Dropping it stops the thread too.
pub struct FeedHandle {
    name: String,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<u64>>,
}

impl FeedHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signals the thread and joins it. Returns the number of polled frames.
    pub fn stop(mut self) -> u64 {
        self.join()
    }

    fn join(&mut self) -> u64 {
        self.stop.store(true, Ordering::Release);
        let Some(thread) = self.thread.take() else {
            return 0;
        };
        match thread.join() {
            Ok(frames) => {
                log::info!("tracking feed '{}' stopped after {frames} frames", self.name);
                frames
            }
            Err(_) => {
                log::error!("tracking feed '{}' panicked", self.name);
                0
            }
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Vec2;
    use crate::feed::{NoTracking, ScriptedSource, TrackedSample};
    use crate::scene::{EntitySpec, TrackingBinding};

    fn bound(scene: &Scene, id: &str, source_name: &str) {
        let spec = EntitySpec {
            tracking: TrackingBinding { source_name: Some(source_name.into()), ..TrackingBinding::default() },
            ..EntitySpec::default()
        };
        scene.create_entity(id, spec).unwrap();
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn unavailable_source_spawns_nothing() {
        let scene = Arc::new(Scene::new());
        assert!(FeedWorker::spawn(scene, NoTracking, 100).is_none());
    }

    #[test]
    fn samples_reach_bound_entities() {
        let scene = Arc::new(Scene::new());
        bound(&scene, "r1", "robot_1");
        bound(&scene, "r2", "robot_2");

        let frame = vec![
            TrackedSample::new("robot_1", Vec2::new(1.0, 2.0), Some(0.5)),
            TrackedSample::invalid("robot_2"),
        ];
        let handle = FeedWorker::spawn(Arc::clone(&scene), ScriptedSource::new([frame]), 200).unwrap();
        assert!(wait_for(|| scene.get_entity("r1").is_some_and(|e| e.tracked.is_some())));
        assert!(handle.stop() >= 1);

        let r1 = scene.get_entity("r1").unwrap();
        assert_eq!(r1.display_position(), Some(Vec2::new(1.0, 2.0)));
        assert!(!r1.tracking.lost);
        assert!(scene.get_entity("r2").unwrap().tracking.lost);
    }

    #[test]
    fn stop_is_prompt_at_low_rates() {
        let scene = Arc::new(Scene::new());
        let handle = FeedWorker::spawn(scene, ScriptedSource::default(), 1).unwrap();
        let started = Instant::now();
        handle.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
