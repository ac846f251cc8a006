//! Frame-at-a-time analysis loop.
//!
//! A `Pipeline` owns the detector registry and the handler for the selected
//! mode. `run` pulls frames from a source in order, hands each to the
//! handler, annotates it and forwards it to the sink. The loop ends when the
//! source is exhausted or the stop flag is set; upstream errors end it too,
//! and the sink is closed on every one of those paths.

pub mod handlers;
pub mod mode;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::detect::BackendRegistry;
use crate::events::{SaveEvent, SaveThresholds};
use crate::ingest::{FrameSource, SourceStats};
use crate::render::{Annotator, Overlay, PassthroughAnnotator};
use crate::sink::{FrameSink, ScopedSink};
use crate::track::{TrackerSettings, DEFAULT_HISTORY_CAPACITY};

pub use handlers::{handler_for, FrameOutput, ModeHandler};
pub use mode::Mode;

/// Tunables shared by the mode handlers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineSettings {
    pub ball_history_capacity: usize,
    pub save_thresholds: SaveThresholds,
    pub tracker: TrackerSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            ball_history_capacity: DEFAULT_HISTORY_CAPACITY,
            save_thresholds: SaveThresholds::default(),
            tracker: TrackerSettings::default(),
        }
    }
}

/// Cooperative stop signal, polled once per frame.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a completed run.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub mode: Mode,
    pub frames_processed: u64,
    /// Cumulative save count; `None` outside save detection.
    pub saves: Option<u64>,
    pub events: Vec<SaveEvent>,
    /// True when the run ended on the stop flag rather than exhaustion.
    pub interrupted: bool,
    pub source: SourceStats,
}

pub struct Pipeline {
    handler: Box<dyn ModeHandler>,
    registry: BackendRegistry,
    annotator: Box<dyn Annotator>,
    stop: StopFlag,
}

impl Pipeline {
    /// Build the pipeline for `mode`.
    ///
    /// Fails before any frame is read when the mode cannot run in this build
    /// or no registered backend covers the capabilities it needs.
    pub fn new(mode: Mode, settings: &PipelineSettings, registry: BackendRegistry) -> Result<Self> {
        let handler = handler_for(mode, settings)?;
        registry
            .require(handler.capabilities())
            .with_context(|| format!("mode {} cannot run with the configured backends", mode))?;
        Ok(Self {
            handler,
            registry,
            annotator: Box::new(PassthroughAnnotator),
            stop: StopFlag::new(),
        })
    }

    pub fn with_annotator<A: Annotator + 'static>(mut self, annotator: A) -> Self {
        self.annotator = Box::new(annotator);
        self
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    pub fn mode(&self) -> Mode {
        self.handler.mode()
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
    ) -> Result<RunSummary> {
        let mode = self.handler.mode();
        source.connect().context("failed to open frame source")?;
        self.registry.warm_up().context("detector warm-up failed")?;
        let mut out = ScopedSink::open(sink).context("failed to open frame sink")?;

        log::info!(
            "pipeline: mode={} backends={:?}",
            mode,
            self.registry.list()
        );

        let mut frames_processed = 0u64;
        let mut events = Vec::new();
        let mut interrupted = false;

        loop {
            if self.stop.is_set() {
                log::info!("pipeline: stop requested after {} frames", frames_processed);
                interrupted = true;
                break;
            }
            let Some(frame) = source.next_frame()? else {
                break;
            };

            let output = self
                .handler
                .process(&frame, &mut self.registry)
                .with_context(|| format!("processing frame {} failed", frame.index))?;
            log::debug!(
                "frame {}: {} detections, ball={}",
                frame.index,
                output.detections.len(),
                output.ball.is_some()
            );

            if let Some(event) = output.save {
                log::info!(
                    "[SAVE DETECTED] Ball near goalkeeper with speed {:.2}",
                    event.speed
                );
                events.push(event);
            }

            let overlay = Overlay {
                detections: &output.detections,
                ball: output.ball.as_ref(),
            };
            let annotated = self.annotator.annotate(frame, &overlay)?;
            out.write_frame(&annotated)?;
            frames_processed += 1;
        }

        out.finish().context("failed to close frame sink")?;

        Ok(RunSummary {
            mode,
            frames_processed,
            saves: self.handler.saves(),
            events,
            interrupted,
            source: source.stats(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, DetectionCapability, DetectorBackend};
    use crate::frame::Frame;
    use crate::ingest::{FileConfig, FileSource};
    use crate::sink::NullSink;

    struct Failing;

    impl DetectorBackend for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn supports(&self, _capability: DetectionCapability) -> bool {
            true
        }

        fn detect(&mut self, _frame: &Frame, _capability: DetectionCapability) -> Result<Vec<Detection>> {
            anyhow::bail!("model exploded")
        }
    }

    fn stub_source(frames: u64) -> FileSource {
        FileSource::new(FileConfig {
            path: format!("stub://unit?frames={}&width=64&height=48", frames),
            stride: 1,
        })
        .unwrap()
    }

    #[test]
    fn backend_error_propagates_and_sink_is_closed() {
        let mut registry = BackendRegistry::new();
        registry.register(Failing);
        let mut pipeline =
            Pipeline::new(Mode::PlayerDetection, &PipelineSettings::default(), registry).unwrap();
        let mut sink = NullSink::new();
        let err = pipeline.run(&mut stub_source(3), &mut sink).unwrap_err();
        assert!(format!("{:#}", err).contains("model exploded"));
        assert!(sink.is_closed());
        assert_eq!(sink.frames_written(), 0);
    }

    #[test]
    fn stop_flag_ends_run_before_first_frame() {
        let mut registry = BackendRegistry::new();
        registry.register(Failing);
        let stop = StopFlag::new();
        let mut pipeline =
            Pipeline::new(Mode::PlayerDetection, &PipelineSettings::default(), registry)
                .unwrap()
                .with_stop_flag(stop.clone());
        stop.trigger();
        let mut sink = NullSink::new();
        let summary = pipeline.run(&mut stub_source(3), &mut sink).unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.frames_processed, 0);
        assert!(sink.is_closed());
    }

    #[test]
    fn empty_registry_fails_fast() {
        let err = Pipeline::new(
            Mode::SaveDetection,
            &PipelineSettings::default(),
            BackendRegistry::new(),
        )
        .err()
        .unwrap();
        assert!(format!("{:#}", err).contains("SAVE_DETECTION"));
    }
}
