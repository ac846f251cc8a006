use anyhow::{anyhow, Result};

use crate::detect::{BoundingBox, Detection, ObjectClass};

/// Assigns stable identities to per-frame detections.
///
/// Implementations receive detections in strict frame order and return the
/// detections that belong to confirmed tracks, each with `tracker_id` set.
pub trait ObjectTracker {
    fn update(&mut self, detections: Vec<Detection>) -> Vec<Detection>;
}

/// Tuning for `IouTracker`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerSettings {
    /// Consecutive matched frames before a track is reported.
    pub min_consecutive_frames: u32,
    /// Minimum IoU for a detection to continue a track.
    pub iou_threshold: f32,
    /// Missed frames after which a confirmed track is dropped.
    pub max_age: u32,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            min_consecutive_frames: 3,
            iou_threshold: 0.3,
            max_age: 30,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TrackState {
    Tentative,
    Confirmed,
}

#[derive(Clone, Debug)]
struct Track {
    id: u64,
    class: ObjectClass,
    bbox: BoundingBox,
    hits: u32,
    misses: u32,
    state: TrackState,
}

/// Greedy IoU tracker with per-class association.
pub struct IouTracker {
    settings: TrackerSettings,
    tracks: Vec<Track>,
    next_id: u64,
}

impl IouTracker {
    pub fn new(settings: TrackerSettings) -> Result<Self> {
        if settings.min_consecutive_frames == 0 {
            return Err(anyhow!("tracker min_consecutive_frames must be >= 1"));
        }
        if !(settings.iou_threshold > 0.0 && settings.iou_threshold <= 1.0) {
            return Err(anyhow!("tracker iou_threshold must be in (0, 1]"));
        }
        Ok(Self {
            settings,
            tracks: Vec::new(),
            next_id: 1,
        })
    }

    pub fn active_tracks(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.state == TrackState::Confirmed)
            .count()
    }

    fn associate(&self, detections: &[Detection]) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize, f32)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for (di, det) in detections.iter().enumerate() {
                if det.class != track.class {
                    continue;
                }
                let iou = track.bbox.iou(&det.bbox);
                if iou >= self.settings.iou_threshold {
                    pairs.push((ti, di, iou));
                }
            }
        }
        pairs.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut track_used = vec![false; self.tracks.len()];
        let mut det_used = vec![false; detections.len()];
        let mut matches = Vec::new();
        for (ti, di, _) in pairs {
            if track_used[ti] || det_used[di] {
                continue;
            }
            track_used[ti] = true;
            det_used[di] = true;
            matches.push((ti, di));
        }
        matches
    }
}

impl ObjectTracker for IouTracker {
    fn update(&mut self, detections: Vec<Detection>) -> Vec<Detection> {
        let matches = self.associate(&detections);
        let mut assigned: Vec<Option<usize>> = vec![None; detections.len()];
        let mut matched_tracks = vec![false; self.tracks.len()];

        for (ti, di) in matches {
            let track = &mut self.tracks[ti];
            track.bbox = detections[di].bbox;
            track.hits += 1;
            track.misses = 0;
            if track.hits >= self.settings.min_consecutive_frames {
                track.state = TrackState::Confirmed;
            }
            matched_tracks[ti] = true;
            assigned[di] = Some(ti);
        }

        let max_age = self.settings.max_age;
        let mut keep = Vec::with_capacity(self.tracks.len());
        for (ti, track) in self.tracks.iter_mut().enumerate() {
            if matched_tracks[ti] {
                keep.push(true);
                continue;
            }
            track.misses += 1;
            // Tentative tracks must be matched on consecutive frames.
            keep.push(track.state == TrackState::Confirmed && track.misses <= max_age);
        }

        // Remap assignments after dropping stale tracks.
        let mut remap = vec![None; self.tracks.len()];
        let mut survivors = Vec::with_capacity(self.tracks.len());
        for (ti, track) in std::mem::take(&mut self.tracks).into_iter().enumerate() {
            if keep[ti] {
                remap[ti] = Some(survivors.len());
                survivors.push(track);
            }
        }
        self.tracks = survivors;

        let mut out = Vec::new();
        for (di, mut det) in detections.into_iter().enumerate() {
            match assigned[di].and_then(|ti| remap[ti]) {
                Some(ti) => {
                    let track = &self.tracks[ti];
                    if track.state == TrackState::Confirmed {
                        det.tracker_id = Some(track.id);
                        out.push(det);
                    }
                }
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    let state = if self.settings.min_consecutive_frames <= 1 {
                        TrackState::Confirmed
                    } else {
                        TrackState::Tentative
                    };
                    self.tracks.push(Track {
                        id,
                        class: det.class,
                        bbox: det.bbox,
                        hits: 1,
                        misses: 0,
                        state,
                    });
                    if state == TrackState::Confirmed {
                        det.tracker_id = Some(id);
                        out.push(det);
                    }
                }
            }
        }
        out
    }
}
