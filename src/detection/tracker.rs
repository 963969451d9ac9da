use crate::models::{BoundingBox, Detection};

#[derive(Debug, Clone)]
struct Track {
    id: u64,
    class_id: usize,
    bbox: BoundingBox,
    /// Consecutive frames without a match
    misses: u32,
}

/// Keeps object identity across frames by greedy IoU matching.
///
/// Matching is per class. Unmatched detections open new tracks with fresh ids;
/// tracks unmatched for more than `max_age` frames are forgotten.
#[derive(Debug, Clone)]
pub struct IouTracker {
    tracks: Vec<Track>,
    next_id: u64,
    iou_threshold: f32,
    max_age: u32,
}

impl IouTracker {
    pub fn new(iou_threshold: f32, max_age: u32) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            iou_threshold,
            max_age,
        }
    }

    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Assign a `track_id` to every detection of the current frame
    pub fn update(&mut self, detections: &mut [Detection]) {
        let mut pairs = Vec::new();
        for (t, track) in self.tracks.iter().enumerate() {
            for (d, det) in detections.iter().enumerate() {
                if track.class_id != det.class_id {
                    continue;
                }
                let iou = track.bbox.iou(&det.bbox);
                if iou >= self.iou_threshold {
                    pairs.push((iou, t, d));
                }
            }
        }
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut track_matched = vec![false; self.tracks.len()];
        let mut det_matched = vec![false; detections.len()];
        for (_, t, d) in pairs {
            if track_matched[t] || det_matched[d] {
                continue;
            }
            track_matched[t] = true;
            det_matched[d] = true;
            let track = &mut self.tracks[t];
            track.bbox = detections[d].bbox;
            track.misses = 0;
            detections[d].track_id = Some(track.id);
        }

        for (track, matched) in self.tracks.iter_mut().zip(&track_matched) {
            if !matched {
                track.misses += 1;
            }
        }
        let max_age = self.max_age;
        self.tracks.retain(|t| t.misses <= max_age);

        for (det, matched) in detections.iter_mut().zip(det_matched) {
            if matched {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            det.track_id = Some(id);
            self.tracks.push(Track {
                id,
                class_id: det.class_id,
                bbox: det.bbox,
                misses: 0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: usize, x: f32) -> Detection {
        Detection {
            class_id,
            label: String::new(),
            confidence: 0.9,
            bbox: BoundingBox { x1: x, y1: 0.0, x2: x + 10.0, y2: 10.0 },
            mask: None,
            track_id: None,
        }
    }

    #[test]
    fn moving_object_keeps_its_id() {
        let mut tracker = IouTracker::new(0.3, 30);

        let mut frame1 = vec![det(0, 0.0), det(1, 50.0)];
        tracker.update(&mut frame1);
        assert_eq!(frame1[0].track_id, Some(1));
        assert_eq!(frame1[1].track_id, Some(2));

        // Shifted a little, listed in the other order
        let mut frame2 = vec![det(1, 51.0), det(0, 2.0)];
        tracker.update(&mut frame2);
        assert_eq!(frame2[0].track_id, Some(2));
        assert_eq!(frame2[1].track_id, Some(1));
    }

    #[test]
    fn class_change_starts_a_new_track() {
        let mut tracker = IouTracker::new(0.3, 30);
        let mut frame1 = vec![det(0, 0.0)];
        tracker.update(&mut frame1);

        let mut frame2 = vec![det(1, 0.0)];
        tracker.update(&mut frame2);
        assert_eq!(frame2[0].track_id, Some(2));
    }

    #[test]
    fn stale_tracks_are_dropped_after_max_age() {
        let mut tracker = IouTracker::new(0.3, 2);
        tracker.update(&mut [det(0, 0.0)]);
        assert_eq!(tracker.active_tracks(), 1);

        tracker.update(&mut []);
        tracker.update(&mut []);
        assert_eq!(tracker.active_tracks(), 1);
        tracker.update(&mut []);
        assert_eq!(tracker.active_tracks(), 0);

        let mut back = vec![det(0, 0.0)];
        tracker.update(&mut back);
        assert_eq!(back[0].track_id, Some(2));
    }
}
