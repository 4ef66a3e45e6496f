//! Groups heatmap peaks into people using part affinity fields.
//!
//! The network output is an `[h, w, 57]` grid: channels `0..19` are per-part
//! confidence maps (the last one is background) and channels `19..57` are 19
//! two-channel vector fields, one per limb.

use std::cmp::Ordering;

use ndarray::ArrayView3;

use crate::{
    pipeline::skeleton::COCO_PAIRS,
    types::{BodyPart, DetectedPerson, Keypoint},
};

pub const HEATMAP_CHANNELS: usize = 19;
pub const PAF_CHANNELS: usize = 38;
pub const OUTPUT_CHANNELS: usize = HEATMAP_CHANNELS + PAF_CHANNELS;

/// Body parts that can carry peaks; background is excluded.
const PART_COUNT: usize = 18;

/// PAF (x, y) channel offsets for each entry of [`COCO_PAIRS`], relative to the
/// first PAF channel.
pub const PAIR_PAF_CHANNELS: [(usize, usize); 19] = [
    (12, 13),
    (20, 21),
    (14, 15),
    (16, 17),
    (22, 23),
    (24, 25),
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (8, 9),
    (10, 11),
    (28, 29),
    (30, 31),
    (34, 35),
    (32, 33),
    (36, 37),
    (18, 19),
    (26, 27),
];

#[derive(Clone, Debug)]
pub struct PafConfig {
    pub peak_threshold: f32,
    pub paf_threshold: f32,
    pub paf_samples: usize,
    pub min_samples_above: usize,
    pub min_subset_parts: usize,
    pub min_subset_score: f32,
}

impl Default for PafConfig {
    fn default() -> Self {
        Self {
            peak_threshold: 0.15,
            paf_threshold: 0.05,
            paf_samples: 10,
            min_samples_above: 6,
            min_subset_parts: 4,
            min_subset_score: 0.8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak {
    pub id: usize,
    pub part: usize,
    pub x: usize,
    pub y: usize,
    pub score: f32,
}

#[derive(Clone, Copy, Debug)]
struct Connection {
    peak_a: usize,
    peak_b: usize,
    score: f32,
}

#[derive(Clone, Debug)]
struct Subset {
    parts: [Option<usize>; PART_COUNT],
    score: f32,
    count: usize,
}

/// Local 3x3 maxima above the threshold, grouped by part. Peak ids are unique
/// across all parts.
pub fn find_peaks(output: &ArrayView3<'_, f32>, cfg: &PafConfig) -> Vec<Vec<Peak>> {
    let (h, w, _) = output.dim();
    let mut next_id = 0;
    let mut peaks = vec![Vec::new(); PART_COUNT];

    for (part, part_peaks) in peaks.iter_mut().enumerate() {
        for y in 0..h {
            for x in 0..w {
                let v = output[[y, x, part]];
                if v < cfg.peak_threshold || !is_local_max(output, part, x, y, v) {
                    continue;
                }
                part_peaks.push(Peak {
                    id: next_id,
                    part,
                    x,
                    y,
                    score: v,
                });
                next_id += 1;
            }
        }
    }
    peaks
}

// Plateaus keep only their first cell in raster order.
fn is_local_max(output: &ArrayView3<'_, f32>, channel: usize, x: usize, y: usize, v: f32) -> bool {
    let (h, w, _) = output.dim();
    for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
        for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
            if nx == x && ny == y {
                continue;
            }
            let n = output[[ny, nx, channel]];
            let earlier = (ny, nx) < (y, x);
            if n > v || (earlier && n == v) {
                return false;
            }
        }
    }
    true
}

fn score_pairs(
    output: &ArrayView3<'_, f32>,
    from: &[Peak],
    to: &[Peak],
    paf: (usize, usize),
    cfg: &PafConfig,
) -> Vec<Connection> {
    let (h, w, _) = output.dim();
    let (paf_x, paf_y) = (HEATMAP_CHANNELS + paf.0, HEATMAP_CHANNELS + paf.1);
    let mut candidates = Vec::new();

    for a in from {
        for b in to {
            let vx = b.x as f32 - a.x as f32;
            let vy = b.y as f32 - a.y as f32;
            let norm = (vx * vx + vy * vy).sqrt();
            if norm < 1e-6 {
                continue;
            }
            let (ux, uy) = (vx / norm, vy / norm);

            let mut total = 0.0;
            let mut above = 0;
            for i in 0..cfg.paf_samples {
                let t = i as f32 / cfg.paf_samples as f32;
                let sx = ((a.x as f32 + vx * t).round() as usize).min(w - 1);
                let sy = ((a.y as f32 + vy * t).round() as usize).min(h - 1);
                let dot = output[[sy, sx, paf_x]] * ux + output[[sy, sx, paf_y]] * uy;
                total += dot;
                if dot > cfg.paf_threshold {
                    above += 1;
                }
            }

            // Penalise limbs longer than half the grid height.
            let prior = (0.5 * h as f32 / norm - 1.0).min(0.0);
            let mean = total / cfg.paf_samples as f32 + prior;
            if above >= cfg.min_samples_above && mean > 0.0 {
                candidates.push(Connection {
                    peak_a: a.id,
                    peak_b: b.id,
                    score: mean,
                });
            }
        }
    }

    candidates.sort_by(|l, r| r.score.partial_cmp(&l.score).unwrap_or(Ordering::Equal));

    let mut used_a = Vec::new();
    let mut used_b = Vec::new();
    let mut chosen = Vec::new();
    for conn in candidates {
        if used_a.contains(&conn.peak_a) || used_b.contains(&conn.peak_b) {
            continue;
        }
        used_a.push(conn.peak_a);
        used_b.push(conn.peak_b);
        chosen.push(conn);
        if chosen.len() >= from.len().min(to.len()) {
            break;
        }
    }
    chosen
}

/// Decode one network output into people. Coordinates are fractions of the
/// output grid, so they hold for any frame the grid was computed from.
pub fn decode_people(output: &ArrayView3<'_, f32>, cfg: &PafConfig) -> Vec<DetectedPerson> {
    let (h, w, c) = output.dim();
    if h == 0 || w == 0 || c < OUTPUT_CHANNELS {
        return Vec::new();
    }

    let peaks_by_part = find_peaks(output, cfg);
    let all_peaks: Vec<Peak> = peaks_by_part.iter().flatten().copied().collect();
    let score_of = |id: usize| all_peaks[id].score;

    let mut subsets: Vec<Subset> = Vec::new();
    for (pair_idx, &(part_a, part_b)) in COCO_PAIRS.iter().enumerate() {
        let connections = score_pairs(
            output,
            &peaks_by_part[part_a],
            &peaks_by_part[part_b],
            PAIR_PAF_CHANNELS[pair_idx],
            cfg,
        );

        for conn in connections {
            let found: Vec<usize> = subsets
                .iter()
                .enumerate()
                .filter(|(_, s)| {
                    s.parts[part_a] == Some(conn.peak_a) || s.parts[part_b] == Some(conn.peak_b)
                })
                .map(|(idx, _)| idx)
                .take(2)
                .collect();

            match found.as_slice() {
                [] => {
                    // Shoulder-to-ear pairs only extend existing people.
                    if pair_idx >= 17 {
                        continue;
                    }
                    let mut parts = [None; PART_COUNT];
                    parts[part_a] = Some(conn.peak_a);
                    parts[part_b] = Some(conn.peak_b);
                    subsets.push(Subset {
                        parts,
                        score: score_of(conn.peak_a) + score_of(conn.peak_b) + conn.score,
                        count: 2,
                    });
                }
                [single] => extend_subset(&mut subsets[*single], part_b, conn, score_of(conn.peak_b)),
                [first, second] => {
                    let (first, second) = (*first, *second);
                    let disjoint = subsets[first]
                        .parts
                        .iter()
                        .zip(subsets[second].parts.iter())
                        .all(|(l, r)| l.is_none() || r.is_none());
                    if disjoint {
                        let merged = subsets.remove(second);
                        let target = &mut subsets[first];
                        for (slot, other) in target.parts.iter_mut().zip(merged.parts) {
                            if slot.is_none() {
                                *slot = other;
                            }
                        }
                        target.count += merged.count;
                        target.score += merged.score + conn.score;
                    } else {
                        extend_subset(&mut subsets[first], part_b, conn, score_of(conn.peak_b));
                    }
                }
                _ => unreachable!("at most two subsets are collected"),
            }
        }
    }

    subsets
        .into_iter()
        .filter(|s| s.count >= cfg.min_subset_parts && s.score / s.count as f32 >= cfg.min_subset_score)
        .map(|s| {
            let mut person = DetectedPerson::new();
            person.score = s.score;
            for (part_idx, peak_id) in s.parts.iter().enumerate() {
                let (Some(peak_id), Some(part)) = (peak_id, BodyPart::from_index(part_idx)) else {
                    continue;
                };
                let peak = all_peaks[*peak_id];
                let (x, y) = (peak.x as f32 / w as f32, peak.y as f32 / h as f32);
                person.insert(part, Keypoint::new(x, y, peak.score));
            }
            person
        })
        .collect()
}

fn extend_subset(subset: &mut Subset, part_b: usize, conn: Connection, peak_score: f32) {
    if subset.parts[part_b] != Some(conn.peak_b) {
        if subset.parts[part_b].is_none() {
            subset.count += 1;
        }
        subset.parts[part_b] = Some(conn.peak_b);
        subset.score += peak_score + conn.score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    const GRID: usize = 10;

    fn empty_output() -> Array3<f32> {
        Array3::zeros((GRID, GRID, OUTPUT_CHANNELS))
    }

    fn set_peak(out: &mut Array3<f32>, part: BodyPart, x: usize, y: usize) {
        out[[y, x, part.index()]] = 1.0;
    }

    /// Paint a unit vector field along a straight horizontal or vertical limb.
    fn paint_limb(out: &mut Array3<f32>, pair_idx: usize, from: (usize, usize), to: (usize, usize)) {
        let (cx, cy) = PAIR_PAF_CHANNELS[pair_idx];
        let (cx, cy) = (HEATMAP_CHANNELS + cx, HEATMAP_CHANNELS + cy);
        let dx = (to.0 as f32 - from.0 as f32).signum();
        let dy = (to.1 as f32 - from.1 as f32).signum();
        let (x0, x1) = (from.0.min(to.0), from.0.max(to.0));
        let (y0, y1) = (from.1.min(to.1), from.1.max(to.1));
        for y in y0..=y1 {
            for x in x0..=x1 {
                out[[y, x, cx]] = dx;
                out[[y, x, cy]] = dy;
            }
        }
    }

    /// Neck -> right shoulder -> right elbow -> right wrist.
    fn right_arm(out: &mut Array3<f32>, x_offset: usize) {
        let neck = (x_offset, 2);
        let shoulder = (x_offset + 3, 2);
        let elbow = (x_offset + 3, 5);
        let wrist = (x_offset + 3, 8);
        set_peak(out, BodyPart::Neck, neck.0, neck.1);
        set_peak(out, BodyPart::RShoulder, shoulder.0, shoulder.1);
        set_peak(out, BodyPart::RElbow, elbow.0, elbow.1);
        set_peak(out, BodyPart::RWrist, wrist.0, wrist.1);
        paint_limb(out, 0, neck, shoulder);
        paint_limb(out, 2, shoulder, elbow);
        paint_limb(out, 3, elbow, wrist);
    }

    #[test]
    fn finds_isolated_peaks_above_threshold() {
        let mut out = empty_output();
        set_peak(&mut out, BodyPart::Nose, 4, 4);
        out[[1, 1, BodyPart::Nose.index()]] = 0.1;
        let view = out.view();

        let peaks = find_peaks(&view, &PafConfig::default());
        assert_eq!(peaks.len(), 18);
        assert_eq!(peaks[0].len(), 1);
        assert_eq!((peaks[0][0].x, peaks[0][0].y), (4, 4));
        assert!(peaks[1..].iter().all(Vec::is_empty));
    }

    #[test]
    fn plateau_yields_a_single_peak() {
        let mut out = empty_output();
        out[[3, 3, 0]] = 0.5;
        out[[3, 4, 0]] = 0.5;
        let view = out.view();
        let peaks = find_peaks(&view, &PafConfig::default());
        assert_eq!(peaks[0].len(), 1);
        assert_eq!((peaks[0][0].x, peaks[0][0].y), (3, 3));
    }

    #[test]
    fn connected_arm_becomes_one_person() {
        let mut out = empty_output();
        right_arm(&mut out, 1);
        let view = out.view();

        let people = decode_people(&view, &PafConfig::default());
        assert_eq!(people.len(), 1);

        let person = &people[0];
        assert_eq!(person.len(), 4);
        let wrist = person.get(BodyPart::RWrist).expect("wrist detected");
        assert_eq!((wrist.x, wrist.y), (0.4, 0.8));
        assert!(person.get(BodyPart::Nose).is_none());
    }

    #[test]
    fn peaks_without_a_field_are_not_grouped() {
        let mut out = empty_output();
        set_peak(&mut out, BodyPart::Neck, 1, 2);
        set_peak(&mut out, BodyPart::RShoulder, 4, 2);
        set_peak(&mut out, BodyPart::RElbow, 4, 5);
        set_peak(&mut out, BodyPart::RWrist, 4, 8);
        let view = out.view();

        assert!(decode_people(&view, &PafConfig::default()).is_empty());
    }

    #[test]
    fn small_groups_are_dropped() {
        let mut out = empty_output();
        set_peak(&mut out, BodyPart::Neck, 1, 2);
        set_peak(&mut out, BodyPart::RShoulder, 4, 2);
        paint_limb(&mut out, 0, (1, 2), (4, 2));
        let view = out.view();

        assert!(decode_people(&view, &PafConfig::default()).is_empty());

        let lenient = PafConfig {
            min_subset_parts: 2,
            ..PafConfig::default()
        };
        assert_eq!(decode_people(&view, &lenient).len(), 1);
    }

    #[test]
    fn short_outputs_decode_to_nobody() {
        let out = Array3::<f32>::zeros((GRID, GRID, HEATMAP_CHANNELS));
        let view = out.view();
        assert!(decode_people(&view, &PafConfig::default()).is_empty());
    }
}
