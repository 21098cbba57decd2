//! Cost deltas and best-solution criteria.

use crate::cost;
use crate::data::FloorplanDb;
use crate::solution::{OutlineTarget, Placement};
use mosaic_common::less_or_equal;

/// The measured quantities of one solution that the objective looks at.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Snapshot {
    /// Packing width.
    pub width: f64,
    /// Packing height.
    pub height: f64,
    /// Bounding-box area.
    pub area: f64,
    /// Weighted wirelength (zero when wirelength is not measured).
    pub hpwl: f64,
    /// Wasted area (zero when not measured).
    pub wasted: f64,
}

impl Snapshot {
    /// Width over height.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        }
    }

    /// Returns `true` if the packing lies within `outline`.
    pub fn fits(&self, outline: &OutlineTarget) -> bool {
        less_or_equal(self.width, outline.width) && less_or_equal(self.height, outline.height)
    }

    /// Summed excess over `outline`.
    pub fn violation(&self, outline: &OutlineTarget) -> f64 {
        (self.width - outline.width).max(0.0) + (self.height - outline.height).max(0.0)
    }
}

/// The annealing objective of one run.
#[derive(Clone, Debug)]
pub struct Objective {
    /// Whether wirelength is part of the cost.
    pub min_wirelength: bool,
    /// Required outline, if any.
    pub outline: Option<OutlineTarget>,
    /// Area weight.
    pub area_weight: f64,
    /// Wirelength weight.
    pub wire_weight: f64,
    /// Scale of the aspect-ratio term (20 for the tree, 10 for the
    /// sequence pair).
    pub ar_scale: f64,
    /// Start temperature, used to scale every term.
    pub start_temperature: f64,
    /// Total block area.
    pub block_area: f64,
    /// Whether the fixed-outline wirelength blend uses wasted area.
    pub wasted_area_blend: bool,
}

impl Objective {
    /// Weight of the aspect-ratio term.
    pub fn ar_weight(&self) -> f64 {
        (1.0 - self.area_weight - self.wire_weight).max(0.0)
    }

    /// Whether snapshots need the wasted-area measure.
    pub fn needs_wasted(&self) -> bool {
        self.wasted_area_blend && self.min_wirelength && self.outline.is_some()
    }

    /// Measures `placement`.
    pub fn snapshot(&self, db: &FloorplanDb, placement: &Placement) -> Snapshot {
        Snapshot {
            width: placement.width,
            height: placement.height,
            area: placement.area(),
            hpwl: if self.min_wirelength {
                cost::total_hpwl(db, placement)
            } else {
                0.0
            },
            wasted: if self.needs_wasted() {
                cost::wasted_area(placement)
            } else {
                0.0
            },
        }
    }

    /// Cost change of moving from `curr` to `next` at `temperature`.
    pub fn delta(&self, curr: &Snapshot, next: &Snapshot, temperature: f64) -> f64 {
        let k = if temperature > 30.0 { 1.2 } else { 1.5 };
        let t0 = self.start_temperature;
        let block_area = self.block_area.max(f64::MIN_POSITIVE);

        let d_area = (next.area - curr.area) * k * t0 / block_area;
        let d_wasted = (next.wasted - curr.wasted) * k * t0 / block_area;
        let d_hpwl = if self.min_wirelength && curr.hpwl > 0.0 {
            (next.hpwl - curr.hpwl) * k * t0 / curr.hpwl
        } else {
            0.0
        };

        let aw = self.area_weight;
        let ww = self.wire_weight;
        let arw = self.ar_weight();

        match &self.outline {
            Some(outline) => {
                let r = outline.aspect_ratio();
                let d_ar = ((next.aspect_ratio() - r).powi(2) - (curr.aspect_ratio() - r).powi(2))
                    * self.ar_scale
                    * t0;
                if self.min_wirelength {
                    if self.wasted_area_blend {
                        0.2 * d_hpwl + 0.4 * d_ar + 0.4 * d_wasted
                    } else {
                        aw * d_area + ww * d_hpwl + arw * d_ar
                    }
                } else {
                    (aw + ww / 2.0) * d_area + (arw + ww / 2.0) * d_ar
                }
            }
            None if self.min_wirelength => (aw + arw / 2.0) * d_area + (ww + arw / 2.0) * d_hpwl,
            None => d_area,
        }
    }

    /// Returns `true` if `candidate` should replace the best solution seen.
    pub fn improves_best(&self, candidate: &Snapshot, best: Option<&Snapshot>) -> bool {
        match &self.outline {
            Some(outline) => {
                if !candidate.fits(outline) {
                    return false;
                }
                let Some(best) = best else {
                    return true;
                };
                if self.min_wirelength {
                    candidate.hpwl < best.hpwl
                        && (!self.needs_wasted() || candidate.wasted < best.wasted)
                } else {
                    candidate.area < best.area
                }
            }
            None => {
                let Some(best) = best else {
                    return true;
                };
                if self.min_wirelength {
                    self.area_weight * candidate.area + self.wire_weight * candidate.hpwl
                        < self.area_weight * best.area + self.wire_weight * best.hpwl
                } else {
                    candidate.area < best.area
                }
            }
        }
    }

    /// Returns `true` when the run may stop early with `current`.
    pub fn is_done(&self, current: &Snapshot, temperature: f64) -> bool {
        match &self.outline {
            Some(outline) if current.fits(outline) => !self.min_wirelength || temperature < 5.0,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objective(min_wirelength: bool, outline: Option<OutlineTarget>) -> Objective {
        Objective {
            min_wirelength,
            outline,
            area_weight: 0.4,
            wire_weight: 0.4,
            ar_scale: 20.0,
            start_temperature: 30000.0,
            block_area: 400.0,
            wasted_area_blend: true,
        }
    }

    fn snap(width: f64, height: f64, hpwl: f64) -> Snapshot {
        Snapshot {
            width,
            height,
            area: width * height,
            hpwl,
            wasted: 0.0,
        }
    }

    #[test]
    fn area_only_delta_is_scaled_area_change() {
        let o = objective(false, None);
        let d = o.delta(&snap(20.0, 20.0, 0.0), &snap(40.0, 10.0, 0.0), 100.0);
        assert_eq!(d, 0.0);
        let d = o.delta(&snap(20.0, 20.0, 0.0), &snap(20.0, 30.0, 0.0), 100.0);
        assert!((d - 200.0 * 1.2 * 30000.0 / 400.0).abs() < 1e-6);
        let cold = o.delta(&snap(20.0, 20.0, 0.0), &snap(20.0, 30.0, 0.0), 10.0);
        assert!(cold > d);
    }

    #[test]
    fn aspect_ratio_term_prefers_target_shape() {
        let outline = OutlineTarget {
            width: 20.0,
            height: 20.0,
        };
        let o = objective(false, Some(outline));
        // same area, the square matches the target
        let to_square = o.delta(&snap(40.0, 10.0, 0.0), &snap(20.0, 20.0, 0.0), 100.0);
        assert!(to_square < 0.0);
    }

    #[test]
    fn wirelength_delta_ignored_without_wires() {
        let o = objective(true, None);
        let d = o.delta(&snap(20.0, 20.0, 0.0), &snap(20.0, 20.0, 50.0), 100.0);
        assert_eq!(d, 0.0);
        let d = o.delta(&snap(20.0, 20.0, 100.0), &snap(20.0, 20.0, 50.0), 100.0);
        assert!(d < 0.0);
    }

    #[test]
    fn best_requires_fit_under_outline() {
        let outline = OutlineTarget {
            width: 20.0,
            height: 20.0,
        };
        let o = objective(false, Some(outline));
        assert!(!o.improves_best(&snap(40.0, 10.0, 0.0), None));
        assert!(o.improves_best(&snap(20.0, 20.0, 0.0), None));
        let best = snap(20.0, 20.0, 0.0);
        assert!(!o.improves_best(&snap(20.0, 20.0, 0.0), Some(&best)));
        assert!(o.improves_best(&snap(20.0, 19.0, 0.0), Some(&best)));
    }

    #[test]
    fn free_outline_best_blends_area_and_wirelength() {
        let o = objective(true, None);
        let best = snap(20.0, 20.0, 100.0);
        assert!(o.improves_best(&snap(20.0, 21.0, 50.0), Some(&best)));
        assert!(!o.improves_best(&snap(20.0, 30.0, 90.0), Some(&best)));
    }

    #[test]
    fn early_exit_waits_for_low_temperature_with_wirelength() {
        let outline = OutlineTarget {
            width: 20.0,
            height: 20.0,
        };
        let fitting = snap(20.0, 20.0, 10.0);
        assert!(objective(false, Some(outline)).is_done(&fitting, 1000.0));
        assert!(!objective(true, Some(outline)).is_done(&fitting, 1000.0));
        assert!(objective(true, Some(outline)).is_done(&fitting, 4.0));
        assert!(!objective(false, None).is_done(&fitting, 1.0));
    }
}
