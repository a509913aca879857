// backward pass: required times, cut selection and map references
use crate::aig::{NodeId, NodeKind};
use crate::cut::INFINITY;
use crate::mapper::{ActiveSlot, Mapper};
use crate::store::Gen;
use log::warn;

fn relax(time: i32, ratio: u32) -> i32 {
    (time as f64 * (100.0 + ratio as f64) / 100.0) as i32
}

impl<'a> Mapper<'a> {
    fn set_required(&mut self, id: NodeId, time: i32) {
        let required = &mut self.required[id as usize];
        *required = (*required).min(time);
    }

    /// Applies the delay target to the delay achieved by the forward pass.
    fn target_delay(&mut self, delay: i32) -> i32 {
        let ratio = self.params.relax_ratio;
        if self.params.delay_target.is_none() && ratio != 0 {
            self.params.delay_target = Some(relax(delay, ratio));
        }
        match self.params.delay_target {
            Some(target) if (delay as f64) < target as f64 + 0.01 => target,
            Some(target) => {
                if ratio == 0 {
                    warn!("Relaxing user-specified delay target from {} to {}", target, delay);
                }
                delay
            }
            None => delay,
        }
    }

    fn reset_pass_stats(&mut self, delay: i32) {
        self.stats.delay = delay;
        self.stats.area = 0;
        self.stats.edge = 0;
        self.stats.mux7 = 0;
        self.stats.switches = 0.0;
    }

    /// Seeds the required times of CO drivers. With `commit` the drivers
    /// also get a map reference.
    fn seed_co_required(&mut self, delay: i32, commit: bool) {
        let aig = self.aig;
        for co in 0..aig.num_cos() {
            let driver = aig.co_driver(co).node();
            let required = if self.params.do_average {
                relax(self.co_arrival(co), self.params.relax_ratio)
            } else {
                delay
            };
            self.set_required(driver, required);
            if commit && aig.is_internal(driver) {
                self.map_refs[driver as usize] += 1;
            }
        }
    }

    /// Reverse sweep when a timing manager is attached. Buffers pass their
    /// required time through, CIs report theirs to the manager.
    fn sweep_with_manager(&mut self, delay: i32, commit: bool) {
        let aig = self.aig;
        let do_average = self.params.do_average;
        let ratio = self.params.relax_ratio;
        let co_required: Vec<i32> = if do_average {
            (0..aig.num_cos())
                .map(|co| relax(self.co_arrival(co), ratio))
                .collect()
        } else {
            Vec::new()
        };
        self.with_timing(|t| {
            t.increment_trav_id();
            if do_average {
                for (co, &time) in co_required.iter().enumerate() {
                    t.set_co_required(co, time);
                }
            } else {
                t.init_co_required_all(delay);
            }
        });
        for id in (1..aig.num_objs() as NodeId).rev() {
            match aig.kind(id) {
                NodeKind::Const0 => {}
                NodeKind::Buf => {
                    let required = self.required[id as usize];
                    self.set_required(aig.fanin0(id).node(), required);
                }
                NodeKind::And | NodeKind::Xor | NodeKind::Mux => {
                    if self.map_refs[id as usize] > 0 {
                        if commit {
                            self.set_map_refs_one(id);
                        } else {
                            self.count_map_refs_one(id);
                        }
                    }
                }
                NodeKind::Ci => {
                    let ci = aig.cio_index(id);
                    let required = self.required[id as usize];
                    self.with_timing(|t| t.set_ci_required(ci, required));
                }
                NodeKind::Co => {
                    let co = aig.cio_index(id);
                    let required = self.with_timing(|t| t.co_required(co)).unwrap_or(INFINITY);
                    let driver = aig.fanin0(id).node();
                    self.set_required(driver, required);
                    if commit && aig.is_internal(driver) {
                        self.map_refs[driver as usize] += 1;
                    }
                }
            }
        }
    }

    /// Commits the cut selection of a delay or area-flow pass: computes
    /// required times from the COs down, picks the active cut of every
    /// reached node and recounts map references. Returns the LUT count.
    pub(crate) fn set_map_refs(&mut self) -> u64 {
        let aig = self.aig;
        let delay = (0..aig.num_cos())
            .map(|co| self.co_arrival(co))
            .max()
            .unwrap_or(0);
        let delay = self.target_delay(delay);
        self.reset_pass_stats(delay);
        self.map_refs.fill(0);
        self.required.fill(INFINITY);
        if self.params.use_mux7 {
            self.marks.fill(false);
            for &ci in aig.cis() {
                self.marks[ci as usize] = true;
            }
        }

        if self.timing.is_some() {
            self.sweep_with_manager(delay, true);
        } else {
            self.seed_co_required(delay, true);
            for id in (1..aig.num_objs() as NodeId).rev() {
                if aig.is_buf(id) {
                    let required = self.required[id as usize];
                    let fanin = aig.fanin0(id).node();
                    self.set_required(fanin, required);
                    if aig.is_internal(fanin) {
                        self.map_refs[fanin as usize] += 1;
                    }
                } else if aig.is_internal(id) && self.map_refs[id as usize] > 0 {
                    self.set_map_refs_one(id);
                }
            }
        }

        if self.params.use_mux7 {
            self.marks.fill(false);
        }
        self.blend_flow_refs();
        self.stats.area
    }

    /// Picks the active cut of a referenced node and propagates its
    /// required time to the leaves.
    fn set_map_refs_one(&mut self, id: NodeId) {
        let required = self.required[id as usize];
        let best = self.best[id as usize];
        assert!(self.map_refs[id as usize] > 0);
        assert_eq!(best.active, ActiveSlot::None);
        if !(self.params.use_mux7 && self.set_mux_cut(id, required)) {
            let area = best.diff_cuts() && best.delay[1] <= required;
            self.best[id as usize].active = if area {
                ActiveSlot::Area
            } else {
                ActiveSlot::Delay
            };
        }
        let cut = self.best_cut(id, Gen::Old);
        for &leaf in cut.leaves() {
            self.set_required(leaf, required - 1);
            if self.aig.is_internal(leaf) {
                self.map_refs[leaf as usize] += 1;
            }
        }
        if cut.mux7 {
            self.stats.mux7 += 1;
            self.stats.edge += 1;
            return;
        }
        if self.params.power {
            self.stats.switches += self.cut_switches(&cut);
        }
        self.stats.edge += cut.len() as u64;
        self.stats.area += 1;
    }

    /// Selects the structural MUX cut of `id` when it meets the required
    /// time, is not much worse in flow than the area cut and neither the
    /// node nor its data inputs are already taken by another MUX cut.
    fn set_mux_cut(&mut self, id: NodeId, required: i32) -> bool {
        let aig = self.aig;
        if !aig.is_mux(id) {
            return false;
        }
        let best = &self.best[id as usize];
        if best.delay[2] > required || best.flow[2] > 1.1 * best.flow[1] {
            return false;
        }
        let data0 = aig.fanin0(id).node() as usize;
        let data1 = aig.fanin1(id).node() as usize;
        if self.marks[id as usize] || self.marks[data0] || self.marks[data1] {
            return false;
        }
        self.marks[data0] = true;
        self.marks[data1] = true;
        self.best[id as usize].active = ActiveSlot::Mux;
        true
    }

    /// Backward pass of an exact-area pass. The forward pass has already
    /// selected and referenced the cuts; this recomputes required times and
    /// the pass statistics. Returns the LUT count.
    pub(crate) fn count_map_refs(&mut self) -> u64 {
        let aig = self.aig;
        let delay = (0..aig.num_cos())
            .map(|co| self.co_arrival_active(co))
            .max()
            .unwrap_or(0);
        let delay = self.target_delay(delay);
        self.reset_pass_stats(delay);
        self.required.fill(INFINITY);
        if self.params.use_mux7 {
            self.marks.fill(false);
        }

        if self.timing.is_some() {
            self.sweep_with_manager(delay, false);
        } else {
            self.seed_co_required(delay, false);
            for id in (1..aig.num_objs() as NodeId).rev() {
                if aig.is_buf(id) {
                    let required = self.required[id as usize];
                    self.set_required(aig.fanin0(id).node(), required);
                } else if aig.is_internal(id) && self.map_refs[id as usize] > 0 {
                    self.count_map_refs_one(id);
                }
            }
        }
        self.stats.area
    }

    fn count_map_refs_one(&mut self, id: NodeId) {
        let required = self.required[id as usize];
        debug_assert!(self.best[id as usize].is_mapped());
        let cut = self.best_cut(id, Gen::Old);
        for &leaf in cut.leaves() {
            self.set_required(leaf, required - 1);
        }
        if self.params.power {
            self.stats.switches += self.cut_switches(&cut);
        }
        self.stats.edge += cut.len() as u64;
        self.stats.area += 1;
    }
}
