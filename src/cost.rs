// cut costing: arrival, required-time estimate and area flow
use crate::aig::{Aig, NodeId, NodeKind};
use crate::cut::{Cut, INFINITY};
use crate::mapper::{Mapper, PassKind};
use crate::store::Gen;

const FLOW_MAX: f32 = 1e32;

/// Initial fanout estimate used to share area flow between consumers.
///
/// Counts internal fanouts and CO references. In networks without native
/// MUX/XOR nodes, AND-level MUX structures discount their control and a
/// data node shared by both branches, since those edges vanish once the
/// structure is covered by one LUT.
pub fn init_flow_refs(aig: &Aig) -> Vec<f32> {
    let mut refs = vec![0i32; aig.num_objs()];
    let native = (1..aig.num_objs() as NodeId).any(|id| aig.is_mux(id) || aig.is_xor(id));
    for id in 1..aig.num_objs() as NodeId {
        if !aig.is_internal(id) && !aig.is_buf(id) {
            continue;
        }
        let f0 = aig.fanin0(id).node();
        if aig.is_internal(f0) {
            refs[f0 as usize] += 1;
        }
        if aig.is_buf(id) {
            continue;
        }
        let f1 = aig.fanin1(id).node();
        if aig.is_internal(f1) {
            refs[f1 as usize] += 1;
        }
        if native {
            if aig.is_mux(id) {
                let f2 = aig.fanin2(id).node();
                if aig.is_internal(f2) {
                    refs[f2 as usize] += 1;
                }
            }
        } else if let Some((ctrl, data1, data0)) = aig.recognize_mux(id) {
            if aig.is_internal(ctrl.node()) {
                refs[ctrl.node() as usize] -= 1;
            }
            if data0.node() == data1.node() && aig.is_internal(data0.node()) {
                refs[data0.node() as usize] -= 1;
            }
        }
    }
    for co in 0..aig.num_cos() {
        let driver = aig.co_driver(co).node();
        if aig.is_internal(driver) {
            refs[driver as usize] += 1;
        }
    }
    refs.into_iter().map(|r| r.max(1) as f32).collect()
}

impl<'a> Mapper<'a> {
    pub(crate) fn cut_switches(&self, cut: &Cut) -> f32 {
        cut.leaves().iter().map(|&leaf| self.switching[leaf as usize]).sum()
    }

    /// Cost of implementing `cut` as one LUT.
    pub(crate) fn cut_area(&self, cut: &Cut) -> f32 {
        if cut.len() < 2 || cut.mux7 {
            0.0
        } else if self.params.power {
            cut.len() as f32 + self.cut_switches(cut)
        } else if self.params.opt_edge {
            (cut.len() as u32 + self.params.area_tuner) as f32
        } else {
            1.0
        }
    }

    /// Arrival time of a node that does not carry cuts of its own, or the
    /// delay-best arrival of one that does.
    pub(crate) fn arrival(&self, id: NodeId) -> i32 {
        match self.aig.kind(id) {
            NodeKind::Buf => self.arrival(self.aig.fanin0(id).node()),
            NodeKind::And | NodeKind::Xor | NodeKind::Mux => self.best[id as usize].delay[0],
            NodeKind::Ci => self.ci_arrival[self.aig.cio_index(id)],
            NodeKind::Const0 | NodeKind::Co => 0,
        }
    }

    pub(crate) fn co_arrival(&self, co: usize) -> i32 {
        self.arrival(self.aig.co_driver(co).node())
    }

    /// Like `co_arrival`, but through the cut currently selected at the driver.
    pub(crate) fn co_arrival_active(&self, co: usize) -> i32 {
        let mut id = self.aig.co_driver(co).node();
        while self.aig.is_buf(id) {
            id = self.aig.fanin0(id).node();
        }
        if self.aig.is_internal(id) {
            let best = &self.best[id as usize];
            best.delay[best.cut_index()]
        } else {
            self.arrival(id)
        }
    }

    /// Required-time estimate for a node the previous backward pass did
    /// not reach, derived from the leaves of its old delay-best cut.
    pub(crate) fn cut_required(&self, cut: &Cut) -> i32 {
        let mut req_max = 0;
        let mut arr_max = 0;
        for &leaf in cut.leaves() {
            let req = self.required[leaf as usize];
            if req < INFINITY {
                req_max = req_max.max(req);
            }
            let arr = if self.aig.is_internal(leaf) {
                self.best[leaf as usize].delay[0]
            } else {
                self.arrival(leaf)
            };
            arr_max = arr_max.max(arr);
        }
        (req_max + 2).max(arr_max + 1)
    }

    /// Fills in the delay, lateness and area flow of `cut` at a node with
    /// the given required time and flow references.
    ///
    /// Outside exact-area passes each internal leaf contributes its area
    /// best cut when that one still meets `required - 1`, and its delay
    /// best cut otherwise. Exact-area passes use whatever the leaf has
    /// committed to and cost the cut by its dereferenced area.
    pub(crate) fn cut_params(&mut self, cut: &mut Cut, required: i32, flow_refs: f32) {
        let ela = self.pass == PassKind::ExactArea;
        let mut delay = 0;
        let mut flow = 0.0f32;
        for &leaf in cut.leaves() {
            let leaf_delay = if self.aig.is_internal(leaf) {
                let best = &self.best[leaf as usize];
                debug_assert!(best.delay[0] <= best.delay[1]);
                debug_assert!(best.flow[0] >= best.flow[1]);
                let index = if ela {
                    best.index()
                } else {
                    let index = (best.delay[1] < required && required != INFINITY) as usize;
                    flow = if flow >= FLOW_MAX || best.flow[index] >= FLOW_MAX {
                        FLOW_MAX
                    } else {
                        flow + best.flow[index]
                    };
                    index
                };
                best.delay[index]
            } else {
                self.arrival(leaf)
            };
            delay = delay.max(leaf_delay);
        }
        cut.delay = delay + (cut.len() > 1) as i32;
        cut.late = cut.delay > required;
        cut.flow = if ela {
            self.area_derefed(cut, Gen::New) / flow_refs
        } else {
            (flow + self.cut_area(cut)) / flow_refs
        };
    }

    /// Blends the flow references toward the map references of the last
    /// backward pass, trusting the measured counts more with every pass.
    pub(crate) fn blend_flow_refs(&mut self) {
        let n = (self.iter + 1) as f32;
        let coef = 1.0 / (1.0 + n * n);
        for id in 1..self.aig.num_objs() as NodeId {
            if !self.aig.is_internal(id) {
                continue;
            }
            let refs = self.map_refs[id as usize].max(1) as f32;
            let flow = &mut self.flow_refs[id as usize];
            *flow = coef * *flow + (1.0 - coef) * refs;
        }
    }
}
