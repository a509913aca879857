// per-node cut enumeration, ranked cut lists and the pool of stored cut sets
use crate::aig::{Aig, NodeId};
use crate::cut::{self, compute_truth, merge2, merge3, Cut, Gate, CUT_MAX, EPSILON, INFINITY};
use crate::mapper::{ActiveSlot, Mapper, PassKind};
use crate::store::Gen;
use bumpalo::Bump;

pub const LOG_SET_PAGE: usize = 12;
const SET_PAGE: usize = 1 << LOG_SET_PAGE;

type SetSlot = u32;

/// Working list of the cuts of one node under construction.
///
/// `cuts[..len]` is the ranked list and `cuts[len]` is the slot the next
/// candidate is built in.
pub struct CutList {
    cuts: [Cut; CUT_MAX],
    len: usize,
    cut_num: usize,
}

impl CutList {
    pub fn new(cut_num: usize) -> Self {
        assert!((2..=CUT_MAX).contains(&cut_num));
        CutList {
            cuts: [Cut::default(); CUT_MAX],
            len: 0,
            cut_num,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts[..self.len]
    }

    pub fn get(&self, idx: usize) -> &Cut {
        &self.cuts[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Cut {
        &mut self.cuts[idx]
    }

    pub fn candidate(&self) -> &Cut {
        &self.cuts[self.len]
    }

    pub fn candidate_mut(&mut self) -> &mut Cut {
        &mut self.cuts[self.len]
    }

    /// Whether the candidate is dominated by a cut already in the list.
    pub fn candidate_is_dominated(&self) -> bool {
        cut::last_cut_is_contained(&self.cuts, self.len)
    }

    /// Ranks the candidate into the list.
    pub fn commit_candidate(&mut self) {
        self.len = cut::add_cut(&mut self.cuts, self.len, self.cut_num);
    }
}

/// Cut sets of nodes whose consumers have not all been built yet.
///
/// Slots are handed out on a node's first fetch (when the node stores its
/// own cuts) and returned once every consumer has fetched them.
pub struct CutsetPool<'a> {
    alloc: &'a Bump,
    cut_num: usize,
    pages: Vec<&'a mut [Cut]>,
    lens: Vec<u8>,
    free: Vec<SetSlot>,
    slots: Vec<Option<SetSlot>>,
    consumers: Vec<u32>,
    front_max: usize,
}

impl<'a> CutsetPool<'a> {
    pub fn new(alloc: &'a Bump, cut_num: usize, num_objs: usize) -> Self {
        CutsetPool {
            alloc,
            cut_num,
            pages: Vec::new(),
            lens: Vec::new(),
            free: Vec::new(),
            slots: vec![None; num_objs],
            consumers: vec![0; num_objs],
            front_max: 0,
        }
    }

    /// Counts, for every internal node, the nodes that will read its cut set:
    /// internal fanouts (including MUX controls) and the nodes it is a choice of.
    pub fn set_consumers(&mut self, aig: &Aig) {
        assert_eq!(self.free.len(), self.pages.len() * SET_PAGE, "cut sets leaked from the previous pass");
        self.consumers.fill(0);
        for id in 1..aig.num_objs() as NodeId {
            if !aig.is_internal(id) {
                continue;
            }
            let mut fanins = vec![aig.fanin0(id).node(), aig.fanin1(id).node()];
            if aig.is_mux(id) {
                fanins.push(aig.fanin2(id).node());
            }
            if let Some(sibling) = aig.sibling(id) {
                fanins.push(sibling);
            }
            for fanin in fanins {
                if aig.is_internal(fanin) {
                    self.consumers[fanin as usize] += 1;
                }
            }
        }
    }

    pub fn consumers(&self, id: NodeId) -> u32 {
        self.consumers[id as usize]
    }

    fn grow(&mut self) {
        let base = (self.pages.len() * SET_PAGE) as SetSlot;
        let alloc = self.alloc;
        let page = alloc.alloc_slice_fill_copy(SET_PAGE * self.cut_num, Cut::default());
        self.pages.push(page);
        self.lens.resize(self.lens.len() + SET_PAGE, 0);
        self.free.extend((0..SET_PAGE as SetSlot).rev().map(|i| base + i));
    }

    /// Looks up the cut set of `id`. The first fetch allocates it, later
    /// fetches count down the consumers and release it after the last one.
    /// The returned slot stays readable until the next allocation.
    pub fn fetch(&mut self, id: NodeId) -> SetSlot {
        assert!(self.consumers[id as usize] > 0);
        match self.slots[id as usize] {
            None => {
                if self.free.is_empty() {
                    self.grow();
                }
                let Some(slot) = self.free.pop() else {
                    unreachable!();
                };
                self.slots[id as usize] = Some(slot);
                self.front_max = self.front_max.max(slot as usize + 1);
                slot
            }
            Some(slot) => {
                self.consumers[id as usize] -= 1;
                if self.consumers[id as usize] == 0 {
                    self.free.push(slot);
                    self.slots[id as usize] = None;
                }
                slot
            }
        }
    }

    pub fn cuts(&self, slot: SetSlot) -> &[Cut] {
        let slot = slot as usize;
        let page = &self.pages[slot >> LOG_SET_PAGE];
        let base = (slot & (SET_PAGE - 1)) * self.cut_num;
        &page[base..base + self.lens[slot] as usize]
    }

    pub fn store(&mut self, slot: SetSlot, cuts: &[Cut]) {
        assert!(cuts.len() <= self.cut_num);
        let slot = slot as usize;
        let page = &mut self.pages[slot >> LOG_SET_PAGE];
        let base = (slot & (SET_PAGE - 1)) * self.cut_num;
        page[base..base + cuts.len()].copy_from_slice(cuts);
        self.lens[slot] = cuts.len() as u8;
    }

    /// Most cut sets alive at once.
    pub fn front_max(&self) -> usize {
        self.front_max
    }

    pub fn is_drained(&self) -> bool {
        self.free.len() == self.pages.len() * SET_PAGE
    }
}

impl<'a> Mapper<'a> {
    /// Cut set of a fanin: the stored set of an internal node, the unit
    /// cut of anything else.
    fn fanin_cuts(&mut self, id: NodeId) -> Vec<Cut> {
        if !self.aig.is_internal(id) {
            return vec![Cut::unit(id, self.params.cut_min)];
        }
        let slot = self.sets.fetch(id);
        self.sets.cuts(slot).to_vec()
    }

    fn candidate_truth(&mut self, gate: Gate, fanins: &[(&Cut, bool)], list: &mut CutList) {
        let Some(truths) = self.truths.as_mut() else {
            return;
        };
        let candidate = list.candidate_mut();
        if compute_truth(truths, gate, fanins, candidate) {
            candidate.recompute_sign();
        }
    }

    /// Enumerates the cuts of internal node `id` from the cut sets of its
    /// fanins (and of its choice sibling), selects its delay-best and
    /// area-best cut and stores the cut set for the node's consumers.
    pub(crate) fn merge_order(&mut self, id: NodeId) {
        let aig = self.aig;
        let lut_size = self.params.lut_size;
        let cut_min = self.params.cut_min;
        let ela = self.pass == PassKind::ExactArea;
        let flow_refs = self.flow_refs[id as usize];
        let mut required = self.required[id as usize];
        let (f0, f1) = (aig.fanin0(id), aig.fanin1(id));
        let set0 = self.fanin_cuts(f0.node());
        let set1 = self.fanin_cuts(f1.node());
        let mut list = CutList::new(self.params.cut_num);

        // seed with the cuts selected in the previous pass
        if self.iter > 0 {
            let best = self.best[id as usize];
            *list.get_mut(0) = self.store.load_old(best.handles[0], id, cut_min, true);
            if best.diff_cuts() {
                *list.get_mut(1) = self.store.load_old(best.handles[1], id, cut_min, true);
            }
            if ela && self.map_refs[id as usize] > 0 {
                let active = *list.get(best.index());
                self.cut_deref(&active, Gen::New);
            }
            if required == INFINITY {
                required = self.cut_required(list.get(0));
            }
            self.cut_params(list.get_mut(0), required, flow_refs);
            list.commit_candidate();
            if best.diff_cuts() {
                self.cut_params(list.get_mut(1), required, flow_refs);
                list.commit_candidate();
            }
            if list.get(0).late {
                self.stats.time_fails += 1;
            }
        }

        if let Some(sibling) = aig.sibling(id) {
            let complement = aig.phase(id) ^ aig.phase(sibling);
            for sibling_cut in self.fanin_cuts(sibling) {
                if sibling_cut.leaves().first() == Some(&sibling) {
                    continue;
                }
                let candidate = list.candidate_mut();
                *candidate = sibling_cut;
                candidate.func = candidate.func.map(|func| func.not_cond(complement));
                self.cut_params(list.candidate_mut(), required, flow_refs);
                list.commit_candidate();
            }
        }

        if aig.is_mux(id) {
            let f2 = aig.fanin2(id);
            let set2 = self.fanin_cuts(f2.node());
            self.stats.cut_count[0] += (set0.len() * set1.len() * set2.len()) as f64;
            for c0 in &set0 {
                for c1 in &set1 {
                    for c2 in &set2 {
                        if (c0.sign | c1.sign | c2.sign).count_ones() as usize > lut_size {
                            continue;
                        }
                        self.stats.cut_count[1] += 1.0;
                        if !merge3(c0, c1, c2, list.candidate_mut(), lut_size) {
                            continue;
                        }
                        if list.candidate_is_dominated() {
                            continue;
                        }
                        self.stats.cut_count[2] += 1.0;
                        let fanins = [
                            (c0, f0.is_complement()),
                            (c1, f1.is_complement()),
                            (c2, f2.is_complement()),
                        ];
                        self.candidate_truth(Gate::Mux, &fanins, &mut list);
                        self.cut_params(list.candidate_mut(), required, flow_refs);
                        list.commit_candidate();
                    }
                }
            }
        } else {
            let gate = if aig.is_xor(id) { Gate::Xor } else { Gate::And };
            self.stats.cut_count[0] += (set0.len() * set1.len()) as f64;
            for c0 in &set0 {
                for c1 in &set1 {
                    if c0.len() + c1.len() > lut_size
                        && (c0.sign | c1.sign).count_ones() as usize > lut_size
                    {
                        continue;
                    }
                    self.stats.cut_count[1] += 1.0;
                    if !merge2(c0, c1, list.candidate_mut(), lut_size) {
                        continue;
                    }
                    if list.candidate_is_dominated() {
                        continue;
                    }
                    self.stats.cut_count[2] += 1.0;
                    let fanins = [(c0, f0.is_complement()), (c1, f1.is_complement())];
                    self.candidate_truth(gate, &fanins, &mut list);
                    self.cut_params(list.candidate_mut(), required, flow_refs);
                    list.commit_candidate();
                }
            }
        }

        let n = list.len();
        assert!(n > 0 && n < self.params.cut_num, "node {} has {} cuts", id, n);
        debug_assert!(n == 1 || list.get(0).delay <= list.get(1).delay);

        // the delay-best cut fills both slots until an area cut beats it
        let cut0 = *list.get(0);
        let handle = self.store.save(&cut0, id);
        let best = &mut self.best[id as usize];
        best.active = ActiveSlot::None;
        best.handles = [handle, handle];
        best.delay[0] = cut0.delay;
        best.delay[1] = cut0.delay;
        best.flow[0] = cut0.flow;
        best.flow[1] = cut0.flow;
        self.stats.cut_sizes[cut0.len()] += 1;
        self.stats.cut_count[3] += n as f64;
        self.stats.cut_equal += 1;
        let mut used = 0;
        if n > 1 && cut0.flow > list.get(1).flow + EPSILON {
            let cut1 = *list.get(1);
            let handle = self.store.save(&cut1, id);
            let best = &mut self.best[id as usize];
            best.handles[1] = handle;
            best.delay[1] = cut1.delay;
            best.flow[1] = cut1.flow;
            self.stats.cut_sizes[cut1.len()] += 1;
            self.stats.cut_equal -= 1;
            if !cut1.late {
                used = 1;
            }
        }

        if self.params.use_mux7 && aig.is_mux(id) {
            let mut mux = Cut::mux7(
                f0.node(),
                f1.node(),
                aig.fanin2(id).node(),
                cut_min,
            );
            self.cut_params(&mut mux, required, flow_refs);
            let best = &mut self.best[id as usize];
            best.delay[2] = mux.delay;
            best.flow[2] = mux.flow;
        }

        if ela {
            self.best[id as usize].active = if used == 1 {
                ActiveSlot::Area
            } else {
                ActiveSlot::Delay
            };
            if self.map_refs[id as usize] > 0 {
                let active = *list.get(used);
                self.cut_ref(&active, Gen::New);
            }
        }

        if self.sets.consumers(id) == 0 {
            return;
        }
        let slot = self.sets.fetch(id);
        let mut stored = list.cuts().to_vec();
        if cut0.len() > 1 && (n == 1 || list.get(1).len() > 1) {
            stored.push(Cut::unit(id, cut_min));
        }
        self.sets.store(slot, &stored);
    }
}

#[cfg(test)]
mod test {
    use crate::aig::Aig;
    use crate::cut::Cut;
    use crate::cutset::{CutList, CutsetPool};
    use bumpalo::Bump;

    #[test]
    fn test_cut_list_drops_dominated() {
        let mut list = CutList::new(8);
        *list.candidate_mut() = Cut::from_leaves(&[1, 2]);
        list.commit_candidate();
        *list.candidate_mut() = Cut::from_leaves(&[1, 2, 3]);
        assert!(list.candidate_is_dominated());
        *list.candidate_mut() = Cut::from_leaves(&[2, 3]);
        assert!(!list.candidate_is_dominated());
        list.commit_candidate();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_pool_lifetime() {
        let mut aig = Aig::new();
        let a = aig.add_ci();
        let b = aig.add_ci();
        let c = aig.add_ci();
        let ab = aig.and(a, b);
        let x = aig.and(ab, c);
        let y = aig.and(ab, !c);
        aig.add_co(x);
        aig.add_co(y);

        let bump = Bump::new();
        let mut pool = CutsetPool::new(&bump, 4, aig.num_objs());
        pool.set_consumers(&aig);
        assert_eq!(pool.consumers(ab.node()), 2);
        assert_eq!(pool.consumers(x.node()), 0);

        let slot = pool.fetch(ab.node());
        pool.store(slot, &[Cut::from_leaves(&[1, 2]), Cut::unit(ab.node(), false)]);
        assert_eq!(pool.fetch(ab.node()), slot);
        assert_eq!(pool.cuts(slot).len(), 2);
        assert!(!pool.is_drained());
        assert_eq!(pool.fetch(ab.node()), slot);
        assert!(pool.is_drained());
        assert_eq!(pool.front_max(), 1);

        // a second pass starts from a drained pool
        pool.set_consumers(&aig);
        assert_eq!(pool.consumers(ab.node()), 2);
    }
}
