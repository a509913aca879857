// exact area via reference counting of selected cuts
use crate::aig::NodeId;
use crate::cut::Cut;
use crate::mapper::Mapper;
use crate::store::Gen;

impl<'a> Mapper<'a> {
    /// The cut node `id` currently commits to, read from generation `gen`.
    /// Reads from the old generation carry the cut function in cut-min mode.
    pub(crate) fn best_cut(&self, id: NodeId, gen: Gen) -> Cut {
        let best = &self.best[id as usize];
        match best.cut_index() {
            2 => {
                let aig = self.aig;
                Cut::mux7(
                    aig.fanin0(id).node(),
                    aig.fanin1(id).node(),
                    aig.fanin2(id).node(),
                    self.params.cut_min && gen == Gen::Old,
                )
            }
            index => {
                let truth = self.params.cut_min && gen == Gen::Old;
                self.store.load(gen, best.handles[index], id, truth)
            }
        }
    }

    /// References the leaves of `cut`, recursing into leaves that were not
    /// referenced before. Returns the area of the cone brought in.
    pub(crate) fn cut_ref(&mut self, cut: &Cut, gen: Gen) -> f32 {
        let mut area = self.cut_area(cut);
        for &leaf in cut.leaves() {
            if leaf == 0 || !self.aig.is_internal(leaf) {
                continue;
            }
            let refs = &mut self.map_refs[leaf as usize];
            *refs += 1;
            if *refs == 1 {
                let leaf_cut = self.best_cut(leaf, gen);
                area += self.cut_ref(&leaf_cut, gen);
            }
        }
        area
    }

    /// Reverse of `cut_ref`.
    pub(crate) fn cut_deref(&mut self, cut: &Cut, gen: Gen) -> f32 {
        let mut area = self.cut_area(cut);
        for &leaf in cut.leaves() {
            if leaf == 0 || !self.aig.is_internal(leaf) {
                continue;
            }
            let refs = &mut self.map_refs[leaf as usize];
            assert!(*refs > 0, "dereferencing unreferenced node {}", leaf);
            *refs -= 1;
            if *refs == 0 {
                let leaf_cut = self.best_cut(leaf, gen);
                area += self.cut_deref(&leaf_cut, gen);
            }
        }
        area
    }

    /// Area `cut` would add to the current cover, leaving the reference
    /// counts as they were.
    pub(crate) fn area_derefed(&mut self, cut: &Cut, gen: Gen) -> f32 {
        if cut.len() < 2 {
            return 0.0;
        }
        let ela1 = self.cut_ref(cut, gen);
        let ela2 = self.cut_deref(cut, gen);
        debug_assert!((ela1 - ela2).abs() < 1e-3);
        ela1
    }
}
