// cut records, merges, containment and ranking
use crate::aig::{Lit, NodeId};
use crate::truth;
use crate::tt_store::{TruthStore, TT_MUX, TT_VAR0};
use std::cmp::Ordering;

pub const LEAF_MAX: usize = 13;
pub const CUT_MAX: usize = 32;
pub const EPSILON: f32 = 0.005;
pub const INFINITY: i32 = 1_000_000_000;

/// One candidate fan-in window of a node.
///
/// Leaves are strictly ascending except for structural MUX cuts, which keep
/// the `[data0, data1, ctrl]` order of the node's fanins.
#[derive(Clone, Copy, Debug)]
pub struct Cut {
    pub sign: u64,
    pub delay: i32,
    pub flow: f32,
    pub func: Option<Lit>,
    pub late: bool,
    pub mux7: bool,
    n: u8,
    leaves: [NodeId; LEAF_MAX],
}

impl Default for Cut {
    fn default() -> Self {
        Cut {
            sign: 0,
            delay: 0,
            flow: 0.0,
            func: None,
            late: false,
            mux7: false,
            n: 0,
            leaves: [0; LEAF_MAX],
        }
    }
}

pub fn leaf_sign(leaf: NodeId) -> u64 {
    1 << (leaf & 63)
}

pub fn compute_sign(leaves: &[NodeId]) -> u64 {
    leaves.iter().fold(0, |sign, &leaf| sign | leaf_sign(leaf))
}

impl Cut {
    /// The trivial cut `{id}`.
    pub fn unit(id: NodeId, cut_min: bool) -> Self {
        let mut cut = Cut::default();
        cut.n = 1;
        cut.leaves[0] = id;
        cut.sign = leaf_sign(id);
        cut.func = cut_min.then(|| Lit::new(TT_VAR0, false));
        cut
    }

    /// The structural cut of a MUX node over its three fanins.
    pub fn mux7(data0: NodeId, data1: NodeId, ctrl: NodeId, cut_min: bool) -> Self {
        let mut cut = Cut::default();
        cut.set_leaves(&[data0, data1, ctrl]);
        cut.func = cut_min.then(|| Lit::new(TT_MUX, false));
        cut.mux7 = true;
        cut
    }

    pub fn from_leaves(leaves: &[NodeId]) -> Self {
        let mut cut = Cut::default();
        cut.set_leaves(leaves);
        cut
    }

    pub fn len(&self) -> usize {
        self.n as usize
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves[..self.n as usize]
    }

    pub fn set_leaves(&mut self, leaves: &[NodeId]) {
        assert!(leaves.len() <= LEAF_MAX);
        self.n = leaves.len() as u8;
        self.leaves[..leaves.len()].copy_from_slice(leaves);
        self.sign = compute_sign(leaves);
    }

    pub fn truncate(&mut self, n: usize) {
        assert!(n <= self.n as usize);
        self.n = n as u8;
    }

    pub fn recompute_sign(&mut self) {
        self.sign = compute_sign(self.leaves());
    }

    pub fn is_sorted(&self) -> bool {
        self.leaves().windows(2).all(|w| w[0] < w[1])
    }
}

fn reset_merged(cut: &mut Cut, n: usize, sign: u64) {
    cut.n = n as u8;
    cut.sign = sign;
    cut.func = None;
    cut.late = false;
    cut.mux7 = false;
}

/// Union of two sorted cuts into `out`. Fails if the union exceeds `lut_size` leaves.
pub fn merge2(cut0: &Cut, cut1: &Cut, out: &mut Cut, lut_size: usize) -> bool {
    let (c0, c1) = (cut0.leaves(), cut1.leaves());
    if c0.len() == lut_size && c1.len() == lut_size {
        if c0 != c1 {
            return false;
        }
        out.leaves[..lut_size].copy_from_slice(c0);
        reset_merged(out, lut_size, cut0.sign | cut1.sign);
        return true;
    }

    let (mut i, mut k, mut c) = (0, 0, 0);
    while i < c0.len() && k < c1.len() {
        if c == lut_size {
            return false;
        }
        match c0[i].cmp(&c1[k]) {
            Ordering::Less => {
                out.leaves[c] = c0[i];
                i += 1;
            }
            Ordering::Greater => {
                out.leaves[c] = c1[k];
                k += 1;
            }
            Ordering::Equal => {
                out.leaves[c] = c0[i];
                i += 1;
                k += 1;
            }
        }
        c += 1;
    }
    let rest = if i < c0.len() { &c0[i..] } else { &c1[k..] };
    if c + rest.len() > lut_size {
        return false;
    }
    out.leaves[c..c + rest.len()].copy_from_slice(rest);
    reset_merged(out, c + rest.len(), cut0.sign | cut1.sign);
    true
}

/// Union of three sorted cuts into `out`.
pub fn merge3(cut0: &Cut, cut1: &Cut, cut2: &Cut, out: &mut Cut, lut_size: usize) -> bool {
    let lists = [cut0.leaves(), cut1.leaves(), cut2.leaves()];
    let mut pos = [0usize; 3];
    let mut c = 0;
    loop {
        let heads: [NodeId; 3] =
            std::array::from_fn(|k| lists[k].get(pos[k]).copied().unwrap_or(NodeId::MAX));
        let min = heads[0].min(heads[1]).min(heads[2]);
        if min == NodeId::MAX {
            break;
        }
        if c == lut_size {
            return false;
        }
        out.leaves[c] = min;
        c += 1;
        for k in 0..3 {
            if heads[k] == min {
                pos[k] += 1;
            }
        }
    }
    reset_merged(out, c, cut0.sign | cut1.sign | cut2.sign);
    true
}

/// Whether the leaves of `cut` are a subset of the leaves of `base`.
pub fn is_contained_order(base: &Cut, cut: &Cut) -> bool {
    let (b, c) = (base.leaves(), cut.leaves());
    if b.len() == c.len() {
        return b == c;
    }
    debug_assert!(b.len() > c.len());
    if c.is_empty() {
        return true;
    }
    let mut k = 0;
    for &leaf in b {
        if leaf > c[k] {
            return false;
        }
        if leaf == c[k] {
            k += 1;
            if k == c.len() {
                return true;
            }
        }
    }
    false
}

fn dominates(small: &Cut, large: &Cut) -> bool {
    small.sign & large.sign == small.sign && is_contained_order(large, small)
}

fn compare_flow(a: f32, b: f32) -> Ordering {
    if a < b - EPSILON {
        Ordering::Less
    } else if a > b + EPSILON {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Ranks by delay, then leaf count, then flow.
pub fn compare_delay(a: &Cut, b: &Cut) -> Ordering {
    a.delay
        .cmp(&b.delay)
        .then(a.n.cmp(&b.n))
        .then(compare_flow(a.flow, b.flow))
}

/// Ranks cuts meeting their required time first, then by flow, delay and leaf count.
pub fn compare_area(a: &Cut, b: &Cut) -> Ordering {
    a.late
        .cmp(&b.late)
        .then(compare_flow(a.flow, b.flow))
        .then(a.delay.cmp(&b.delay))
        .then(a.n.cmp(&b.n))
}

/// Whether the candidate at `cuts[n]` is dominated by one of `cuts[..n]`.
pub fn last_cut_is_contained(cuts: &[Cut], n: usize) -> bool {
    let new = &cuts[n];
    cuts[..n]
        .iter()
        .any(|cut| cut.n <= new.n && dominates(cut, new))
}

// drops area cuts strictly dominated by the candidate at `cuts[n]`
fn last_cut_contains_area(cuts: &mut [Cut], n: usize) -> usize {
    let new = cuts[n];
    let mut removed = [false; CUT_MAX + 1];
    let mut changed = false;
    for i in 1..n {
        if new.n < cuts[i].n && dominates(&new, &cuts[i]) {
            removed[i] = true;
            changed = true;
        }
    }
    if !changed {
        return n;
    }
    let mut k = 1;
    for i in 1..=n {
        if removed[i] {
            continue;
        }
        if k < i {
            cuts[k] = cuts[i];
        }
        k += 1;
    }
    k - 1
}

fn sort_last_by_area(cuts: &mut [Cut], n: usize) {
    for i in (2..=n).rev() {
        if compare_area(&cuts[i - 1], &cuts[i]) == Ordering::Less {
            return;
        }
        cuts.swap(i - 1, i);
    }
}

/// Inserts the candidate at `cuts[n]` into the ranked list `cuts[..n]`.
///
/// Position 0 keeps the delay-best cut and the rest is ordered by area.
/// Returns the new list length, which stays below `cut_num` so that one
/// slot is always free for the next candidate.
pub fn add_cut(cuts: &mut [Cut], n: usize, cut_num: usize) -> usize {
    debug_assert!(cuts[n].is_sorted() && cuts[n].sign == compute_sign(cuts[n].leaves()));
    if n == 0 {
        return 1;
    }
    let n = last_cut_contains_area(cuts, n);
    assert!(n >= 1);
    if compare_delay(&cuts[0], &cuts[n]) == Ordering::Greater {
        cuts.swap(0, n);
        if cuts[0].n < cuts[n].n && dominates(&cuts[0], &cuts[n]) {
            return n;
        }
    }
    sort_last_by_area(cuts, n);
    (n + 1).min(cut_num - 1)
}

/// Gate kinds a cut function can be composed with.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Gate {
    And,
    Xor,
    Mux,
}

/// Computes the function of `result` from the functions of the fanin cuts
/// (`[data0, data1]`, plus `ctrl` for a MUX), each paired with the
/// complement of its fanin edge. Redundant leaves are dropped from
/// `result`. Returns whether any leaf was dropped.
pub fn compute_truth(
    store: &mut TruthStore,
    gate: Gate,
    fanins: &[(&Cut, bool)],
    result: &mut Cut,
) -> bool {
    let old_len = result.len();
    let tts: Vec<Vec<u64>> = fanins
        .iter()
        .map(|&(cut, complement)| {
            let func = cut.func.expect("fanin cut without a function");
            let mut t = store.read_lit(func.node(), func.is_complement() ^ complement);
            truth::expand(&mut t, cut.leaves(), result.leaves());
            t
        })
        .collect();

    let mut t = match gate {
        Gate::And => tts[0].iter().zip(&tts[1]).map(|(a, b)| a & b).collect::<Vec<_>>(),
        Gate::Xor => tts[0].iter().zip(&tts[1]).map(|(a, b)| a ^ b).collect(),
        Gate::Mux => (0..tts[2].len())
            .map(|w| (tts[2][w] & tts[1][w]) | (!tts[2][w] & tts[0][w]))
            .collect(),
    };
    let complement = t[0] & 1 != 0;
    if complement {
        truth::not(&mut t);
    }
    let n = result.len();
    let new_len = truth::min_base(&mut t, &mut result.leaves[..n]);
    result.truncate(new_len);
    result.func = Some(Lit::new(store.insert(&t), complement));
    new_len < old_len
}

#[cfg(test)]
mod test {
    use crate::cut::*;
    use crate::truth;
    use crate::tt_store::TruthStore;
    use std::cmp::Ordering;

    fn cut(leaves: &[u32], delay: i32, flow: f32) -> Cut {
        let mut cut = Cut::from_leaves(leaves);
        cut.delay = delay;
        cut.flow = flow;
        cut
    }

    #[test]
    fn test_merge2_bound() {
        let c0 = Cut::from_leaves(&[1, 2, 3]);
        let c1 = Cut::from_leaves(&[2, 3, 4]);
        let mut out = Cut::default();
        assert!(merge2(&c0, &c1, &mut out, 4));
        assert_eq!(out.leaves(), &[1, 2, 3, 4]);
        assert_eq!(out.sign, compute_sign(&[1, 2, 3, 4]));
        assert!(!merge2(&c0, &c1, &mut out, 3));
    }

    #[test]
    fn test_merge2_full_cuts() {
        let c0 = Cut::from_leaves(&[1, 2, 3]);
        let c1 = Cut::from_leaves(&[1, 2, 4]);
        let mut out = Cut::default();
        assert!(!merge2(&c0, &c1, &mut out, 3));
        assert!(merge2(&c0, &c0, &mut out, 3));
        assert_eq!(out.leaves(), c0.leaves());
    }

    #[test]
    fn test_merge2_empty() {
        let c0 = Cut::default();
        let c1 = Cut::from_leaves(&[7, 9]);
        let mut out = Cut::default();
        assert!(merge2(&c0, &c1, &mut out, 2));
        assert_eq!(out.leaves(), &[7, 9]);
    }

    #[test]
    fn test_merge3() {
        let c0 = Cut::from_leaves(&[1, 5]);
        let c1 = Cut::from_leaves(&[2, 5]);
        let c2 = Cut::from_leaves(&[1, 70]);
        let mut out = Cut::default();
        assert!(merge3(&c0, &c1, &c2, &mut out, 4));
        assert_eq!(out.leaves(), &[1, 2, 5, 70]);
        assert!(out.is_sorted());
        assert!(!merge3(&c0, &c1, &c2, &mut out, 3));
    }

    #[test]
    fn test_containment() {
        let big = Cut::from_leaves(&[2, 4, 6, 8]);
        assert!(is_contained_order(&big, &Cut::from_leaves(&[4, 8])));
        assert!(!is_contained_order(&big, &Cut::from_leaves(&[4, 5])));
        assert!(is_contained_order(&big, &Cut::default()));
        assert!(is_contained_order(&big, &big));
    }

    #[test]
    fn test_comparators() {
        let a = cut(&[1, 2], 2, 1.0);
        let b = cut(&[1, 2, 3], 2, 0.5);
        assert_eq!(compare_delay(&a, &b), Ordering::Less);
        assert_eq!(compare_area(&a, &b), Ordering::Greater);
        let c = cut(&[4, 5], 2, 1.001);
        assert_eq!(compare_delay(&a, &c), Ordering::Equal);
        let mut late = cut(&[1], 0, 0.0);
        late.late = true;
        assert_eq!(compare_area(&late, &b), Ordering::Greater);
    }

    #[test]
    fn test_dominated_candidate() {
        let mut cuts = [Cut::default(); CUT_MAX];
        cuts[0] = cut(&[3, 5], 1, 1.0);
        cuts[1] = cut(&[3, 5, 9], 2, 1.0);
        assert!(last_cut_is_contained(&cuts, 1));
        cuts[1] = cut(&[3, 9], 2, 1.0);
        assert!(!last_cut_is_contained(&cuts, 1));
    }

    #[test]
    fn test_add_cut_removes_supersets() {
        let mut cuts = [Cut::default(); CUT_MAX];
        let mut n = 0;
        cuts[n] = cut(&[1, 2], 1, 2.0);
        n = add_cut(&mut cuts, n, 8);
        cuts[n] = cut(&[5, 7, 9], 2, 1.0);
        n = add_cut(&mut cuts, n, 8);
        assert_eq!(n, 2);
        // {5} dominates {5, 7, 9}, which is dropped
        cuts[n] = cut(&[5], 2, 0.5);
        n = add_cut(&mut cuts, n, 8);
        assert_eq!(n, 2);
        assert_eq!(cuts[0].leaves(), &[1, 2]);
        assert_eq!(cuts[1].leaves(), &[5]);
    }

    #[test]
    fn test_add_cut_delay_slot_and_area_order() {
        let mut cuts = [Cut::default(); CUT_MAX];
        let mut n = 0;
        for (leaves, delay, flow) in [
            (&[1, 2, 3][..], 3, 1.0),
            (&[4, 5][..], 2, 3.0),
            (&[6, 7][..], 4, 0.5),
            (&[8, 9][..], 4, 2.0),
        ] {
            cuts[n] = cut(leaves, delay, flow);
            n = add_cut(&mut cuts, n, 8);
        }
        assert_eq!(n, 4);
        assert_eq!(cuts[0].leaves(), &[4, 5]);
        let flows: Vec<f32> = cuts[1..n].iter().map(|c| c.flow).collect();
        assert_eq!(flows, vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_add_cut_capacity() {
        let mut cuts = [Cut::default(); CUT_MAX];
        let mut n = 0;
        for i in 0..10u32 {
            cuts[n] = cut(&[10 * i, 10 * i + 1], 1, i as f32);
            n = add_cut(&mut cuts, n, 4);
            assert!(n <= 3);
        }
        assert_eq!(n, 3);
    }

    #[test]
    fn test_compute_truth_and() {
        let mut store = TruthStore::new(4);
        let a = Cut::unit(3, true);
        let b = Cut::unit(5, true);
        let mut r = Cut::from_leaves(&[3, 5]);
        assert!(!compute_truth(&mut store, Gate::And, &[(&a, false), (&b, true)], &mut r));
        let func = r.func.unwrap();
        let t = store.read_lit(func.node(), func.is_complement());
        assert_eq!(t[0] & 0xf, 0x2);
    }

    #[test]
    fn test_compute_truth_shrinks_support() {
        let mut store = TruthStore::new(4);
        // x ^ x over a cut that repeats the same leaf through two paths
        let a = Cut::unit(3, true);
        let mut r = Cut::from_leaves(&[3]);
        compute_truth(&mut store, Gate::Xor, &[(&a, false), (&a, true)], &mut r);
        assert_eq!(r.len(), 0);
        let func = r.func.unwrap();
        assert!(truth::is_const1(&store.read_lit(func.node(), func.is_complement())));
    }

    #[test]
    fn test_compute_truth_mux() {
        let mut store = TruthStore::new(4);
        let d0 = Cut::unit(2, true);
        let d1 = Cut::unit(4, true);
        let s = Cut::unit(6, true);
        let mut r = Cut::from_leaves(&[2, 4, 6]);
        compute_truth(&mut store, Gate::Mux, &[(&d0, false), (&d1, false), (&s, false)], &mut r);
        let func = r.func.unwrap();
        let t = store.read_lit(func.node(), func.is_complement());
        assert_eq!(t[0] & 0xff, 0xca);
    }
}
