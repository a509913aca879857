// and-inverter graph with native XOR/MUX nodes and optional choices
use std::collections::HashMap;
use std::ops::Not;

pub type NodeId = u32;

/// Node reference with a complement bit, `id << 1 | complement`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
pub struct Lit(u32);

impl Lit {
    pub const FALSE: Lit = Lit(0);
    pub const TRUE: Lit = Lit(1);

    pub fn new(node: NodeId, complement: bool) -> Self {
        Lit(node << 1 | complement as u32)
    }

    pub fn from_raw(raw: u32) -> Self {
        Lit(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn node(self) -> NodeId {
        self.0 >> 1
    }

    pub fn is_complement(self) -> bool {
        self.0 & 1 != 0
    }

    pub fn regular(self) -> Lit {
        Lit(self.0 & !1)
    }

    pub fn not_cond(self, c: bool) -> Lit {
        Lit(self.0 ^ c as u32)
    }

    pub fn is_const(self) -> bool {
        self.node() == 0
    }
}

impl Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        Lit(self.0 ^ 1)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    Const0,
    Ci,
    Co,
    And,
    Xor,
    /// `fanin[2] ? fanin[1] : fanin[0]`
    Mux,
    Buf,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub fanin: [Lit; 3],
    // position among CIs or COs
    cio: u32,
    // value under the all-zero input pattern
    phase: bool,
}

#[derive(Clone, Debug)]
pub struct Aig {
    nodes: Vec<Node>,
    cis: Vec<NodeId>,
    cos: Vec<NodeId>,
    strash: HashMap<(NodeKind, [Lit; 3]), NodeId>,
    siblings: Vec<NodeId>,
}

impl Default for Aig {
    fn default() -> Self {
        Self::new()
    }
}

impl Aig {
    pub fn new() -> Self {
        Aig {
            nodes: vec![Node {
                kind: NodeKind::Const0,
                fanin: [Lit::FALSE; 3],
                cio: 0,
                phase: false,
            }],
            cis: vec![],
            cos: vec![],
            strash: HashMap::new(),
            siblings: vec![],
        }
    }

    pub fn num_objs(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_cis(&self) -> usize {
        self.cis.len()
    }

    pub fn num_cos(&self) -> usize {
        self.cos.len()
    }

    pub fn cis(&self) -> &[NodeId] {
        &self.cis
    }

    pub fn cos(&self) -> &[NodeId] {
        &self.cos
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id as usize].kind
    }

    pub fn fanin0(&self, id: NodeId) -> Lit {
        self.nodes[id as usize].fanin[0]
    }

    pub fn fanin1(&self, id: NodeId) -> Lit {
        self.nodes[id as usize].fanin[1]
    }

    /// Control input of a MUX node.
    pub fn fanin2(&self, id: NodeId) -> Lit {
        debug_assert!(self.is_mux(id));
        self.nodes[id as usize].fanin[2]
    }

    pub fn is_ci(&self, id: NodeId) -> bool {
        self.kind(id) == NodeKind::Ci
    }

    pub fn is_co(&self, id: NodeId) -> bool {
        self.kind(id) == NodeKind::Co
    }

    pub fn is_buf(&self, id: NodeId) -> bool {
        self.kind(id) == NodeKind::Buf
    }

    pub fn is_mux(&self, id: NodeId) -> bool {
        self.kind(id) == NodeKind::Mux
    }

    pub fn is_xor(&self, id: NodeId) -> bool {
        self.kind(id) == NodeKind::Xor
    }

    pub fn is_and(&self, id: NodeId) -> bool {
        self.kind(id) == NodeKind::And
    }

    /// AND, XOR or MUX node: anything a LUT can be rooted at.
    pub fn is_internal(&self, id: NodeId) -> bool {
        matches!(
            self.kind(id),
            NodeKind::And | NodeKind::Xor | NodeKind::Mux
        )
    }

    pub fn has_muxes(&self) -> bool {
        self.nodes.iter().any(|node| node.kind == NodeKind::Mux)
    }

    pub fn num_internal(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node.kind, NodeKind::And | NodeKind::Xor | NodeKind::Mux))
            .count()
    }

    pub fn cio_index(&self, id: NodeId) -> usize {
        debug_assert!(self.is_ci(id) || self.is_co(id));
        self.nodes[id as usize].cio as usize
    }

    pub fn co_driver(&self, co: usize) -> Lit {
        self.fanin0(self.cos[co])
    }

    pub fn phase(&self, id: NodeId) -> bool {
        self.nodes[id as usize].phase
    }

    fn lit_phase(&self, lit: Lit) -> bool {
        self.phase(lit.node()) ^ lit.is_complement()
    }

    pub fn sibling(&self, id: NodeId) -> Option<NodeId> {
        match self.siblings.get(id as usize) {
            Some(&sibling) if sibling != 0 => Some(sibling),
            _ => None,
        }
    }

    pub fn has_choices(&self) -> bool {
        self.siblings.iter().any(|&s| s != 0)
    }

    /// Records `sibling` as a functionally equivalent (up to phase) alternative of `id`.
    pub fn set_sibling(&mut self, id: NodeId, sibling: NodeId) {
        assert!(sibling < id);
        assert!(self.is_internal(id) && self.is_internal(sibling));
        if self.siblings.len() < self.nodes.len() {
            self.siblings.resize(self.nodes.len(), 0);
        }
        self.siblings[id as usize] = sibling;
    }

    fn push(&mut self, kind: NodeKind, fanin: [Lit; 3], cio: u32) -> NodeId {
        let id = self.nodes.len() as NodeId;
        let phase = match kind {
            NodeKind::Const0 | NodeKind::Ci => false,
            NodeKind::Co | NodeKind::Buf => self.lit_phase(fanin[0]),
            NodeKind::And => self.lit_phase(fanin[0]) & self.lit_phase(fanin[1]),
            NodeKind::Xor => self.lit_phase(fanin[0]) ^ self.lit_phase(fanin[1]),
            NodeKind::Mux => {
                if self.lit_phase(fanin[2]) {
                    self.lit_phase(fanin[1])
                } else {
                    self.lit_phase(fanin[0])
                }
            }
        };
        self.nodes.push(Node {
            kind,
            fanin,
            cio,
            phase,
        });
        id
    }

    pub fn add_ci(&mut self) -> Lit {
        let idx = self.cis.len() as u32;
        let id = self.push(NodeKind::Ci, [Lit::FALSE; 3], idx);
        self.cis.push(id);
        Lit::new(id, false)
    }

    pub fn add_co(&mut self, driver: Lit) -> NodeId {
        let idx = self.cos.len() as u32;
        let id = self.push(NodeKind::Co, [driver, Lit::FALSE, Lit::FALSE], idx);
        self.cos.push(id);
        id
    }

    pub fn add_buf(&mut self, driver: Lit) -> Lit {
        Lit::new(
            self.push(NodeKind::Buf, [driver, Lit::FALSE, Lit::FALSE], 0),
            false,
        )
    }

    fn hashed(&mut self, kind: NodeKind, fanin: [Lit; 3]) -> NodeId {
        if let Some(&id) = self.strash.get(&(kind, fanin)) {
            return id;
        }
        let id = self.push(kind, fanin, 0);
        self.strash.insert((kind, fanin), id);
        id
    }

    pub fn and(&mut self, a: Lit, b: Lit) -> Lit {
        if a == Lit::FALSE || b == Lit::FALSE || a == !b {
            return Lit::FALSE;
        }
        if a == Lit::TRUE || a == b {
            return b;
        }
        if b == Lit::TRUE {
            return a;
        }
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        Lit::new(self.hashed(NodeKind::And, [a, b, Lit::FALSE]), false)
    }

    pub fn or(&mut self, a: Lit, b: Lit) -> Lit {
        !self.and(!a, !b)
    }

    /// Native XOR node; fanins are stored regular with the complement pushed to the output.
    pub fn xor(&mut self, a: Lit, b: Lit) -> Lit {
        if a.is_const() {
            return b.not_cond(a == Lit::TRUE);
        }
        if b.is_const() {
            return a.not_cond(b == Lit::TRUE);
        }
        if a == b {
            return Lit::FALSE;
        }
        if a == !b {
            return Lit::TRUE;
        }
        let complement = a.is_complement() ^ b.is_complement();
        let (a, b) = (a.regular(), b.regular());
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        Lit::new(self.hashed(NodeKind::Xor, [a, b, Lit::FALSE]), complement)
    }

    /// Native MUX node computing `ctrl ? data1 : data0`.
    pub fn mux(&mut self, ctrl: Lit, data1: Lit, data0: Lit) -> Lit {
        if ctrl == Lit::TRUE {
            return data1;
        }
        if ctrl == Lit::FALSE || data0 == data1 {
            return data0;
        }
        if data1 == !data0 {
            return self.xor(ctrl, data0);
        }
        let (ctrl, data1, data0) = if ctrl.is_complement() {
            (!ctrl, data0, data1)
        } else {
            (ctrl, data1, data0)
        };
        let complement = data0.is_complement();
        let (data1, data0) = (data1.not_cond(complement), data0.not_cond(complement));
        Lit::new(
            self.hashed(NodeKind::Mux, [data0, data1, ctrl]),
            complement,
        )
    }

    /// XOR expressed with three AND nodes.
    pub fn xor_aig(&mut self, a: Lit, b: Lit) -> Lit {
        let both = self.and(a, b);
        let neither = self.and(!a, !b);
        self.and(!both, !neither)
    }

    /// MUX expressed with three AND nodes.
    pub fn mux_aig(&mut self, ctrl: Lit, data1: Lit, data0: Lit) -> Lit {
        let t = self.and(ctrl, data1);
        let e = self.and(!ctrl, data0);
        self.or(t, e)
    }

    /// Number of fanouts of every object, counting COs and buffers as consumers.
    pub fn fanout_counts(&self) -> Vec<u32> {
        let mut refs = vec![0u32; self.nodes.len()];
        for node in self.nodes.iter() {
            let nfanins = match node.kind {
                NodeKind::Const0 | NodeKind::Ci => 0,
                NodeKind::Co | NodeKind::Buf => 1,
                NodeKind::And | NodeKind::Xor => 2,
                NodeKind::Mux => 3,
            };
            for fanin in &node.fanin[..nfanins] {
                refs[fanin.node() as usize] += 1;
            }
        }
        refs
    }

    /// An AND whose complemented fanins are ANDs sharing a variable in opposite polarities.
    pub fn is_mux_type(&self, id: NodeId) -> bool {
        if !self.is_and(id) {
            return false;
        }
        let (f0, f1) = (self.fanin0(id), self.fanin1(id));
        if !f0.is_complement() || !f1.is_complement() {
            return false;
        }
        if !self.is_and(f0.node()) || !self.is_and(f1.node()) {
            return false;
        }
        self.mux_control_pair(f0.node(), f1.node()).is_some()
    }

    fn mux_control_pair(&self, n0: NodeId, n1: NodeId) -> Option<(usize, usize)> {
        let c0 = &self.nodes[n0 as usize].fanin;
        let c1 = &self.nodes[n1 as usize].fanin;
        [(1, 1), (0, 0), (0, 1), (1, 0)]
            .into_iter()
            .find(|&(i, j)| c0[i] == !c1[j])
    }

    /// For a MUX-type AND returns `(ctrl, then, else)` with `ctrl` regular,
    /// such that the node computes `ctrl ? then : else`.
    pub fn recognize_mux(&self, id: NodeId) -> Option<(Lit, Lit, Lit)> {
        if !self.is_mux_type(id) {
            return None;
        }
        let (n0, n1) = (self.fanin0(id).node(), self.fanin1(id).node());
        let (i, j) = self.mux_control_pair(n0, n1)?;
        let c0 = self.nodes[n0 as usize].fanin;
        let c1 = self.nodes[n1 as usize].fanin;
        let (o0, o1) = (c0[1 - i], c1[1 - j]);
        if c0[i].is_complement() {
            Some((c1[j], !o1, !o0))
        } else {
            Some((c0[i], !o0, !o1))
        }
    }

    /// For an AND encoding an XOR returns the two operands.
    pub fn recognize_xor(&self, id: NodeId) -> Option<(Lit, Lit)> {
        if !self.is_and(id) {
            return None;
        }
        let (f0, f1) = (self.fanin0(id), self.fanin1(id));
        if !f0.is_complement() || !f1.is_complement() {
            return None;
        }
        let (p0, p1) = (f0.node(), f1.node());
        if !self.is_and(p0) || !self.is_and(p1) {
            return None;
        }
        let c0 = self.nodes[p0 as usize].fanin;
        let c1 = self.nodes[p1 as usize].fanin;
        if c0[0].node() != c1[0].node() || c0[1].node() != c1[1].node() {
            return None;
        }
        if c0[0] == c1[0] || c0[1] == c1[1] {
            return None;
        }
        Some((c0[0], c0[1]))
    }

    /// Number of distinct CO drivers and of drivers used in both polarities.
    pub fn co_driver_stats(&self) -> (usize, usize) {
        let mut marks: HashMap<NodeId, u8> = HashMap::new();
        for co in 0..self.cos.len() {
            let driver = self.co_driver(co);
            *marks.entry(driver.node()).or_insert(0) |= if driver.is_complement() { 2 } else { 1 };
        }
        let drivers = marks.len();
        let inverters = marks.values().filter(|&&mark| mark == 3).count();
        (drivers, inverters)
    }

    /// Rebuilds the network folding AND-level XOR and MUX structures into native nodes.
    /// MUXes are only folded if their two inner ANDs have at most `limit` fanouts combined.
    pub fn coarsen(&self, limit: u32) -> Aig {
        let refs = self.fanout_counts();
        let mut new = Aig::new();
        let mut copy: Vec<Lit> = vec![Lit::FALSE; self.nodes.len()];
        let tr = |copy: &Vec<Lit>, lit: Lit| copy[lit.node() as usize].not_cond(lit.is_complement());

        for id in 1..self.nodes.len() as NodeId {
            let node = &self.nodes[id as usize];
            let [f0, f1, f2] = node.fanin;
            copy[id as usize] = match node.kind {
                NodeKind::Const0 => unreachable!(),
                NodeKind::Ci => new.add_ci(),
                NodeKind::Co => {
                    new.add_co(tr(&copy, f0));
                    continue;
                }
                NodeKind::Buf => new.add_buf(tr(&copy, f0)),
                NodeKind::Xor => new.xor(tr(&copy, f0), tr(&copy, f1)),
                NodeKind::Mux => new.mux(tr(&copy, f2), tr(&copy, f1), tr(&copy, f0)),
                NodeKind::And => {
                    if !self.is_mux_type(id)
                        || self.sibling(f0.node()).is_some()
                        || self.sibling(f1.node()).is_some()
                    {
                        new.and(tr(&copy, f0), tr(&copy, f1))
                    } else if let Some((a, b)) = self.recognize_xor(id) {
                        new.xor(tr(&copy, a), tr(&copy, b))
                    } else if refs[f0.node() as usize] + refs[f1.node() as usize] > limit {
                        new.and(tr(&copy, f0), tr(&copy, f1))
                    } else {
                        let Some((c, t, e)) = self.recognize_mux(id) else {
                            unreachable!();
                        };
                        new.mux(tr(&copy, c), tr(&copy, t), tr(&copy, e))
                    }
                }
            };

            if let Some(sibling) = self.sibling(id) {
                let new_id = copy[id as usize].node();
                let new_sibling = copy[sibling as usize].node();
                if new.is_internal(new_id) && new.is_internal(new_sibling) && new_id > new_sibling {
                    new.set_sibling(new_id, new_sibling);
                }
            }
        }

        new.cleanup()
    }

    /// Copy of the network without logic unreachable from the COs. CIs are all kept.
    pub fn cleanup(&self) -> Aig {
        let mut used = vec![false; self.nodes.len()];
        for id in (1..self.nodes.len() as NodeId).rev() {
            let node = &self.nodes[id as usize];
            if node.kind == NodeKind::Co {
                used[id as usize] = true;
            }
            if !used[id as usize] {
                continue;
            }
            let nfanins = match node.kind {
                NodeKind::Const0 | NodeKind::Ci => 0,
                NodeKind::Co | NodeKind::Buf => 1,
                NodeKind::And | NodeKind::Xor => 2,
                NodeKind::Mux => 3,
            };
            for fanin in &node.fanin[..nfanins] {
                used[fanin.node() as usize] = true;
            }
            if let Some(sibling) = self.sibling(id) {
                used[sibling as usize] = true;
            }
        }

        let mut new = Aig::new();
        let mut copy: Vec<Lit> = vec![Lit::FALSE; self.nodes.len()];
        let tr = |copy: &Vec<Lit>, lit: Lit| copy[lit.node() as usize].not_cond(lit.is_complement());
        for id in 1..self.nodes.len() as NodeId {
            let node = &self.nodes[id as usize];
            let [f0, f1, f2] = node.fanin;
            if node.kind != NodeKind::Ci && !used[id as usize] {
                continue;
            }
            copy[id as usize] = match node.kind {
                NodeKind::Const0 => unreachable!(),
                NodeKind::Ci => new.add_ci(),
                NodeKind::Co => {
                    new.add_co(tr(&copy, f0));
                    continue;
                }
                NodeKind::Buf => new.add_buf(tr(&copy, f0)),
                NodeKind::And => new.and(tr(&copy, f0), tr(&copy, f1)),
                NodeKind::Xor => new.xor(tr(&copy, f0), tr(&copy, f1)),
                NodeKind::Mux => new.mux(tr(&copy, f2), tr(&copy, f1), tr(&copy, f0)),
            };
            if let Some(sibling) = self.sibling(id) {
                let new_id = copy[id as usize].node();
                let new_sibling = copy[sibling as usize].node();
                if new.is_internal(new_id) && new.is_internal(new_sibling) && new_id > new_sibling {
                    new.set_sibling(new_id, new_sibling);
                }
            }
        }
        new
    }

    /// Expands native XOR and MUX nodes into ANDs. Returns the new network
    /// and the literal each old object maps to.
    pub fn expand(&self) -> (Aig, Vec<Lit>) {
        let mut new = Aig::new();
        let mut copy: Vec<Lit> = vec![Lit::FALSE; self.nodes.len()];
        let tr = |copy: &Vec<Lit>, lit: Lit| copy[lit.node() as usize].not_cond(lit.is_complement());
        for id in 1..self.nodes.len() as NodeId {
            let [f0, f1, f2] = self.nodes[id as usize].fanin;
            copy[id as usize] = match self.kind(id) {
                NodeKind::Const0 => unreachable!(),
                NodeKind::Ci => new.add_ci(),
                NodeKind::Co => {
                    new.add_co(tr(&copy, f0));
                    continue;
                }
                NodeKind::Buf => new.add_buf(tr(&copy, f0)),
                NodeKind::And => new.and(tr(&copy, f0), tr(&copy, f1)),
                NodeKind::Xor => new.xor_aig(tr(&copy, f0), tr(&copy, f1)),
                NodeKind::Mux => new.mux_aig(tr(&copy, f2), tr(&copy, f1), tr(&copy, f0)),
            };
        }
        (new, copy)
    }

    /// 64-way parallel simulation. `ci_patterns[i]` holds 64 values of CI `i`.
    /// Returns the value of every object.
    pub fn simulate(&self, ci_patterns: &[u64]) -> Vec<u64> {
        assert_eq!(ci_patterns.len(), self.cis.len());
        let mut values = vec![0u64; self.nodes.len()];
        let val = |values: &Vec<u64>, lit: Lit| {
            let v = values[lit.node() as usize];
            if lit.is_complement() {
                !v
            } else {
                v
            }
        };
        for (id, node) in self.nodes.iter().enumerate() {
            let [f0, f1, f2] = node.fanin;
            values[id] = match node.kind {
                NodeKind::Const0 => 0,
                NodeKind::Ci => ci_patterns[node.cio as usize],
                NodeKind::Co | NodeKind::Buf => val(&values, f0),
                NodeKind::And => val(&values, f0) & val(&values, f1),
                NodeKind::Xor => val(&values, f0) ^ val(&values, f1),
                NodeKind::Mux => {
                    let c = val(&values, f2);
                    (c & val(&values, f1)) | (!c & val(&values, f0))
                }
            };
        }
        values
    }

    pub fn lit_value(values: &[u64], lit: Lit) -> u64 {
        let v = values[lit.node() as usize];
        if lit.is_complement() {
            !v
        } else {
            v
        }
    }
}
