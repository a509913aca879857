// derivation of the LUT cover from the final selection
use crate::aig::{Aig, Lit, NodeId, NodeKind};
use crate::error::{MapError, Result};
use crate::mapper::{MapStats, Mapper};
use crate::store::Gen;
use crate::truth;
use crate::tt_store::TT_VAR0;
use std::collections::{HashMap, HashSet};

/// LUT cover of a network as a flat table.
///
/// Entry `i` of the first `num_objs` entries is the offset of the record
/// of the LUT rooted at node `i`, or 0. A record is `n, leaf_0 .. leaf_n-1,
/// root`, with the root negated for LUTs covering a MUX by its fanins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LutMapping {
    table: Vec<i32>,
    num_objs: usize,
    functions: HashMap<NodeId, Vec<u64>>,
}

struct LutRecord {
    root: NodeId,
    leaves: Vec<NodeId>,
    mux7: bool,
    function: Option<Vec<u64>>,
}

impl LutMapping {
    fn from_records(num_objs: usize, records: Vec<LutRecord>) -> Result<Self> {
        let mut table = vec![0i32; num_objs];
        let mut functions = HashMap::new();
        for record in records {
            if table[record.root as usize] != 0 {
                return Err(MapError::MappingCheck(format!("node {} is the root of two LUTs", record.root)));
            }
            table[record.root as usize] = table.len() as i32;
            table.push(record.leaves.len() as i32);
            table.extend(record.leaves.iter().map(|&leaf| leaf as i32));
            table.push(if record.mux7 {
                -(record.root as i32)
            } else {
                record.root as i32
            });
            if let Some(function) = record.function {
                functions.insert(record.root, function);
            }
        }
        Ok(LutMapping {
            table,
            num_objs,
            functions,
        })
    }

    pub fn table(&self) -> &[i32] {
        &self.table
    }

    fn offset(&self, id: NodeId) -> usize {
        let offset = self.table[id as usize];
        assert!(offset > 0, "node {} is not a LUT root", id);
        offset as usize
    }

    pub fn is_lut(&self, id: NodeId) -> bool {
        (id as usize) < self.num_objs && self.table[id as usize] != 0
    }

    pub fn lut_size(&self, id: NodeId) -> usize {
        self.table[self.offset(id)] as usize
    }

    pub fn lut_leaves(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let offset = self.offset(id);
        let n = self.table[offset] as usize;
        self.table[offset + 1..offset + 1 + n]
            .iter()
            .map(|&leaf| leaf as NodeId)
    }

    pub fn lut_root_is_mux7(&self, id: NodeId) -> bool {
        let offset = self.offset(id);
        self.table[offset + 1 + self.table[offset] as usize] < 0
    }

    pub fn iter_luts(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.num_objs as NodeId).filter(|&id| self.is_lut(id))
    }

    pub fn lut_count(&self) -> usize {
        self.iter_luts().count()
    }

    pub fn edge_count(&self) -> usize {
        self.iter_luts().map(|id| self.lut_size(id)).sum()
    }

    /// Truth table of the LUT at `root` over its leaves, when functions
    /// were computed during mapping.
    pub fn lut_function(&self, root: NodeId) -> Option<&[u64]> {
        self.functions.get(&root).map(|f| f.as_slice())
    }

    /// Number of LUT levels between the CIs and the deepest CO.
    pub fn depth(&self, aig: &Aig) -> usize {
        let mut level = vec![0usize; aig.num_objs()];
        for id in 1..aig.num_objs() as NodeId {
            level[id as usize] = if aig.is_buf(id) {
                level[aig.fanin0(id).node() as usize]
            } else if self.is_lut(id) {
                1 + self
                    .lut_leaves(id)
                    .map(|leaf| level[leaf as usize])
                    .max()
                    .unwrap_or(0)
            } else {
                0
            };
        }
        (0..aig.num_cos())
            .map(|co| level[aig.co_driver(co).node() as usize])
            .max()
            .unwrap_or(0)
    }

    /// Checks that the cover is closed: every CO driver and every LUT leaf
    /// is a CI, the constant or the root of another LUT.
    pub fn verify(&self, aig: &Aig) -> Result<()> {
        if self.num_objs != aig.num_objs() {
            return Err(MapError::MappingCheck(format!(
                "mapping covers {} objects, network has {}",
                self.num_objs,
                aig.num_objs()
            )));
        }
        let check = |mut id: NodeId, user: &dyn Fn() -> String| -> Result<()> {
            while aig.is_buf(id) {
                id = aig.fanin0(id).node();
            }
            if id == 0 || aig.is_ci(id) || self.is_lut(id) {
                Ok(())
            } else {
                Err(MapError::MappingCheck(format!(
                    "node {} used by {} is not implemented by a LUT",
                    id,
                    user()
                )))
            }
        };
        for co in 0..aig.num_cos() {
            check(aig.co_driver(co).node(), &|| format!("CO {}", co))?;
        }
        for root in self.iter_luts() {
            if !aig.is_internal(root) {
                return Err(MapError::MappingCheck(format!("LUT root {} is not a gate", root)));
            }
            for leaf in self.lut_leaves(root) {
                if leaf >= root {
                    return Err(MapError::MappingCheck(format!(
                        "LUT {} has leaf {} that is not in its fanin cone",
                        root, leaf
                    )));
                }
                check(leaf, &|| format!("LUT {}", root))?;
            }
        }
        Ok(())
    }
}

/// A mapped network: the network the cover refers to and the cover itself.
#[derive(Clone, Debug)]
pub struct MappedNetwork {
    pub aig: Aig,
    pub mapping: LutMapping,
    pub stats: MapStats,
}

/// Builds `t` over `leaves` by Shannon expansion on its top support variable.
fn synthesize(aig: &mut Aig, t: &[u64], leaves: &[Lit]) -> Lit {
    if truth::is_const0(t) {
        return Lit::FALSE;
    }
    if truth::is_const1(t) {
        return Lit::TRUE;
    }
    let Some(var) = (0..leaves.len()).rev().find(|&var| truth::has_var(t, var)) else {
        unreachable!("non-constant function without support");
    };
    let mut t0 = t.to_vec();
    truth::cofactor0(&mut t0, var);
    let mut t1 = t.to_vec();
    truth::cofactor1(&mut t1, var);
    let e = synthesize(aig, &t0, &leaves[..var]);
    let th = synthesize(aig, &t1, &leaves[..var]);
    aig.mux_aig(leaves[var], th, e)
}

/// Identifies input `k` of `t` with input `i`, leaving `t` independent of `k`.
fn merge_var(t: &mut [u64], i: usize, k: usize, nvars: usize) {
    let mut t0 = t.to_vec();
    truth::cofactor0(&mut t0, k);
    let mut t1 = t.to_vec();
    truth::cofactor1(&mut t1, k);
    let e = truth::elementary(i, nvars);
    for (w, word) in t.iter_mut().enumerate() {
        *word = (e[w] & t1[w]) | (!e[w] & t0[w]);
    }
}

impl<'a> Mapper<'a> {
    fn mapped_nodes(&self) -> Vec<NodeId> {
        (1..self.aig.num_objs() as NodeId)
            .filter(|&id| self.aig.is_internal(id) && self.map_refs[id as usize] > 0)
            .collect()
    }

    /// Cover over the mapped network itself.
    fn derive_plain(&self) -> Result<MappedNetwork> {
        let records = self
            .mapped_nodes()
            .into_iter()
            .map(|id| {
                let cut = self.best_cut(id, Gen::Old);
                LutRecord {
                    root: id,
                    leaves: cut.leaves().to_vec(),
                    mux7: cut.mux7,
                    function: None,
                }
            })
            .collect();
        Ok(MappedNetwork {
            aig: self.aig.clone(),
            mapping: LutMapping::from_records(self.aig.num_objs(), records)?,
            stats: self.stats.clone(),
        })
    }

    /// Cover over the mapped network with native XOR and MUX nodes
    /// expanded back to ANDs.
    fn derive_coarse(&self) -> Result<MappedNetwork> {
        let (aig, copy) = self.aig.expand();
        let records = self
            .mapped_nodes()
            .into_iter()
            .map(|id| {
                let cut = self.best_cut(id, Gen::Old);
                LutRecord {
                    root: copy[id as usize].node(),
                    leaves: cut
                        .leaves()
                        .iter()
                        .map(|&leaf| copy[leaf as usize].node())
                        .collect(),
                    mux7: cut.mux7,
                    function: None,
                }
            })
            .collect();
        Ok(MappedNetwork {
            mapping: LutMapping::from_records(aig.num_objs(), records)?,
            aig,
            stats: self.stats.clone(),
        })
    }

    /// Rebuilds the network from the minimized cut functions, one AND
    /// structure per LUT.
    fn derive_cut_min(&self) -> Result<MappedNetwork> {
        let src = self.aig;
        let truths = self
            .truths
            .as_ref()
            .expect("cut functions were not computed");
        let nvars = truths.nvars();
        let mut aig = Aig::new();
        let mut copy = vec![Lit::FALSE; src.num_objs()];
        let tr = |copy: &Vec<Lit>, lit: Lit| copy[lit.node() as usize].not_cond(lit.is_complement());
        let mut records = Vec::new();
        let mut roots = HashSet::new();
        for id in 1..src.num_objs() as NodeId {
            match src.kind(id) {
                NodeKind::Const0 => unreachable!(),
                NodeKind::Ci => copy[id as usize] = aig.add_ci(),
                NodeKind::Co => {
                    aig.add_co(tr(&copy, src.fanin0(id)));
                }
                NodeKind::Buf => copy[id as usize] = aig.add_buf(tr(&copy, src.fanin0(id))),
                NodeKind::And | NodeKind::Xor | NodeKind::Mux => {
                    if self.map_refs[id as usize] == 0 {
                        continue;
                    }
                    let cut = self.best_cut(id, Gen::Old);
                    let Some(func) = cut.func else {
                        unreachable!("cut of node {} has no function", id);
                    };
                    if cut.is_empty() {
                        assert_eq!(func.node(), 0);
                        copy[id as usize] = func;
                        continue;
                    }
                    if cut.len() == 1 {
                        assert_eq!(func.node(), TT_VAR0);
                        copy[id as usize] = copy[cut.leaves()[0] as usize].not_cond(func.is_complement());
                        continue;
                    }

                    // re-express the cut function over the distinct nodes
                    // its leaves were copied to
                    let mut t = truths.read(func.node()).to_vec();
                    let mut leaves: Vec<NodeId> = Vec::with_capacity(cut.len());
                    for (k, &leaf) in cut.leaves().iter().enumerate() {
                        let mut lit = copy[leaf as usize];
                        if cut.mux7 {
                            let fanin = match k {
                                0 => src.fanin0(id),
                                1 => src.fanin1(id),
                                _ => src.fanin2(id),
                            };
                            lit = lit.not_cond(fanin.is_complement());
                        }
                        if lit.is_complement() {
                            truth::flip_var(&mut t, k);
                        }
                        if lit.is_const() {
                            truth::cofactor0(&mut t, k);
                        } else if let Some(i) = leaves.iter().position(|&node| node == lit.node()) {
                            merge_var(&mut t, i, k, nvars);
                        }
                        leaves.push(lit.node());
                    }
                    let n = truth::min_base(&mut t, &mut leaves);
                    leaves.truncate(n);

                    let root = match n {
                        0 => Lit::FALSE.not_cond(truth::is_const1(&t)),
                        1 => Lit::new(leaves[0], t[0] & 1 != 0),
                        _ => {
                            let lits: Vec<Lit> = leaves.iter().map(|&leaf| Lit::new(leaf, false)).collect();
                            synthesize(&mut aig, &t, &lits)
                        }
                    };
                    copy[id as usize] = root.not_cond(func.is_complement());
                    // structural hashing may land on a node that is already
                    // a root or is no gate at all
                    if n < 2 || !aig.is_internal(root.node()) || !roots.insert(root.node()) {
                        continue;
                    }
                    if root.is_complement() {
                        truth::not(&mut t);
                    }
                    records.push(LutRecord {
                        root: root.node(),
                        mux7: cut.mux7 && n == cut.len(),
                        leaves,
                        function: Some(t),
                    });
                }
            }
        }
        Ok(MappedNetwork {
            mapping: LutMapping::from_records(aig.num_objs(), records)?,
            aig,
            stats: self.stats.clone(),
        })
    }

    /// The cover selected by the last pass, over the network variant the
    /// parameters call for.
    pub fn extract(&self) -> Result<MappedNetwork> {
        if self.params.cut_min {
            self.derive_cut_min()
        } else if self.params.coarsen {
            self.derive_coarse()
        } else {
            self.derive_plain()
        }
    }
}
