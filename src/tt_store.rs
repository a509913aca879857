use crate::truth;
use std::collections::HashMap;

/// Hash-consed store of fixed-width truth tables.
///
/// Entry 0 is constant zero and entry 1 is the first elementary variable,
/// so a literal of 2 denotes the identity function of a single leaf.
/// Stored tables always have bit 0 clear; complements live in literals.
pub struct TruthStore {
    nvars: usize,
    nwords: usize,
    entries: Vec<u64>,
    index: HashMap<Box<[u64]>, u32>,
}

pub const TT_CONST0: u32 = 0;
pub const TT_VAR0: u32 = 1;
pub const TT_MUX: u32 = 2;

impl TruthStore {
    pub fn new(nvars: usize) -> Self {
        let nwords = truth::word_count(nvars);
        let mut store = TruthStore {
            nvars,
            nwords,
            entries: Vec::new(),
            index: HashMap::new(),
        };
        store.insert(&vec![0; nwords]);
        store.insert(&truth::elementary(0, nvars));
        store
    }

    /// Adds the MUX function `v2 ? v1 : v0` as entry 2.
    pub fn add_mux(&mut self) -> u32 {
        let v0 = truth::elementary(0, self.nvars);
        let v1 = truth::elementary(1, self.nvars);
        let v2 = truth::elementary(2, self.nvars);
        let mux: Vec<u64> = (0..self.nwords)
            .map(|w| (v2[w] & v1[w]) | (!v2[w] & v0[w]))
            .collect();
        let id = self.insert(&mux);
        assert_eq!(id, TT_MUX);
        id
    }

    pub fn nvars(&self) -> usize {
        self.nvars
    }

    pub fn nwords(&self) -> usize {
        self.nwords
    }

    pub fn len(&self) -> usize {
        self.entries.len() / self.nwords
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, t: &[u64]) -> u32 {
        assert_eq!(t.len(), self.nwords);
        debug_assert!(t[0] & 1 == 0);
        if let Some(&id) = self.index.get(t) {
            return id;
        }
        let id = self.len() as u32;
        self.entries.extend_from_slice(t);
        self.index.insert(t.into(), id);
        id
    }

    pub fn read(&self, id: u32) -> &[u64] {
        let start = id as usize * self.nwords;
        &self.entries[start..start + self.nwords]
    }

    /// Copy of entry `id`, complemented if `complement` is set.
    pub fn read_lit(&self, id: u32, complement: bool) -> Vec<u64> {
        let mut t = self.read(id).to_vec();
        if complement {
            truth::not(&mut t);
        }
        t
    }
}
