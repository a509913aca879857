// paged byte arena holding the winning cuts of two consecutive passes
use crate::aig::{Lit, NodeId};
use crate::cut::{compute_sign, Cut, LEAF_MAX};

pub const LOG_PAGE: usize = 16;
pub const PAGE_SIZE: usize = 1 << LOG_PAGE;
const PAGE_MASK: usize = PAGE_SIZE - 1;
// worst-case size of one encoded cut
const PAGE_RESERVE: usize = 4 * (LEAF_MAX + 2);

type Page = Box<[u8]>;

/// Position of a saved cut. Only valid for the generation it was written in.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CutHandle {
    generation: u32,
    offset: u32,
}

fn write_unsigned(buf: &mut [u8], mut pos: usize, mut x: u32) -> usize {
    while x & !0x7f != 0 {
        buf[pos] = (x & 0x7f) as u8 | 0x80;
        pos += 1;
        x >>= 7;
    }
    buf[pos] = x as u8;
    pos + 1
}

fn read_unsigned(buf: &[u8], pos: &mut usize) -> u32 {
    let mut x: u32 = 0;
    let mut shift = 0;
    loop {
        let byte = buf[*pos];
        *pos += 1;
        x |= ((byte & 0x7f) as u32) << shift;
        if byte & 0x80 == 0 {
            return x;
        }
        shift += 7;
    }
}

/// Which of the two live generations a read goes to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Gen {
    Old,
    New,
}

/// One generation of saved cuts.
#[derive(Default)]
struct Generation {
    id: u32,
    pages: Vec<Option<Page>>,
    cur: usize,
}

impl Generation {
    fn page(&self, idx: usize) -> &[u8] {
        match &self.pages[idx] {
            Some(page) => page,
            None => panic!("cut page {} of generation {} was recycled", idx, self.id),
        }
    }
}

/// Two generations of saved cuts sharing a pool of free pages.
///
/// The forward pass writes into the new generation while reading (and
/// progressively releasing) the old one. `flip` discards what remains of
/// the old generation and promotes the new one.
#[derive(Default)]
pub struct CutStore {
    old: Generation,
    new: Generation,
    free: Vec<Page>,
    allocated: usize,
    next_id: u32,
}

impl CutStore {
    pub fn new() -> Self {
        let mut store = CutStore::default();
        store.old.id = 0;
        store.new.id = 1;
        store.next_id = 2;
        store
    }

    /// Serializes `cut` of node `obj` into the new generation.
    pub fn save(&mut self, cut: &Cut, obj: NodeId) -> CutHandle {
        assert!(!cut.mux7);
        debug_assert!(cut.is_sorted() && cut.sign == compute_sign(cut.leaves()));
        assert!(cut.len() >= 2 || cut.func.map_or(true, |f| f.raw() <= 3));
        let gen = &mut self.new;
        let start = gen.cur;
        let page_idx = start >> LOG_PAGE;
        if gen.pages.len() == page_idx {
            let page = self.free.pop().unwrap_or_else(|| {
                self.allocated += 1;
                vec![0u8; PAGE_SIZE].into_boxed_slice()
            });
            gen.pages.push(Some(page));
        }
        let Some(page) = gen.pages[page_idx].as_mut() else {
            panic!("writing into a recycled page");
        };
        let mut pos = start & PAGE_MASK;
        debug_assert!(PAGE_MASK - pos >= PAGE_RESERVE);
        pos = write_unsigned(page, pos, cut.len() as u32);
        let mut prev = obj;
        for &leaf in cut.leaves().iter().rev() {
            debug_assert!(leaf < prev);
            pos = write_unsigned(page, pos, prev - leaf);
            prev = leaf;
        }
        if let Some(func) = cut.func {
            pos = write_unsigned(page, pos, func.raw());
        }
        gen.cur = if PAGE_MASK - pos < PAGE_RESERVE {
            (page_idx + 1) << LOG_PAGE
        } else {
            (start & !PAGE_MASK) | pos
        };
        CutHandle {
            generation: gen.id,
            offset: start as u32,
        }
    }

    fn load_from(gen: &Generation, handle: CutHandle, obj: NodeId, truth: bool) -> Cut {
        assert_eq!(handle.generation, gen.id, "stale cut handle");
        let offset = handle.offset as usize;
        let page = gen.page(offset >> LOG_PAGE);
        let mut pos = offset & PAGE_MASK;
        let n = read_unsigned(page, &mut pos) as usize;
        assert!(n <= LEAF_MAX);
        let mut leaves = [0 as NodeId; LEAF_MAX];
        let mut prev = obj;
        for i in (0..n).rev() {
            leaves[i] = prev - read_unsigned(page, &mut pos);
            prev = leaves[i];
        }
        let mut cut = Cut::from_leaves(&leaves[..n]);
        if truth {
            cut.func = Some(Lit::from_raw(read_unsigned(page, &mut pos)));
        }
        cut
    }

    /// Reads a cut of the previous pass. With `recycle`, pages before the
    /// one holding this cut are returned to the pool.
    pub fn load_old(&mut self, handle: CutHandle, obj: NodeId, truth: bool, recycle: bool) -> Cut {
        let cut = Self::load_from(&self.old, handle, obj, truth);
        let page_idx = handle.offset as usize >> LOG_PAGE;
        if recycle && page_idx > 0 {
            if let Some(page) = self.old.pages[page_idx - 1].take() {
                self.free.push(page);
            }
        }
        cut
    }

    /// Reads a cut written during the current pass.
    pub fn load_new(&self, handle: CutHandle, obj: NodeId, truth: bool) -> Cut {
        Self::load_from(&self.new, handle, obj, truth)
    }

    pub fn load(&self, gen: Gen, handle: CutHandle, obj: NodeId, truth: bool) -> Cut {
        match gen {
            Gen::Old => Self::load_from(&self.old, handle, obj, truth),
            Gen::New => Self::load_from(&self.new, handle, obj, truth),
        }
    }

    /// Whether nothing has been written in the current pass.
    pub fn new_is_empty(&self) -> bool {
        self.new.cur == 0 && self.new.pages.is_empty()
    }

    fn recycle(gen: &mut Generation, free: &mut Vec<Page>, id: u32) {
        free.extend(gen.pages.drain(..).flatten());
        gen.cur = 0;
        gen.id = id;
    }

    /// Ends a forward pass: the new generation becomes the old one and
    /// an empty generation takes its place.
    pub fn flip(&mut self) {
        Self::recycle(&mut self.old, &mut self.free, self.next_id);
        self.next_id += 1;
        std::mem::swap(&mut self.old, &mut self.new);
    }

    /// Pages allocated so far, live or free.
    pub fn pages_allocated(&self) -> usize {
        self.allocated
    }

    pub fn bytes_used(&self) -> usize {
        self.allocated * PAGE_SIZE
    }

    pub fn free_pages(&self) -> usize {
        self.free.len()
    }
}
