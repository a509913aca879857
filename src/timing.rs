// arrival/required exchange with an external timing model
use crate::aig::Aig;
use crate::error::{MapError, Result};

/// Timing collaborator attached to a mapping run.
///
/// The forward pass pulls CI arrival times from it and pushes CO arrival
/// times to it. The backward pass seeds CO required times through it and
/// reports the resulting CI required times back.
pub trait TimingManager {
    fn num_cis(&self) -> usize;
    fn num_cos(&self) -> usize;
    /// Starts a new traversal; called once at the top of every sweep.
    fn increment_trav_id(&mut self);
    fn ci_arrival(&self, ci: usize) -> i32;
    fn set_co_arrival(&mut self, co: usize, time: i32);
    fn init_co_required_all(&mut self, time: i32);
    fn set_co_required(&mut self, co: usize, time: i32);
    fn co_required(&self, co: usize) -> i32;
    fn set_ci_required(&mut self, ci: usize, time: i32);
}

pub fn check_manager(manager: &dyn TimingManager, aig: &Aig) -> Result<()> {
    if manager.num_cis() != aig.num_cis() || manager.num_cos() != aig.num_cos() {
        return Err(MapError::InvalidTimingManager {
            expected_cis: manager.num_cis(),
            expected_cos: manager.num_cos(),
            cis: aig.num_cis(),
            cos: aig.num_cos(),
        });
    }
    Ok(())
}

/// Timing model of a design without boxes: CI arrivals are fixed, the
/// other three tables just record what the mapper reports.
#[derive(Clone, Debug)]
pub struct FlatTiming {
    ci_arrival: Vec<i32>,
    ci_required: Vec<i32>,
    co_arrival: Vec<i32>,
    co_required: Vec<i32>,
    trav_id: u32,
}

impl FlatTiming {
    pub fn new(num_cis: usize, num_cos: usize) -> Self {
        FlatTiming {
            ci_arrival: vec![0; num_cis],
            ci_required: vec![0; num_cis],
            co_arrival: vec![0; num_cos],
            co_required: vec![0; num_cos],
            trav_id: 0,
        }
    }

    pub fn with_ci_arrivals(arrivals: Vec<i32>, num_cos: usize) -> Self {
        let mut timing = FlatTiming::new(arrivals.len(), num_cos);
        timing.ci_arrival = arrivals;
        timing
    }

    pub fn co_arrivals(&self) -> &[i32] {
        &self.co_arrival
    }

    pub fn ci_requireds(&self) -> &[i32] {
        &self.ci_required
    }

    pub fn trav_id(&self) -> u32 {
        self.trav_id
    }
}

impl TimingManager for FlatTiming {
    fn num_cis(&self) -> usize {
        self.ci_arrival.len()
    }

    fn num_cos(&self) -> usize {
        self.co_arrival.len()
    }

    fn increment_trav_id(&mut self) {
        self.trav_id += 1;
    }

    fn ci_arrival(&self, ci: usize) -> i32 {
        self.ci_arrival[ci]
    }

    fn set_co_arrival(&mut self, co: usize, time: i32) {
        self.co_arrival[co] = time;
    }

    fn init_co_required_all(&mut self, time: i32) {
        self.co_required.fill(time);
    }

    fn set_co_required(&mut self, co: usize, time: i32) {
        self.co_required[co] = time;
    }

    fn co_required(&self, co: usize) -> i32 {
        self.co_required[co]
    }

    fn set_ci_required(&mut self, ci: usize, time: i32) {
        self.ci_required[ci] = time;
    }
}
