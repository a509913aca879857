// switching activity estimate by random simulation
use crate::aig::Aig;
use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

const SIM_WORDS: usize = 48;
const SIM_SEED: u64 = 0;

/// Probability of each object toggling between two independent random
/// input patterns, `2p(1 - p)` where `p` is its signal probability.
pub fn switching_activity(aig: &Aig) -> Vec<f32> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(SIM_SEED);
    let mut ones = vec![0u32; aig.num_objs()];
    let mut patterns = vec![0u64; aig.num_cis()];
    for _ in 0..SIM_WORDS {
        for word in patterns.iter_mut() {
            *word = rng.next_u64();
        }
        let values = aig.simulate(&patterns);
        for (count, value) in ones.iter_mut().zip(values) {
            *count += value.count_ones();
        }
    }
    let total = (SIM_WORDS * 64) as f32;
    ones.into_iter()
        .map(|count| {
            let p = count as f32 / total;
            2.0 * p * (1.0 - p)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use crate::aig::Aig;
    use crate::switching::switching_activity;

    #[test]
    fn test_switching_activity() {
        let mut aig = Aig::new();
        let a = aig.add_ci();
        let b = aig.add_ci();
        let c = aig.add_ci();
        let ab = aig.and(a, b);
        let abc = aig.and(ab, c);
        aig.add_co(abc);

        let sw = switching_activity(&aig);
        assert_eq!(sw[0], 0.0);
        // p = 1/2 for a CI, 1/4 for a 2-input AND, 1/8 for a 3-input one
        assert!((sw[a.node() as usize] - 0.5).abs() < 0.03);
        assert!((sw[ab.node() as usize] - 0.375).abs() < 0.03);
        assert!((sw[abc.node() as usize] - 0.21875).abs() < 0.03);
    }
}
