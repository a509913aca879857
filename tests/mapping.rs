use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::HashMap;
use test_case::test_case;
use xyz_lutmap::aig::{Aig, Lit, NodeId, NodeKind};
use xyz_lutmap::timing::FlatTiming;
use xyz_lutmap::{perform_mapping, MapError, MappedNetwork, MapperParams};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_aig(seed: u64, num_cis: usize, num_gates: usize) -> Aig {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut aig = Aig::new();
    let mut lits: Vec<Lit> = (0..num_cis).map(|_| aig.add_ci()).collect();
    let pick = |rng: &mut Xoshiro256PlusPlus, lits: &Vec<Lit>| {
        // bias toward recent nodes for deeper logic
        let lo = lits.len().saturating_sub(12);
        let lit = lits[rng.gen_range(lo..lits.len())];
        lit.not_cond(rng.gen_bool(0.5))
    };
    while lits.len() < num_cis + num_gates {
        let a = pick(&mut rng, &lits);
        let b = pick(&mut rng, &lits);
        let lit = match rng.gen_range(0..6) {
            0 => aig.xor_aig(a, b),
            1 => {
                let s = pick(&mut rng, &lits);
                aig.mux_aig(s, a, b)
            }
            _ => aig.and(a, b),
        };
        if !lit.is_const() {
            lits.push(lit);
        }
    }
    for &lit in lits.iter().rev().take(4) {
        aig.add_co(lit);
    }
    aig
}

fn chain(n: usize) -> Aig {
    let mut aig = Aig::new();
    let cis: Vec<Lit> = (0..n).map(|_| aig.add_ci()).collect();
    let root = cis[1..].iter().fold(cis[0], |acc, &ci| aig.and(acc, ci));
    aig.add_co(root);
    aig
}

fn co_values(aig: &Aig, values: &[u64]) -> Vec<u64> {
    (0..aig.num_cos())
        .map(|co| Aig::lit_value(values, aig.co_driver(co)))
        .collect()
}

fn random_patterns(aig: &Aig, seed: u64) -> Vec<u64> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..aig.num_cis()).map(|_| rng.gen()).collect()
}

// value of `id` computed from the leaf values only, failing on any path
// that escapes the cut
fn cone_value(aig: &Aig, id: NodeId, leaves: &HashMap<NodeId, u64>, memo: &mut HashMap<NodeId, u64>) -> u64 {
    if let Some(&v) = leaves.get(&id) {
        return v;
    }
    if let Some(&v) = memo.get(&id) {
        return v;
    }
    let fanin = |lit: Lit, memo: &mut HashMap<NodeId, u64>| {
        let v = cone_value(aig, lit.node(), leaves, memo);
        if lit.is_complement() {
            !v
        } else {
            v
        }
    };
    let v = match aig.kind(id) {
        NodeKind::Const0 => 0,
        NodeKind::Ci | NodeKind::Co => panic!("node {} escapes the cut", id),
        NodeKind::Buf => fanin(aig.fanin0(id), memo),
        NodeKind::And => fanin(aig.fanin0(id), memo) & fanin(aig.fanin1(id), memo),
        NodeKind::Xor => fanin(aig.fanin0(id), memo) ^ fanin(aig.fanin1(id), memo),
        NodeKind::Mux => {
            let c = fanin(aig.fanin2(id), memo);
            (c & fanin(aig.fanin1(id), memo)) | (!c & fanin(aig.fanin0(id), memo))
        }
    };
    memo.insert(id, v);
    v
}

/// Evaluates the cover LUT by LUT, each one from the values of its leaves.
fn evaluate_cover(mapped: &MappedNetwork, patterns: &[u64]) -> Vec<u64> {
    let aig = &mapped.aig;
    let mapping = &mapped.mapping;
    let mut values = vec![0u64; aig.num_objs()];
    for (k, &ci) in aig.cis().iter().enumerate() {
        values[ci as usize] = patterns[k];
    }
    for id in 1..aig.num_objs() as NodeId {
        if aig.is_buf(id) {
            values[id as usize] = Aig::lit_value(&values, aig.fanin0(id));
            continue;
        }
        if !mapping.is_lut(id) {
            continue;
        }
        let leaves: Vec<NodeId> = mapping.lut_leaves(id).collect();
        values[id as usize] = match mapping.lut_function(id) {
            Some(function) => (0..64).fold(0u64, |acc, bit| {
                let minterm = leaves
                    .iter()
                    .enumerate()
                    .fold(0usize, |m, (k, &leaf)| m | ((((values[leaf as usize] >> bit) & 1) as usize) << k));
                let set = (function[minterm / 64] >> (minterm % 64)) & 1;
                acc | (set << bit)
            }),
            None => {
                let leaf_values = leaves.iter().map(|&leaf| (leaf, values[leaf as usize])).collect();
                cone_value(aig, id, &leaf_values, &mut HashMap::new())
            }
        };
    }
    co_values(aig, &values)
}

#[test]
fn test_single_and() {
    init_logging();
    let mut aig = Aig::new();
    let a = aig.add_ci();
    let b = aig.add_ci();
    let y = aig.and(a, b);
    aig.add_co(y);

    let mapped = perform_mapping(&aig, &MapperParams::default(), None).unwrap();
    assert_eq!(mapped.mapping.lut_count(), 1);
    let root = mapped.mapping.iter_luts().next().unwrap();
    assert_eq!(mapped.mapping.lut_size(root), 2);
    assert_eq!(mapped.mapping.depth(&mapped.aig), 1);
    assert_eq!(mapped.stats.delay, 1);
    assert_eq!(mapped.stats.area, 1);
}

#[test]
fn test_wire_and_constant_outputs() {
    let mut aig = Aig::new();
    let a = aig.add_ci();
    aig.add_co(!a);
    aig.add_co(Lit::TRUE);

    let mapped = perform_mapping(&aig, &MapperParams::default(), None).unwrap();
    assert_eq!(mapped.mapping.lut_count(), 0);
    assert_eq!(mapped.stats.delay, 0);
    assert_eq!(mapped.mapping.depth(&mapped.aig), 0);
}

#[test_case(2, 7; "two inputs")]
#[test_case(3, 4; "three inputs")]
#[test_case(4, 3; "four inputs")]
#[test_case(6, 2; "six inputs")]
#[test_case(8, 1; "eight inputs")]
fn test_chain_depth(lut_size: usize, depth: usize) {
    init_logging();
    let aig = chain(8);
    let params = MapperParams {
        lut_size,
        ..Default::default()
    };
    let mapped = perform_mapping(&aig, &params, None).unwrap();
    assert_eq!(mapped.mapping.depth(&mapped.aig), depth);
    assert_eq!(mapped.stats.delay, depth as i32);
    for root in mapped.mapping.iter_luts() {
        assert!(mapped.mapping.lut_size(root) <= lut_size);
    }
}

#[test]
fn test_late_input_timing() {
    let aig = chain(4);
    let mut timing = FlatTiming::with_ci_arrivals(vec![0, 0, 0, 3], 1);
    let params = MapperParams {
        lut_size: 3,
        ..Default::default()
    };
    let mapped = perform_mapping(&aig, &params, Some(&mut timing)).unwrap();
    // the late input sits directly on the output LUT
    assert_eq!(mapped.stats.delay, 4);
    assert_eq!(timing.co_arrivals(), &[4]);
}

#[test]
fn test_bad_params() {
    let aig = chain(3);
    let params = MapperParams {
        lut_size: 1,
        ..Default::default()
    };
    assert!(matches!(
        perform_mapping(&aig, &params, None),
        Err(MapError::InvalidLutSize { size: 1, .. })
    ));
    let mut timing = FlatTiming::new(2, 1);
    assert!(matches!(
        perform_mapping(&aig, &MapperParams::default(), Some(&mut timing)),
        Err(MapError::InvalidTimingManager { .. })
    ));
}

#[test_case(4, false, false; "k4")]
#[test_case(6, false, false; "k6")]
#[test_case(6, true, false; "k6 edge")]
#[test_case(6, false, true; "k6 mux7")]
#[test_case(5, true, true; "k5 edge mux7")]
fn test_random_cover(lut_size: usize, opt_edge: bool, use_mux7: bool) {
    init_logging();
    for seed in 0..4 {
        let aig = random_aig(seed, 10, 120);
        let params = MapperParams {
            lut_size,
            opt_edge,
            use_mux7,
            ..Default::default()
        };
        let mapped = perform_mapping(&aig, &params, None).unwrap();
        for root in mapped.mapping.iter_luts() {
            assert!(mapped.mapping.lut_size(root) <= lut_size);
        }
        assert!(mapped.mapping.depth(&mapped.aig) as i32 <= mapped.stats.delay);

        let patterns = random_patterns(&aig, seed + 100);
        let expect = co_values(&aig, &aig.simulate(&patterns));
        assert_eq!(co_values(&mapped.aig, &mapped.aig.simulate(&patterns)), expect);
        assert_eq!(evaluate_cover(&mapped, &patterns), expect);
    }
}

#[test_case(4; "k4")]
#[test_case(6; "k6")]
fn test_random_cut_min(lut_size: usize) {
    init_logging();
    for seed in 10..13 {
        let aig = random_aig(seed, 8, 80);
        let params = MapperParams {
            lut_size,
            cut_min: true,
            ..Default::default()
        };
        let mapped = perform_mapping(&aig, &params, None).unwrap();
        for root in mapped.mapping.iter_luts() {
            assert!(mapped.mapping.lut_size(root) <= lut_size);
            assert!(mapped.mapping.lut_function(root).is_some());
        }

        let patterns = random_patterns(&aig, seed);
        let expect = co_values(&aig, &aig.simulate(&patterns));
        assert_eq!(evaluate_cover(&mapped, &patterns), expect);
    }
}

#[test]
fn test_area_recovery_keeps_delay() {
    let aig = random_aig(7, 12, 200);
    let delay_only = MapperParams {
        rounds: 1,
        rounds_ela: 0,
        opt_edge: false,
        ..Default::default()
    };
    let full = MapperParams {
        opt_edge: false,
        ..Default::default()
    };
    let first = perform_mapping(&aig, &delay_only, None).unwrap();
    let recovered = perform_mapping(&aig, &full, None).unwrap();
    assert!(recovered.stats.delay <= first.stats.delay);
    assert!(recovered.mapping.lut_count() <= first.mapping.lut_count());
}

fn check_cover(aig: &Aig, mapped: &MappedNetwork, params: &MapperParams, seed: u64) {
    for root in mapped.mapping.iter_luts() {
        assert!(mapped.mapping.lut_size(root) <= params.lut_size);
        if params.cut_min {
            assert!(mapped.mapping.lut_function(root).is_some());
        }
    }
    assert!(mapped.mapping.depth(&mapped.aig) as i32 <= mapped.stats.delay);
    let patterns = random_patterns(aig, seed);
    let expect = co_values(aig, &aig.simulate(&patterns));
    assert_eq!(co_values(&mapped.aig, &mapped.aig.simulate(&patterns)), expect);
    assert_eq!(evaluate_cover(mapped, &patterns), expect);
}

#[test_case(6, |_| (); "baseline")]
#[test_case(6, |p| p.power = true; "power")]
#[test_case(4, |p| { p.power = true; p.opt_edge = false }; "power no edge")]
#[test_case(6, |p| p.do_average = true; "average")]
#[test_case(5, |p| { p.do_average = true; p.relax_ratio = 20 }; "average relaxed")]
#[test_case(8, |p| p.cut_min = true; "cut min k8")]
#[test_case(13, |p| p.cut_min = true; "cut min k13")]
#[test_case(6, |p| { p.cut_min = true; p.use_mux7 = true }; "cut min mux7")]
#[test_case(2, |p| p.rounds_ela = 2; "k2 exact area")]
fn test_random_variants(lut_size: usize, tweak: fn(&mut MapperParams)) {
    init_logging();
    let mut params = MapperParams {
        lut_size,
        ..Default::default()
    };
    tweak(&mut params);
    for seed in 20..23 {
        let aig = random_aig(seed, 12, 150);
        let mapped = perform_mapping(&aig, &params, None).unwrap();
        check_cover(&aig, &mapped, &params, seed);
    }
}

// two structures of the same AND8 with the balanced one recorded as the
// alternative of the chain that feeds the logic
fn choice_aig(seed: u64) -> Aig {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut aig = Aig::new();
    let cis: Vec<Lit> = (0..10).map(|_| aig.add_ci()).collect();
    let mut level: Vec<Lit> = cis[..8].to_vec();
    while level.len() > 1 {
        level = level.chunks(2).map(|pair| aig.and(pair[0], pair[1])).collect();
    }
    let balanced = level[0];
    let chain = cis[..8].iter().rev().fold(Lit::TRUE, |acc, &ci| aig.and(ci, acc));
    assert_ne!(chain.node(), balanced.node());
    aig.set_sibling(chain.node(), balanced.node());

    let mut lits = vec![chain, cis[8], cis[9]];
    for _ in 0..30 {
        let a = lits[rng.gen_range(0..lits.len())].not_cond(rng.gen_bool(0.5));
        let b = lits[rng.gen_range(0..lits.len())].not_cond(rng.gen_bool(0.5));
        let lit = if rng.gen_bool(0.3) { aig.xor_aig(a, b) } else { aig.and(a, b) };
        if !lit.is_const() {
            lits.push(lit);
        }
    }
    aig.add_co(chain);
    for &lit in lits.iter().rev().take(3) {
        aig.add_co(lit);
    }
    aig
}

#[test_case(4; "k4")]
#[test_case(6; "k6")]
fn test_choice_network(lut_size: usize) {
    init_logging();
    for seed in 30..33 {
        let aig = choice_aig(seed);
        assert!(aig.has_choices());
        let params = MapperParams {
            lut_size,
            ..Default::default()
        };
        let mapped = perform_mapping(&aig, &params, None).unwrap();
        // choices force cut functions
        let forced = MapperParams {
            cut_min: true,
            ..params
        };
        check_cover(&aig, &mapped, &forced, seed);
    }
}
