// truth tables of up to 13 variables stored as u64 words
//
// Tables narrower than six variables are replicated over the whole word,
// so the per-word masks below work regardless of the variable count.

pub type Truth6 = u64;

pub const COFACTOR_MASKS: [Truth6; 6] = [
    0xaaaaaaaaaaaaaaaa,
    0xcccccccccccccccc,
    0xf0f0f0f0f0f0f0f0,
    0xff00ff00ff00ff00,
    0xffff0000ffff0000,
    0xffffffff00000000,
];

pub fn word_count(nvars: usize) -> usize {
    if nvars <= 6 {
        1
    } else {
        1 << (nvars - 6)
    }
}

pub fn elementary(var: usize, nvars: usize) -> Vec<u64> {
    let nwords = word_count(nvars);
    if var < 6 {
        vec![COFACTOR_MASKS[var]; nwords]
    } else {
        (0..nwords)
            .map(|w| if (w >> (var - 6)) & 1 != 0 { !0 } else { 0 })
            .collect()
    }
}

fn check_support6(t: Truth6, var_idx: usize) -> bool {
    let (t_shift, _) = t.overflowing_shl(1 << var_idx);
    ((t_shift ^ t) & COFACTOR_MASKS[var_idx]) != 0
}

pub fn has_var(t: &[u64], var: usize) -> bool {
    if var < 6 {
        return t.iter().any(|&w| check_support6(w, var));
    }
    let step = 1 << (var - 6);
    assert!(2 * step <= t.len());
    for base in (0..t.len()).step_by(2 * step) {
        for k in 0..step {
            if t[base + k] != t[base + step + k] {
                return true;
            }
        }
    }
    false
}

pub fn support_size(t: &[u64], nvars: usize) -> usize {
    (0..nvars).filter(|&var| has_var(t, var)).count()
}

/// Replaces `t` with its negative cofactor with respect to `var`.
pub fn cofactor0(t: &mut [u64], var: usize) {
    if var < 6 {
        let shift = 1 << var;
        let mask = !COFACTOR_MASKS[var];
        for w in t.iter_mut() {
            *w = (*w & mask) | ((*w & mask) << shift);
        }
        return;
    }
    let step = 1 << (var - 6);
    for base in (0..t.len()).step_by(2 * step) {
        for k in 0..step {
            t[base + step + k] = t[base + k];
        }
    }
}

/// Replaces `t` with its positive cofactor with respect to `var`.
pub fn cofactor1(t: &mut [u64], var: usize) {
    if var < 6 {
        let shift = 1 << var;
        let mask = COFACTOR_MASKS[var];
        for w in t.iter_mut() {
            *w = (*w & mask) | ((*w & mask) >> shift);
        }
        return;
    }
    let step = 1 << (var - 6);
    for base in (0..t.len()).step_by(2 * step) {
        for k in 0..step {
            t[base + k] = t[base + step + k];
        }
    }
}

/// Replaces `t` with the function obtained by complementing input `var`.
pub fn flip_var(t: &mut [u64], var: usize) {
    if var < 6 {
        let shift = 1 << var;
        let mask = COFACTOR_MASKS[var];
        for w in t.iter_mut() {
            *w = ((*w & mask) >> shift) | ((*w & !mask) << shift);
        }
        return;
    }
    let step = 1 << (var - 6);
    for base in (0..t.len()).step_by(2 * step) {
        for k in 0..step {
            t.swap(base + k, base + step + k);
        }
    }
}

fn get_bit(t: &[u64], m: usize) -> bool {
    (t[m >> 6] >> (m & 63)) & 1 != 0
}

pub fn swap_vars(t: &mut [u64], i: usize, j: usize) {
    if i == j {
        return;
    }
    let orig = t.to_vec();
    let nbits = t.len() * 64;
    assert!(1 << i.max(j) < nbits);
    let flip = (1 << i) | (1 << j);
    for w in t.iter_mut() {
        *w = 0;
    }
    for m in 0..nbits {
        let src = if ((m >> i) ^ (m >> j)) & 1 != 0 {
            m ^ flip
        } else {
            m
        };
        if get_bit(&orig, src) {
            t[m >> 6] |= 1 << (m & 63);
        }
    }
}

/// Re-expresses a function of the leaves `from` as a function of the
/// superset `to`. Both lists are sorted.
pub fn expand(t: &mut [u64], from: &[u32], to: &[u32]) {
    let mut k = from.len();
    for i in (0..to.len()).rev() {
        if k == 0 {
            break;
        }
        if to[i] > from[k - 1] {
            continue;
        }
        assert_eq!(to[i], from[k - 1]);
        if k - 1 < i {
            swap_vars(t, k - 1, i);
        }
        k -= 1;
    }
    assert_eq!(k, 0);
}

/// Drops variables outside the support, compacting `leaves` in place.
/// Returns the new leaf count.
pub fn min_base(t: &mut [u64], leaves: &mut [u32]) -> usize {
    let mut k = 0;
    for i in 0..leaves.len() {
        if !has_var(t, i) {
            continue;
        }
        if k < i {
            leaves[k] = leaves[i];
            swap_vars(t, k, i);
        }
        k += 1;
    }
    k
}

pub fn not(t: &mut [u64]) {
    for w in t.iter_mut() {
        *w = !*w;
    }
}

pub fn is_const0(t: &[u64]) -> bool {
    t.iter().all(|&w| w == 0)
}

pub fn is_const1(t: &[u64]) -> bool {
    t.iter().all(|&w| w == !0)
}

pub fn to_hex(t: &[u64], nvars: usize) -> String {
    let ndigits = if nvars <= 2 { 1 } else { 1 << (nvars - 2) };
    let mut s = String::with_capacity(ndigits);
    for d in (0..ndigits).rev() {
        let nibble = (t[d / 16] >> ((d % 16) * 4)) & 0xf;
        s.push(char::from_digit(nibble as u32, 16).unwrap_or('?'));
    }
    s
}
