/// Length of the longest common subsequence of `a` and `b`, by char.
pub fn lcs_len(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `lcs² / |hash|`: rewards overlap while penalising hashes much longer
/// than the overlap.
pub fn similarity(capture: &str, hash: &str) -> f64 {
    let hash_len = hash.chars().count();
    if hash_len == 0 {
        return 0.0;
    }
    let lcs = lcs_len(capture, hash) as f64;
    lcs * lcs / hash_len as f64
}
