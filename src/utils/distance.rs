//! Distance kernels shared by the neighbor index, clustering and embedding.

/// Squared Euclidean distance. Unrolled by four so the compiler can
/// vectorize the main loop.
#[inline]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have the same length");

    let chunks_a = a.chunks_exact(4);
    let chunks_b = b.chunks_exact(4);
    let rem_a = chunks_a.remainder();
    let rem_b = chunks_b.remainder();

    let mut acc = [0.0f64; 4];
    for (ca, cb) in chunks_a.zip(chunks_b) {
        for lane in 0..4 {
            let d = ca[lane] - cb[lane];
            acc[lane] += d * d;
        }
    }

    let tail: f64 = rem_a
        .iter()
        .zip(rem_b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum();

    acc[0] + acc[1] + acc[2] + acc[3] + tail
}
