use image::GrayImage;

/// Sum of per-pixel absolute grayscale differences. Zero for identical
/// frames, up to `255 * width * height` for inverted ones.
pub fn abs_diff_sum(a: &GrayImage, b: &GrayImage) -> u64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    a.as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(pa, pb)| pa.abs_diff(*pb) as u64)
        .sum()
}

// Stabilizers from the SSIM definition, with K1 = 0.01, K2 = 0.03, L = 255.
const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// Global structural-similarity score over the whole image, in [-1, 1].
/// An image compared against itself scores exactly 1.0.
pub fn ssim(a: &GrayImage, b: &GrayImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let n = (a.width() * a.height()) as f64;
    if n == 0.0 {
        return 1.0;
    }

    let (mut sum_a, mut sum_b) = (0.0f64, 0.0f64);
    for (pa, pb) in a.as_raw().iter().zip(b.as_raw()) {
        sum_a += *pa as f64;
        sum_b += *pb as f64;
    }
    let (mean_a, mean_b) = (sum_a / n, sum_b / n);

    let (mut var_a, mut var_b, mut covar) = (0.0f64, 0.0f64, 0.0f64);
    for (pa, pb) in a.as_raw().iter().zip(b.as_raw()) {
        let da = *pa as f64 - mean_a;
        let db = *pb as f64 - mean_b;
        var_a += da * da;
        var_b += db * db;
        covar += da * db;
    }
    var_a /= n;
    var_b /= n;
    covar /= n;

    ((2.0 * mean_a * mean_b + C1) * (2.0 * covar + C2))
        / ((mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2))
}
