//! 1D median filtering.
//!
//! The flux and energy pipelines only ever need a 1D smoothing pass over a
//! feature-frame sequence (odd kernel, reflected edges).

/// Apply a length-`window` median filter to `data`. `window` is rounded up
/// to the next odd value if even. No-op for `window <= 1` or empty input.
pub fn median_filter_1d(data: &[f64], window: usize) -> Vec<f64> {
    if data.is_empty() || window <= 1 {
        return data.to_vec();
    }
    let window = if window % 2 == 0 { window + 1 } else { window };
    let half = window / 2;
    let n = data.len();

    let mut out = Vec::with_capacity(n);
    let mut scratch = Vec::with_capacity(window);
    for i in 0..n {
        scratch.clear();
        for offset in -(half as isize)..=(half as isize) {
            let idx = reflect_index(i as isize + offset, n);
            scratch.push(data[idx]);
        }
        scratch.sort_by(|a, b| a.partial_cmp(b).unwrap());
        out.push(scratch[scratch.len() / 2]);
    }
    out
}

/// Reflect an out-of-bounds index back into `[0, n)`.
fn reflect_index(i: isize, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    let n = n as isize;
    let mut i = i;
    while i < 0 || i >= n {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - i - 1;
        }
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_length() {
        let data = vec![1.0, 5.0, 2.0, 8.0, 3.0, 9.0, 4.0];
        let out = median_filter_1d(&data, 3);
        assert_eq!(out.len(), data.len());
    }

    #[test]
    fn removes_impulse_spike() {
        let data = vec![1.0, 1.0, 1.0, 100.0, 1.0, 1.0, 1.0];
        let out = median_filter_1d(&data, 3);
        assert!((out[3] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn even_window_rounds_up() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let a = median_filter_1d(&data, 4);
        let b = median_filter_1d(&data, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn window_of_one_is_identity() {
        let data = vec![3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(median_filter_1d(&data, 1), data);
    }

    #[test]
    fn empty_input_is_identity() {
        let data: Vec<f64> = vec![];
        assert_eq!(median_filter_1d(&data, 3), data);
    }
}
