use ndarray::Array2;

/// Resamples a filled coarse grid to exactly `target` (rows, cols) with
/// separable Catmull-Rom interpolation.
///
/// Source coordinates are endpoint-aligned: output corners sample input
/// corners, interior points map at `(len_in - 1) / (len_out - 1)`. Border
/// taps clamp to the edge sample. Output is built cell by cell at the
/// target shape, so the shape contract cannot drift with the math.
///
/// Being a cubic kernel it will overshoot around sharp steps; values
/// outside the input's min/max are expected, and clamping is the caller's
/// choice.
pub fn upsample(coarse: &Array2<f64>, target: (usize, usize)) -> Array2<f64> {
    let (rows_in, cols_in) = coarse.dim();
    let (rows_out, cols_out) = target;
    Array2::from_shape_fn((rows_out, cols_out), |(row, col)| {
        let src_row = source_position(row, rows_out, rows_in);
        let src_col = source_position(col, cols_out, cols_in);
        sample_bicubic(coarse, src_row, src_col)
    })
}

fn source_position(out_idx: usize, out_len: usize, in_len: usize) -> f64 {
    if out_len <= 1 || in_len <= 1 {
        return 0.0;
    }
    out_idx as f64 * (in_len - 1) as f64 / (out_len - 1) as f64
}

fn sample_bicubic(grid: &Array2<f64>, src_row: f64, src_col: f64) -> f64 {
    let (rows, cols) = grid.dim();
    let base_row = src_row.floor();
    let base_col = src_col.floor();
    let row_weights = catmull_rom_weights(src_row - base_row);
    let col_weights = catmull_rom_weights(src_col - base_col);

    let mut acc = 0.0;
    for (i, row_weight) in row_weights.iter().enumerate() {
        let tap_row = clamp_index(base_row as isize + i as isize - 1, rows);
        for (j, col_weight) in col_weights.iter().enumerate() {
            let tap_col = clamp_index(base_col as isize + j as isize - 1, cols);
            acc += row_weight * col_weight * grid[[tap_row, tap_col]];
        }
    }
    acc
}

fn catmull_rom_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        -0.5 * t3 + t2 - 0.5 * t,
        1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
        0.5 * t3 - 0.5 * t2,
    ]
}

fn clamp_index(idx: isize, len: usize) -> usize {
    idx.clamp(0, len as isize - 1) as usize
}
