/// Scales `v` to unit L2 norm in place. Vectors with a norm below `1e-12`
/// are left as they are, so an all-zero vector stays all-zero.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < 1e-12 {
        return;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
}
