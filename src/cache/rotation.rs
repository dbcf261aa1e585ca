//! Rotation-group helper shared by `dns::frontend` (answer shuffling on a
//! cache hit) and `dns::packed` (pre-packed rotation groups).
//!
//! Grounded on spec.md §4.I: "rotation group: an ordered sequence of
//! pre-packed messages, one per rotation distance; index `i` holds the
//! answer section rotated left by `i` places." `original_source/dns_gslb.go`
//! does this rotation inline at pack time; here it's factored out so both
//! the packed-message cache and the front-end's no-cache path can share it.

/// Returns every left-rotation of `items`, starting with rotation 0
/// (the original order) through rotation `items.len() - 1`.
pub fn rotations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.is_empty() {
        return vec![Vec::new()];
    }
    let mut out = Vec::with_capacity(items.len());
    let mut current = items.to_vec();
    out.push(current.clone());
    for _ in 1..items.len() {
        current.rotate_left(1);
        out.push(current.clone());
    }
    out
}

/// Rotates `items` left by one place in place, used by the no-cache
/// front-end path to advance the rotation on every lookup (spec.md §4.G).
pub fn rotate_left_one<T>(items: &mut [T]) {
    if items.len() > 1 {
        items.rotate_left(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations_cover_every_distance() {
        let got = rotations(&[1, 2, 3]);
        assert_eq!(got, vec![vec![1, 2, 3], vec![2, 3, 1], vec![3, 1, 2]]);
    }

    #[test]
    fn single_item_has_one_rotation() {
        assert_eq!(rotations(&[1]), vec![vec![1]]);
    }

    #[test]
    fn rotate_left_one_advances_by_a_single_place() {
        let mut v = vec![1, 2, 3];
        rotate_left_one(&mut v);
        assert_eq!(v, vec![2, 3, 1]);
    }
}
