//! Topic combinations for flexible taxonomy.
//!
//! A combination keeps the relative order of the input segments, so
//! `foo:bar:baz` yields `bar:baz` but never `baz:bar`.

use indexmap::IndexSet;

/// All `k`-element combinations of `items`, in lexicographic index order.
pub fn combinations_of<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    let n = items.len();
    if k == 0 || k > n {
        return Vec::new();
    }

    let mut indices: Vec<usize> = (0..k).collect();
    let mut out = Vec::new();
    loop {
        out.push(indices.iter().map(|&i| items[i].clone()).collect());

        // Rightmost position that can still advance.
        let Some(pos) = (0..k).rev().find(|&i| indices[i] < i + n - k) else {
            break;
        };
        indices[pos] += 1;
        for j in pos + 1..k {
            indices[j] = indices[j - 1] + 1;
        }
    }
    out
}

/// Every non-empty combination of `items`: `2^n - 1` entries for `n` items.
pub fn combinations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    (1..=items.len())
        .flat_map(|k| combinations_of(items, k))
        .collect()
}

/// Every combination of a `:`-delimited id's segments, joined back with `:`.
pub fn topic_combinations(id: &str) -> IndexSet<String> {
    let segments: Vec<&str> = id.split(':').collect();
    combinations(&segments)
        .into_iter()
        .map(|c| c.join(":"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_combinations() {
        let items = ["a", "b", "c", "d"];
        assert_eq!(
            combinations_of(&items, 2),
            vec![
                vec!["a", "b"],
                vec!["a", "c"],
                vec!["a", "d"],
                vec!["b", "c"],
                vec!["b", "d"],
                vec!["c", "d"],
            ]
        );
        assert!(combinations_of(&items, 5).is_empty());
        assert!(combinations_of(&items, 0).is_empty());
    }

    #[test]
    fn test_all_combinations_count() {
        assert_eq!(combinations(&[1, 2, 3]).len(), 7);
        assert_eq!(combinations(&[1, 2, 3, 4, 5]).len(), 31);
        assert!(combinations::<u8>(&[]).is_empty());
    }

    #[test]
    fn test_topic_combinations_preserve_order() {
        let combos = topic_combinations("foo:bar:baz");
        let expected = ["foo", "bar", "baz", "foo:bar", "foo:baz", "bar:baz", "foo:bar:baz"];
        assert_eq!(combos.iter().map(String::as_str).collect::<Vec<_>>(), expected);
        assert!(!combos.contains("baz:foo"));
    }

    #[test]
    fn test_repeated_segments_are_deduplicated() {
        let combos = topic_combinations("a:a");
        assert_eq!(combos.len(), 2);
    }
}
