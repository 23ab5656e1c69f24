//! Bundled demo: an instrumented merge sort and its mutant catalogue
//!
//! Every mutation mechanism appears here: `FLIP_LT` and `DUP_LEFT` replace
//! an expression, `SKIP_BLOCK` and `INC_OBO2` suppress or alter a step, and
//! `INC_OBO` swaps the whole `inc` function. `NO_MUTATION` changes nothing
//! and is expected to survive.

use anyhow::anyhow;
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, TestRunner};

use crate::context::is_not_active;
use crate::error::Result;
use crate::inject::select;
use crate::mutant::MutableFn;
use crate::registry::Registry;

/// Scope of the demo mutants
pub const SCOPE: &str = "demo.rs";

static INC: MutableFn<usize, usize> = MutableFn::new("inc");

fn inc(x: usize) -> usize {
    INC.dispatch(x, |x| x + 1)
}

/// Sort `arr` in place
pub fn merge_sort(arr: &mut [i32]) {
    if arr.len() <= 1 {
        return;
    }

    let mid = arr.len() / 2;
    let mut left = arr[..mid].to_vec();
    let mut right = arr[mid..].to_vec();
    merge_sort(&mut left);
    merge_sort(&mut right);

    let (mut i, mut j, mut k) = (0, 0, 0);

    while i < left.len() && j < right.len() {
        if select("FLIP_LT", || left[i] < right[j], || left[i] > right[j]) {
            arr[k] = left[i];
            i = inc(i);
        } else {
            arr[k] = right[j];
            j = inc(j);
        }
        k = inc(k);
    }

    while i < left.len() {
        arr[k] = left[i];
        if is_not_active("SKIP_BLOCK") {
            i = inc(i);
        }
        k = inc(k);
    }

    while j < right.len() {
        arr[k] = select("DUP_LEFT", || right[j], || left[i]);
        j = inc(j);
        k = if is_not_active("INC_OBO2") {
            inc(k)
        } else {
            inc(k) + 1
        };
    }
}

/// Mutants of this module
pub fn catalogue() -> Result<Registry> {
    let mut builder = Registry::builder();
    builder.declare("FLIP_LT", SCOPE, "Change < to >.")?;
    builder.declare("SKIP_BLOCK", SCOPE, "Skip a critical block.")?;
    builder.declare("DUP_LEFT", SCOPE, "Merge left with left, not right.")?;
    builder.declare("INC_OBO2", SCOPE, "Advance the output index twice.")?;
    builder.declare("NO_MUTATION", SCOPE, "Changes nothing; always survives.")?;
    builder.declare_override(&INC, "INC_OBO", None, "Increment is off by one.", |x| x + 2)?;
    Ok(builder.build())
}

/// Property-based suite for [`merge_sort`]
pub fn suite() -> anyhow::Result<()> {
    sorts_like_std()?;
    output_is_ordered()?;
    Ok(())
}

fn property_config() -> ProptestConfig {
    ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn sorts_like_std() -> anyhow::Result<()> {
    let mut runner = TestRunner::new(property_config());
    runner
        .run(&vec(any::<i32>(), 0..64), |input| {
            let mut expected = input.clone();
            expected.sort();

            let mut actual = input;
            merge_sort(&mut actual);

            prop_assert_eq!(actual, expected);
            Ok(())
        })
        .map_err(|e| anyhow!("merge_sort disagrees with slice::sort: {e}"))
}

fn output_is_ordered() -> anyhow::Result<()> {
    let mut runner = TestRunner::new(property_config());
    runner
        .run(&vec(any::<i32>(), 0..64), |mut input| {
            merge_sort(&mut input);
            prop_assert!(input.windows(2).all(|pair| pair[0] <= pair[1]));
            Ok(())
        })
        .map_err(|e| anyhow!("merge_sort output is not ordered: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::Scope;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_sort_without_mutant() {
        let mut values = vec![5, -1, 3, 3, 0, 9, -7];
        merge_sort(&mut values);
        assert_eq!(values, vec![-7, -1, 0, 3, 3, 5, 9]);

        let mut empty: Vec<i32> = Vec::new();
        merge_sort(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_suite_passes_without_mutant() {
        suite().unwrap();
    }

    #[test]
    fn test_catalogue_lives_in_demo_scope() {
        let registry = catalogue().unwrap();
        assert_eq!(
            registry.mutant_names(SCOPE),
            vec!["DUP_LEFT", "FLIP_LT", "INC_OBO", "INC_OBO2", "NO_MUTATION", "SKIP_BLOCK"]
        );
        let inc_obo = registry.get(&Scope::from(SCOPE), "INC_OBO").unwrap();
        assert!(inc_obo.overrides("inc"));
    }
}
