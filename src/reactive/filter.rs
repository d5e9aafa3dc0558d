//! Bidirectional filtered views over list-valued sources.
//!
//! The forward pass keeps the elements that satisfy the predicate, in source
//! order. The reverse pass merges a written filtered list back into the full
//! list by position: the i-th matching source element is replaced by the i-th
//! written element and every non-matching element stays exactly where it
//! was. The written list must have one element per matching source element;
//! anything else is a [`ReactiveError::FilterLengthMismatch`].

use std::rc::Rc;

use super::error::ReactiveError;
use super::source::{Sink, Source};
use super::transform::{connector, Compute, Derived, Inverse};

/// Keep the elements of `items` that satisfy `keep`, preserving order.
pub fn filter_items<T: Clone>(items: &[T], keep: impl Fn(&T) -> bool) -> Vec<T> {
    items.iter().filter(|item| keep(item)).cloned().collect()
}

/// Merge `replacement` into `source` at the positions selected by `keep`.
///
/// The result always has `source.len()` elements.
pub fn merge_filtered<T: Clone>(
    source: &[T],
    replacement: Vec<T>,
    keep: impl Fn(&T) -> bool,
) -> Result<Vec<T>, ReactiveError> {
    let expected = source.iter().filter(|item| keep(item)).count();
    if replacement.len() != expected {
        return Err(ReactiveError::FilterLengthMismatch {
            expected,
            actual: replacement.len(),
        });
    }
    let mut replacement = replacement.into_iter();
    let merged = source
        .iter()
        .map(|item| {
            if keep(item) {
                replacement.next().unwrap_or_else(|| item.clone())
            } else {
                item.clone()
            }
        })
        .collect();
    Ok(merged)
}

impl<T: Clone + PartialEq + 'static> Derived<Vec<T>> {
    /// Writable view of the elements satisfying a fixed predicate.
    pub fn filter<S>(source: S, predicate: impl Fn(&T) -> bool + 'static) -> Self
    where
        S: Sink<Vec<T>>,
    {
        let predicate = Rc::new(predicate);
        let forward = Rc::clone(&predicate);
        Self::reversible(
            source,
            move |items: &Vec<T>| filter_items(items, |item| forward(item)),
            move |items: &Vec<T>, written: Vec<T>| {
                merge_filtered(items, written, |item| predicate(item))
            },
        )
    }

    /// Writable view of the elements accepted by `test` under the current
    /// value of an observable predicate.
    ///
    /// The view depends on both sources: changing the predicate re-filters.
    /// Writes are merged against the predicate value current at write time.
    pub fn filter_by<Q, S, P>(source: S, predicate: P, test: impl Fn(&Q, &T) -> bool + 'static) -> Self
    where
        Q: Clone + 'static,
        S: Sink<Vec<T>>,
        P: Source<Q>,
    {
        let connectors = vec![connector(&source), connector(&predicate)];
        let test = Rc::new(test);

        let (reader, forward_pred, forward_test) =
            (source.clone(), predicate.clone(), Rc::clone(&test));
        let compute: Compute<Vec<T>> = Box::new(move || {
            let q = forward_pred.get();
            filter_items(&reader.get(), |item| forward_test(&q, item))
        });

        let inverse: Inverse<Vec<T>> = Box::new(move |written: Vec<T>| {
            let q = predicate.get();
            let merged = merge_filtered(&source.get(), written, |item| test(&q, item))?;
            source.try_set(merged)
        });

        Self::from_parts(connectors, compute, Some(inverse))
    }
}
