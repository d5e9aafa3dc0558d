//! Typed property views.
//!
//! A [`Lens<S, A>`] pairs a getter `&S -> A` with a rebuild function
//! `(&S, A) -> S` that returns a copy of the parent with one part replaced.
//! [`Derived::property`] turns a lens over a writable source into a live,
//! writable view of that part.
//!
//! With the `macros` feature, `#[derive(Lenses)]` generates a
//! `<field>_lens()` constructor for every named field of a struct.

use std::fmt;
use std::rc::Rc;

use super::error::ReactiveError;
use super::source::Sink;
use super::transform::Derived;

/// Getter plus rebuild function focusing one part `A` of a value `S`.
pub struct Lens<S, A> {
    get: Rc<dyn Fn(&S) -> A>,
    put: Rc<dyn Fn(&S, A) -> Result<S, ReactiveError>>,
}

impl<S, A> Clone for Lens<S, A> {
    fn clone(&self) -> Self {
        Self {
            get: Rc::clone(&self.get),
            put: Rc::clone(&self.put),
        }
    }
}

impl<S, A> fmt::Debug for Lens<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens")
            .field("source", &std::any::type_name::<S>())
            .field("focus", &std::any::type_name::<A>())
            .finish()
    }
}

impl<S: 'static, A: 'static> Lens<S, A> {
    /// Lens over a part that every `S` has.
    pub fn new(get: impl Fn(&S) -> A + 'static, put: impl Fn(&S, A) -> S + 'static) -> Self {
        Self {
            get: Rc::new(get),
            put: Rc::new(move |s: &S, a: A| Ok(put(s, a))),
        }
    }

    /// Lens whose rebuild can fail when the parent has the wrong shape.
    pub fn try_new(
        get: impl Fn(&S) -> A + 'static,
        put: impl Fn(&S, A) -> Result<S, ReactiveError> + 'static,
    ) -> Self {
        Self {
            get: Rc::new(get),
            put: Rc::new(put),
        }
    }

    /// Read the focused part.
    pub fn get(&self, source: &S) -> A {
        (self.get)(source)
    }

    /// Copy of `source` with the focused part replaced by `value`.
    pub fn put(&self, source: &S, value: A) -> Result<S, ReactiveError> {
        (self.put)(source, value)
    }

    /// Focus further into the part: `S -> A -> B`.
    pub fn then<B: 'static>(self, inner: Lens<A, B>) -> Lens<S, B> {
        let outer_get = Rc::clone(&self.get);
        let inner_get = Rc::clone(&inner.get);
        Lens {
            get: Rc::new(move |s: &S| inner_get(&outer_get(s))),
            put: Rc::new(move |s: &S, b: B| {
                let part = (self.get)(s);
                let part = (inner.put)(&part, b)?;
                (self.put)(s, part)
            }),
        }
    }
}

impl<T: Clone + 'static> Lens<Vec<T>, Option<T>> {
    /// Element `index` of a list. Reads `None` past the end; writing past the
    /// end, or writing `None`, is a [`ReactiveError::ShapeMismatch`].
    pub fn index(index: usize) -> Self {
        Self::try_new(
            move |items: &Vec<T>| items.get(index).cloned(),
            move |items: &Vec<T>, value: Option<T>| {
                let Some(value) = value else {
                    return Err(ReactiveError::shape(format!(
                        "a value for index {index} (removal is not a property write)"
                    )));
                };
                if index >= items.len() {
                    return Err(ReactiveError::shape(format!(
                        "index {index} within length {}",
                        items.len()
                    )));
                }
                let mut next = items.clone();
                next[index] = value;
                Ok(next)
            },
        )
    }
}

impl<A: Clone + PartialEq + 'static> Derived<A> {
    /// Live, writable view of the part of `source` that `lens` focuses.
    ///
    /// Writes rebuild the parent with [`Lens::put`] and store it in the
    /// source, which notifies the parent's listeners once.
    pub fn property<V, S>(source: S, lens: Lens<V, A>) -> Self
    where
        V: Clone + 'static,
        S: Sink<V>,
    {
        let reader = lens.clone();
        Self::reversible(
            source,
            move |parent: &V| reader.get(parent),
            move |parent: &V, value: A| lens.put(parent, value),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Observable, Source};
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};

    #[derive(Debug, Clone, PartialEq)]
    struct Todo {
        text: String,
        completed: bool,
    }

    fn completed() -> Lens<Todo, bool> {
        Lens::new(
            |t: &Todo| t.completed,
            |t: &Todo, completed| Todo {
                completed,
                ..t.clone()
            },
        )
    }

    fn text() -> Lens<Todo, String> {
        Lens::new(
            |t: &Todo| t.text.clone(),
            |t: &Todo, text| Todo { text, ..t.clone() },
        )
    }

    #[test]
    fn property_write_rebuilds_parent_once() {
        let todo = Observable::new(Todo {
            text: "a".into(),
            completed: false,
        });
        let hits = Rc::new(Cell::new(0));
        let hits_c = Rc::clone(&hits);
        let _sub = todo.subscribe(move |_, _| hits_c.set(hits_c.get() + 1));

        let done = todo.property(completed());
        done.set(true);

        assert_eq!(
            todo.get(),
            Todo {
                text: "a".into(),
                completed: true
            }
        );
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn property_view_only_notifies_for_its_field() {
        let todo = Observable::new(Todo {
            text: "a".into(),
            completed: false,
        });
        let label = todo.property(text());
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_c = Rc::clone(&log);
        let _sub = label.subscribe(move |new: &String, _| log_c.borrow_mut().push(new.clone()));

        todo.property(completed()).set(true);
        label.set("b".into());
        assert_eq!(*log.borrow(), vec!["b".to_string()]);
    }

    #[test]
    fn index_lens_reads_and_writes() {
        let list = Observable::new(vec![1, 2, 3]);
        let second = list.property(Lens::index(1));
        assert_eq!(second.get(), Some(2));
        second.set(Some(20));
        assert_eq!(list.get(), vec![1, 20, 3]);
    }

    #[test]
    fn index_lens_past_end_is_shape_mismatch() {
        let list = Observable::new(vec![1, 2]);
        let fifth = list.property(Lens::index(5));
        assert_eq!(fifth.get(), None);
        let err = fifth.try_set(Some(9)).unwrap_err();
        assert!(matches!(err, ReactiveError::ShapeMismatch { .. }));
        assert_eq!(list.get(), vec![1, 2]);
    }

    #[test]
    #[should_panic(expected = "does not fit the parent value")]
    fn index_lens_none_write_fails_fast() {
        let list = Observable::new(vec![1, 2]);
        list.property(Lens::index(0)).set(None);
    }

    #[test]
    fn composed_lens_through_list() {
        let list = Observable::new(vec![Todo {
            text: "a".into(),
            completed: false,
        }]);
        let first_done = Lens::<Vec<Todo>, Option<Todo>>::index(0).then(Lens::try_new(
            |t: &Option<Todo>| t.as_ref().is_some_and(|t| t.completed),
            |t: &Option<Todo>, done| match t {
                Some(todo) => completed().put(todo, done).map(Some),
                None => Err(ReactiveError::shape("an existing todo")),
            },
        ));
        let view = list.property(first_done);
        view.set(true);
        assert!(list.get()[0].completed);
    }

    #[test]
    fn property_views_chain() {
        let todo = Observable::new(Todo {
            text: "a".into(),
            completed: false,
        });
        let label = Derived::property(todo.clone(), text());
        let length = Derived::bimap(label, |s: &String| s.len(), |n: usize| "x".repeat(n));
        length.set(3);
        assert_eq!(todo.get().text, "xxx");
    }
}
