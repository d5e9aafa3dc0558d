//! # tether
//!
//! A small reactive state core with mount-aware DOM bindings.
//!
//! tether holds application state in observable cells, derives further
//! values from them through transform links (mapped, combined, filtered and
//! property views, optionally writable), and binds those values to element
//! sites in a retained document. Bindings stay subscribed only while their
//! element is attached to the connected tree, so unmounted views stop
//! holding the reactive graph live.
//!
//! ## Core Systems
//!
//! - **[`reactive`]**: Observable cells, derived links, lenses, subscriptions
//! - **[`dom`]**: Slotmap-backed document arena with structural mutation records
//! - **[`mount`]**: Binding specs and the attachment lifecycle tracker
//!
//! ## Example
//!
//! ```
//! use tether::dom::Document;
//! use tether::mount::{AttachmentTracker, BindingSpec, TrackerConfig};
//! use tether::reactive::{Derived, Observable};
//!
//! let doc = Document::new();
//! let mut tracker = AttachmentTracker::new(TrackerConfig::default());
//! tracker.start(&doc);
//!
//! let todos = Observable::new(vec![false, true, false]);
//! let remaining = Derived::map(todos.clone(), |t: &Vec<bool>| t.iter().filter(|d| !**d).count());
//!
//! let span = doc.create_element("span");
//! tracker.attach(span, BindingSpec::text(remaining));
//! doc.append_child(doc.root(), span).unwrap();
//! tracker.flush();
//! assert_eq!(doc.text(span).as_deref(), Some("2"));
//!
//! todos.set(vec![true, true, false]);
//! assert_eq!(doc.text(span).as_deref(), Some("1"));
//! ```

// Core systems
pub mod dom;
pub mod reactive;

// Bindings
pub mod mount;

// Proc macros (feature-gated)
#[cfg(feature = "macros")]
pub use tether_macros::Lenses;
