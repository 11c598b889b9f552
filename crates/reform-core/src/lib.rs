//! # Forms, Registry, and Watches
//!
//! Reform keeps form state in live, observable trees instead of plain structs.
//! There are three main pieces:
//!
//! - [`Schema`] + [`build`] — declarative description turned into a
//!   [`StateNode`] tree.
//! - [`FormRegistry`] — keyed store of live trees with get-or-create and
//!   explicit removal.
//! - [`watch_form`] — resolves a (possibly changing) key to the live tree and
//!   re-emits on every change.
//!
//! ## Building
//!
//! ```rust
//! use reform_core::*;
//!
//! let required = Validator::rule("required", |v| !v.is_empty_value());
//! let schema = Schema::group([
//!     ("firstName", Schema::field_with("A", [required])),
//!     ("lastName", "B".into()),
//! ]);
//!
//! let form = build(&schema);
//! assert_eq!(
//!     form.value(),
//!     FormValue::map([("firstName", "A".into()), ("lastName", "B".into())])
//! );
//! assert!(form.errors().is_none());
//!
//! let first = form.as_group().unwrap().control("firstName").unwrap();
//! first.set_value("");
//! first.mark_as_touched();
//! assert!(first.has_error("required"));
//! assert_eq!(form.status(), NodeStatus::Invalid);
//! ```
//!
//! ## Watching
//!
//! Views usually get at a form through a key held in application state:
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use reform_core::*;
//!
//! let registry = FormRegistry::new();
//! let a = registry.create_and_register_form(&Schema::field(1), CreateOptions::new());
//! let b = registry.create_and_register_form(&Schema::field(2), CreateOptions::new());
//!
//! let selected = signal(Some(a.clone()));
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let watch = registry.watch(&selected, {
//!     let seen = seen.clone();
//!     move |form| seen.borrow_mut().push(form.map(|f| f.value()))
//! });
//!
//! selected.set(Some(b));
//! selected.set(None);
//! assert_eq!(
//!     *seen.borrow(),
//!     vec![Some(FormValue::Int(1)), Some(FormValue::Int(2)), None]
//! );
//! drop(watch);
//! ```
//!
//! Everything is single-threaded and push-based: mutations and notifications
//! happen synchronously on the caller's turn.

pub mod bridge;
pub mod builder;
pub mod effects;
pub mod error;
pub mod node;
pub mod prelude;
pub mod registry;
pub mod schema;
pub mod scope;
pub mod signal;
pub mod tests;
pub mod validation;
pub mod value;

pub use bridge::*;
pub use builder::*;
pub use effects::*;
pub use error::*;
pub use node::*;
pub use registry::*;
pub use schema::*;
pub use scope::*;
pub use signal::*;
pub use validation::*;
pub use value::*;
