//! # Dependency Module
//!
//! Handlers declare what they need as named [`Dependency`] descriptors; the
//! [`Injector`] turns those declarations into values for each request.
//!
//! ## Lifetimes
//!
//! - [`Lifetime::Singleton`] values are created on first use, cached by
//!   descriptor identity and shared by every later request. Their cleanup
//!   hooks run at [`Injector::shutdown`], newest first.
//! - [`Lifetime::Request`] values are created for one request and recorded in
//!   its [`RequestScope`]. [`RequestScope::teardown`] runs their cleanup hooks
//!   exactly once, newest first, after the handler finishes (success or not).
//!
//! ## Planning
//!
//! A descriptor may [`Dependency::requires`] other descriptors by name. The
//! whole graph is walked when a route is registered ([`Injector::plan`]), so
//! unknown names, cycles and singletons depending on request-scoped values
//! are setup errors and never surface during a request.
//!
//! ```text
//! route deps: [session]        providers: [config, pool]
//! session --requires--> pool --requires--> config
//! plan order: config, pool, session
//! ```

mod core;
mod injector;

pub use core::{Dependencies, Dependency, DependencyContext, DependencyId, Instance, Lifetime};
pub use injector::{CleanupFailure, Injector, PlanStep, RequestScope, ResolutionPlan};
