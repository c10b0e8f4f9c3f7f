//
// Copyright (c) The Nosconf Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod error;
pub mod reconciler;
pub mod resolver;
pub mod step;
pub mod store;

pub use crate::error::{Error, ResolveError, StepError, StepErrorKind};
pub use crate::reconciler::{DEFAULT_TIMEOUT, Reconciler, Report};
pub use crate::resolver::{Resolver, StaticResolver};
pub use crate::step::Step;
pub use crate::store::{Database, DbStore, MarkerStore, MemoryStore};
