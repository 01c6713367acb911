// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Consumer-facing adapters: typed per-key state and query serialization.
//! Keeps call sites thin and framework-agnostic.

pub mod serializer;
pub mod state;

pub use serializer::Serializer;
pub use state::QueryState;
