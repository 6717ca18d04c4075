//! Unique binder identity, used instead of pointer-based scope chains.
//!
//! Every variable-introducing position (lambda parameter, `let`, `let rec`,
//! pattern variable) is assigned a fresh [`BinderId`] by the desugarer. Two
//! `Var` nodes refer to the same binding iff they carry the same
//! `BinderId` -- the `name: String` alongside it is kept purely for
//! diagnostics and eventual codegen, and is never compared for equality of
//! reference. This sidesteps capture issues that a name-only
//! representation would have under substitution (inlining, beta-reduction).

use std::cell::Cell;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct BinderId(pub u64);

impl std::fmt::Display for BinderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic counter shared by the desugarer (which mints one `BinderId`
/// per binding occurrence) and the optimizer (which mints fresh ids when it
/// needs to rename a binder to avoid capture during inlining).
#[derive(Debug, Default)]
pub struct BinderIdGen {
    next: Cell<u64>,
}

impl BinderIdGen {
    pub fn new() -> Self {
        BinderIdGen { next: Cell::new(0) }
    }

    /// Resume numbering after an existing tree's highest binder id, so a
    /// later pass (the optimizer minting fresh ids while renaming to avoid
    /// capture) can never collide with one the desugarer already assigned.
    pub fn starting_at(next: u64) -> Self {
        BinderIdGen { next: Cell::new(next) }
    }

    pub fn fresh(&self) -> BinderId {
        let id = self.next.get();
        self.next.set(id + 1);
        BinderId(id)
    }
}
