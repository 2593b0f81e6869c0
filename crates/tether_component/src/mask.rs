//! Component-kind bit masks.
//!
//! A [`CompMask`] describes a set of component kinds: one bit per kind, in
//! schema declaration order. The same representation serves three roles —
//! an entity's current composition, a kind's required/dependent sets, and
//! an observer's watched shape.

use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

/// A bit-set over component kinds.
///
/// Bit 0 is reserved for the Existence kind every live entity carries;
/// user-declared kinds claim bits 1..=31 in declaration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CompMask(pub u32);

impl CompMask {
    /// The empty set.
    pub const NONE: CompMask = CompMask(0);

    /// Every bit set — denotes "any/all kinds".
    pub const ALL: CompMask = CompMask(u32::MAX);

    /// The reserved Existence bit.
    pub const EXISTENCE: CompMask = CompMask(1);

    /// The mask with only bit `index` set.
    #[must_use]
    pub const fn bit(index: u16) -> Self {
        CompMask(1 << index)
    }

    /// Returns `true` if every bit of `other` is also set in `self`.
    #[must_use]
    pub const fn contains_all(self, other: CompMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if `self` and `other` share at least one bit.
    #[must_use]
    pub const fn intersects(self, other: CompMask) -> bool {
        self.0 & other.0 != 0
    }

    /// `self` with the bits of `other` added.
    #[must_use]
    pub const fn with(self, other: CompMask) -> Self {
        CompMask(self.0 | other.0)
    }

    /// `self` with the bits of `other` cleared.
    #[must_use]
    pub const fn without(self, other: CompMask) -> Self {
        CompMask(self.0 & !other.0)
    }

    /// Returns `true` if no bits are set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for CompMask {
    type Output = CompMask;
    fn bitor(self, rhs: Self) -> Self {
        CompMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for CompMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for CompMask {
    type Output = CompMask;
    fn bitand(self, rhs: Self) -> Self {
        CompMask(self.0 & rhs.0)
    }
}

impl BitAndAssign for CompMask {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for CompMask {
    type Output = CompMask;
    fn not(self) -> Self {
        CompMask(!self.0)
    }
}

impl std::fmt::Display for CompMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
