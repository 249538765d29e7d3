//! Object identifier type.
//!
//! An [`Oid`] is an immutable sequence of numeric sub-identifiers ("arcs").
//! Ordering is lexicographic arc-by-arc, so a strict prefix sorts before any
//! of its extensions: `1.3.6.1.2` < `1.3.6.1.2.1` < `1.3.6.1.3`. This is the
//! ordering GETNEXT and walks are defined over.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::error::{Error, OidErrorKind};

/// Maximum number of arcs accepted when parsing an OID from text.
pub const MAX_OID_LEN: usize = 128;

type Arcs = SmallVec<[u32; 12]>;

/// An SNMP object identifier.
///
/// Construct with [`Oid::from_slice`], the [`oid!`](crate::oid!) macro, or by
/// parsing dotted-decimal text. Once built, an `Oid` never changes; derived
/// identifiers are produced by [`child`](Oid::child).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Oid {
    arcs: Arcs,
}

impl Oid {
    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: Arcs::from_slice(arcs),
        }
    }

    /// The arcs of this OID.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// True if the OID has no arcs.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// True if `prefix` is a (non-strict) prefix of this OID.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.len() >= prefix.arcs.len() && self.arcs[..prefix.arcs.len()] == prefix.arcs[..]
    }

    /// A new OID with `arc` appended.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// The arcs after `prefix`, or `None` if this OID does not extend it.
    ///
    /// For a table cell `base.column.row`, `cell.suffix(&column_base)` yields
    /// the row index arcs.
    pub fn suffix(&self, prefix: &Oid) -> Option<&[u32]> {
        self.starts_with(prefix)
            .then(|| &self.arcs[prefix.arcs.len()..])
    }
}

impl FromStr for Oid {
    type Err = Error;

    /// Parse dotted-decimal text, with or without a leading dot.
    fn from_str(s: &str) -> Result<Self, Error> {
        let trimmed = s.strip_prefix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Err(Error::invalid_oid_with_input(OidErrorKind::Empty, s));
        }

        let mut arcs = Arcs::new();
        for part in trimmed.split('.') {
            let arc = part
                .parse::<u32>()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s))?;
            arcs.push(arc);
        }

        if arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid_with_input(
                OidErrorKind::TooManyArcs {
                    count: arcs.len(),
                    max: MAX_OID_LEN,
                },
                s,
            ));
        }

        Ok(Oid { arcs })
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.arcs.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
        }
        Ok(())
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Oid::from_slice(arcs)
    }
}

/// Construct an [`Oid`] from literal arcs: `oid!(1, 3, 6, 1, 2, 1)`.
#[macro_export]
macro_rules! oid {
    ($($arc:expr),+ $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),+])
    };
}
