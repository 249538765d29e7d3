//! Managed object registry.
//!
//! The registry maps OIDs to handlers kept in lexicographic order, which is
//! what makes GETNEXT (and therefore walking) work: [`MoRegistry::next`]
//! returns the smallest registered OID strictly greater than its argument.
//! Storage is a sorted vector with binary search, so lookups stay O(log n)
//! for tables with thousands of rows.

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::value::Value;

/// Access mode of a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Readable only. SET is out of scope for this core, so every entry
    /// behaves read-only on the wire regardless.
    ReadOnly,
    /// Declared writable (honored by column declarations, not by the agent).
    ReadWrite,
}

/// Handler kind of a registry entry.
///
/// Dispatch is a tagged variant over the two handler shapes this core
/// serves, not a trait hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum MoKind {
    /// A standalone scalar value.
    Scalar(Value),
    /// One cell of a table built by [`TableBuilder`](crate::table::TableBuilder).
    TableCell(Value),
}

/// A registered managed object: an OID plus a handler able to produce a
/// value for GET and to advertise its OID for NEXT lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct MoEntry {
    oid: Oid,
    access: Access,
    kind: MoKind,
}

impl MoEntry {
    /// Create a read-only scalar entry.
    pub fn read_only(oid: Oid, value: impl Into<Value>) -> Self {
        Self {
            oid,
            access: Access::ReadOnly,
            kind: MoKind::Scalar(value.into()),
        }
    }

    /// Create a table-cell entry.
    pub(crate) fn table_cell(oid: Oid, access: Access, value: Value) -> Self {
        Self {
            oid,
            access,
            kind: MoKind::TableCell(value),
        }
    }

    /// The OID this entry is registered at. Immutable once registered.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// The access mode.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Produce the current value for a GET.
    pub fn fetch(&self) -> Value {
        match &self.kind {
            MoKind::Scalar(v) => v.clone(),
            MoKind::TableCell(v) => v.clone(),
        }
    }
}

/// Sorted managed-object store.
#[derive(Debug, Default)]
pub struct MoRegistry {
    /// Entries kept sorted by OID; insertion order is irrelevant.
    entries: Vec<MoEntry>,
}

impl MoRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, oid: &Oid) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|e| e.oid.cmp(oid))
    }

    /// Register one entry.
    ///
    /// Fails with [`Error::DuplicateRegistration`] if an entry with the same
    /// OID exists; the registry is unchanged on failure.
    pub fn register(&mut self, entry: MoEntry) -> Result<()> {
        match self.position(&entry.oid) {
            Ok(_) => Err(Error::DuplicateRegistration {
                oid: entry.oid.clone(),
            }),
            Err(idx) => {
                self.entries.insert(idx, entry);
                Ok(())
            }
        }
    }

    /// Register a batch of entries atomically.
    ///
    /// If any entry collides with an existing registration or with another
    /// entry in the batch, nothing is inserted.
    pub fn register_all(&mut self, entries: Vec<MoEntry>) -> Result<()> {
        for (i, entry) in entries.iter().enumerate() {
            if self.position(&entry.oid).is_ok() {
                return Err(Error::DuplicateRegistration {
                    oid: entry.oid.clone(),
                });
            }
            if let Some(dup) = entries[..i].iter().find(|e| e.oid == entry.oid) {
                return Err(Error::DuplicateRegistration {
                    oid: dup.oid.clone(),
                });
            }
        }
        for entry in entries {
            let idx = self
                .position(&entry.oid)
                .expect_err("batch was checked for duplicates");
            self.entries.insert(idx, entry);
        }
        Ok(())
    }

    /// Remove the entry at `oid` if present.
    ///
    /// Idempotent: removing an absent OID is a no-op. Returns whether an
    /// entry was removed.
    pub fn unregister(&mut self, oid: &Oid) -> bool {
        match self.position(oid) {
            Ok(idx) => {
                self.entries.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Resolve a GET.
    ///
    /// Never a hard failure: a miss yields [`Value::NoSuchInstance`] when the
    /// requested OID sits inside a registered subtree (object known, instance
    /// absent) and [`Value::NoSuchObject`] otherwise. The sentinel propagates
    /// into the wire response.
    pub fn get(&self, oid: &Oid) -> Value {
        match self.position(oid) {
            Ok(idx) => self.entries[idx].fetch(),
            Err(idx) => {
                // The insertion point neighbors are the only candidates for a
                // prefix relationship in sorted order.
                let extends_registered = idx > 0 && oid.starts_with(&self.entries[idx - 1].oid);
                let prefixes_registered = self
                    .entries
                    .get(idx)
                    .is_some_and(|e| e.oid.starts_with(oid));
                if extends_registered || prefixes_registered {
                    Value::NoSuchInstance
                } else {
                    Value::NoSuchObject
                }
            }
        }
    }

    /// The entry with the smallest OID strictly greater than `oid`, or
    /// `None` when the view is exhausted (the caller answers with
    /// [`Value::EndOfMibView`]).
    pub fn next(&self, oid: &Oid) -> Option<&MoEntry> {
        match self.position(oid) {
            Ok(idx) => self.entries.get(idx + 1),
            Err(idx) => self.entries.get(idx),
        }
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in OID order.
    pub fn iter(&self) -> impl Iterator<Item = &MoEntry> {
        self.entries.iter()
    }
}
