//! Community-based access control.
//!
//! A two-step model distilled from view-based access control: the community
//! string maps to a group, and the group maps to a read [`View`] describing
//! the OID subtrees it may see. A request whose community maps to no group is
//! rejected outright; a request whose community is known is served, but only
//! inside the group's view.

use std::collections::HashMap;

use bytes::Bytes;

use crate::oid::Oid;

/// A collection of OID subtrees defining accessible objects.
///
/// Membership is a prefix check: an OID is in the view when at least one
/// included subtree prefixes it and no excluded subtree does. Exclusions win.
///
/// ```rust
/// use minsnmp::agent::View;
/// use minsnmp::oid;
///
/// let view = View::new()
///     .include(oid!(1, 3, 6, 1, 2, 1))
///     .exclude(oid!(1, 3, 6, 1, 2, 1, 25));
///
/// assert!(view.contains(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)));
/// assert!(!view.contains(&oid!(1, 3, 6, 1, 2, 1, 25, 1, 0)));
/// assert!(!view.contains(&oid!(1, 3, 6, 1, 4, 1)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct View {
    subtrees: Vec<ViewSubtree>,
}

#[derive(Debug, Clone)]
struct ViewSubtree {
    oid: Oid,
    included: bool,
}

impl View {
    /// Create an empty view (contains nothing).
    pub fn new() -> Self {
        Self::default()
    }

    /// Include the subtree rooted at `oid`.
    pub fn include(mut self, oid: Oid) -> Self {
        self.subtrees.push(ViewSubtree {
            oid,
            included: true,
        });
        self
    }

    /// Exclude the subtree rooted at `oid`, even where an include covers it.
    pub fn exclude(mut self, oid: Oid) -> Self {
        self.subtrees.push(ViewSubtree {
            oid,
            included: false,
        });
        self
    }

    /// Check whether `oid` is visible through this view.
    pub fn contains(&self, oid: &Oid) -> bool {
        let mut included = false;
        for subtree in &self.subtrees {
            if oid.starts_with(&subtree.oid) {
                if subtree.included {
                    included = true;
                } else {
                    return false;
                }
            }
        }
        included
    }
}

/// Access configuration: community → group → view.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    community_to_group: HashMap<Bytes, Bytes>,
    group_views: HashMap<Bytes, View>,
}

impl AccessControl {
    /// Create an empty configuration (every community is rejected).
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a community string to a group.
    pub fn add_community(&mut self, community: impl Into<Bytes>, group: impl Into<Bytes>) {
        self.community_to_group
            .insert(community.into(), group.into());
    }

    /// Grant a group its read view.
    pub fn add_view(&mut self, group: impl Into<Bytes>, view: View) {
        self.group_views.insert(group.into(), view);
    }

    /// Resolve a community to its group, if mapped.
    pub fn group_for(&self, community: &[u8]) -> Option<&Bytes> {
        self.community_to_group.get(community)
    }

    /// The read view granted to a community, or `None` when the community
    /// maps to no group (access denied).
    pub fn view_for(&self, community: &[u8]) -> Option<&View> {
        let group = self.group_for(community)?;
        self.group_views.get(group)
    }
}
