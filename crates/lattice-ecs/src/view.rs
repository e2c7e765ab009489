//! Cached filtered views over groups.
//!
//! A [`View`] lists every group whose signature is a superset of its filter,
//! in group creation order. Views are built once per distinct filter and then
//! kept current: the group registry pushes each new group into every cached
//! view it satisfies.

use std::fmt;

use crate::group::{Group, GroupId};
use crate::registry::GroupRegistry;
use crate::signature::Signature;

/// Index of a cached view.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub(crate) u32);

impl ViewId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewId({})", self.0)
    }
}

/// Groups matching a component filter.
#[derive(Debug, Clone)]
pub struct View {
    id: ViewId,
    filter: Signature,
    groups: Vec<GroupId>,
}

impl View {
    #[inline]
    pub fn id(&self) -> ViewId {
        self.id
    }

    #[inline]
    pub fn filter(&self) -> &Signature {
        &self.filter
    }

    /// Matching groups in creation order.
    #[inline]
    pub fn groups(&self) -> &[GroupId] {
        &self.groups
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ViewCache
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ViewCache {
    views: Vec<View>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached view whose filter equals `filter` as a set.
    pub fn find(&self, filter: &Signature) -> Option<ViewId> {
        self.views
            .iter()
            .find(|view| &view.filter == filter)
            .map(|view| view.id)
    }

    /// Return the view for `filter`, building it from `groups` on a miss.
    pub fn get_or_create(&mut self, filter: &Signature, groups: &GroupRegistry) -> ViewId {
        if let Some(id) = self.find(filter) {
            return id;
        }

        let id = ViewId(self.views.len() as u32);
        let matching: Vec<GroupId> = groups
            .iter()
            .filter(|group| group.has_all(filter))
            .map(|group| group.id())
            .collect();
        tracing::debug!(
            view = id.0,
            filter = ?filter.ids(),
            groups = matching.len(),
            "view created"
        );
        self.views.push(View {
            id,
            filter: filter.clone(),
            groups: matching,
        });
        id
    }

    /// Append a newly built group to every view it satisfies.
    pub fn on_group_created(&mut self, group: &Group) {
        for view in &mut self.views {
            if group.has_all(&view.filter) {
                view.groups.push(group.id());
            }
        }
    }

    #[inline]
    pub fn get(&self, id: ViewId) -> Option<&View> {
        self.views.get(id.index())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Forget every group. Filters and ids stay valid.
    pub fn clear_groups(&mut self) {
        for view in &mut self.views {
            view.groups.clear();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
