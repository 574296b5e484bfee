// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent pane split tree.
//!
//! Every mutation returns a new tree (`splitting_leaf`, `removing_leaf`,
//! `setting_entry`); the window swaps trees atomically under its lock.
//! Removing a leaf collapses the parent split. Grid shape is bounded at
//! 2 rows by 3 columns; `can_split` rejects anything that would grow
//! past that.

use crate::SplitDirection;

/// Maximum rows in one window's grid.
pub const MAX_ROWS: usize = 2;
/// Maximum columns in one window's grid.
pub const MAX_COLS: usize = 3;

/// A pane layout: leaves are panes, splits carry orientation and ratio.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<T> {
    Leaf {
        id: String,
        entry: Option<T>,
    },
    Split {
        direction: SplitDirection,
        first: Box<Node<T>>,
        second: Box<Node<T>>,
        ratio: f32,
    },
}

impl<T: Clone> Node<T> {
    pub fn leaf(id: impl Into<String>, entry: Option<T>) -> Self {
        Node::Leaf { id: id.into(), entry }
    }

    /// Leaf ids in layout order.
    pub fn leaf_ids(&self) -> Vec<&str> {
        match self {
            Node::Leaf { id, .. } => vec![id.as_str()],
            Node::Split { first, second, .. } => {
                let mut ids = first.leaf_ids();
                ids.extend(second.leaf_ids());
                ids
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { first, second, .. } => first.leaf_count() + second.leaf_count(),
        }
    }

    pub fn contains_leaf(&self, leaf_id: &str) -> bool {
        match self {
            Node::Leaf { id, .. } => id == leaf_id,
            Node::Split { first, second, .. } => {
                first.contains_leaf(leaf_id) || second.contains_leaf(leaf_id)
            }
        }
    }

    pub fn entry(&self, leaf_id: &str) -> Option<&T> {
        match self {
            Node::Leaf { id, entry, .. } if id == leaf_id => entry.as_ref(),
            Node::Leaf { .. } => None,
            Node::Split { first, second, .. } => {
                first.entry(leaf_id).or_else(|| second.entry(leaf_id))
            }
        }
    }

    /// Grid dimensions (rows, cols) of the layout.
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            Node::Leaf { .. } => (1, 1),
            Node::Split { direction, first, second, .. } => {
                let (r1, c1) = first.dimensions();
                let (r2, c2) = second.dimensions();
                match direction {
                    // Side-by-side: columns add, rows overlay.
                    SplitDirection::Horizontal => (r1.max(r2), c1 + c2),
                    // Stacked: rows add, columns overlay.
                    SplitDirection::Vertical => (r1 + r2, c1.max(c2)),
                }
            }
        }
    }

    /// Whether splitting `leaf_id` in `direction` keeps the grid within
    /// 2 rows by 3 columns.
    pub fn can_split(&self, leaf_id: &str, direction: SplitDirection) -> bool {
        match self.splitting_leaf(leaf_id, "\u{0}probe", direction, 0.5) {
            Some(next) => {
                let (rows, cols) = next.dimensions();
                rows <= MAX_ROWS && cols <= MAX_COLS
            }
            None => false,
        }
    }

    /// New tree with `leaf_id` replaced by a split holding the old leaf
    /// and a fresh empty leaf `new_id`. `None` when the leaf is missing.
    pub fn splitting_leaf(
        &self,
        leaf_id: &str,
        new_id: &str,
        direction: SplitDirection,
        ratio: f32,
    ) -> Option<Node<T>> {
        match self {
            Node::Leaf { id, entry } if id == leaf_id => Some(Node::Split {
                direction,
                first: Box::new(Node::Leaf { id: id.clone(), entry: entry.clone() }),
                second: Box::new(Node::leaf(new_id, None)),
                ratio,
            }),
            Node::Leaf { .. } => None,
            Node::Split { direction: d, first, second, ratio: r } => {
                if let Some(next) = first.splitting_leaf(leaf_id, new_id, direction, ratio) {
                    Some(Node::Split {
                        direction: *d,
                        first: Box::new(next),
                        second: second.clone(),
                        ratio: *r,
                    })
                } else {
                    second.splitting_leaf(leaf_id, new_id, direction, ratio).map(|next| {
                        Node::Split {
                            direction: *d,
                            first: first.clone(),
                            second: Box::new(next),
                            ratio: *r,
                        }
                    })
                }
            }
        }
    }

    /// New tree with `leaf_id` removed; the parent split collapses to the
    /// sibling. Outer `None` when the leaf is missing; `Some(None)` when
    /// removing the last leaf empties the tree.
    #[allow(clippy::option_option)]
    pub fn removing_leaf(&self, leaf_id: &str) -> Option<Option<Node<T>>> {
        match self {
            Node::Leaf { id, .. } if id == leaf_id => Some(None),
            Node::Leaf { .. } => None,
            Node::Split { direction, first, second, ratio } => {
                if let Some(next) = first.removing_leaf(leaf_id) {
                    Some(Some(match next {
                        None => (**second).clone(),
                        Some(subtree) => Node::Split {
                            direction: *direction,
                            first: Box::new(subtree),
                            second: second.clone(),
                            ratio: *ratio,
                        },
                    }))
                } else {
                    second.removing_leaf(leaf_id).map(|next| {
                        Some(match next {
                            None => (**first).clone(),
                            Some(subtree) => Node::Split {
                                direction: *direction,
                                first: first.clone(),
                                second: Box::new(subtree),
                                ratio: *ratio,
                            },
                        })
                    })
                }
            }
        }
    }

    /// New tree with the entry of `leaf_id` replaced.
    pub fn setting_entry(&self, leaf_id: &str, entry: T) -> Option<Node<T>> {
        match self {
            Node::Leaf { id, .. } if id == leaf_id => {
                Some(Node::Leaf { id: id.clone(), entry: Some(entry) })
            }
            Node::Leaf { .. } => None,
            Node::Split { direction, first, second, ratio } => {
                if let Some(next) = first.setting_entry(leaf_id, entry.clone()) {
                    Some(Node::Split {
                        direction: *direction,
                        first: Box::new(next),
                        second: second.clone(),
                        ratio: *ratio,
                    })
                } else {
                    second.setting_entry(leaf_id, entry).map(|next| Node::Split {
                        direction: *direction,
                        first: first.clone(),
                        second: Box::new(next),
                        ratio: *ratio,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
