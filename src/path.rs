// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Slash-path traversal over a file tree
//!
//! Paths are resolved relative to a starting node: empty components are
//! ignored and a leading `/` is tolerated, so `"/a//b/"` and `"a/b"` name
//! the same node.

use crate::{Error, FileNode, FileOptions, Stat};

/// Visitor verdict for [`walk`]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Walk {
    /// Descend into the node's children
    Continue,

    /// Skip the node's children, continue with its siblings
    SkipChildren,
}

/// Options for [`set`]
#[derive(Default)]
pub struct SetOptions<'a> {
    /// Create missing intermediate nodes along the path
    pub create: bool,

    /// Applied to every node that [`set`] creates
    pub set_stat: Option<&'a dyn Fn(&mut Stat)>,

    /// Node to install at the leaf; a new empty node if absent
    pub file: Option<FileNode>,
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Resolves `path` relative to `start` and returns the terminal node.
///
/// An empty path resolves to `start` itself.
///
/// # Errors
///
/// Returns [`Error::ChildNotFound`] at the first missing component.
pub fn open(start: &FileNode, path: &str) -> crate::Result<FileNode> {
    let mut node = start.clone();

    for component in components(path) {
        node = node.open_child(component)?;
    }

    Ok(node)
}

/// Installs a node at `path` relative to `start` and returns it.
///
/// Missing intermediate nodes are created when `opts.create` is set,
/// with `opts.set_stat` applied to each; otherwise a missing component is an
/// error. The leaf is always (re)installed: either `opts.file` or a fresh
/// empty node.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] for a path with no components and
/// [`Error::ChildNotFound`] when a component is missing and `opts.create` is
/// not set.
pub fn set(start: &FileNode, path: &str, opts: SetOptions<'_>) -> crate::Result<FileNode> {
    let mut parts: Vec<&str> = components(path).collect();

    let Some(leaf_name) = parts.pop() else {
        return Err(Error::InvalidPath(path.into()));
    };

    let mut node = start.clone();

    for component in parts {
        node = match node.open_child(component) {
            Ok(child) => child,
            Err(Error::ChildNotFound(_)) if opts.create => {
                let child = new_node(&node, component, opts.set_stat);
                node.set_child(component, &child);
                child
            }
            Err(e) => return Err(e),
        };
    }

    let leaf = match opts.file {
        Some(file) => file,
        None => new_node(&node, leaf_name, opts.set_stat),
    };

    node.set_child(leaf_name, &leaf);

    Ok(leaf)
}

fn new_node(parent: &FileNode, name: &str, set_stat: Option<&dyn Fn(&mut Stat)>) -> FileNode {
    let node = FileNode::new(
        parent.store().clone(),
        FileOptions {
            name: Some(name.into()),
            split: Some(parent.split_config()),
            cancel: Some(parent.cancel_signal().clone()),
            ..FileOptions::default()
        },
    );

    if let Some(f) = set_stat {
        node.set_stat(f);
    }

    node
}

/// Removes the node at `path` from its parent.
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] for a path with no components and
/// [`Error::ChildNotFound`] if the path does not resolve.
pub fn remove(start: &FileNode, path: &str) -> crate::Result<()> {
    let mut parts: Vec<&str> = components(path).collect();

    let Some(leaf_name) = parts.pop() else {
        return Err(Error::InvalidPath(path.into()));
    };

    let mut parent = start.clone();
    for component in parts {
        parent = parent.open_child(component)?;
    }

    if parent.remove_child(leaf_name) {
        Ok(())
    } else {
        Err(Error::ChildNotFound(leaf_name.into()))
    }
}

/// Walks the tree rooted at `start` depth-first, pre-order, children in
/// ascending name order.
///
/// The visitor receives each node's slash path (the root as `"/"`) and may
/// prune a subtree by returning [`Walk::SkipChildren`].
///
/// # Errors
///
/// The first visitor or store error aborts the walk.
pub fn walk<F: FnMut(&str, &FileNode) -> crate::Result<Walk>>(
    start: &FileNode,
    mut visit: F,
) -> crate::Result<()> {
    walk_inner(start, "/", &mut visit)
}

fn walk_inner(
    node: &FileNode,
    path: &str,
    visit: &mut dyn FnMut(&str, &FileNode) -> crate::Result<Walk>,
) -> crate::Result<()> {
    if visit(path, node)? == Walk::SkipChildren {
        return Ok(());
    }

    for name in node.child_names() {
        let child = node.open_child(&name)?;

        let child_path = if path.ends_with('/') {
            format!("{path}{name}")
        } else {
            format!("{path}/{name}")
        };

        walk_inner(&child, &child_path, visit)?;
    }

    Ok(())
}
