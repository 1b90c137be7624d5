#![allow(dead_code)]

use cas_tree::{FileNode, FileOptions, Key, MemoryStore, StoreRef};
use std::sync::Arc;

pub fn memory_store() -> (StoreRef, Arc<MemoryStore>) {
    let raw = Arc::new(MemoryStore::new());
    let store: StoreRef = raw.clone();
    (store, raw)
}

pub fn empty_node(store: &StoreRef) -> FileNode {
    FileNode::new(store.clone(), FileOptions::default())
}

/// Reads the node's entire contents.
pub fn read_all(node: &FileNode) -> cas_tree::Result<Vec<u8>> {
    let mut buf = vec![0; node.size() as usize];
    let n = node.read_at(&mut buf, 0)?;
    assert_eq!(buf.len(), n);
    Ok(buf)
}

/// Collects the node's data block keys in file order via scan.
pub fn block_keys(node: &FileNode) -> cas_tree::Result<Vec<Key>> {
    let mut keys = vec![];

    node.scan(|key, is_node| {
        if !is_node {
            keys.push(key.clone());
        }
        true
    })?;

    Ok(keys)
}
