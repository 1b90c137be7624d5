mod common;

use cas_tree::{FileNode, SplitConfig};
use common::{empty_node, memory_store, read_all};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use test_log::test;

#[test]
fn roundtrip_small_file() -> cas_tree::Result<()> {
    let (store, _) = memory_store();
    let node = empty_node(&store);

    node.write_at(b"hello, content-addressed world", 0)?;
    let key = node.flush()?;

    let reopened = FileNode::open(store, &key)?;
    assert_eq!(30, reopened.size());
    assert_eq!(b"hello, content-addressed world", &*read_all(&reopened)?);

    Ok(())
}

#[test]
fn roundtrip_multi_block_file() -> cas_tree::Result<()> {
    let (store, _) = memory_store();
    let node = empty_node(&store);

    let mut rng = StdRng::seed_from_u64(42);
    let mut payload = vec![0u8; 300_000];
    rng.fill_bytes(&mut payload);

    node.write_at(&payload, 0)?;
    let key = node.flush()?;

    let reopened = FileNode::open(store, &key)?;
    assert_eq!(payload.len() as u64, reopened.size());
    assert_eq!(payload, read_all(&reopened)?);

    Ok(())
}

#[test]
fn roundtrip_empty_file() -> cas_tree::Result<()> {
    let (store, _) = memory_store();
    let node = empty_node(&store);

    let key = node.flush()?;

    let reopened = FileNode::open(store, &key)?;
    assert_eq!(0, reopened.size());
    assert_eq!(0, reopened.read_at(&mut [0; 16], 0)?);

    Ok(())
}

#[test]
fn roundtrip_incremental_writes() -> cas_tree::Result<()> {
    let (store, _) = memory_store();

    let node = FileNode::new(
        store.clone(),
        cas_tree::FileOptions {
            split: Some(
                SplitConfig::default()
                    .with_min_size(64)
                    .with_target_size(256)
                    .with_max_size(1_024),
            ),
            ..Default::default()
        },
    );

    let mut expected = vec![];
    for i in 0u32..100 {
        let line = format!("line {i} of an append-style workload\n");
        node.write_at(line.as_bytes(), expected.len() as u64)?;
        expected.extend_from_slice(line.as_bytes());
    }

    let key = node.flush()?;
    let reopened = FileNode::open(store, &key)?;

    assert_eq!(expected, read_all(&reopened)?);

    Ok(())
}

#[test]
fn roundtrip_preserves_bytes_after_interior_rewrite() -> cas_tree::Result<()> {
    let (store, _) = memory_store();
    let node = empty_node(&store);

    let mut rng = StdRng::seed_from_u64(7);
    let mut payload = vec![0u8; 100_000];
    rng.fill_bytes(&mut payload);

    node.write_at(&payload, 0)?;

    let patch = b"interior patch".repeat(10);
    node.write_at(&patch, 40_000)?;
    payload.splice(40_000..40_000 + patch.len(), patch.iter().copied());

    let key = node.flush()?;
    let reopened = FileNode::open(store, &key)?;

    assert_eq!(payload, read_all(&reopened)?);

    Ok(())
}
