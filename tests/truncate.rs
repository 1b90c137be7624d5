mod common;

use cas_tree::{FileNode, FileOptions, SplitConfig};
use common::{empty_node, memory_store, read_all};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use test_log::test;

#[test]
fn truncate_then_size() -> cas_tree::Result<()> {
    let (store, _) = memory_store();
    let node = empty_node(&store);

    node.write_at(b"0123456789", 0)?;

    for n in [10u64, 7, 3, 0, 0] {
        node.truncate(n)?;
        assert_eq!(n, node.size());
    }

    Ok(())
}

#[test]
fn truncate_makes_reads_at_cut_eof() -> cas_tree::Result<()> {
    let (store, _) = memory_store();
    let node = empty_node(&store);

    node.write_at(b"0123456789", 0)?;
    node.truncate(4)?;

    let mut buf = [0u8; 8];
    assert_eq!(0, node.read_at(&mut buf, 4)?);
    assert_eq!(4, node.read_at(&mut buf, 0)?);
    assert_eq!(b"0123", &buf[..4]);

    Ok(())
}

#[test]
fn truncate_extension_reads_zeros() -> cas_tree::Result<()> {
    let (store, _) = memory_store();
    let node = empty_node(&store);

    node.write_at(b"abc", 0)?;
    node.truncate(2)?;
    node.truncate(6)?;

    assert_eq!(6, node.size());
    assert_eq!(b"ab\0\0\0\0", &*read_all(&node)?);

    Ok(())
}

#[test]
fn truncate_multi_block_survives_roundtrip() -> cas_tree::Result<()> {
    let (store, _) = memory_store();

    let node = FileNode::new(
        store.clone(),
        FileOptions {
            split: Some(
                SplitConfig::default()
                    .with_min_size(64)
                    .with_target_size(256)
                    .with_max_size(1_024),
            ),
            ..Default::default()
        },
    );

    let mut rng = StdRng::seed_from_u64(99);
    let mut payload = vec![0u8; 20_000];
    rng.fill_bytes(&mut payload);

    node.write_at(&payload, 0)?;

    // cut in the middle of some interior block
    node.truncate(11_111)?;
    payload.truncate(11_111);

    let key = node.flush()?;
    let reopened = FileNode::open(store, &key)?;

    assert_eq!(payload, read_all(&reopened)?);

    Ok(())
}
