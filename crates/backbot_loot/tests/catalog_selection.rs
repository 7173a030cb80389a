//! Integration tests: catalog on disk through selection and actions.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use backbot_loot::frames::encode_frames;
use backbot_loot::{
    Catalog, DirBackSource, LootActions, LootBag, LootError, LootResult, MemoryLootBag,
    PlaybackSink, PlaybackTarget, Rarity, Selector, UserId,
};

fn temp_catalog_root() -> PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("test_catalog_{id}"))
}

fn write_back(root: &Path, path: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, encode_frames(&[b"frame".as_slice()]).unwrap()).unwrap();
}

struct CountingSink;

impl PlaybackSink for CountingSink {
    fn deliver(&self, _target: &PlaybackTarget, frames: &[Vec<u8>]) -> LootResult<()> {
        if frames.is_empty() {
            return Err(LootError::Playback("nothing to play".to_string()));
        }
        Ok(())
    }
}

#[test]
fn test_loaded_catalog_draws_every_tier() {
    let root = temp_catalog_root();
    write_back(&root, "Rollback/reset.dca");
    write_back(&root, "rare/r.dca");
    write_back(&root, "Uncommon/u.dca");
    write_back(&root, "Common/c.dca");
    write_back(&root, "Common/deeper/still/c2.dca");

    let catalog = Catalog::load(&root).unwrap();
    assert_eq!(catalog.len(), 5);
    assert!(catalog.resolve("Common/deeper/still/c2.dca").is_some());

    let selector = Selector::with_seed(Arc::new(catalog), 11);
    let stats = selector.run_statistics(40_000);
    assert_eq!(stats.failed_draws, 0);
    for rarity in Rarity::ALL {
        assert!(stats.tier_counts.get(&rarity).copied().unwrap_or(0) > 0, "{rarity} never drawn");
    }

    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_unknown_tier_directory_fails_load() {
    let root = temp_catalog_root();
    write_back(&root, "Common/c.dca");
    write_back(&root, "Legendary/l.dca");

    assert_eq!(
        Catalog::load(&root).unwrap_err(),
        LootError::UnknownTier {
            name: "Legendary".to_string()
        }
    );

    fs::remove_dir_all(&root).ok();
}

#[test]
fn test_actions_over_directory_source() {
    let root = temp_catalog_root();
    write_back(&root, "Common/c.dca");

    let catalog = Arc::new(Catalog::load(&root).unwrap());
    let selector = Arc::new(Selector::with_seed(Arc::clone(&catalog), 3));
    let bag = Arc::new(MemoryLootBag::new());
    let actions = LootActions::new(selector, Arc::clone(&bag), DirBackSource::new(&root), CountingSink);
    let target = PlaybackTarget::new("u1", "voice");

    // Only Common exists, so keep drawing until a roll lands there
    let mut owned = 0;
    for _ in 0..10 {
        if actions.back(&target).is_ok() {
            owned += 1;
        }
    }
    let user = UserId::from("u1");
    let item = catalog.backs(Rarity::Common)[0].clone();
    assert_eq!(bag.get_state(&user).count(&item), owned);
    assert!(owned > 0);

    fs::remove_file(root.join("Common/c.dca")).unwrap();
    assert_eq!(
        actions.playback(&target, "Common/c.dca"),
        Err(LootError::BackNotFound("Common/c.dca".to_string()))
    );
    assert_eq!(bag.get_state(&user).count(&item), owned);

    fs::remove_dir_all(&root).ok();
}
