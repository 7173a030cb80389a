//! # Loot Actions
//!
//! The user-facing flows built on the selector and the ledger.
//!
//! ```text
//!            ┌──────────┐  back   ┌────────────┐ frames ┌──────────────┐
//! target ──> │ Selector │ ──────> │ BackSource │ ─────> │ PlaybackSink │
//!            └──────────┘         └────────────┘        └──────┬───────┘
//!                                                               │ ok
//!                                                               ▼
//!                                                         ┌─────────┐
//!                                                         │ LootBag │
//!                                                         └─────────┘
//! ```
//!
//! The ledger only changes once the sink has accepted the frames, except for
//! `playback`, which takes the back out first and puts it back if anything
//! downstream fails.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use crate::back::Back;
use crate::error::{LootError, LootResult};
use crate::frames::decode_frames;
use crate::ledger::{LootBag, UserId};
use crate::rarity::Rarity;
use crate::selector::Selector;

/// Default points needed before a user may roll back.
pub const DEFAULT_ROLLBACK_THRESHOLD: u64 = 10_000;

/// Where a back should be delivered.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlaybackTarget {
    /// The user who triggered the action and receives the loot.
    pub user: UserId,
    /// The channel the request came from.
    pub channel: String,
}

impl PlaybackTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(user: impl Into<UserId>, channel: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            channel: channel.into(),
        }
    }
}

/// Supplies the raw bytes of a back file.
pub trait BackSource: Send + Sync {
    /// Reads the whole file behind `back`.
    ///
    /// # Errors
    ///
    /// [`LootError::BackNotFound`] if the file is gone, otherwise any IO
    /// failure mapped to a [`LootError`].
    fn open(&self, back: &Back) -> LootResult<Vec<u8>>;
}

/// Plays decoded frames to a user.
pub trait PlaybackSink: Send + Sync {
    /// Delivers `frames` to `target`.
    ///
    /// # Errors
    ///
    /// [`LootError::NoActiveSession`] when the user has nowhere to receive
    /// playback, [`LootError::Playback`] for delivery failures.
    fn deliver(&self, target: &PlaybackTarget, frames: &[Vec<u8>]) -> LootResult<()>;
}

/// Reads back files from the catalog directory.
#[derive(Clone, Debug)]
pub struct DirBackSource {
    root: PathBuf,
}

impl DirBackSource {
    /// Reads files relative to `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BackSource for DirBackSource {
    fn open(&self, back: &Back) -> LootResult<Vec<u8>> {
        let path = self.root.join(back.path());
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LootError::BackNotFound(back.path().to_string()),
            _ => LootError::CatalogIo(format!("failed to read {}: {e}", path.display())),
        })
    }
}

/// One tier's section of a [`Backpack`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackpackTier {
    /// The tier.
    pub rarity: Rarity,
    /// Points per copy.
    pub value: u64,
    /// Owned backs of this tier, sorted by path.
    pub items: Vec<(Back, u32)>,
}

/// A user's loot summary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backpack {
    /// Whose backpack this is.
    pub user: UserId,
    /// Scored tiers, most valuable first. Tiers with no items are kept.
    pub tiers: Vec<BackpackTier>,
    /// Total rarity points.
    pub total_points: u64,
    /// Currency balance.
    pub greenbacks: u64,
}

impl fmt::Display for Backpack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}'s loot:", self.user)?;
        for tier in &self.tiers {
            writeln!(f, "{} ({} each):", tier.rarity, tier.value)?;
            for (back, count) in &tier.items {
                writeln!(f, "🔙 {}: {count}", back.file_name())?;
            }
            writeln!(f)?;
        }
        write!(f, "Total nominal value is {} greenbacks", self.total_points)
    }
}

/// The loot flows over a selector, a ledger, a source and a sink.
pub struct LootActions<B, S, P> {
    selector: Arc<Selector>,
    bag: Arc<B>,
    source: S,
    sink: P,
    rollback_threshold: u64,
}

impl<B, S, P> LootActions<B, S, P>
where
    B: LootBag,
    S: BackSource,
    P: PlaybackSink,
{
    /// Wires the collaborators together with the default rollback threshold.
    #[must_use]
    pub fn new(selector: Arc<Selector>, bag: Arc<B>, source: S, sink: P) -> Self {
        Self {
            selector,
            bag,
            source,
            sink,
            rollback_threshold: DEFAULT_ROLLBACK_THRESHOLD,
        }
    }

    /// Overrides the points needed for a rollback.
    #[must_use]
    pub const fn with_rollback_threshold(mut self, threshold: u64) -> Self {
        self.rollback_threshold = threshold;
        self
    }

    /// The ledger these actions write to.
    #[must_use]
    pub fn bag(&self) -> &B {
        &self.bag
    }

    /// Draws a weighted back and plays it to the target.
    ///
    /// Once delivered the back joins the user's loot; a Rollback-tier draw
    /// clears the user's loot instead.
    ///
    /// # Errors
    ///
    /// Any selection, load, decode or delivery error. The ledger is
    /// untouched on error.
    pub fn back(&self, target: &PlaybackTarget) -> LootResult<Back> {
        let back = self.selector.pick_weighted()?;
        tracing::info!(user = %target.user, back = %back, "back chosen");

        self.play(target, &back)?;

        if back.rarity() == Rarity::Rollback {
            tracing::info!(user = %target.user, "rollback drawn, clearing loot");
            self.bag.rollback(&target.user);
        } else {
            self.bag.add_loot(&target.user, &back);
        }
        Ok(back)
    }

    /// Plays an owned back, consuming one copy.
    ///
    /// # Errors
    ///
    /// [`LootError::InvalidBackPath`] for a malformed path,
    /// [`LootError::BackNotOwned`] when the user has no copy, otherwise the
    /// load or delivery error, in which case the copy is returned.
    pub fn playback(&self, target: &PlaybackTarget, path: &str) -> LootResult<Back> {
        let back = Back::parse(path)?;

        if !self.bag.remove_loot(&target.user, &back) {
            return Err(LootError::BackNotOwned {
                path: back.path().to_string(),
            });
        }

        if let Err(e) = self.play(target, &back) {
            tracing::info!(user = %target.user, back = %back, error = %e, "playback failed, returning loot");
            self.bag.add_loot(&target.user, &back);
            return Err(e);
        }
        Ok(back)
    }

    /// Spends the user's whole backpack on a Rollback-tier back.
    ///
    /// # Errors
    ///
    /// [`LootError::InsufficientPoints`] below the threshold, otherwise the
    /// selection, load or delivery error. Loot is spent only after a
    /// successful delivery.
    ///
    /// Only the backs counted toward the threshold are spent. Loot recorded
    /// by a concurrent action while the rollback is delivering is kept.
    pub fn rollback(&self, target: &PlaybackTarget) -> LootResult<Back> {
        let counted = self.bag.get_state(&target.user);
        let available = counted.rarity_points(self.selector.catalog().points());
        tracing::info!(user = %target.user, points = available, "rollback requested");

        if available < self.rollback_threshold {
            return Err(LootError::InsufficientPoints {
                required: self.rollback_threshold,
                available,
            });
        }

        let back = self.selector.pick_from_tier(Rarity::Rollback)?;
        self.play(target, &back)?;
        self.bag.spend_loot(&target.user, &counted.loot);
        Ok(back)
    }

    /// The user's loot grouped by scored tier.
    #[must_use]
    pub fn backpack(&self, user: &UserId) -> Backpack {
        let entry = self.bag.get_state(user);
        let points = self.selector.catalog().points();
        let mut grouped = entry.loot_by_rarity();

        let mut tiers: Vec<BackpackTier> = points
            .iter()
            .map(|(rarity, value)| BackpackTier {
                rarity,
                value,
                items: grouped.remove(&rarity).unwrap_or_default(),
            })
            .collect();
        tiers.sort_by(|a, b| b.value.cmp(&a.value));

        Backpack {
            user: user.clone(),
            tiers,
            total_points: entry.rarity_points(points),
            greenbacks: entry.greenbacks,
        }
    }

    /// Owned backs whose name contains `input`, as `(name, path)` pairs
    /// sorted by path.
    #[must_use]
    pub fn autocomplete(&self, user: &UserId, input: &str) -> Vec<(String, String)> {
        let matches: BTreeMap<String, String> = self
            .bag
            .get_state(user)
            .loot
            .into_keys()
            .filter(|back| back.name().contains(input))
            .map(|back| (back.path().to_string(), back.name().to_string()))
            .collect();

        matches.into_iter().map(|(path, name)| (name, path)).collect()
    }

    fn play(&self, target: &PlaybackTarget, back: &Back) -> LootResult<()> {
        let bytes = self.source.open(back)?;
        let frames = decode_frames(&bytes)?;
        tracing::debug!(back = %back, frames = frames.len(), "delivering back");
        self.sink.deliver(target, &frames)
    }
}

impl<B, S, P> fmt::Debug for LootActions<B, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LootActions")
            .field("rollback_threshold", &self.rollback_threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::frames::encode_frames;
    use crate::ledger::MemoryLootBag;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    /// In-memory back files keyed by path.
    struct FakeSource {
        files: HashMap<String, Vec<u8>>,
    }

    impl BackSource for FakeSource {
        fn open(&self, back: &Back) -> LootResult<Vec<u8>> {
            self.files
                .get(back.path())
                .cloned()
                .ok_or_else(|| LootError::BackNotFound(back.path().to_string()))
        }
    }

    /// Records deliveries; users in `absent` have no session.
    #[derive(Default)]
    struct FakeSink {
        absent: HashSet<UserId>,
        delivered: Mutex<Vec<(UserId, usize)>>,
    }

    impl PlaybackSink for FakeSink {
        fn deliver(&self, target: &PlaybackTarget, frames: &[Vec<u8>]) -> LootResult<()> {
            if self.absent.contains(&target.user) {
                return Err(LootError::NoActiveSession(target.user.to_string()));
            }
            self.delivered.lock().push((target.user.clone(), frames.len()));
            Ok(())
        }
    }

    fn back(path: &str) -> Back {
        Back::parse(path).unwrap()
    }

    fn actions(
        paths: &[&str],
        sink: FakeSink,
    ) -> LootActions<MemoryLootBag, FakeSource, FakeSink> {
        let frames = encode_frames(&[b"opus-1".as_slice(), b"opus-2".as_slice()]).unwrap();
        let files = paths.iter().map(|p| ((*p).to_string(), frames.clone())).collect();
        let catalog = Catalog::from_backs(paths.iter().map(|p| back(p)));
        let selector = Arc::new(Selector::with_seed(Arc::new(catalog), 5));

        LootActions::new(selector, Arc::new(MemoryLootBag::new()), FakeSource { files }, sink)
    }

    fn target(user: &str) -> PlaybackTarget {
        PlaybackTarget::new(user, "general")
    }

    #[test]
    fn test_back_records_loot_after_delivery() {
        let actions = actions(&["Common/c.dca"], FakeSink::default());
        let t = target("u1");

        let drawn = actions.back(&t).unwrap();
        assert_eq!(drawn, back("Common/c.dca"));
        assert_eq!(actions.bag().get_state(&t.user).count(&drawn), 1);
        assert_eq!(actions.sink.delivered.lock().as_slice(), &[(t.user.clone(), 2)]);
    }

    #[test]
    fn test_back_without_session_changes_nothing() {
        let sink = FakeSink {
            absent: HashSet::from([UserId::from("u1")]),
            ..FakeSink::default()
        };
        let actions = actions(&["Common/c.dca"], sink);
        let t = target("u1");

        assert_eq!(
            actions.back(&t),
            Err(LootError::NoActiveSession("u1".to_string()))
        );
        assert!(actions.bag().get_state(&t.user).is_empty());
    }

    #[test]
    fn test_rollback_draw_clears_loot() {
        let actions = actions(&["Rollback/reset.dca"], FakeSink::default());
        let t = target("u1");
        actions.bag().add_loot(&t.user, &back("Rare/r.dca"));

        // Any roll that lands outside Rollback hits an empty tier
        let mut drawn = None;
        for _ in 0..2000 {
            if let Ok(b) = actions.back(&t) {
                drawn = Some(b);
                break;
            }
        }
        assert_eq!(drawn, Some(back("Rollback/reset.dca")));
        assert!(actions.bag().get_state(&t.user).loot.is_empty());
    }

    #[test]
    fn test_playback_consumes_one_copy() {
        let actions = actions(&["Rare/r.dca"], FakeSink::default());
        let t = target("u1");
        let r = back("Rare/r.dca");
        actions.bag().add_loot(&t.user, &r);
        actions.bag().add_loot(&t.user, &r);

        assert_eq!(actions.playback(&t, "Rare/r.dca").unwrap(), r);
        assert_eq!(actions.bag().get_state(&t.user).count(&r), 1);
    }

    #[test]
    fn test_playback_requires_ownership() {
        let actions = actions(&["Rare/r.dca"], FakeSink::default());
        let t = target("u1");

        assert_eq!(
            actions.playback(&t, "Rare/r.dca"),
            Err(LootError::BackNotOwned {
                path: "Rare/r.dca".to_string()
            })
        );
        assert!(matches!(
            actions.playback(&t, "not-a-tier/x"),
            Err(LootError::InvalidBackPath { .. })
        ));
    }

    #[test]
    fn test_failed_playback_returns_loot() {
        let sink = FakeSink {
            absent: HashSet::from([UserId::from("u1")]),
            ..FakeSink::default()
        };
        let actions = actions(&["Rare/r.dca"], sink);
        let t = target("u1");
        let r = back("Rare/r.dca");
        let gone = back("Common/deleted.dca");
        actions.bag().add_loot(&t.user, &r);
        actions.bag().add_loot(&t.user, &gone);

        assert!(matches!(actions.playback(&t, "Rare/r.dca"), Err(LootError::NoActiveSession(_))));
        assert_eq!(actions.bag().get_state(&t.user).count(&r), 1);

        assert_eq!(
            actions.playback(&t, "Common/deleted.dca"),
            Err(LootError::BackNotFound("Common/deleted.dca".to_string()))
        );
        assert_eq!(actions.bag().get_state(&t.user).count(&gone), 1);
    }

    #[test]
    fn test_rollback_needs_points() {
        let actions = actions(&["Rollback/reset.dca", "Rare/r.dca"], FakeSink::default());
        let t = target("u1");
        let r = back("Rare/r.dca");
        actions.bag().add_loot(&t.user, &r);

        assert_eq!(
            actions.rollback(&t),
            Err(LootError::InsufficientPoints {
                required: 10_000,
                available: 5000
            })
        );

        actions.bag().add_loot(&t.user, &r);
        assert_eq!(actions.rollback(&t).unwrap(), back("Rollback/reset.dca"));
        assert!(actions.bag().get_state(&t.user).loot.is_empty());
    }

    #[test]
    fn test_rollback_keeps_loot_when_delivery_fails() {
        let sink = FakeSink {
            absent: HashSet::from([UserId::from("u1")]),
            ..FakeSink::default()
        };
        let actions = actions(&["Rollback/reset.dca"], sink).with_rollback_threshold(100);
        let t = target("u1");
        actions.bag().add_loot(&t.user, &back("Common/c.dca"));

        assert!(actions.rollback(&t).is_err());
        assert_eq!(actions.bag().get_state(&t.user).count(&back("Common/c.dca")), 1);
    }

    /// Records a back for the user mid-delivery, as a concurrent draw would.
    struct RacingSink {
        bag: Arc<MemoryLootBag>,
        late: Back,
    }

    impl PlaybackSink for RacingSink {
        fn deliver(&self, target: &PlaybackTarget, _frames: &[Vec<u8>]) -> LootResult<()> {
            self.bag.add_loot(&target.user, &self.late);
            Ok(())
        }
    }

    #[test]
    fn test_rollback_keeps_loot_won_during_delivery() {
        let reset = back("Rollback/reset.dca");
        let r = back("Rare/r.dca");
        let late = back("Common/late.dca");
        let frames = encode_frames(&[b"opus".as_slice()]).unwrap();
        let source = FakeSource {
            files: HashMap::from([(reset.path().to_string(), frames)]),
        };
        let catalog = Arc::new(Catalog::from_backs([reset.clone(), r.clone()]));
        let bag = Arc::new(MemoryLootBag::new());
        let sink = RacingSink {
            bag: Arc::clone(&bag),
            late: late.clone(),
        };
        let actions = LootActions::new(Arc::new(Selector::with_seed(catalog, 1)), Arc::clone(&bag), source, sink);

        let user = UserId::from("u1");
        bag.add_loot(&user, &r);
        bag.add_loot(&user, &r);

        assert_eq!(actions.rollback(&PlaybackTarget::new("u1", "voice")).unwrap(), reset);
        let state = bag.get_state(&user);
        assert_eq!(state.count(&r), 0);
        assert_eq!(state.count(&late), 1);
    }

    #[test]
    fn test_backpack_groups_by_tier() {
        let actions = actions(&["Rare/r.dca"], FakeSink::default());
        let user = UserId::from("amy");
        actions.bag().add_loot(&user, &back("Rare/r.dca"));
        actions.bag().add_loot(&user, &back("Common/b.dca"));
        actions.bag().add_loot(&user, &back("Common/a.dca"));
        actions.bag().add_loot(&user, &back("Common/a.dca"));

        let pack = actions.backpack(&user);
        let order: Vec<Rarity> = pack.tiers.iter().map(|t| t.rarity).collect();
        assert_eq!(order, vec![Rarity::Rare, Rarity::Uncommon, Rarity::Common]);
        assert_eq!(pack.total_points, 5000 + 3 * 125);
        assert!(pack.tiers[1].items.is_empty());

        let text = pack.to_string();
        assert_eq!(
            text,
            "amy's loot:\n\
             Rare (5000 each):\n🔙 r.dca: 1\n\n\
             Uncommon (555 each):\n\n\
             Common (125 each):\n🔙 a.dca: 2\n🔙 b.dca: 1\n\n\
             Total nominal value is 5375 greenbacks"
        );
    }

    #[test]
    fn test_autocomplete_matches_names() {
        let actions = actions(&["Rare/r.dca"], FakeSink::default());
        let user = UserId::from("u1");
        for p in ["Common/zback.dca", "Common/aback.dca", "Rare/front.dca", "Uncommon/sub/backup.dca"] {
            actions.bag().add_loot(&user, &back(p));
        }

        assert_eq!(
            actions.autocomplete(&user, "back"),
            vec![
                ("aback".to_string(), "Common/aback.dca".to_string()),
                ("zback".to_string(), "Common/zback.dca".to_string()),
                ("backup".to_string(), "Uncommon/sub/backup.dca".to_string()),
            ]
        );
        assert!(actions.autocomplete(&UserId::from("nobody"), "").is_empty());
    }
}
