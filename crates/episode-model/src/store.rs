//! Persistence port for episode records.
//!
//! Operations are simple keyed reads and writes. Nothing here spans a
//! transaction; multi-step edits are expected to tolerate a crash between
//! writes.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use castkit_common::error::{CastError, CastResult};
use serde::{Deserialize, Serialize};

use crate::episode::{Episode, Podcast, ReusableAsset};
use crate::ids::{AssetId, EpisodeId, PodcastId, SegmentId};
use crate::segment::{sort_by_position, Segment};

/// Keyed storage for podcasts, episodes, segments, and library assets.
pub trait EpisodeStore: Send + Sync {
    fn podcast(&self, id: PodcastId) -> CastResult<Podcast>;
    fn put_podcast(&self, podcast: &Podcast) -> CastResult<()>;

    fn episode(&self, id: EpisodeId) -> CastResult<Episode>;
    fn put_episode(&self, episode: &Episode) -> CastResult<()>;

    fn segment(&self, id: SegmentId) -> CastResult<Segment>;
    /// Segments of one episode in playback order.
    fn segments_for_episode(&self, episode_id: EpisodeId) -> CastResult<Vec<Segment>>;
    fn put_segment(&self, segment: &Segment) -> CastResult<()>;
    fn delete_segment(&self, id: SegmentId) -> CastResult<()>;

    fn asset(&self, id: AssetId) -> CastResult<ReusableAsset>;
    fn put_asset(&self, asset: &ReusableAsset) -> CastResult<()>;
}

/// Serialized form of a whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub podcasts: Vec<Podcast>,
    #[serde(default)]
    pub episodes: Vec<Episode>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub assets: Vec<ReusableAsset>,
}

#[derive(Debug, Default)]
struct Tables {
    podcasts: HashMap<PodcastId, Podcast>,
    episodes: HashMap<EpisodeId, Episode>,
    segments: HashMap<SegmentId, Segment>,
    assets: HashMap<AssetId, ReusableAsset>,
}

impl Tables {
    fn from_catalog(catalog: Catalog) -> Self {
        Self {
            podcasts: catalog.podcasts.into_iter().map(|p| (p.id, p)).collect(),
            episodes: catalog.episodes.into_iter().map(|e| (e.id, e)).collect(),
            segments: catalog.segments.into_iter().map(|s| (s.id, s)).collect(),
            assets: catalog.assets.into_iter().map(|a| (a.id, a)).collect(),
        }
    }

    fn to_catalog(&self) -> Catalog {
        let mut segments: Vec<Segment> = self.segments.values().cloned().collect();
        segments.sort_by(|a, b| {
            a.episode_id
                .cmp(&b.episode_id)
                .then_with(|| a.position.cmp(&b.position))
        });
        Catalog {
            podcasts: self.podcasts.values().cloned().collect(),
            episodes: self.episodes.values().cloned().collect(),
            segments,
            assets: self.assets.values().cloned().collect(),
        }
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            tables: RwLock::new(Tables::from_catalog(catalog)),
        }
    }

    pub fn snapshot(&self) -> Catalog {
        self.read().to_catalog()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl EpisodeStore for MemoryStore {
    fn podcast(&self, id: PodcastId) -> CastResult<Podcast> {
        self.read()
            .podcasts
            .get(&id)
            .cloned()
            .ok_or_else(|| CastError::not_found("Podcast", id))
    }

    fn put_podcast(&self, podcast: &Podcast) -> CastResult<()> {
        self.write().podcasts.insert(podcast.id, podcast.clone());
        Ok(())
    }

    fn episode(&self, id: EpisodeId) -> CastResult<Episode> {
        self.read()
            .episodes
            .get(&id)
            .cloned()
            .ok_or_else(|| CastError::not_found("Episode", id))
    }

    fn put_episode(&self, episode: &Episode) -> CastResult<()> {
        self.write().episodes.insert(episode.id, episode.clone());
        Ok(())
    }

    fn segment(&self, id: SegmentId) -> CastResult<Segment> {
        self.read()
            .segments
            .get(&id)
            .cloned()
            .ok_or_else(|| CastError::not_found("Segment", id))
    }

    fn segments_for_episode(&self, episode_id: EpisodeId) -> CastResult<Vec<Segment>> {
        let mut segments: Vec<Segment> = self
            .read()
            .segments
            .values()
            .filter(|s| s.episode_id == episode_id)
            .cloned()
            .collect();
        sort_by_position(&mut segments);
        Ok(segments)
    }

    fn put_segment(&self, segment: &Segment) -> CastResult<()> {
        self.write().segments.insert(segment.id, segment.clone());
        Ok(())
    }

    fn delete_segment(&self, id: SegmentId) -> CastResult<()> {
        self.write()
            .segments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CastError::not_found("Segment", id))
    }

    fn asset(&self, id: AssetId) -> CastResult<ReusableAsset> {
        self.read()
            .assets
            .get(&id)
            .cloned()
            .ok_or_else(|| CastError::not_found("Asset", id))
    }

    fn put_asset(&self, asset: &ReusableAsset) -> CastResult<()> {
        self.write().assets.insert(asset.id, asset.clone());
        Ok(())
    }
}

/// A [`MemoryStore`] mirrored to a single JSON catalog file.
///
/// Every write rewrites the file through a temporary sibling and a rename, so
/// readers never observe a half-written catalog.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    inner: MemoryStore,
    /// Held from snapshot to rename so an older snapshot never replaces a
    /// newer file.
    flush_lock: Mutex<()>,
}

impl JsonStore {
    /// Open the catalog at `path`, starting empty if the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> CastResult<Self> {
        let path = path.as_ref().to_path_buf();
        let catalog = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Catalog::default()
        };
        tracing::debug!(path = %path.display(), "Opened episode catalog");
        Ok(Self {
            path,
            inner: MemoryStore::from_catalog(catalog),
            flush_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> CastResult<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let _guard = self
            .flush_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let json = serde_json::to_string_pretty(&self.inner.snapshot())?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| CastError::Io(e.error))?;
        Ok(())
    }
}

impl EpisodeStore for JsonStore {
    fn podcast(&self, id: PodcastId) -> CastResult<Podcast> {
        self.inner.podcast(id)
    }

    fn put_podcast(&self, podcast: &Podcast) -> CastResult<()> {
        self.inner.put_podcast(podcast)?;
        self.flush()
    }

    fn episode(&self, id: EpisodeId) -> CastResult<Episode> {
        self.inner.episode(id)
    }

    fn put_episode(&self, episode: &Episode) -> CastResult<()> {
        self.inner.put_episode(episode)?;
        self.flush()
    }

    fn segment(&self, id: SegmentId) -> CastResult<Segment> {
        self.inner.segment(id)
    }

    fn segments_for_episode(&self, episode_id: EpisodeId) -> CastResult<Vec<Segment>> {
        self.inner.segments_for_episode(episode_id)
    }

    fn put_segment(&self, segment: &Segment) -> CastResult<()> {
        self.inner.put_segment(segment)?;
        self.flush()
    }

    fn delete_segment(&self, id: SegmentId) -> CastResult<()> {
        self.inner.delete_segment(id)?;
        self.flush()
    }

    fn asset(&self, id: AssetId) -> CastResult<ReusableAsset> {
        self.inner.asset(id)
    }

    fn put_asset(&self, asset: &ReusableAsset) -> CastResult<()> {
        self.inner.put_asset(asset)?;
        self.flush()
    }
}
