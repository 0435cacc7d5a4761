//! Somewhere to dump intermediate geometry while partitioning, for debugging bad results.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use geojson::Feature;

use crate::PartitionError;

static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// A directory that many partitioning calls may share, even concurrently. Each call gets its own
/// `Namespace`, and every file it writes is prefixed by that.
#[derive(Clone, Debug)]
pub struct ScratchWorkspace {
    dir: PathBuf,
}

impl ScratchWorkspace {
    pub fn new<P: Into<PathBuf>>(dir: P) -> ScratchWorkspace {
        ScratchWorkspace { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Allocates a fresh `<process id>_<sequence>` prefix. Nothing touches the disk unless
    /// `enabled`.
    pub fn namespace(&self, enabled: bool) -> Namespace {
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Namespace {
            dir: self.dir.clone(),
            prefix: format!("{}_{}", std::process::id(), seq),
            enabled,
        }
    }
}

pub struct Namespace {
    dir: PathBuf,
    prefix: String,
    enabled: bool,
}

impl Namespace {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn path(&self, stage: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.geojson", self.prefix, stage))
    }

    /// Writes one stage as a FeatureCollection. The features are only built when enabled.
    pub fn write<F: FnOnce() -> Vec<Feature>>(
        &self,
        stage: &str,
        features: F,
    ) -> Result<(), PartitionError> {
        if !self.enabled {
            return Ok(());
        }
        let path = self.path(stage);
        fs_err::create_dir_all(&self.dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| geom::io::write_features(&path, features()))
            .with_context(|| format!("writing stage {}", stage))
            .map_err(PartitionError::Scratch)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use geom::Pt2D;

    use super::*;

    #[test]
    fn namespaces_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchWorkspace::new(dir.path());
        let prefixes: BTreeSet<String> = (0..50)
            .map(|_| scratch.namespace(false).prefix().to_string())
            .collect();
        assert_eq!(prefixes.len(), 50);

        // Across threads too
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let scratch = scratch.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| scratch.namespace(false).prefix().to_string())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all = BTreeSet::new();
        for handle in handles {
            for prefix in handle.join().unwrap() {
                assert!(all.insert(prefix));
            }
        }
    }

    #[test]
    fn only_writes_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchWorkspace::new(dir.path().join("nested"));

        let off = scratch.namespace(false);
        off.write("points", || vec![geom::io::feature(Pt2D::new(1.0, 2.0).to_geojson())])
            .unwrap();
        assert!(!off.path("points").exists());

        let on = scratch.namespace(true);
        on.write("points", || vec![geom::io::feature(Pt2D::new(1.0, 2.0).to_geojson())])
            .unwrap();
        assert!(on.path("points").exists());
        assert_eq!(geom::io::read_features(on.path("points")).unwrap().len(), 1);
    }
}
