use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::device_config::DeviceConfig;
use crate::models::device_key::DeviceKey;
use crate::models::error::CaptureError;
use crate::registry::frame_source::FrameSource;

/// Live sources and the device keys they claim, guarded together so the
/// duplicate-claim check and the insert are one atomic step.
#[derive(Default)]
struct RegistryInner {
    sources: Vec<Arc<FrameSource>>,
    claimed: HashMap<DeviceKey, Arc<FrameSource>>,
}

/// What [`DeviceRegistry::claim`] did.
#[derive(Debug)]
pub enum Claim {
    /// A live source already held the key; it is returned unchanged.
    Existing(Arc<FrameSource>),
    Created(Arc<FrameSource>),
}

impl Claim {
    pub fn source(&self) -> &Arc<FrameSource> {
        match self {
            Self::Existing(s) | Self::Created(s) => s,
        }
    }

    pub fn into_source(self) -> Arc<FrameSource> {
        match self {
            Self::Existing(s) | Self::Created(s) => s,
        }
    }
}

/// Registry of live frame sources, keyed by [`DeviceKey`].
///
/// Never holds two live sources for the same key.
#[derive(Default)]
pub struct DeviceRegistry {
    inner: Mutex<RegistryInner>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve_key(config: &DeviceConfig) -> DeviceKey {
        DeviceKey::resolve(config)
    }

    pub fn find_existing(&self, key: &DeviceKey) -> Option<Arc<FrameSource>> {
        self.inner.lock().claimed.get(key).cloned()
    }

    pub fn get(&self, id: Uuid) -> Option<Arc<FrameSource>> {
        self.inner
            .lock()
            .sources
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    /// Return the live source for `config`'s key, or build one with `create`.
    ///
    /// `create` runs without the registry lock held, so readers are not
    /// blocked while a driver opens. If another claim of the same key lands
    /// meanwhile, the freshly built source is disposed and the winner is
    /// returned as `Existing`.
    pub fn claim<F>(&self, config: &DeviceConfig, create: F) -> Result<Claim, CaptureError>
    where
        F: FnOnce(&DeviceConfig) -> Result<FrameSource, CaptureError>,
    {
        let key = DeviceKey::resolve(config);
        if let Some(existing) = self.find_existing(&key) {
            return Ok(Claim::Existing(existing));
        }

        let source = Arc::new(create(config)?);

        let mut inner = self.inner.lock();
        if let Some(existing) = inner.claimed.get(&key).cloned() {
            drop(inner);
            log::warn!("{}: claimed concurrently, discarding duplicate", key);
            source.dispose();
            return Ok(Claim::Existing(existing));
        }
        inner.claimed.insert(key, Arc::clone(&source));
        inner.sources.push(Arc::clone(&source));
        Ok(Claim::Created(source))
    }

    /// Drop `source` from the registry, freeing its key.
    pub fn remove(&self, source: &FrameSource) -> Option<Arc<FrameSource>> {
        let mut inner = self.inner.lock();
        let index = inner.sources.iter().position(|s| s.id() == source.id())?;
        let removed = inner.sources.remove(index);
        if inner
            .claimed
            .get(removed.key())
            .is_some_and(|s| s.id() == removed.id())
        {
            inner.claimed.remove(removed.key());
        }
        Some(removed)
    }

    pub fn sources(&self) -> Vec<Arc<FrameSource>> {
        self.inner.lock().sources.clone()
    }

    /// Remove and return every source.
    pub fn drain(&self) -> Vec<Arc<FrameSource>> {
        let mut inner = self.inner.lock();
        inner.claimed.clear();
        std::mem::take(&mut inner.sources)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::registry::frame_source::testing::*;

    fn build(opened: &AtomicUsize) -> impl FnOnce(&DeviceConfig) -> Result<FrameSource, CaptureError> + '_ {
        move |config| {
            opened.fetch_add(1, Ordering::SeqCst);
            Ok(FrameSource::new(
                config.clone(),
                Box::new(ScriptedDevice(Script::new())),
            ))
        }
    }

    #[test]
    fn duplicate_key_returns_existing_handle() {
        let registry = DeviceRegistry::new();
        let opened = AtomicUsize::new(0);

        let mut first = config("Finish cam", "/dev/x");
        first.file_path = Some(PathBuf::from("/videos/finish.mp4"));
        let mut second = config("Finish cam copy", "/dev/y");
        second.file_path = Some(PathBuf::from("/videos/finish.mp4"));

        let a = registry.claim(&first, build(&opened)).unwrap();
        let b = registry.claim(&second, build(&opened)).unwrap();

        assert!(matches!(a, Claim::Created(_)));
        assert!(matches!(b, Claim::Existing(_)));
        assert!(Arc::ptr_eq(a.source(), b.source()));
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn readers_are_not_blocked_while_creating() {
        let registry = DeviceRegistry::new();
        let existing = registry
            .claim(&config("CamA", "/dev/camA"), |c| {
                Ok(FrameSource::new(c.clone(), Box::new(ScriptedDevice(Script::new()))))
            })
            .unwrap()
            .into_source();

        let cfg = config("CamB", "/dev/camB");
        let claim = registry
            .claim(&cfg, |c| {
                // Would deadlock if the registry lock were held here.
                assert_eq!(registry.sources().len(), 1);
                assert!(registry.get(existing.id()).is_some());
                Ok(FrameSource::new(c.clone(), Box::new(ScriptedDevice(Script::new()))))
            })
            .unwrap();
        assert!(matches!(claim, Claim::Created(_)));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn losing_a_concurrent_claim_disposes_the_duplicate() {
        let registry = DeviceRegistry::new();
        let cfg = config("CamA", "/dev/camA");
        let mut winner = None;

        let claim = registry
            .claim(&cfg, |c| {
                winner = Some(
                    registry
                        .claim(c, |c| {
                            Ok(FrameSource::new(c.clone(), Box::new(ScriptedDevice(Script::new()))))
                        })
                        .unwrap()
                        .into_source(),
                );
                Ok(FrameSource::new(c.clone(), Box::new(ScriptedDevice(Script::new()))))
            })
            .unwrap();

        let winner = winner.unwrap();
        assert!(matches!(claim, Claim::Existing(_)));
        assert!(Arc::ptr_eq(claim.source(), &winner));
        assert!(!winner.is_disposed());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failed_create_claims_nothing() {
        let registry = DeviceRegistry::new();
        let cfg = config("CamA", "/dev/camA");

        let result = registry.claim(&cfg, |_| Err(CaptureError::DeviceNotAvailable));
        assert!(result.is_err());
        assert!(registry.find_existing(&DeviceKey::resolve(&cfg)).is_none());
    }

    #[test]
    fn remove_frees_the_key() {
        let registry = DeviceRegistry::new();
        let opened = AtomicUsize::new(0);
        let cfg = config("CamA", "/dev/camA");

        let source = registry.claim(&cfg, build(&opened)).unwrap().into_source();
        assert!(registry.remove(&source).is_some());
        assert!(registry.is_empty());

        let again = registry.claim(&cfg, build(&opened)).unwrap();
        assert!(matches!(again, Claim::Created(_)));
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn lookup_by_id() {
        let registry = DeviceRegistry::new();
        let opened = AtomicUsize::new(0);
        let source = registry
            .claim(&config("CamA", "/dev/camA"), build(&opened))
            .unwrap()
            .into_source();

        assert!(registry.get(source.id()).is_some());
        assert!(registry.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn drain_empties_everything() {
        let registry = DeviceRegistry::new();
        let opened = AtomicUsize::new(0);
        registry.claim(&config("A", "/dev/a"), build(&opened)).unwrap();
        registry.claim(&config("B", "/dev/b"), build(&opened)).unwrap();

        assert_eq!(registry.drain().len(), 2);
        assert!(registry.is_empty());
        assert!(registry
            .find_existing(&DeviceKey::resolve(&config("A", "/dev/a")))
            .is_none());
    }
}
