//! Headset passthrough camera provider.
//!
//! Platform camera access is plugged in through [`PassthroughBackend`]
//! adapters registered up front in a [`BackendRegistry`]. A backend may
//! expose several frame sources; the provider prefers the ones whose names
//! suggest the left color camera.

use std::fmt;
use std::rc::Rc;

use super::{CameraFrame, CameraProvider, ProviderConfig};

/// Adapter over one platform's passthrough camera capability.
pub trait PassthroughBackend {
    /// Start camera access.
    fn start(&mut self, config: &ProviderConfig) -> Result<(), String>;

    /// Per-tick polling hook.
    fn poll(&mut self) {}

    /// Names of every frame source the backend exposes.
    fn frame_sources(&self) -> Vec<String>;

    fn frame(&self, source: &str) -> Option<&CameraFrame>;

    fn stop(&mut self);
}

type BackendConstructor = Rc<dyn Fn() -> Box<dyn PassthroughBackend>>;

#[derive(Clone)]
struct Registration {
    name: String,
    create: BackendConstructor,
}

/// Explicitly registered passthrough backends, in registration order.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    entries: Vec<Registration>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| &entry.name))
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, create: F)
    where
        F: Fn() -> Box<dyn PassthroughBackend> + 'static,
    {
        let name = name.into();
        tracing::debug!("Registered passthrough backend {}", name);
        self.entries.push(Registration {
            name,
            create: Rc::new(create),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }
}

/// Rank of a frame source name; lower is preferred.
pub fn source_affinity(name: &str) -> i32 {
    let name = name.to_lowercase();
    let mut score = 100;
    if name.contains("left") {
        score -= 25;
    }
    if name.contains("color") {
        score -= 20;
    }
    if name.contains("camera") {
        score -= 10;
    }
    if name.contains("texture") {
        score -= 5;
    }
    score
}

struct ActiveBackend {
    name: String,
    backend: Box<dyn PassthroughBackend>,
    sources: Vec<String>,
}

pub struct PassthroughProvider {
    registry: BackendRegistry,
    active: Option<ActiveBackend>,
}

impl PassthroughProvider {
    pub const NAME: &'static str = "Headset passthrough camera";

    pub fn new(registry: &BackendRegistry) -> Self {
        Self {
            registry: registry.clone(),
            active: None,
        }
    }

    /// Frame sources of the attached backend, best first.
    pub fn ranked_sources(&self) -> &[String] {
        self.active
            .as_ref()
            .map(|active| active.sources.as_slice())
            .unwrap_or(&[])
    }
}

impl CameraProvider for PassthroughProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, config: &ProviderConfig) -> Result<(), String> {
        self.dispose();

        if self.registry.is_empty() {
            return Err(
                "No headset passthrough camera backend is registered for this platform.".into(),
            );
        }

        let mut reason = String::new();
        for entry in &self.registry.entries {
            let mut backend = (entry.create)();
            if let Err(e) = backend.start(config) {
                tracing::warn!("Passthrough backend {} failed to start: {}", entry.name, e);
                reason = format!("{} failed to start: {}", entry.name, e);
                backend.stop();
                continue;
            }

            let mut sources = backend.frame_sources();
            if sources.is_empty() {
                tracing::warn!("Passthrough backend {} exposes no frame source", entry.name);
                reason = format!("{} exposes no camera frame source.", entry.name);
                backend.stop();
                continue;
            }
            sources.sort_by_key(|name| source_affinity(name));

            tracing::info!(
                "Passthrough backend {} attached, sources: {:?}",
                entry.name,
                sources
            );
            self.active = Some(ActiveBackend {
                name: entry.name.clone(),
                backend,
                sources,
            });
            return Ok(());
        }

        Err(reason)
    }

    fn tick(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.backend.poll();
        }
    }

    fn current_frame(&self) -> Option<&CameraFrame> {
        let active = self.active.as_ref()?;
        active
            .sources
            .iter()
            .filter_map(|source| active.backend.frame(source))
            .find(|frame| !frame.is_empty())
    }

    fn dispose(&mut self) {
        if let Some(mut active) = self.active.take() {
            tracing::debug!("Stopping passthrough backend {}", active.name);
            active.backend.stop();
        }
    }
}

impl Drop for PassthroughProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}
