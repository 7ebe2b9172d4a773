//! Keyed widget-tree reconciler.
//!
//! Each named context (the main tree, overlays, dialogs...) keeps the last
//! rendered snapshot of its nodes. [`Reconciler::reconcile`] diffs a freshly
//! built widget tree against that snapshot and returns the ordered patch list
//! for the render surface; the new snapshot is committed only when the whole
//! cycle succeeded.
pub mod config;
mod diff_engine;
pub mod errors;
pub mod fingerprint;
pub mod html_generator;
pub mod props;
pub mod registry;
pub mod types;
pub mod widget;

#[cfg(feature = "python")]
mod converters;
#[cfg(feature = "python")]
mod python;

pub use config::ReconcilerConfig;
pub use errors::ReconcilerError;
pub use fingerprint::{Fingerprint, fingerprint};
pub use html_generator::{HtmlStubGenerator, StubGenerator, StubRegistry, StubRequest};
pub use props::{PropObject, PropValue, Props};
pub use registry::NodeRegistry;
pub use types::{
    CallbackBinding, IdGenerator, Identity, Key, Patch, PatchAction, ReconciliationResult,
    RenderedNode, TargetId,
};
pub use widget::{Widget, WidgetNode};

use diff_engine::DiffEngine;
use once_cell::sync::Lazy;
use std::collections::HashMap;

static EMPTY_REGISTRY: Lazy<NodeRegistry> = Lazy::new(NodeRegistry::new);

/// Owns one [`NodeRegistry`] per named context and the id generator they share.
///
/// No internal locking: cycles must be serialized by the caller.
#[derive(Debug)]
pub struct Reconciler {
    config: ReconcilerConfig,
    context_maps: HashMap<String, NodeRegistry>,
    ids: IdGenerator,
    stubs: StubRegistry,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    /// Default configuration and no stub generators (fallback stubs only).
    pub fn new() -> Self {
        Self::with_stubs(StubRegistry::new())
    }

    pub fn with_stubs(stubs: StubRegistry) -> Self {
        Self::build(ReconcilerConfig::default(), stubs)
    }

    /// Fails with [`ReconcilerError::Config`] when `config` does not validate.
    pub fn with_config(
        config: ReconcilerConfig,
        stubs: StubRegistry,
    ) -> Result<Self, ReconcilerError> {
        config.validate()?;
        Ok(Self::build(config, stubs))
    }

    fn build(config: ReconcilerConfig, stubs: StubRegistry) -> Self {
        log::info!(
            "Reconciler initialized (main context '{}', id prefix '{}')",
            config.main_context,
            config.id_prefix
        );
        let mut context_maps = HashMap::new();
        context_maps.insert(config.main_context.clone(), NodeRegistry::new());

        Reconciler {
            ids: IdGenerator::new(config.id_prefix.clone()),
            config,
            context_maps,
            stubs,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn stubs_mut(&mut self) -> &mut StubRegistry {
        &mut self.stubs
    }

    /// Last committed registry of `context`, or an empty one.
    pub fn registry(&self, context: &str) -> &NodeRegistry {
        self.context_maps.get(context).unwrap_or(&EMPTY_REGISTRY)
    }

    /// Names of the contexts currently holding a registry, sorted.
    pub fn contexts(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.context_maps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Drops a context's registry, e.g. when an overlay is torn down. Unknown contexts are ignored.
    pub fn clear_context(&mut self, context: &str) {
        if self.context_maps.remove(context).is_some() {
            log::info!("Reconciler: cleared context '{}'", context);
        }
    }

    pub fn clear_all_contexts(&mut self) {
        self.context_maps.clear();
        self.context_maps
            .insert(self.config.main_context.clone(), NodeRegistry::new());
        log::info!("Reconciler: cleared all contexts");
    }

    /// Replaces the registry of `context` wholesale.
    pub fn commit(&mut self, context: &str, registry: NodeRegistry) {
        self.context_maps.insert(context.to_string(), registry);
    }

    /// Runs one cycle for `context`: diff `new_root` (or nothing, to tear the
    /// tree down) under `parent_id`, commit the new registry and return the patches.
    ///
    /// On error nothing is committed and the previous registry stays authoritative.
    pub fn reconcile(
        &mut self,
        context: &str,
        new_root: Option<&dyn Widget>,
        parent_id: impl Into<TargetId>,
    ) -> Result<ReconciliationResult, ReconcilerError> {
        let parent_id = parent_id.into();
        let old_tree = self.context_maps.get(context).unwrap_or(&EMPTY_REGISTRY);
        log::debug!(
            "Reconciler: reconciling context '{}' under '{}' ({} previous nodes, root: {})",
            context,
            parent_id,
            old_tree.len(),
            if new_root.is_some() { "Some" } else { "None" }
        );

        let engine = DiffEngine::new(
            old_tree,
            &mut self.ids,
            &self.stubs,
            self.config.strict_identities,
        );
        let (result, new_tree) = engine.reconcile(new_root, &parent_id)?;

        self.commit(context, new_tree);
        Ok(result)
    }
}
