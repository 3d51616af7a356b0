use std::env;

/// Name of the bundled library preloaded by default
pub const CORE_LIBRARY: &str = "_core";

const DEFAULT_MAX_DEPTH: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Nested evaluations allowed before a run fails with
    /// [`crate::runtime::Error::DepthExceeded`]
    pub max_depth: usize,
    /// Quasiquoted symbols ending in this character are renamed per expansion
    pub gensym_marker: char,
    /// Libraries loaded from the script store when an interpreter is built
    pub preload: Vec<Box<str>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: max_depth_from_env(),
            gensym_marker: '#',
            preload: vec![CORE_LIBRARY.into()],
        }
    }
}

impl Options {
    pub fn without_preload(mut self) -> Self {
        self.preload.clear();
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

fn max_depth_from_env() -> usize {
    env::var("SPRIG_MAX_DEPTH")
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .filter(|depth| *depth > 0)
        .unwrap_or(DEFAULT_MAX_DEPTH)
}
