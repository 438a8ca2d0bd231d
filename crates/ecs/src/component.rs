use serde::Serialize;

/// Name of a component schema, e.g. `"ComputePass"`.
///
/// Tags index the store's top-level collections. They are interned as
/// `&'static str` so comparing two tags never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ComponentTag(&'static str);

impl ComponentTag {
    pub const COMPUTE_PASS: Self = Self("ComputePass");
    pub const RENDER_PASS: Self = Self("RenderPass");
    pub const RESOURCE: Self = Self("Resource");
    pub const DEPENDENCY: Self = Self("Dependency");
    pub const EROSION_PARAMS: Self = Self("ErosionParams");
    pub const HEIGHTFIELD: Self = Self("Heightfield");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Data that can be attached to an entity.
///
/// Each implementing type owns exactly one tag. The store keeps one
/// homogeneous container per tag, so two types must never share a tag.
pub trait Component: Serialize + std::fmt::Debug + 'static {
    const TAG: ComponentTag;
}
