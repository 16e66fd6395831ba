//! Policies controlling loader and storer traversal and encoding.

/// Which related objects a load or store operation follows from its
/// requested roots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FollowPolicy {
    /// Follow the parent relationship upward.
    pub parent: bool,
    /// Follow sibling order both ways.
    pub siblings: bool,
    /// Follow the parent relationship downward.
    pub children: bool,
    /// Follow object-valued properties.
    pub object_properties: bool,
}

impl FollowPolicy {
    /// Touch only the requested objects.
    pub const NOTHING: FollowPolicy = FollowPolicy {
        parent: false,
        siblings: false,
        children: false,
        object_properties: false,
    };

    /// Follow object-valued properties only.
    pub const OBJECT_PROPERTIES: FollowPolicy = FollowPolicy {
        parent: false,
        siblings: false,
        children: false,
        object_properties: true,
    };

    /// Follow every relationship.
    pub const ALL: FollowPolicy = FollowPolicy {
        parent: true,
        siblings: true,
        children: true,
        object_properties: true,
    };
}

impl Default for FollowPolicy {
    fn default() -> Self {
        FollowPolicy::OBJECT_PROPERTIES
    }
}

/// What the loader does with a property that has no stored value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AbsentPropertyPolicy {
    /// Leave the object's current value untouched.
    #[default]
    Ignore,
    /// Reset to the value of a freshly built default instance. Requires
    /// the factory registry to know the class; silently ignored
    /// otherwise.
    Reset,
}

/// When the storer may allocate blank nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlankNodePolicy {
    /// Blank nodes for singly-referenced, unrequested objects and for
    /// list cells. Multiply-referenced or requested objects always get
    /// URIs, keeping blank-node scoping sound.
    #[default]
    PermitBlankObjectNodes,
    /// URIs for all objects; list cells may still be blank.
    NoBlankObjectNodes,
    /// URIs for everything, list cells included.
    NeverUseBlankNodes,
}

/// Whether the storer writes properties unconditionally or skips
/// default-valued ones.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StorePolicy {
    /// Write every readable property.
    #[default]
    Always,
    /// Skip (and remove previous triples of) properties whose value
    /// equals a freshly built default instance's. Requires the factory
    /// registry to know the class; writes unconditionally otherwise.
    IfChanged,
}
