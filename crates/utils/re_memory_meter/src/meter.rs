use crate::{
    BufferPolicy, BufferWindow, Footprint, IdentitySet, IntrospectionError, Measurable,
    MeasureError, MeasurementConfig, NodeId, ReferenceVisitor, Shape, Tracker, TrackerFactory,
    oracle::installed_oracle,
};

/// Measures shallow and deep sizes of object graphs.
///
/// ```
/// use std::rc::Rc;
/// use re_memory_meter::{MemoryMeter, impl_measurable};
///
/// struct Node {
///     value: u64,
///     next: Option<Rc<Node>>,
/// }
///
/// impl_measurable!(Node { value, next });
///
/// re_memory_meter::install_layout_oracle();
///
/// let tail = Rc::new(Node { value: 2, next: None });
/// let head = Node { value: 1, next: Some(tail) };
///
/// let meter = MemoryMeter::default();
/// assert_eq!(meter.count_children(Some(&head)).unwrap(), 2);
/// assert_eq!(
///     meter.measure_deep(Some(&head)).unwrap(),
///     2 * std::mem::size_of::<Node>() as u64,
/// );
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryMeter {
    config: MeasurementConfig,
}

impl From<MeasurementConfig> for MemoryMeter {
    fn from(config: MeasurementConfig) -> Self {
        Self { config }
    }
}

impl MemoryMeter {
    pub fn new(config: MeasurementConfig) -> Self {
        Self { config }
    }

    /// Configured from the environment, see [`MeasurementConfig::from_env`].
    pub fn from_env() -> Self {
        Self::new(MeasurementConfig::from_env())
    }

    #[inline]
    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    pub fn with_tracker_factory(self, tracker_factory: TrackerFactory) -> Self {
        Self::new(self.config.with_tracker_factory(tracker_factory))
    }

    pub fn with_buffer_policy(self, buffer_policy: BufferPolicy) -> Self {
        Self::new(self.config.with_buffer_policy(buffer_policy))
    }

    /// The shallow size of `node`, as reported by the installed [`crate::SizeOracle`].
    #[inline]
    pub fn measure(&self, node: &dyn Measurable) -> Result<u64, MeasureError> {
        let oracle = installed_oracle().ok_or(MeasureError::UninitializedOracle)?;
        Ok(oracle.shallow_size(node))
    }

    /// What a buffer-like node costs on top of its shallow size.
    #[inline]
    pub fn measure_buffer(&self, window: BufferWindow) -> u64 {
        self.config.buffer_policy().buffer_size(window)
    }

    /// The retained size of `root`: the shallow sizes of every node reachable from it,
    /// each counted once, plus the configured cost of every buffer-like node.
    ///
    /// Fails with [`MeasureError::NullRoot`] if there is no root.
    pub fn measure_deep(&self, root: Option<&dyn Measurable>) -> Result<u64, MeasureError> {
        let mut total_bytes = 0;
        self.walk_deep(root, |_node, cost| {
            total_bytes += cost.total();
        })?;
        Ok(total_bytes)
    }

    /// Like [`Self::measure_deep`], but with a per-type breakdown of where the bytes went.
    pub fn measure_deep_footprint(
        &self,
        root: Option<&dyn Measurable>,
    ) -> Result<Footprint, MeasureError> {
        let mut footprint = Footprint::default();
        self.walk_deep(root, |node, cost| {
            footprint.add(node.type_name(), cost.shallow_bytes, cost.buffer_bytes);
        })?;
        Ok(footprint)
    }

    /// The number of distinct nodes reachable from `root`, including `root`.
    ///
    /// Unlike [`Self::measure_deep`] this ignores the configuration: it always tracks nodes
    /// with a fresh [`IdentitySet`], never consults the size oracle, and expands buffer-like
    /// nodes like any other node, so their backing storage is counted too.
    ///
    /// Nodes are told apart by address and type, so distinct boxed values of the same
    /// zero-sized type may share an address and be counted once.
    ///
    /// Fails with [`MeasureError::NullRoot`] if there is no root.
    pub fn count_children(&self, root: Option<&dyn Measurable>) -> Result<u64, MeasureError> {
        let root = root.ok_or(MeasureError::NullRoot)?;

        let mut walk = Walk::new(root, Box::new(IdentitySet::default()));
        let mut num_nodes = 0;
        while let Some(node) = walk.stack.pop() {
            num_nodes += 1;
            walk.expand(node)?;
        }

        Ok(num_nodes)
    }

    fn walk_deep<'a>(
        &self,
        root: Option<&'a dyn Measurable>,
        mut on_node: impl FnMut(&'a dyn Measurable, NodeCost),
    ) -> Result<(), MeasureError> {
        let root = root.ok_or(MeasureError::NullRoot)?;
        let oracle = installed_oracle().ok_or(MeasureError::UninitializedOracle)?;

        let mut walk = Walk::new(root, (self.config.tracker_factory())());
        let mut num_nodes = 0_u64;
        let mut total_bytes = 0_u64;
        while let Some(node) = walk.stack.pop() {
            num_nodes += 1;

            let shallow_bytes = oracle.shallow_size(node);
            let buffer_bytes = match node.shape() {
                // Elements for arrays, fields for composites:
                Shape::Array | Shape::Composite => {
                    walk.expand(node)?;
                    0
                }
                // Buffers are leaves; their contents are priced by policy instead.
                Shape::Buffer(window) => self.measure_buffer(window),
            };

            let cost = NodeCost {
                shallow_bytes,
                buffer_bytes,
            };
            total_bytes += cost.total();
            on_node(node, cost);
        }

        log::debug!(
            "Measured {total_bytes} B in {num_nodes} nodes from {}, with at most {} pending",
            root.type_name(),
            walk.max_pending
        );

        Ok(())
    }
}

#[derive(Clone, Copy)]
struct NodeCost {
    shallow_bytes: u64,
    buffer_bytes: u64,
}

impl NodeCost {
    #[inline]
    fn total(self) -> u64 {
        self.shallow_bytes + self.buffer_bytes
    }
}

/// The state of one traversal: nodes still to visit, and every node ever reached.
///
/// An explicit stack instead of recursion, so that arbitrarily deep graphs
/// (long linked lists) are bounded by memory rather than by the call stack.
struct Walk<'a> {
    /// Only ever holds nodes that were not tracked before they were pushed.
    stack: Vec<&'a dyn Measurable>,
    tracker: Box<dyn Tracker>,
    max_pending: usize,
}

impl<'a> Walk<'a> {
    fn new(root: &'a dyn Measurable, mut tracker: Box<dyn Tracker>) -> Self {
        tracker.insert(NodeId::of(root));
        Self {
            stack: vec![root],
            tracker,
            max_pending: 1,
        }
    }

    fn expand(&mut self, node: &'a dyn Measurable) -> Result<(), IntrospectionError> {
        node.visit_references(self)?;
        self.max_pending = self.max_pending.max(self.stack.len());
        Ok(())
    }
}

impl<'a> ReferenceVisitor<'a> for Walk<'a> {
    #[inline]
    fn visit(&mut self, node: &'a dyn Measurable) {
        if self.tracker.insert(NodeId::of(node)) {
            self.stack.push(node);
        }
    }
}
