//! Traversal properties, checked with an oracle that gives every node the same size.

use std::cell::OnceCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use re_memory_meter::{
    BufferPolicy, IdentitySet, IntrospectionError, Measurable, MeasureError, MemoryMeter,
    ReferenceVisitor, SharedBytes, SizeOracle, Tracker, TrackerFactory, TypeFootprint,
    impl_measurable,
};

const NODE_BYTES: u64 = 16;

struct FixedOracle;

impl SizeOracle for FixedOracle {
    fn shallow_size(&self, _node: &dyn Measurable) -> u64 {
        NODE_BYTES
    }
}

fn meter() -> MemoryMeter {
    // Every test installs the same oracle; whoever comes first wins.
    re_memory_meter::install_oracle(FixedOracle).ok();
    MemoryMeter::default()
}

// ---

struct Tree {
    label: String,
    children: Vec<Rc<Tree>>,
}

impl_measurable!(Tree { label, children });

fn leaf(label: &str) -> Rc<Tree> {
    Rc::new(Tree {
        label: label.to_owned(),
        children: Vec::new(),
    })
}

struct Pair {
    left: Rc<String>,
    right: Rc<String>,
}

impl_measurable!(Pair { left, right });

/// Half of a reference cycle.
#[derive(Default)]
struct Peer {
    other: OnceCell<Rc<Peer>>,
}

impl_measurable!(Peer { other });

struct Base {
    parent: Option<Rc<String>>,
}

impl_measurable!(Base { parent });

struct Derived {
    base: Base,
    own: Box<u32>,
    singleton: &'static String,
}

impl_measurable!(Derived {
    base,
    own,
    singleton
});

// ---

#[test]
fn deep_size_is_the_sum_of_shallow_sizes() {
    let meter = meter();

    let grandchild = leaf("grandchild");
    let child = Rc::new(Tree {
        label: "child".to_owned(),
        children: vec![grandchild.clone()],
    });
    let sibling = leaf("sibling");
    let root = Tree {
        label: "root".to_owned(),
        children: vec![child.clone(), sibling.clone()],
    };

    let nodes: [&dyn Measurable; 4] = [&root, &*child, &*sibling, &*grandchild];
    let expected: u64 = nodes.iter().map(|node| meter.measure(*node).unwrap()).sum();

    assert_eq!(meter.measure_deep(Some(&root)).unwrap(), expected);
    assert_eq!(expected, 4 * NODE_BYTES);
    assert_eq!(meter.count_children(Some(&root)).unwrap(), 4);
}

#[test]
fn cycles_terminate_and_count_each_node_once() {
    let meter = meter();

    let a = Rc::new(Peer::default());
    let b = Rc::new(Peer::default());
    a.other.set(b.clone()).ok();
    b.other.set(a.clone()).ok();

    assert_eq!(meter.measure_deep(Some(&*a)).unwrap(), 2 * NODE_BYTES);
    assert_eq!(meter.count_children(Some(&*a)).unwrap(), 2);

    // A node pointing at itself:
    let selfish = Rc::new(Peer::default());
    selfish.other.set(selfish.clone()).ok();
    assert_eq!(meter.count_children(Some(&*selfish)).unwrap(), 1);
}

#[test]
fn value_equal_nodes_are_distinct() {
    let meter = meter();

    let pair = Pair {
        left: Rc::new("same".to_owned()),
        right: Rc::new("same".to_owned()),
    };
    assert!(pair.left == pair.right);

    assert_eq!(meter.count_children(Some(&pair)).unwrap(), 3);
    assert_eq!(meter.measure_deep(Some(&pair)).unwrap(), 3 * NODE_BYTES);
}

#[test]
fn shared_child_is_counted_once() {
    let meter = meter();

    let child = Rc::new("shared".to_owned());
    let pair = Pair {
        left: child.clone(),
        right: child,
    };

    assert_eq!(meter.count_children(Some(&pair)).unwrap(), 2);
    assert_eq!(meter.measure_deep(Some(&pair)).unwrap(), 2 * NODE_BYTES);
}

#[test]
fn embedded_structs_are_walked_but_statics_are_not() {
    static SINGLETON: std::sync::LazyLock<String> =
        std::sync::LazyLock::new(|| "process-wide".to_owned());

    let meter = meter();

    let derived = Derived {
        base: Base {
            parent: Some(Rc::new("parent".to_owned())),
        },
        own: Box::new(7),
        singleton: &SINGLETON,
    };

    // `derived`, the parent string and the boxed `u32`:
    assert_eq!(meter.count_children(Some(&derived)).unwrap(), 3);
    assert_eq!(*derived.own + 1, 8);
    assert_eq!(derived.singleton.as_str(), "process-wide");
}

#[test]
fn missing_root_is_an_error() {
    let meter = meter();
    assert!(matches!(
        meter.measure_deep(None),
        Err(MeasureError::NullRoot)
    ));
    assert!(matches!(
        meter.measure_deep_footprint(None),
        Err(MeasureError::NullRoot)
    ));
    assert!(matches!(
        meter.count_children(None),
        Err(MeasureError::NullRoot)
    ));
}

#[test]
fn unshared_buffer_costs_header_plus_length_under_every_policy() {
    let bytes = SharedBytes::from(vec![0_u8; 100]);

    for policy in BufferPolicy::ALL {
        let meter = meter().with_buffer_policy(policy);
        assert_eq!(
            meter.measure_deep(Some(&bytes)).unwrap(),
            NODE_BYTES + 12 + 100,
            "{policy}"
        );
    }
}

#[test]
fn shared_buffer_cost_depends_on_policy() {
    let bytes = SharedBytes::from(vec![0_u8; 100]);
    let slice = bytes.slice(40..50).unwrap();

    let deep = |policy| {
        meter()
            .with_buffer_policy(policy)
            .measure_deep(Some(&slice))
            .unwrap()
    };

    assert_eq!(deep(BufferPolicy::Ignore), NODE_BYTES + 12);
    assert_eq!(deep(BufferPolicy::IgnoreOverhead), NODE_BYTES + 12 + 10);
    assert_eq!(deep(BufferPolicy::Include), NODE_BYTES + 12 + 100);
}

#[test]
fn buffers_are_leaves_when_measuring_but_not_when_counting() {
    let meter = meter();

    let bytes = SharedBytes::from(vec![1, 2, 3, 4]);
    let views = vec![
        Box::new(bytes.slice(0..2).unwrap()),
        Box::new(bytes.slice(2..4).unwrap()),
    ];

    // The `Vec` and the two views. The backing storage is priced by policy, not visited:
    let footprint = meter.measure_deep_footprint(Some(&views)).unwrap();
    assert_eq!(footprint.num_nodes, 3);
    assert_eq!(footprint.buffer_bytes, 2 * (12 + 2));
    assert_eq!(
        footprint.per_type.get(std::any::type_name::<SharedBytes>()),
        Some(&TypeFootprint {
            count: 2,
            bytes: 2 * (NODE_BYTES + 12 + 2),
        })
    );
    assert_eq!(
        footprint.total_bytes,
        meter.measure_deep(Some(&views)).unwrap()
    );

    // Counting goes through the views into their (shared) backing storage:
    assert_eq!(meter.count_children(Some(&views)).unwrap(), 4);
}

#[test]
fn counting_ignores_configuration() {
    static TRACKERS_CREATED: AtomicUsize = AtomicUsize::new(0);

    let counting_factory: TrackerFactory = Arc::new(|| {
        TRACKERS_CREATED.fetch_add(1, Ordering::Relaxed);
        Box::new(IdentitySet::default()) as Box<dyn Tracker>
    });

    let bytes = SharedBytes::from(vec![0_u8; 64]);
    let views = vec![Box::new(bytes.slice(0..8).unwrap()), Box::new(bytes)];

    let default_meter = meter();
    let configured = meter()
        .with_tracker_factory(counting_factory)
        .with_buffer_policy(BufferPolicy::Include);

    assert_eq!(
        configured.count_children(Some(&views)).unwrap(),
        default_meter.count_children(Some(&views)).unwrap()
    );
    assert_eq!(TRACKERS_CREATED.load(Ordering::Relaxed), 0);

    // …while deep measurement uses the configured tracker:
    configured.measure_deep(Some(&views)).unwrap();
    assert_eq!(TRACKERS_CREATED.load(Ordering::Relaxed), 1);
}

#[test]
fn very_deep_graphs_do_not_overflow_the_stack() {
    struct Link {
        next: Option<Box<Link>>,
    }

    impl_measurable!(Link { next });

    impl Drop for Link {
        fn drop(&mut self) {
            // Unlink iteratively, or dropping the chain would recurse.
            let mut next = self.next.take();
            while let Some(mut link) = next {
                next = link.next.take();
            }
        }
    }

    const LENGTH: u64 = 200_000;

    let mut head = Link { next: None };
    for _ in 1..LENGTH {
        head = Link {
            next: Some(Box::new(head)),
        };
    }

    let meter = meter();
    assert_eq!(meter.count_children(Some(&head)).unwrap(), LENGTH);
    assert_eq!(meter.measure_deep(Some(&head)).unwrap(), LENGTH * NODE_BYTES);
}

#[test]
fn introspection_failures_abort_the_measurement() {
    struct Locked {
        inner: std::sync::Mutex<Vec<Arc<String>>>,
    }

    impl Measurable for Locked {
        fn visit_references<'a>(
            &'a self,
            _visitor: &mut dyn ReferenceVisitor<'a>,
        ) -> Result<(), IntrospectionError> {
            // References behind a guard cannot outlive it, so this type can never be walked.
            Err(IntrospectionError::new(
                self.type_name(),
                "inner",
                "references behind a mutex guard cannot be borrowed",
            ))
        }
    }

    let meter = meter();
    let root = vec![Rc::new(Locked {
        inner: std::sync::Mutex::new(vec![Arc::new("hidden".to_owned())]),
    })];

    let err = meter.measure_deep(Some(&root)).unwrap_err();
    assert!(matches!(&err, MeasureError::Introspection(err) if err.field() == "inner"));

    assert!(matches!(
        meter.count_children(Some(&root)),
        Err(MeasureError::Introspection(_))
    ));

    assert_eq!(root[0].inner.lock().map(|inner| inner.len()).ok(), Some(1));
}
