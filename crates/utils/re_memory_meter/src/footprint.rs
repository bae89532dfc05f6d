use std::collections::BTreeMap;

/// Where the bytes of a deep measurement went.
///
/// Produced by [`crate::MemoryMeter::measure_deep_footprint`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Footprint {
    /// Same as [`crate::MemoryMeter::measure_deep`] would return.
    pub total_bytes: u64,

    /// The part of [`Self::total_bytes`] that comes from the buffer policy,
    /// on top of the shallow sizes of buffer-like nodes.
    pub buffer_bytes: u64,

    /// Distinct nodes visited, including the root.
    pub num_nodes: u64,

    /// Per concrete type.
    pub per_type: BTreeMap<&'static str, TypeFootprint>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TypeFootprint {
    /// Number of nodes of this type.
    pub count: u64,

    /// Shallow size plus buffer cost of all of them.
    pub bytes: u64,
}

impl Footprint {
    pub(crate) fn add(&mut self, type_name: &'static str, shallow_bytes: u64, buffer_bytes: u64) {
        let bytes = shallow_bytes + buffer_bytes;

        self.total_bytes += bytes;
        self.buffer_bytes += buffer_bytes;
        self.num_nodes += 1;

        let per_type = self.per_type.entry(type_name).or_default();
        per_type.count += 1;
        per_type.bytes += bytes;
    }

    /// Types sorted by how many bytes they account for, largest first.
    pub fn largest_types(&self) -> Vec<(&'static str, TypeFootprint)> {
        let mut types: Vec<_> = self
            .per_type
            .iter()
            .map(|(name, footprint)| (*name, *footprint))
            .collect();
        types.sort_by(|(a_name, a), (b_name, b)| b.bytes.cmp(&a.bytes).then(a_name.cmp(b_name)));
        types
    }
}

impl std::fmt::Display for Footprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} B in {} nodes ({} B of buffer contents)",
            self.total_bytes, self.num_nodes, self.buffer_bytes
        )?;
        for (name, TypeFootprint { count, bytes }) in self.largest_types() {
            writeln!(f, "  {bytes:>12} B {count:>8}x {name}")?;
        }
        Ok(())
    }
}

#[test]
fn test_footprint_accumulates() {
    let mut footprint = Footprint::default();
    footprint.add("Leaf", 16, 0);
    footprint.add("Buffer", 32, 112);
    footprint.add("Leaf", 16, 0);

    assert_eq!(footprint.total_bytes, 176);
    assert_eq!(footprint.buffer_bytes, 112);
    assert_eq!(footprint.num_nodes, 3);

    similar_asserts::assert_eq!(
        footprint.largest_types(),
        vec![
            (
                "Buffer",
                TypeFootprint {
                    count: 1,
                    bytes: 144
                }
            ),
            ("Leaf", TypeFootprint { count: 2, bytes: 32 }),
        ]
    );

    let text = footprint.to_string();
    assert!(text.starts_with("176 B in 3 nodes (112 B of buffer contents)\n"));
    assert!(text.contains("2x Leaf"));
}

#[cfg(feature = "serde")]
#[test]
fn test_footprint_serializes() {
    let mut footprint = Footprint::default();
    footprint.add("Leaf", 16, 0);

    similar_asserts::assert_eq!(
        serde_json::to_value(&footprint).unwrap(),
        serde_json::json!({
            "total_bytes": 16,
            "buffer_bytes": 0,
            "num_nodes": 1,
            "per_type": { "Leaf": { "count": 1, "bytes": 16 } },
        })
    );
}
