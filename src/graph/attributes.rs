use ahash::AHashMap;
use ndarray::{Array2, ArrayView1};

use crate::error::{Error, Result};

/// Handle to a declared node attribute, resolved once against a graph schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AttrId(pub(crate) usize);

impl AttrId {
    #[inline] pub fn index(self) -> usize { self.0 }
}

/// Named numeric node attributes stored as a dense `(nodes, attributes)` matrix.
#[derive(Clone, Debug, Default)]
pub(crate) struct AttributeMatrix {
    names: Vec<String>,
    lookup: AHashMap<String, usize>,
    values: Array2<f64>,
}

impl AttributeMatrix {
    /// Build from a schema and a row-major value buffer (`rows * names.len()` entries).
    pub(crate) fn new(names: Vec<String>, rows: usize, values: Vec<f64>) -> Self {
        assert!(values.len() == rows * names.len(), "values.len() must equal rows * names.len()");
        let lookup = names.iter().enumerate().map(|(i, name)| (name.clone(), i)).collect();
        let values = Array2::from_shape_vec((rows, names.len()), values)
            .expect("shape was checked above");

        Self { names, lookup, values }
    }

    /// Get the declared attribute names, in schema order.
    #[inline] pub(crate) fn names(&self) -> &[String] { &self.names }

    /// Resolve an attribute name to its handle.
    pub(crate) fn resolve(&self, name: &str) -> Result<AttrId> {
        self.lookup.get(name).map(|&i| AttrId(i)).ok_or_else(|| Error::UnknownAttribute(name.to_string()))
    }

    /// Value of attribute `attr` on `node`.
    #[inline] pub(crate) fn get(&self, attr: AttrId, node: usize) -> f64 { self.values[[node, attr.0]] }

    /// Column view of one attribute over all nodes.
    #[inline] pub(crate) fn column(&self, attr: AttrId) -> ArrayView1<'_, f64> { self.values.column(attr.0) }

    /// Row view of all attributes of one node.
    #[inline] pub(crate) fn row(&self, node: usize) -> ArrayView1<'_, f64> { self.values.row(node) }
}
