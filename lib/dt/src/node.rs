use crate::prop::{Property, PropertyError};
use alloc::{boxed::Box, collections::btree_map::BTreeMap, string::String, vec, vec::Vec};
use core::ops::Range;

pub struct DeviceTree {
    pub root_id: usize,
    pub container: Vec<Node>,
    pub phandle_map: BTreeMap<u32, usize>,
}

pub struct Node {
    pub node_id: usize,
    pub parent_id: usize,
    pub full_name: Box<str>,
    pub node_name: Box<str>,
    pub unit_addr: Box<str>,
    pub children: Vec<usize>,
    pub props: Vec<Property>,
}

impl Default for DeviceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceTree {
    /// Create a tree holding only the root node.
    pub fn new() -> DeviceTree {
        DeviceTree {
            root_id: 0,
            container: vec![Node {
                node_id: 0,
                parent_id: 0,
                full_name: Box::from(""),
                node_name: Box::from(""),
                unit_addr: Box::from(""),
                children: vec![],
                props: vec![],
            }],
            phandle_map: BTreeMap::new(),
        }
    }

    /// Append a node named `full_name` (`name@unit-address`) under `parent_id`.
    ///
    /// Return the id of the new node. Panics if `parent_id` is not a node of this tree.
    pub fn add_node(&mut self, parent_id: usize, full_name: &str) -> usize {
        let (node_name, unit_addr) = match full_name.find('@') {
            Some(idx) => (&full_name[0..idx], &full_name[idx + 1..]),
            None => (full_name, ""),
        };
        let node_id = self.container.len();
        self.container.push(Node {
            node_id,
            parent_id,
            full_name: Box::from(full_name),
            node_name: Box::from(node_name),
            unit_addr: Box::from(unit_addr),
            children: vec![],
            props: vec![],
        });
        self.container[parent_id].children.push(node_id);
        node_id
    }

    /// Set a property on a node, replacing any property of the same name.
    ///
    /// A `phandle` property also registers the node in [Self::phandle_map].
    pub fn add_property(&mut self, node_id: usize, prop: Property) {
        if prop.name.as_ref() == "phandle" {
            match prop.value_as_u32() {
                Ok(phandle) => {
                    self.phandle_map.insert(phandle, node_id);
                }
                Err(err) => log::warn!(
                    "Ignoring malformed phandle on node '{}': {}",
                    self.container[node_id].full_name,
                    err
                ),
            }
        }
        let props = &mut self.container[node_id].props;
        props.retain(|p| p.name != prop.name);
        props.push(prop);
    }

    pub fn root(&self) -> &Node {
        &self.container[self.root_id]
    }
    pub fn node(&self, node_id: usize) -> Option<&Node> {
        self.container.get(node_id)
    }
    pub fn is_root(&self, node: &Node) -> bool {
        self.get_parent(node).node_id == node.node_id
    }
    fn full_path(&self, node: &Node) -> String {
        if self.is_root(node) {
            String::from("")
        } else {
            self.full_path(self.get_parent(node)) + "/" + node.full_name.as_ref()
        }
    }
    pub fn get_full_path(&self, node: &Node) -> Box<str> {
        let path = self.full_path(node);
        if path.is_empty() {
            Box::from("/")
        } else {
            path.into_boxed_str()
        }
    }
    pub fn get_parent(&self, node: &Node) -> &Node {
        &self.container[node.parent_id]
    }
    pub fn get_children<'b>(&'b self, node: &Node) -> impl Iterator<Item = &'b Node> {
        node.children.iter().map(|x| &self.container[*x])
    }
    pub fn get_property<'b>(&self, node: &'b Node, name: impl AsRef<str>) -> Option<&'b Property> {
        let name = name.as_ref();
        node.props.iter().find(|prop| prop.name.as_ref().eq(name))
    }
    pub fn get_node(&self, path: impl AsRef<str>) -> Option<&Node> {
        let path_str = path.as_ref();
        let mut node = &self.container[self.root_id];
        for section in path_str.split('/') {
            if section.trim().is_empty() {
                continue;
            }
            node = self
                .get_children(node)
                .find(|subnode| subnode.full_name.as_ref().eq(section))?;
        }
        Some(node)
    }
    pub fn get_node_by_phandle(&self, phandle: u32) -> Option<&Node> {
        self.phandle_map.get(&phandle).and_then(|id| self.node(*id))
    }
    pub fn get_phandle(&self, node: &Node) -> Option<u32> {
        self.get_property(node, "phandle")?.value_as_u32().ok()
    }
    /// The node's `compatible` strings, most specific first.
    pub fn get_compatible<'b>(&self, node: &'b Node) -> Vec<&'b str> {
        self.get_property(node, "compatible")
            .and_then(|prop| prop.value_as_strlist().ok())
            .unwrap_or_default()
    }
    /// A node is enabled unless its `status` says otherwise.
    pub fn is_enabled(&self, node: &Node) -> bool {
        match self.get_property(node, "status").map(|p| p.value_as_str()) {
            None => true,
            Some(Ok(status)) => status == "okay" || status == "ok",
            Some(Err(_)) => false,
        }
    }
    /// Find the alias `<stem><n>` in `/aliases` that points at `node` and return `n`.
    pub fn get_alias_seq(&self, stem: &str, node: &Node) -> Option<i32> {
        let aliases = self.get_node("/aliases")?;
        for prop in &aliases.props {
            let Some(index) = prop.name.strip_prefix(stem) else {
                continue;
            };
            let Ok(seq) = index.parse::<i32>() else {
                continue;
            };
            let Ok(path) = prop.value_as_str() else {
                continue;
            };
            if self.get_node(path).is_some_and(|target| target.node_id == node.node_id) {
                return Some(seq);
            }
        }
        None
    }
    pub fn get_reg_value(&self, node: &Node) -> Result<Vec<Range<usize>>, PropertyError> {
        let mut size_cel = 1;
        let mut addr_cel = 2;
        if !self.is_root(node) {
            let parent = self.get_parent(node);
            if let Some(prop) = self.get_property(parent, "#address-cells") {
                addr_cel = prop.value_as_u32()? as usize;
            }
            if let Some(prop) = self.get_property(parent, "#size-cells") {
                size_cel = prop.value_as_u32()? as usize;
            }
        }
        let reg = self
            .get_property(node, "reg")
            .ok_or(PropertyError::PropNotFound)?
            .value_as_cells()?;
        let width = size_cel + addr_cel;
        if width == 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        let count = reg.len() / width;
        let mut res = vec![];
        for i in 0..count {
            let index = width * i;
            let addr = cells_value(&reg[index..index + addr_cel])?;
            let sz = cells_value(&reg[index + addr_cel..index + width])?;
            let end = addr.checked_add(sz).ok_or(PropertyError::InvalidPropFormat)?;
            res.push(Range { start: addr, end });
        }
        Ok(res)
    }
}

/// Join big-endian cells into one number, failing if it does not fit a `usize`.
fn cells_value(cells: &[u32]) -> Result<usize, PropertyError> {
    let mut value: u64 = 0;
    for cell in cells {
        if value >> 32 != 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        value = (value << 32) | u64::from(*cell);
    }
    usize::try_from(value).map_err(|_| PropertyError::InvalidPropFormat)
}
