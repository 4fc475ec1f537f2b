use crate::prop::{Property, PropertyError};
use alloc::{boxed::Box, string::String, vec, vec::Vec};
use core::ops::Range;

/// Flattened node storage; nodes refer to each other by index into `container`.
#[derive(Debug)]
pub struct DeviceTree {
    pub root_id: usize,
    pub container: Vec<Node>,
}

#[derive(Debug)]
pub struct Node {
    pub node_id: usize,
    pub parent_id: usize,
    pub full_name: Box<str>,
    pub node_name: Box<str>,
    pub unit_addr: Box<str>,
    pub children: Vec<usize>,
    pub props: Vec<Property>,
    pub node_type: NodeType,
}

/// `Description` nodes (`/chosen`, `/aliases`, `/memory`, ...) never become devices.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NodeType {
    Device,
    Description,
}

impl DeviceTree {
    /// Cells used by `reg` when the parent does not say otherwise.
    pub const DEFAULT_ADDRESS_CELLS: usize = 2;
    pub const DEFAULT_SIZE_CELLS: usize = 1;

    pub fn root(&self) -> &Node {
        &self.container[self.root_id]
    }

    pub fn is_root(&self, node: &Node) -> bool {
        self.get_parent(node).node_id == node.node_id
    }

    fn full_path(&self, node: &Node) -> String {
        if self.is_root(node) {
            String::new()
        } else {
            self.full_path(self.get_parent(node)) + "/" + node.full_name.as_ref()
        }
    }

    pub fn get_full_path(&self, node: &Node) -> Box<str> {
        if self.is_root(node) {
            return Box::from("/");
        }
        self.full_path(node).into_boxed_str()
    }

    pub fn get_parent(&self, node: &Node) -> &Node {
        &self.container[node.parent_id]
    }

    pub fn get_children<'b>(&'b self, node: &'b Node) -> impl Iterator<Item = &'b Node> + 'b {
        node.children.iter().map(move |x| &self.container[*x])
    }

    pub fn get_property<'b>(&self, node: &'b Node, name: impl AsRef<str>) -> Option<&'b Property> {
        let name = name.as_ref();
        node.props.iter().find(|prop| prop.name.as_ref() == name)
    }

    /// Resolve an absolute path such as `/soc/csi@1c09000`.
    pub fn get_node(&self, path: impl AsRef<str>) -> Option<&Node> {
        let mut node = self.root();
        for section in path.as_ref().split('/') {
            if section.trim().is_empty() {
                continue;
            }
            node = self
                .get_children(node)
                .find(|subnode| subnode.full_name.as_ref() == section)?;
        }
        Some(node)
    }

    /// Resolve a path whose sections may be `*` or a node name without unit address.
    pub fn get_nodes(&self, path: impl AsRef<str>) -> Vec<&Node> {
        let path: Vec<&str> = path.as_ref().split('/').collect();
        self.get_sub_nodes(self.root(), &path, 0)
    }

    fn get_sub_nodes<'b>(&'b self, node: &'b Node, path: &[&str], mut cursor: usize) -> Vec<&'b Node> {
        while cursor < path.len() && path[cursor].trim().is_empty() {
            cursor += 1;
        }
        if cursor >= path.len() {
            return vec![node];
        }
        let sec = path[cursor];
        self.get_children(node)
            .flat_map(|child| {
                if sec == "*" || child.full_name.as_ref() == sec || child.node_name.as_ref() == sec {
                    self.get_sub_nodes(child, path, cursor + 1)
                } else {
                    vec![]
                }
            })
            .collect()
    }

    /// Entries of the `compatible` property, most specific first. Empty when absent.
    pub fn get_compatible<'b>(&self, node: &'b Node) -> Result<Vec<&'b str>, PropertyError> {
        match self.get_property(node, "compatible") {
            Some(prop) => prop.value_as_strlist(),
            None => Ok(vec![]),
        }
    }

    /// Whether the node is enabled. A missing `status` means enabled.
    pub fn is_available(&self, node: &Node) -> bool {
        match self.get_property(node, "status") {
            None => true,
            Some(prop) => matches!(prop.value_as_str(), Ok("okay") | Ok("ok")),
        }
    }

    fn get_cells(&self, node: &Node, name: &str, default: usize) -> Result<usize, PropertyError> {
        match self.get_property(node, name) {
            Some(prop) => Ok(prop.value_as_u32()? as usize),
            None => Ok(default),
        }
    }

    /// Join big endian cells into one value. Fails when the value does not fit a `usize`.
    fn cells_to_usize(cells: &[u32]) -> Result<usize, PropertyError> {
        cells
            .iter()
            .try_fold(0u128, |acc, cell| Some(acc.checked_mul(1 << 32)? | u128::from(*cell)))
            .and_then(|value| usize::try_from(value).ok())
            .ok_or(PropertyError::InvalidPropFormat)
    }

    /// Decode `reg` into address ranges using the parent's `#address-cells` and `#size-cells`.
    ///
    /// Addresses or sizes wider than a `usize` are rejected with [PropertyError::InvalidPropFormat].
    pub fn get_reg_value(&self, node: &Node) -> Result<Vec<Range<usize>>, PropertyError> {
        let mut addr_cel = Self::DEFAULT_ADDRESS_CELLS;
        let mut size_cel = Self::DEFAULT_SIZE_CELLS;
        if !self.is_root(node) {
            let parent = self.get_parent(node);
            addr_cel = self.get_cells(parent, "#address-cells", addr_cel)?;
            size_cel = self.get_cells(parent, "#size-cells", size_cel)?;
        }
        let reg = self
            .get_property(node, "reg")
            .ok_or(PropertyError::PropNotFound)?
            .value_as_cells()?;
        let width = addr_cel + size_cel;
        if width == 0 {
            return Err(PropertyError::InvalidPropFormat);
        }
        if reg.len() % width != 0 {
            log::warn!(
                "'reg' of {} has {} trailing cells, ignoring them.",
                self.get_full_path(node),
                reg.len() % width
            );
        }
        let mut res = vec![];
        for entry in reg.chunks_exact(width) {
            let (addr, size) = entry.split_at(addr_cel);
            let addr = Self::cells_to_usize(addr)?;
            let size = Self::cells_to_usize(size)?;
            let end = addr.checked_add(size).ok_or(PropertyError::InvalidPropFormat)?;
            res.push(addr..end);
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use crate::{DeviceTreeBuilder, PropertyError};

    #[test]
    fn reg_honors_parent_cells() {
        let mut builder = DeviceTreeBuilder::new();
        let soc = builder.node(builder.root(), "soc");
        builder.prop_u32(soc, "#address-cells", 1);
        builder.prop_u32(soc, "#size-cells", 1);
        let csi = builder.node(soc, "csi@1c1d000");
        builder.prop_cells(csi, "reg", &[0x01c1_d000, 0x1000, 0x01c1_e000, 0x100]);
        let tree = builder.build();

        let node = tree.get_node("/soc/csi@1c1d000").unwrap();
        assert_eq!(
            tree.get_reg_value(node).unwrap(),
            std::vec![0x01c1_d000..0x01c1_e000, 0x01c1_e000..0x01c1_e100]
        );
    }

    #[test]
    fn reg_rejects_values_wider_than_usize() {
        let mut builder = DeviceTreeBuilder::new();
        let bus = builder.node(builder.root(), "bus");
        builder.prop_u32(bus, "#address-cells", 3);
        builder.prop_u32(bus, "#size-cells", 1);
        let wide = builder.node(bus, "wide@0");
        builder.prop_cells(wide, "reg", &[0x0200_0000, 0x0, 0x1000, 0x100]);
        let narrow = builder.node(bus, "narrow@1000");
        builder.prop_cells(narrow, "reg", &[0x0, 0x0, 0x1000, 0x100]);
        let tree = builder.build();

        let wide = tree.get_node("/bus/wide@0").unwrap();
        assert_eq!(tree.get_reg_value(wide), Err(PropertyError::InvalidPropFormat));
        let narrow = tree.get_node("/bus/narrow@1000").unwrap();
        assert_eq!(tree.get_reg_value(narrow).unwrap(), std::vec![0x1000..0x1100]);
    }

    #[test]
    #[cfg(target_pointer_width = "32")]
    fn reg_above_4g_does_not_fit() {
        let mut builder = DeviceTreeBuilder::new();
        let node = builder.node(builder.root(), "regs@100000000");
        builder.prop_cells(node, "reg", &[0x1, 0x0, 0x2000]);
        let tree = builder.build();
        let node = tree.get_node("/regs@100000000").unwrap();
        assert_eq!(tree.get_reg_value(node), Err(PropertyError::InvalidPropFormat));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn reg_defaults_to_two_address_cells() {
        let mut builder = DeviceTreeBuilder::new();
        let node = builder.node(builder.root(), "regs@100000000");
        builder.prop_cells(node, "reg", &[0x1, 0x0, 0x2000]);
        let tree = builder.build();
        let node = tree.get_node("/regs@100000000").unwrap();
        assert_eq!(tree.get_reg_value(node).unwrap(), std::vec![0x1_0000_0000..0x1_0000_2000]);
    }

    #[test]
    fn missing_reg_is_reported() {
        let mut builder = DeviceTreeBuilder::new();
        builder.node(builder.root(), "clocks");
        let tree = builder.build();
        let node = tree.get_node("/clocks").unwrap();
        assert_eq!(tree.get_reg_value(node), Err(PropertyError::PropNotFound));
    }

    #[test]
    fn paths_and_wildcards() {
        let mut builder = DeviceTreeBuilder::new();
        let soc = builder.node(builder.root(), "soc");
        builder.node(soc, "csi@1c09000");
        builder.node(soc, "csi@1c1d000");
        builder.node(soc, "uart@1c28000");
        let tree = builder.build();

        assert!(tree.get_node("/soc/csi@1c09000").is_some());
        assert!(tree.get_node("/soc/csi").is_none());
        assert_eq!(tree.get_nodes("/soc/csi").len(), 2);
        assert_eq!(tree.get_nodes("/soc/*").len(), 3);
        let uart = tree.get_node("/soc/uart@1c28000").unwrap();
        assert_eq!(&*tree.get_full_path(uart), "/soc/uart@1c28000");
        assert_eq!(&*tree.get_full_path(tree.root()), "/");
    }

    #[test]
    fn status_controls_availability() {
        let mut builder = DeviceTreeBuilder::new();
        let on = builder.node(builder.root(), "a");
        let off = builder.node(builder.root(), "b");
        let implicit = builder.node(builder.root(), "c");
        builder.prop_str(on, "status", "okay");
        builder.prop_str(off, "status", "disabled");
        let tree = builder.build();
        assert!(tree.is_available(&tree.container[on]));
        assert!(!tree.is_available(&tree.container[off]));
        assert!(tree.is_available(&tree.container[implicit]));
    }
}
