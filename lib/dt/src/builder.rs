//! Assemble a [DeviceTree] node by node, e.g. for boards without a flattened blob.

use crate::{
    node::{DeviceTree, Node, NodeType},
    prop::Property,
};
use alloc::{boxed::Box, vec, vec::Vec};

pub struct DeviceTreeBuilder {
    nodes: Vec<Node>,
}

impl Default for DeviceTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceTreeBuilder {
    /// Top level nodes that describe the machine rather than a device.
    const DESCRIPTION_NODES: [&'static str; 4] = ["aliases", "chosen", "memory", "reserved-memory"];

    /// Start a tree with an empty root node.
    pub fn new() -> DeviceTreeBuilder {
        DeviceTreeBuilder {
            nodes: vec![Node {
                node_id: 0,
                parent_id: 0,
                full_name: Box::from(""),
                node_name: Box::from(""),
                unit_addr: Box::from(""),
                children: vec![],
                props: vec![],
                node_type: NodeType::Device,
            }],
        }
    }

    pub fn root(&self) -> usize {
        0
    }

    /// Append a child named `full_name` (`name@unit-address`) under `parent` and return its id.
    pub fn node(&mut self, parent: usize, full_name: &str) -> usize {
        let (node_name, unit_addr) = full_name.split_once('@').unwrap_or((full_name, ""));
        let id = self.nodes.len();
        self.nodes.push(Node {
            node_id: id,
            parent_id: parent,
            full_name: Box::from(full_name),
            node_name: Box::from(node_name),
            unit_addr: Box::from(unit_addr),
            children: vec![],
            props: vec![],
            node_type: NodeType::Device,
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn prop(&mut self, node: usize, name: &str, data: &[u8]) -> &mut Self {
        let props = &mut self.nodes[node].props;
        props.retain(|prop| prop.name.as_ref() != name);
        props.push(Property::new(name, data));
        self
    }

    pub fn prop_u32(&mut self, node: usize, name: &str, value: u32) -> &mut Self {
        self.prop_cells(node, name, &[value])
    }

    pub fn prop_cells(&mut self, node: usize, name: &str, cells: &[u32]) -> &mut Self {
        let data: Vec<u8> = cells.iter().flat_map(|cell| cell.to_be_bytes()).collect();
        self.prop(node, name, &data)
    }

    pub fn prop_str(&mut self, node: usize, name: &str, value: &str) -> &mut Self {
        self.prop_strlist(node, name, &[value])
    }

    /// Encode a `\0` terminated string list such as `compatible`.
    pub fn prop_strlist(&mut self, node: usize, name: &str, values: &[&str]) -> &mut Self {
        let mut data = Vec::new();
        for value in values {
            data.extend_from_slice(value.as_bytes());
            data.push(0);
        }
        self.prop(node, name, &data)
    }

    /// Finish the tree. Well-known top level description nodes are marked as such.
    pub fn build(mut self) -> DeviceTree {
        let root_children = self.nodes[0].children.clone();
        for child in root_children {
            let node = &mut self.nodes[child];
            if Self::DESCRIPTION_NODES.contains(&node.node_name.as_ref()) {
                node.node_type = NodeType::Description;
            }
        }
        DeviceTree {
            root_id: 0,
            container: self.nodes,
        }
    }
}
