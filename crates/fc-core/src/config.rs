//! Canvas configuration.
//!
//! Every field has a default, and hosts may pass a partial JSON object
//! (camelCase keys) which is merged over the defaults.

use crate::model::Node;
use serde::{Deserialize, Serialize};

// ─── Layout ───────────────────────────────────────────────────────────────

/// Direction of the layered auto-layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDirection {
    /// Ranks run left to right (data flows horizontally).
    #[default]
    Horizontal,
    /// Ranks run top to bottom.
    Vertical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoLayoutConfig {
    pub direction: LayoutDirection,
    /// Gap between consecutive ranks.
    pub rank_separation: f64,
    /// Gap between neighbouring vertices within one rank.
    pub node_separation: f64,
    /// Side length of the stand-in vertex used for a loose link end.
    pub dummy_size: f64,
    /// Top-left corner of the laid-out graph.
    pub margin_x: f64,
    pub margin_y: f64,
    /// Barycenter ordering passes (down + up sweep each).
    pub ordering_passes: usize,
}

impl Default for AutoLayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::Horizontal,
            rank_separation: 80.0,
            node_separation: 40.0,
            dummy_size: 10.0,
            margin_x: 50.0,
            margin_y: 50.0,
            ordering_passes: 4,
        }
    }
}

/// Geometry used to derive node sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeLayoutConfig {
    pub default_node_width: f64,
    pub default_node_height: f64,
    /// Vertical distance between adjacent ports.
    pub port_spacing: f64,
    /// Distance from the node's top edge to its first port.
    pub port_offset_y: f64,
    pub supernode_expanded_width: f64,
    pub supernode_expanded_height: f64,
    pub binding_node_width: f64,
    pub binding_node_height: f64,
    pub comment_width: f64,
    pub comment_height: f64,
}

impl Default for NodeLayoutConfig {
    fn default() -> Self {
        Self {
            default_node_width: 160.0,
            default_node_height: 40.0,
            port_spacing: 20.0,
            port_offset_y: 20.0,
            supernode_expanded_width: 300.0,
            supernode_expanded_height: 200.0,
            binding_node_width: 70.0,
            binding_node_height: 40.0,
            comment_width: 175.0,
            comment_height: 42.0,
        }
    }
}

impl NodeLayoutConfig {
    /// Fill in a node's derived size. Height grows with the larger of its
    /// input and output port counts.
    pub fn size_node(&self, node: &mut Node) {
        if node.is_supernode_input_binding || node.is_supernode_output_binding {
            node.width = self.binding_node_width;
            node.height = self.binding_node_height;
            return;
        }
        let ports = node.input_ports.len().max(node.output_ports.len());
        let port_height = if ports > 1 {
            2.0 * self.port_offset_y + self.port_spacing * (ports - 1) as f64
        } else {
            0.0
        };
        node.width = self.default_node_width;
        node.height = self.default_node_height.max(port_height);
        if node.is_supernode() {
            node.expanded_width.get_or_insert(self.supernode_expanded_width);
            node.expanded_height.get_or_insert(self.supernode_expanded_height);
        }
    }
}

// ─── Canvas ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasConfig {
    /// Push neighbouring objects aside when a supernode grows (expand in
    /// place, deconstruct) and pull them back when it shrinks.
    pub enable_move_nodes_on_supernode_resize: bool,
    pub enable_snap_to_grid: bool,
    pub snap_to_grid_x: f64,
    pub snap_to_grid_y: f64,
    /// Allow a link from a node back to the same node.
    pub enable_self_ref_links: bool,
    /// Links survive losing a node: deleting an endpoint leaves the link
    /// loose at that end instead of removing it.
    pub enable_detachable_links: bool,
    /// How close a loose link end must be to a node to snap onto it.
    pub attach_proximity: f64,
    /// Nudge applied to pasted content while it would exactly cover
    /// existing objects.
    pub paste_offset_x: f64,
    pub paste_offset_y: f64,
    /// Horizontal gap used when placing an automatically added node.
    pub auto_node_gap: f64,
    /// Maximum number of commands kept for undo.
    pub undo_depth: usize,
    pub auto_layout: AutoLayoutConfig,
    pub node_layout: NodeLayoutConfig,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            enable_move_nodes_on_supernode_resize: false,
            enable_snap_to_grid: false,
            snap_to_grid_x: 10.0,
            snap_to_grid_y: 10.0,
            enable_self_ref_links: false,
            enable_detachable_links: false,
            attach_proximity: 20.0,
            paste_offset_x: 10.0,
            paste_offset_y: 10.0,
            auto_node_gap: 50.0,
            undo_depth: 200,
            auto_layout: AutoLayoutConfig::default(),
            node_layout: NodeLayoutConfig::default(),
        }
    }
}

impl CanvasConfig {
    /// Parse a (possibly partial) JSON configuration object.
    pub fn from_json(json: &str) -> Result<Self, crate::error::FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Snap a coordinate pair to the grid when snapping is enabled.
    pub fn snap(&self, x: f64, y: f64) -> (f64, f64) {
        if !self.enable_snap_to_grid {
            return (x, y);
        }
        (
            snap_value(x, self.snap_to_grid_x),
            snap_value(y, self.snap_to_grid_y),
        )
    }
}

fn snap_value(v: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        v
    } else {
        (v / grid).round() * grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = CanvasConfig::from_json(
            r#"{ "enableSnapToGrid": true, "autoLayout": { "rankSeparation": 120 } }"#,
        )
        .unwrap();
        assert!(config.enable_snap_to_grid);
        assert_eq!(config.auto_layout.rank_separation, 120.0);
        assert_eq!(config.auto_layout.node_separation, 40.0);
        assert_eq!(config.undo_depth, 200);
    }

    #[test]
    fn snapping() {
        let mut config = CanvasConfig::default();
        assert_eq!(config.snap(13.0, 27.0), (13.0, 27.0));
        config.enable_snap_to_grid = true;
        assert_eq!(config.snap(13.0, 27.0), (10.0, 30.0));
    }

    #[test]
    fn node_height_follows_port_count() {
        use crate::model::{Cardinality, NodeType, Port};
        let layout = NodeLayoutConfig::default();
        let mut node = Node::new("sized", NodeType::ExecutionNode);
        layout.size_node(&mut node);
        assert_eq!((node.width, node.height), (160.0, 40.0));

        for i in 0..3 {
            node.input_ports
                .push(Port::new(format!("in{i}").as_str(), "", Cardinality::SINGLE));
        }
        layout.size_node(&mut node);
        assert_eq!(node.height, 80.0);
    }
}
