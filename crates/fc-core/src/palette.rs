//! Node palette: categories of node templates a host offers for creation.
//!
//! Templates use the same node shape as pipeline-flow documents, so a
//! palette entry can be dropped on the canvas through
//! [`crate::pipeline::ApiPipeline::create_node`] without translation.

use crate::error::FlowError;
use crate::flow::{FlowNode, node_from_flow, node_to_flow};
use crate::model::Node;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaletteCategory {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub node_types: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Palette {
    pub version: Option<String>,
    pub categories: Vec<PaletteCategory>,
}

impl Palette {
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        let doc: PaletteDoc = serde_json::from_str(json)?;
        Ok(Self {
            version: doc.version,
            categories: doc
                .categories
                .into_iter()
                .map(|c| PaletteCategory {
                    label: c.label.unwrap_or_else(|| c.id.clone()),
                    id: c.id,
                    description: c.description,
                    image: c.image,
                    node_types: c.node_types.into_iter().map(node_from_flow).collect(),
                })
                .collect(),
        })
    }

    pub fn to_json(&self) -> Result<String, FlowError> {
        let doc = PaletteDoc {
            version: self.version.clone(),
            categories: self
                .categories
                .iter()
                .map(|c| CategoryDoc {
                    id: c.id.clone(),
                    label: Some(c.label.clone()),
                    description: c.description.clone(),
                    image: c.image.clone(),
                    node_types: c.node_types.iter().map(|n| node_to_flow(n, &[])).collect(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    pub fn category(&self, id: &str) -> Option<&PaletteCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Append `node` to category `category_id`, creating the category
    /// (labelled `category_label`, or its ID) when it does not exist yet.
    pub fn add_node_type(&mut self, node: Node, category_id: &str, category_label: Option<&str>) {
        match self.categories.iter_mut().find(|c| c.id == category_id) {
            Some(category) => category.node_types.push(node),
            None => self.categories.push(PaletteCategory {
                id: category_id.to_string(),
                label: category_label.unwrap_or(category_id).to_string(),
                node_types: vec![node],
                ..Default::default()
            }),
        }
    }

    /// Find a template by its `op`.
    pub fn node_type_by_op(&self, op: &str) -> Option<&Node> {
        self.categories
            .iter()
            .flat_map(|c| &c.node_types)
            .find(|n| n.op.as_deref() == Some(op))
    }
}

// Older palettes use `category` and `nodetypes`.
#[derive(Serialize, Deserialize)]
struct PaletteDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default)]
    categories: Vec<CategoryDoc>,
}

#[derive(Serialize, Deserialize)]
struct CategoryDoc {
    #[serde(alias = "category")]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(default, alias = "nodetypes")]
    node_types: Vec<FlowNode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeType;

    #[test]
    fn parses_legacy_keys() {
        let palette = Palette::from_json(
            r#"{ "categories": [{ "category": "io", "label": "Import/Export", "nodetypes": [
                { "id": "", "op": "read_csv", "type": "execution_node",
                  "outputs": [{ "id": "out" }],
                  "app_data": { "ui_data": { "label": "Read CSV" } } }
            ] }] }"#,
        )
        .unwrap();
        let io = palette.category("io").unwrap();
        assert_eq!(io.label, "Import/Export");
        assert_eq!(io.node_types[0].label, "Read CSV");
        assert!(palette.node_type_by_op("read_csv").is_some());
    }

    #[test]
    fn add_node_type_appends_or_creates() {
        let mut palette = Palette::default();
        palette.add_node_type(Node::new("", NodeType::ExecutionNode), "new", Some("New"));
        palette.add_node_type(Node::new("", NodeType::ModelNode), "new", Some("Ignored"));
        assert_eq!(palette.categories.len(), 1);
        assert_eq!(palette.categories[0].label, "New");
        assert_eq!(palette.categories[0].node_types.len(), 2);

        palette.add_node_type(Node::new("", NodeType::ExecutionNode), "other", None);
        assert_eq!(palette.category("other").unwrap().label, "other");
    }
}
