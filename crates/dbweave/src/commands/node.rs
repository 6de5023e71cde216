//! `dbweave node`: single-node inspection and mutations.

use serde::Serialize;
use tabled::Tabled;

use dbweave_core::{DbObject, NavNode, ObjectProperty, ROOT_NODE_ID, Workbench};

use super::util;
use crate::cli::{GlobalOpts, NodeArgs, NodeCommand};
use crate::error::CliError;
use crate::output;

const MAX_PATH_DEPTH: usize = 32;

#[derive(Tabled)]
struct PathRow {
    #[tabled(rename = "#")]
    level: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "ID")]
    id: String,
}

#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Object")]
    object: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Property")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Serialize)]
struct PropertyEntry<'a> {
    object: &'a str,
    #[serde(flatten)]
    property: &'a ObjectProperty,
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".into(),
        other => other.to_string(),
    }
}

fn node_detail(node: &NavNode) -> String {
    let mut pairs = vec![
        ("ID", node.id.clone()),
        ("Name", node.display_name().to_owned()),
        ("Kind", node.kind.to_string()),
        ("Type", util::or_dash(node.node_type.as_deref())),
        ("Parent", util::or_dash(node.parent_id.as_deref())),
        ("URI", util::or_dash(node.uri.as_deref())),
        ("Folder", node.folder.to_string()),
        ("Children", node.has_children.to_string()),
    ];
    if !node.features.is_empty() {
        pairs.push(("Features", node.features.join(", ")));
    }
    if let Some(ref description) = node.description {
        pairs.push(("Description", description.clone()));
    }
    let mut text = output::detail_lines(&pairs);
    for property in node.details.iter().flatten() {
        let label = property
            .display_name
            .as_deref()
            .or(property.id.as_deref())
            .unwrap_or("?");
        text.push_str(&format!("\n  {label}: {}", value_text(&property.value)));
    }
    text
}

/// Node ids are hierarchical paths, so descend from the root through the
/// child whose id is the longest prefix of `id` until `id` itself is loaded.
async fn expand_to(workbench: &Workbench, id: &str) -> Result<(), CliError> {
    let tree = workbench.tree();
    let mut parent = ROOT_NODE_ID.to_owned();
    for _ in 0..MAX_PATH_DEPTH {
        let children = tree.load_children(&parent).await?;
        if children.iter().any(|child| child.id == id) {
            return Ok(());
        }
        parent = children
            .iter()
            .filter(|child| id.starts_with(child.id.as_str()))
            .max_by_key(|child| child.id.len())
            .map(|child| child.id.clone())
            .ok_or_else(|| CliError::NotFound {
                resource_type: "navigation node".into(),
                identifier: id.into(),
            })?;
    }
    Err(CliError::NotFound {
        resource_type: "navigation node".into(),
        identifier: id.into(),
    })
}

pub async fn handle(args: NodeArgs, workbench: &Workbench, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        NodeCommand::Info { id, details } => {
            let node = if details {
                workbench.node_info().load_details(&id).await?
            } else {
                workbench.node_info().load(&id).await?
            };
            let rendered = output::render_single(&global.output, &*node, node_detail, |n| n.id.clone());
            output::print_output(&rendered, global.quiet);
        }

        NodeCommand::Path { id } => {
            expand_to(workbench, &id).await?;
            let info = workbench.node_info();
            let path: Vec<NavNode> = info.get_path(&id).iter().map(|n| NavNode::clone(n)).collect();
            let rendered = output::render_list(
                &global.output,
                &path,
                |n| PathRow {
                    level: path.iter().position(|p| p.id == n.id).unwrap_or(0),
                    name: n.display_name().to_owned(),
                    kind: n.kind.to_string(),
                    id: n.id.clone(),
                },
                |n| n.id.clone(),
            );
            output::print_output(&rendered, global.quiet);
        }

        NodeCommand::Object { ids } => {
            let objects: Vec<DbObject> = workbench
                .db_objects()
                .load_many(&ids)
                .await?
                .iter()
                .map(|o| DbObject::clone(o))
                .collect();
            let entries: Vec<PropertyEntry<'_>> = objects
                .iter()
                .flat_map(|o| {
                    o.properties.iter().map(|property| PropertyEntry {
                        object: &o.id,
                        property,
                    })
                })
                .collect();
            let rendered = output::render_list(
                &global.output,
                &entries,
                |e| PropertyRow {
                    object: e.object.to_owned(),
                    category: util::or_dash(e.property.category.as_deref()),
                    name: e
                        .property
                        .display_name
                        .clone()
                        .or_else(|| e.property.id.clone())
                        .unwrap_or_default(),
                    value: value_text(&e.property.value),
                },
                |e| e.property.id.clone().unwrap_or_default(),
            );
            output::print_output(&rendered, global.quiet);
        }

        NodeCommand::Rename { id, name } => {
            let node = workbench.tree().rename_node(&id, &name).await?;
            if !global.quiet {
                eprintln!("Renamed {id} to '{}'", node.name);
            }
        }

        NodeCommand::Delete { ids } => {
            let action = format!("delete {} node(s)", ids.len());
            if !util::confirm(&action, global.yes)? {
                return Ok(());
            }
            let deleted = workbench.tree().delete_nodes(&ids).await?;
            if !global.quiet {
                eprintln!("Deleted {deleted} node(s)");
            }
        }

        NodeCommand::Move { ids, to } => {
            workbench.tree().move_nodes(&ids, &to).await?;
            if !global.quiet {
                eprintln!("Moved {} node(s) to {to}", ids.len());
            }
        }
    }
    Ok(())
}
