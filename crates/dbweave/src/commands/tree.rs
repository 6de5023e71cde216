//! `dbweave tree`: walk the navigator.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use dbweave_core::{NavNode, Workbench};

use crate::cli::{GlobalOpts, TreeArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct TreeEntry {
    depth: u32,
    #[serde(flatten)]
    node: NavNode,
}

#[derive(Tabled)]
struct TreeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Type")]
    node_type: String,
    #[tabled(rename = "ID")]
    id: String,
}

fn row(entry: &TreeEntry) -> TreeRow {
    let indent = "  ".repeat(usize::try_from(entry.depth).unwrap_or(0));
    let marker = if entry.node.has_children { "▸ " } else { "  " };
    TreeRow {
        name: format!("{indent}{marker}{}", entry.node.display_name()),
        kind: entry.node.kind.to_string(),
        node_type: entry.node.node_type.clone().unwrap_or_default(),
        id: entry.node.id.clone(),
    }
}

async fn children(workbench: &Workbench, parent: &str, all: bool) -> Result<Vec<Arc<NavNode>>, CliError> {
    let tree = workbench.tree();
    let mut nodes = tree.load_children(parent).await?;
    while all && tree.can_load_more(parent) {
        nodes = tree.load_more(parent).await?;
    }
    Ok(nodes)
}

pub async fn handle(args: TreeArgs, workbench: &Workbench, global: &GlobalOpts) -> Result<(), CliError> {
    let mut entries = Vec::new();
    // Depth-first, so each child prints under its parent.
    let mut stack: Vec<(u32, Arc<NavNode>)> = children(workbench, &args.node, args.all)
        .await?
        .into_iter()
        .rev()
        .map(|n| (0, n))
        .collect();

    while let Some((depth, node)) = stack.pop() {
        if depth + 1 < args.depth && node.has_children {
            let nested = children(workbench, &node.id, args.all).await?;
            stack.extend(nested.into_iter().rev().map(|n| (depth + 1, n)));
        }
        entries.push(TreeEntry {
            depth,
            node: NavNode::clone(&node),
        });
    }

    let more = workbench.tree().can_load_more(&args.node);
    let rendered = output::render_list(&global.output, &entries, row, |e| e.node.id.clone());
    output::print_output(&rendered, global.quiet);
    if more && !global.quiet {
        eprintln!("(more children available; pass --all to fetch every page)");
    }
    Ok(())
}
