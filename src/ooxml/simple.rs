//! Whole-field loops for presentation and spreadsheet parts: each field is extracted as one unit
//! and written back in one piece.

use anyhow::Context;

use crate::ir::{Address, ContainerKind, RestoreReport, TextUnit};
use crate::markers::flatten_blocks;

use super::xml::{Element, Node, NodePath, XmlTree};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavor {
    Presentation,
    Spreadsheet,
}

impl Flavor {
    /// Whether `part` holds fields of this flavor.
    pub fn handles(self, part: &str) -> bool {
        let part = part.to_ascii_lowercase();
        let numbered = |prefix: &str| {
            part.strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(".xml"))
                .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
        };
        match self {
            Flavor::Presentation => {
                numbered("ppt/slides/slide")
                    || numbered("ppt/notesslides/notesslide")
                    || (part.starts_with("ppt/slidelayouts/") && part.ends_with(".xml"))
            }
            Flavor::Spreadsheet => {
                part == "xl/sharedstrings.xml" || numbered("xl/worksheets/sheet")
            }
        }
    }

    fn is_field(self, el: &Element) -> bool {
        match self {
            Flavor::Presentation => el.is("a:r"),
            Flavor::Spreadsheet => matches!(local_name(&el.name), "si" | "is"),
        }
    }

    fn kind(self) -> ContainerKind {
        match self {
            Flavor::Presentation => ContainerKind::Fragment,
            Flavor::Spreadsheet => ContainerKind::GridCell,
        }
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name)
}

/// Paths of every field in document order. Fields never nest.
fn field_paths(root: &Element, flavor: Flavor) -> Vec<NodePath> {
    let mut out: Vec<NodePath> = Vec::new();
    let mut stack: Vec<(&Element, NodePath)> = vec![(root, Vec::new())];
    while let Some((el, path)) = stack.pop() {
        if flavor.is_field(el) {
            out.push(path);
            continue;
        }
        let children: Vec<(usize, &Element)> = el.indexed_elements().collect();
        for (i, child) in children.into_iter().rev() {
            let mut p = path.clone();
            p.push(i);
            stack.push((child, p));
        }
    }
    out
}

/// Text-bearing `t` elements of a spreadsheet string item, skipping phonetic runs.
fn string_item_texts(item: &Element) -> Vec<NodePath> {
    let mut out: Vec<NodePath> = Vec::new();
    let mut stack: Vec<(&Element, NodePath)> = item
        .indexed_elements()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|(i, e)| (e, vec![i]))
        .collect();
    while let Some((el, path)) = stack.pop() {
        match local_name(&el.name) {
            "rPh" | "phoneticPr" => continue,
            "t" => {
                out.push(path);
                continue;
            }
            _ => {}
        }
        let children: Vec<(usize, &Element)> = el.indexed_elements().collect();
        for (i, child) in children.into_iter().rev() {
            let mut p = path.clone();
            p.push(i);
            stack.push((child, p));
        }
    }
    out
}

fn field_text(field: &Element, flavor: Flavor) -> String {
    match flavor {
        Flavor::Presentation => field.child("a:t").map(|t| t.text()).unwrap_or_default(),
        Flavor::Spreadsheet => string_item_texts(field)
            .iter()
            .filter_map(|p| field.at(p))
            .map(|t| t.text())
            .collect(),
    }
}

fn set_field_text(field: &mut Element, flavor: Flavor, text: &str) {
    match flavor {
        Flavor::Presentation => {
            let text = flatten_blocks(text);
            match field.child_mut("a:t") {
                Some(t) => t.set_text(&text),
                None => field
                    .children
                    .push(Node::Element(Element::new("a:t").with_text(&text))),
            }
        }
        Flavor::Spreadsheet => {
            let paths = string_item_texts(field);
            let Some((head, rest)) = paths.split_first() else {
                let name = match field.name.rsplit_once(':') {
                    Some((prefix, _)) => format!("{prefix}:t"),
                    None => "t".to_string(),
                };
                let mut t = Element::new(&name);
                write_cell_text(&mut t, text);
                field.children.push(Node::Element(t));
                return;
            };
            for path in rest {
                if let Some(t) = field.at_mut(path) {
                    write_cell_text(t, "");
                }
            }
            if let Some(t) = field.at_mut(head) {
                write_cell_text(t, text);
            }
        }
    }
}

fn write_cell_text(t: &mut Element, text: &str) {
    t.set_text(text);
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        t.set_attr("xml:space", "preserve");
    }
}

pub fn extract_leaves(tree: &XmlTree, flavor: Flavor) -> Vec<TextUnit> {
    field_paths(&tree.root, flavor)
        .into_iter()
        .enumerate()
        .filter_map(|(ordinal, path)| {
            let text = field_text(tree.root.at(&path)?, flavor);
            if text.is_empty() {
                return None;
            }
            Some(TextUnit {
                address: Address::Leaf {
                    part: tree.name.clone(),
                    ordinal,
                },
                text,
                kind: flavor.kind(),
                style: None,
            })
        })
        .collect()
}

pub fn restore_leaves(
    tree: &mut XmlTree,
    flavor: Flavor,
    pairs: &[(&TextUnit, &str)],
) -> RestoreReport {
    let paths = field_paths(&tree.root, flavor);
    let mut report = RestoreReport::default();
    for (unit, text) in pairs {
        let result = (|| -> anyhow::Result<()> {
            let Address::Leaf { ordinal, .. } = &unit.address else {
                anyhow::bail!("not a field address");
            };
            let path = paths
                .get(*ordinal)
                .with_context(|| format!("field {ordinal} out of range ({})", paths.len()))?;
            let field = tree.root.at_mut(path).context("stale field path")?;
            set_field_text(field, flavor, text);
            Ok(())
        })();
        match result {
            Ok(()) => report.applied += 1,
            Err(err) => {
                log::warn!("{}: skip {:?}: {err:#}", tree.name, unit.address);
                report.skipped += 1;
            }
        }
    }
    report
}
