use crate::ir::{Address, ContainerKind, TextUnit};
use crate::markers::BLOCK_SEPARATOR;
use crate::style::{segment_block, FragmentInfo, StylePolicy};

use super::address::{collect_sites, ControlModel, SiteKind};
use super::wordml::{block_text, fragments, Walk, P, SDT_CONTENT};
use super::xml::{Element, XmlTree};

/// Extracts the text units of one WordprocessingML part in document order.
pub fn extract_part(tree: &XmlTree, policy: &StylePolicy) -> Vec<TextUnit> {
    let mut units: Vec<TextUnit> = Vec::new();
    for site in collect_sites(&tree.root) {
        let Some(el) = tree.root.at(&site.path) else {
            continue;
        };
        let in_grid = site.in_grid();
        match site.kind {
            SiteKind::Block { container, block } => {
                let infos: Vec<FragmentInfo> = fragments(el, Walk::Inline, policy)
                    .into_iter()
                    .map(|f| f.info)
                    .collect();
                for seg in segment_block(block, &infos) {
                    if seg.text.is_empty() {
                        continue;
                    }
                    units.push(TextUnit {
                        address: Address::Segment {
                            part: tree.name.clone(),
                            container: container.clone(),
                            block,
                            first: seg.first,
                            count: seg.len(),
                        },
                        text: seg.text,
                        kind: if in_grid {
                            ContainerKind::GridCell
                        } else {
                            ContainerKind::Fragment
                        },
                        style: Some(seg.style),
                    });
                }
            }
            SiteKind::Control { controls, model } => {
                let text = control_text(el, model, policy);
                if text.is_empty() {
                    continue;
                }
                units.push(TextUnit {
                    address: Address::Control {
                        part: tree.name.clone(),
                        controls,
                    },
                    text,
                    kind: ContainerKind::ContentControl,
                    style: None,
                });
            }
            SiteKind::Frame { controls, frames } => {
                for (ordinal, frag) in fragments(el, Walk::Flat, policy).into_iter().enumerate() {
                    if frag.info.text.is_empty() {
                        continue;
                    }
                    units.push(TextUnit {
                        address: Address::Floating {
                            part: tree.name.clone(),
                            controls: controls.clone(),
                            frames: frames.clone(),
                            ordinal,
                        },
                        text: frag.info.text,
                        kind: ContainerKind::FloatingText,
                        style: Some(frag.info.style),
                    });
                }
            }
        }
    }
    units
}

/// Aggregated text of a content control: blocks joined by the block separator, or the flat
/// fragment text for run-structured content.
pub fn control_text(sdt: &Element, model: ControlModel, policy: &StylePolicy) -> String {
    let Some(content) = sdt.child(SDT_CONTENT) else {
        return String::new();
    };
    match model {
        ControlModel::Blocks => {
            let blocks: Vec<String> = content
                .elements()
                .filter(|e| e.is(P))
                .map(|p| block_text(p, policy))
                .collect();
            blocks.join(&BLOCK_SEPARATOR.to_string())
        }
        ControlModel::Runs => fragments(content, Walk::Inline, policy)
            .into_iter()
            .map(|f| f.info.text)
            .collect(),
    }
}
