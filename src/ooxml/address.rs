//! Depth-first enumeration of the containers of a WordprocessingML part.
//!
//! The walk uses an explicit stack and carries the counter state for content controls and
//! floating text containers, so the same tree always yields the same sites in the same order.

use crate::ir::Step;

use super::wordml::{holds_links_or_fields, MC_FALLBACK, P, R, SDT, SDT_CONTENT, TXBX_CONTENT};
use super::xml::{Element, NodePath};

/// Occurrence counters keyed by nesting depth.
///
/// Entering a container of this kind at depth `d` takes the next number from `counts[d]`.
/// Counters are never reset: the composed path up to `d` already tells parents apart.
#[derive(Clone, Debug, Default)]
pub struct DepthCounters {
    counts: Vec<usize>,
    path: Vec<usize>,
}

impl DepthCounters {
    pub fn enter(&mut self) -> usize {
        let depth = self.path.len();
        if self.counts.len() <= depth {
            self.counts.resize(depth + 1, 0);
        }
        let index = self.counts[depth];
        self.counts[depth] += 1;
        self.path.push(index);
        index
    }

    pub fn leave(&mut self) {
        self.path.pop();
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlModel {
    /// `w:sdtContent` holds blocks.
    Blocks,
    /// `w:sdtContent` holds a flat fragment sequence.
    Runs,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SiteKind {
    Block { container: Vec<Step>, block: usize },
    Control { controls: Vec<usize>, model: ControlModel },
    Frame { controls: Vec<usize>, frames: Vec<usize> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Site {
    pub path: NodePath,
    pub kind: SiteKind,
}

impl Site {
    pub fn in_grid(&self) -> bool {
        matches!(&self.kind, SiteKind::Block { container, .. }
            if container.iter().any(|s| matches!(s, Step::Cell { .. })))
    }
}

/// Content model of an aggregated control; `None` when the control is transparent.
pub fn control_model(sdt: &Element) -> Option<ControlModel> {
    if holds_links_or_fields(sdt) {
        return None;
    }
    let content = sdt.child(SDT_CONTENT)?;
    if content.elements().any(|e| e.is(P)) {
        Some(ControlModel::Blocks)
    } else if content.elements().any(|e| e.is(R)) {
        Some(ControlModel::Runs)
    } else {
        None
    }
}

struct Container {
    path: Vec<Step>,
    blocks: usize,
    tables: usize,
}

enum Visit<'a> {
    Enter {
        el: &'a Element,
        path: NodePath,
        claimed: bool,
    },
    LeaveContainer,
    LeaveTable,
    LeaveRow,
    LeaveControl,
    LeaveFrame,
}

/// All sites of a part in document order.
pub fn collect_sites(root: &Element) -> Vec<Site> {
    let mut sites: Vec<Site> = Vec::new();
    let mut controls = DepthCounters::default();
    let mut frames = DepthCounters::default();
    let mut containers: Vec<Container> = Vec::new();
    // (table ordinal, rows seen) and (row ordinal, cells seen)
    let mut tables: Vec<(usize, usize)> = Vec::new();
    let mut rows: Vec<(usize, usize)> = Vec::new();
    let mut stories = 0usize;

    let mut stack: Vec<Visit<'_>> = vec![Visit::Enter {
        el: root,
        path: Vec::new(),
        claimed: false,
    }];

    while let Some(visit) = stack.pop() {
        let (el, path, claimed) = match visit {
            Visit::Enter { el, path, claimed } => (el, path, claimed),
            Visit::LeaveContainer => {
                containers.pop();
                continue;
            }
            Visit::LeaveTable => {
                tables.pop();
                continue;
            }
            Visit::LeaveRow => {
                rows.pop();
                continue;
            }
            Visit::LeaveControl => {
                controls.leave();
                continue;
            }
            Visit::LeaveFrame => {
                frames.leave();
                continue;
            }
        };

        let floating = frames.depth() > 0;
        let mut claim_blocks = false;
        match el.name.as_str() {
            MC_FALLBACK => continue,
            "w:body" | "w:hdr" | "w:ftr" => {
                containers.push(Container {
                    path: Vec::new(),
                    blocks: 0,
                    tables: 0,
                });
                stack.push(Visit::LeaveContainer);
            }
            "w:footnote" | "w:endnote" | "w:comment" => {
                containers.push(Container {
                    path: vec![Step::Story(stories)],
                    blocks: 0,
                    tables: 0,
                });
                stories += 1;
                stack.push(Visit::LeaveContainer);
            }
            "w:tbl" if !floating => {
                if let Some(c) = containers.last_mut() {
                    tables.push((c.tables, 0));
                    c.tables += 1;
                    stack.push(Visit::LeaveTable);
                }
            }
            "w:tr" if !floating => {
                if let Some(t) = tables.last_mut() {
                    rows.push((t.1, 0));
                    t.1 += 1;
                    stack.push(Visit::LeaveRow);
                }
            }
            "w:tc" if !floating => {
                if let (Some(t), Some(r), Some(c)) =
                    (tables.last(), rows.last_mut(), containers.last())
                {
                    let mut cpath = c.path.clone();
                    cpath.push(Step::Cell {
                        table: t.0,
                        row: r.0,
                        cell: r.1,
                    });
                    r.1 += 1;
                    containers.push(Container {
                        path: cpath,
                        blocks: 0,
                        tables: 0,
                    });
                    stack.push(Visit::LeaveContainer);
                }
            }
            P if !floating && !claimed => {
                if let Some(c) = containers.last_mut() {
                    sites.push(Site {
                        path: path.clone(),
                        kind: SiteKind::Block {
                            container: c.path.clone(),
                            block: c.blocks,
                        },
                    });
                    c.blocks += 1;
                }
            }
            SDT => {
                controls.enter();
                stack.push(Visit::LeaveControl);
                if !floating {
                    if let Some(model) = control_model(el) {
                        sites.push(Site {
                            path: path.clone(),
                            kind: SiteKind::Control {
                                controls: controls.path().to_vec(),
                                model,
                            },
                        });
                        claim_blocks = model == ControlModel::Blocks;
                    }
                }
            }
            TXBX_CONTENT => {
                frames.enter();
                stack.push(Visit::LeaveFrame);
                sites.push(Site {
                    path: path.clone(),
                    kind: SiteKind::Frame {
                        controls: controls.path().to_vec(),
                        frames: frames.path().to_vec(),
                    },
                });
            }
            _ => {}
        }

        let children: Vec<(usize, &Element)> = el.indexed_elements().collect();
        for (i, child) in children.into_iter().rev() {
            let mut child_path = path.clone();
            child_path.push(i);
            // Blocks directly inside an aggregated control belong to the control.
            if claim_blocks && child.is(SDT_CONTENT) {
                let grand: Vec<(usize, &Element)> = child.indexed_elements().collect();
                for (j, g) in grand.into_iter().rev() {
                    let mut gpath = child_path.clone();
                    gpath.push(j);
                    stack.push(Visit::Enter {
                        el: g,
                        path: gpath,
                        claimed: g.is(P),
                    });
                }
                continue;
            }
            stack.push(Visit::Enter {
                el: child,
                path: child_path,
                claimed: false,
            });
        }
    }
    sites
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xml::parse_xml_tree;

    fn sites_of(body: &str) -> Vec<Site> {
        let xml = format!(
            r#"<w:document xmlns:w="urn:w" xmlns:mc="urn:mc"><w:body>{body}</w:body></w:document>"#
        );
        let tree = parse_xml_tree("word/document.xml", xml.as_bytes()).expect("parse");
        collect_sites(&tree.root)
    }

    #[test]
    fn depth_counters_compose_paths() {
        let mut c = DepthCounters::default();
        assert_eq!(c.enter(), 0);
        assert_eq!(c.enter(), 0);
        assert_eq!(c.path(), &[0, 0]);
        c.leave();
        c.leave();
        assert_eq!(c.enter(), 1);
        assert_eq!(c.enter(), 1);
        assert_eq!(c.path(), &[1, 1]);
    }

    #[test]
    fn body_and_grid_blocks() {
        let sites = sites_of(concat!(
            "<w:p/>",
            "<w:tbl><w:tr><w:tc><w:p/><w:p/></w:tc><w:tc><w:p/></w:tc></w:tr>",
            "<w:tr><w:tc><w:tbl><w:tr><w:tc><w:p/></w:tc></w:tr></w:tbl></w:tc></w:tr></w:tbl>",
            "<w:p/>"
        ));
        let kinds: Vec<SiteKind> = sites.into_iter().map(|s| s.kind).collect();
        let cell = |table, row, cell| Step::Cell { table, row, cell };
        assert_eq!(
            kinds,
            vec![
                SiteKind::Block { container: vec![], block: 0 },
                SiteKind::Block { container: vec![cell(0, 0, 0)], block: 0 },
                SiteKind::Block { container: vec![cell(0, 0, 0)], block: 1 },
                SiteKind::Block { container: vec![cell(0, 0, 1)], block: 0 },
                SiteKind::Block { container: vec![cell(0, 1, 0), cell(0, 0, 0)], block: 0 },
                SiteKind::Block { container: vec![], block: 1 },
            ]
        );
    }

    #[test]
    fn controls_claim_their_blocks_and_frames_nest() {
        let sites = sites_of(concat!(
            "<w:sdt><w:sdtContent><w:p/><w:p/></w:sdtContent></w:sdt>",
            "<w:p><w:r><w:drawing><w:txbxContent>",
            "<w:p/><w:sdt><w:sdtContent><w:p><w:r><w:pict><w:txbxContent><w:p/></w:txbxContent></w:pict></w:r></w:p></w:sdtContent></w:sdt>",
            "</w:txbxContent></w:drawing></w:r></w:p>",
            "<w:p/>"
        ));
        let kinds: Vec<SiteKind> = sites.into_iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SiteKind::Control { controls: vec![0], model: ControlModel::Blocks },
                SiteKind::Block { container: vec![], block: 0 },
                SiteKind::Frame { controls: vec![], frames: vec![0] },
                SiteKind::Frame { controls: vec![1], frames: vec![0, 0] },
                SiteKind::Block { container: vec![], block: 1 },
            ]
        );
    }

    #[test]
    fn controls_with_links_or_fields_stay_transparent() {
        let sites = sites_of(concat!(
            r#"<w:sdt><w:sdtContent><w:p><w:hyperlink r:id="rId1"><w:r><w:t>a</w:t></w:r></w:hyperlink></w:p></w:sdtContent></w:sdt>"#,
            r#"<w:p><w:sdt><w:sdtContent><w:r><w:fldChar w:fldCharType="begin"/></w:r></w:sdtContent></w:sdt></w:p>"#,
            r#"<w:sdt><w:sdtContent><w:p/></w:sdtContent></w:sdt>"#
        ));
        let kinds: Vec<SiteKind> = sites.into_iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SiteKind::Block { container: vec![], block: 0 },
                SiteKind::Block { container: vec![], block: 1 },
                SiteKind::Control { controls: vec![2], model: ControlModel::Blocks },
            ]
        );
    }

    #[test]
    fn fallback_branch_is_not_walked() {
        let sites = sites_of(concat!(
            "<w:p><w:r><mc:AlternateContent>",
            "<mc:Choice><w:drawing><w:txbxContent><w:p/></w:txbxContent></w:drawing></mc:Choice>",
            "<mc:Fallback><w:pict><w:txbxContent><w:p/></w:txbxContent></w:pict></mc:Fallback>",
            "</mc:AlternateContent></w:r></w:p>"
        ));
        let frames = sites
            .iter()
            .filter(|s| matches!(s.kind, SiteKind::Frame { .. }))
            .count();
        assert_eq!(frames, 1);
    }
}
