use std::collections::HashMap;

use anyhow::{anyhow, bail, Context};

use crate::ir::{Address, RestoreReport, Step, TextUnit};
use crate::markers::{flatten_blocks, split_any_break, split_blocks};
use crate::style::StylePolicy;

use super::address::{collect_sites, ControlModel, Site, SiteKind};
use super::wordml::{
    block_template, build_text_nodes, clear_run_text, fragments, has_anchor, new_paragraph,
    new_run, run_text, set_run_text, Walk, P, PPR, RPR, SDT_CONTENT,
};
use super::xml::{Element, Node, NodePath, XmlTree};

#[derive(Default)]
struct QueuedBlock {
    prune: Vec<usize>,
    expand: Vec<Vec<String>>,
}

/// Writes replacement text back into one WordprocessingML part.
///
/// Text is written in document order without moving anything other units resolve to. Structural
/// work (pruning emptied fragments, inserting expanded blocks) is queued per block and runs in
/// reverse document order afterwards. A unit that does not resolve is skipped and logged.
pub fn restore_part(
    tree: &mut XmlTree,
    pairs: &[(&TextUnit, &str)],
    policy: &StylePolicy,
) -> RestoreReport {
    let mut restorer = PartRestorer {
        root: &mut tree.root,
        policy: *policy,
        sites: Vec::new(),
        dirty: true,
        queued: HashMap::new(),
        report: RestoreReport::default(),
    };
    for (unit, text) in pairs {
        match restorer.apply(unit, text) {
            Ok(()) => restorer.report.applied += 1,
            Err(err) => {
                log::warn!("{}: skip {:?}: {err:#}", tree.name, unit.address);
                restorer.report.skipped += 1;
            }
        }
    }
    restorer.finish(&tree.name);
    restorer.report
}

struct PartRestorer<'a> {
    root: &'a mut Element,
    policy: StylePolicy,
    sites: Vec<Site>,
    dirty: bool,
    queued: HashMap<(Vec<Step>, usize), QueuedBlock>,
    report: RestoreReport,
}

impl PartRestorer<'_> {
    fn sites(&mut self) -> &[Site] {
        if self.dirty {
            self.sites = collect_sites(self.root);
            self.dirty = false;
        }
        &self.sites
    }

    fn find_block(&mut self, container: &[Step], block: usize) -> Option<NodePath> {
        self.sites().iter().find_map(|s| match &s.kind {
            SiteKind::Block { container: c, block: b } if c == container && *b == block => {
                Some(s.path.clone())
            }
            _ => None,
        })
    }

    fn find_control(&mut self, controls: &[usize]) -> Option<(NodePath, ControlModel)> {
        self.sites().iter().find_map(|s| match &s.kind {
            SiteKind::Control { controls: c, model } if c == controls => {
                Some((s.path.clone(), *model))
            }
            _ => None,
        })
    }

    fn find_frame(&mut self, controls: &[usize], frames: &[usize]) -> Option<NodePath> {
        self.sites().iter().find_map(|s| match &s.kind {
            SiteKind::Frame {
                controls: c,
                frames: f,
            } if c == controls && f == frames => Some(s.path.clone()),
            _ => None,
        })
    }

    fn apply(&mut self, unit: &TextUnit, text: &str) -> anyhow::Result<()> {
        match &unit.address {
            Address::Segment {
                container,
                block,
                first,
                count,
                ..
            } => self.restore_segment(container, *block, *first, *count, text),
            Address::Control { controls, .. } => self.restore_control(controls, text),
            Address::Floating {
                controls,
                frames,
                ordinal,
                ..
            } => self.restore_floating(controls, frames, *ordinal, text),
            other => bail!("not a word-processing address: {other:?}"),
        }
    }

    fn restore_segment(
        &mut self,
        container: &[Step],
        block: usize,
        first: usize,
        count: usize,
        text: &str,
    ) -> anyhow::Result<()> {
        let path = self
            .find_block(container, block)
            .context("block no longer present")?;
        let policy = self.policy;
        let p = self.root.at_mut(&path).context("stale block path")?;
        let frags = fragments(p, Walk::Inline, &policy);
        if count == 0 || first + count > frags.len() {
            bail!(
                "fragments {first}..{} out of range ({} in block)",
                first + count,
                frags.len()
            );
        }

        let mut pieces = split_blocks(text).into_iter();
        let head = pieces.next().unwrap_or_default();
        let mut moved_anchor = false;
        for (k, frag) in frags[first..first + count].iter().enumerate() {
            let run = p.at_mut(&frag.path).context("stale fragment path")?;
            let before = run.children.len();
            if k == 0 {
                set_run_text(run, head);
            } else {
                clear_run_text(run);
            }
            moved_anchor |= has_anchor(run) && run.children.len() != before;
        }
        if moved_anchor {
            // Anchors host nested containers; their child positions changed.
            self.dirty = true;
        }

        let rest: Vec<String> = pieces.map(|s| s.to_string()).collect();
        let queued = self
            .queued
            .entry((container.to_vec(), block))
            .or_default();
        queued.prune.extend(first + 1..first + count);
        if !rest.is_empty() {
            queued.expand.push(rest);
        }
        Ok(())
    }

    fn restore_control(&mut self, controls: &[usize], text: &str) -> anyhow::Result<()> {
        let (path, model) = self
            .find_control(controls)
            .context("content control no longer present")?;
        let policy = self.policy;
        let sdt = self.root.at_mut(&path).context("stale control path")?;
        let content = sdt
            .child_mut(SDT_CONTENT)
            .ok_or_else(|| anyhow!("content control without content"))?;
        match model {
            ControlModel::Blocks => rebuild_block_control(content, text, &policy),
            ControlModel::Runs => rebuild_run_control(content, text, &policy),
        }
        self.dirty = true;
        Ok(())
    }

    fn restore_floating(
        &mut self,
        controls: &[usize],
        frames: &[usize],
        ordinal: usize,
        text: &str,
    ) -> anyhow::Result<()> {
        let path = self
            .find_frame(controls, frames)
            .context("floating container no longer present")?;
        let policy = self.policy;
        let frame = self.root.at_mut(&path).context("stale frame path")?;
        // Fresh walk: ordinals are never carried over from extraction.
        let frags = fragments(frame, Walk::Flat, &policy);
        let frag = frags
            .get(ordinal)
            .with_context(|| format!("fragment {ordinal} out of range ({})", frags.len()))?;
        let run = frame.at_mut(&frag.path).context("stale fragment path")?;
        if set_run_text(run, &flatten_blocks(text)) && has_anchor(run) {
            self.dirty = true;
        }
        Ok(())
    }

    fn finish(&mut self, part: &str) {
        if self.queued.is_empty() {
            return;
        }
        let policy = self.policy;
        let blocks: Vec<(NodePath, (Vec<Step>, usize))> = self
            .sites()
            .iter()
            .filter_map(|s| match &s.kind {
                SiteKind::Block { container, block } => {
                    Some((s.path.clone(), (container.clone(), *block)))
                }
                _ => None,
            })
            .collect();

        // Reverse document order keeps every earlier block path valid.
        for (path, key) in blocks.into_iter().rev() {
            let Some(mut work) = self.queued.remove(&key) else {
                continue;
            };
            let Some(p) = self.root.at_mut(&path) else {
                continue;
            };
            let (ppr, rpr) = block_template(p, &policy);

            work.prune.sort_unstable();
            work.prune.dedup();
            let frags = fragments(p, Walk::Inline, &policy);
            for idx in work.prune.into_iter().rev() {
                let Some(frag) = frags.get(idx) else {
                    continue;
                };
                let removable = p
                    .at(&frag.path)
                    .map(|r| run_text(r).is_empty() && !has_anchor(r))
                    .unwrap_or(false);
                if removable {
                    remove_at(p, &frag.path);
                }
            }

            if work.expand.is_empty() {
                continue;
            }
            let Some((&last, parent_path)) = path.split_last() else {
                continue;
            };
            let Some(parent) = self.root.at_mut(parent_path) else {
                continue;
            };
            let at = (last + 1).min(parent.children.len());
            for pieces in work.expand.iter().rev() {
                for piece in pieces.iter().rev() {
                    let block = new_paragraph(ppr.as_ref(), rpr.as_ref(), piece);
                    parent.children.insert(at, Node::Element(block));
                }
            }
        }
        for key in self.queued.keys() {
            log::warn!("{part}: queued work for block {key:?} has no target");
        }
        self.queued.clear();
        self.dirty = true;
    }
}

fn remove_at(base: &mut Element, path: &[usize]) -> Option<Node> {
    let (&last, parent_path) = path.split_last()?;
    let parent = base.at_mut(parent_path)?;
    if last < parent.children.len() {
        Some(parent.children.remove(last))
    } else {
        None
    }
}

/// Clears every own fragment of `el`, dropping the ones that carry nothing else.
fn clear_fragments(el: &mut Element, policy: &StylePolicy) {
    let frags = fragments(el, Walk::Inline, policy);
    for frag in frags.iter().rev() {
        let Some(run) = el.at_mut(&frag.path) else {
            continue;
        };
        clear_run_text(run);
        if !has_anchor(run) {
            remove_at(el, &frag.path);
        }
    }
}

fn set_block_props(p: &mut Element, ppr: Option<&Element>) {
    p.children
        .retain(|n| !matches!(n, Node::Element(e) if e.is(PPR)));
    if let Some(ppr) = ppr {
        p.children.insert(0, Node::Element(ppr.clone()));
    }
}

/// Rebuilds a block-structured control in place. Piece `j` goes into original block `j`, so
/// anchors kept by text clearing stay in the block they came from. Extra pieces follow the last
/// original block; unused trailing blocks left with nothing but properties are dropped.
fn rebuild_block_control(content: &mut Element, text: &str, policy: &StylePolicy) {
    let (ppr, rpr) = content
        .elements()
        .find(|e| e.is(P))
        .map(|p| block_template(p, policy))
        .unwrap_or((None, None));
    let pieces = split_blocks(text);

    let slots: Vec<usize> = content
        .children
        .iter()
        .enumerate()
        .filter_map(|(i, n)| matches!(n, Node::Element(e) if e.is(P)).then_some(i))
        .collect();
    for (j, &i) in slots.iter().enumerate() {
        let Some(Node::Element(p)) = content.children.get_mut(i) else {
            continue;
        };
        clear_fragments(p, policy);
        set_block_props(p, ppr.as_ref());
        if let Some(piece) = pieces.get(j).filter(|s| !s.is_empty()) {
            let at = usize::from(ppr.is_some());
            p.children
                .insert(at, Node::Element(new_run(rpr.as_ref(), piece)));
        }
    }

    if pieces.len() > slots.len() {
        let at = slots.last().map_or(content.children.len(), |&i| i + 1);
        let extra: Vec<Node> = pieces[slots.len()..]
            .iter()
            .map(|piece| Node::Element(new_paragraph(ppr.as_ref(), rpr.as_ref(), piece)))
            .collect();
        content.children.splice(at..at, extra);
    } else {
        for &i in slots[pieces.len()..].iter().rev() {
            let bare = matches!(
                content.children.get(i),
                Some(Node::Element(p)) if p.elements().all(|e| e.is(PPR))
            );
            if bare {
                content.children.remove(i);
            }
        }
    }
}

fn rebuild_run_control(content: &mut Element, text: &str, policy: &StylePolicy) {
    let frags = fragments(content, Walk::Inline, policy);
    let rpr = frags
        .first()
        .and_then(|f| content.at(&f.path))
        .and_then(|r| r.child(RPR))
        .cloned();
    let at = frags
        .first()
        .map(|f| f.path[0])
        .unwrap_or(content.children.len());
    clear_fragments(content, policy);

    let mut runs: Vec<Node> = Vec::new();
    for (i, line) in split_any_break(text).into_iter().enumerate() {
        if i == 0 && line.is_empty() {
            continue;
        }
        let mut run = new_run(rpr.as_ref(), "");
        if i > 0 {
            run.children.push(Node::Element(Element::new("w:br")));
        }
        run.children.extend(build_text_nodes(line));
        runs.push(Node::Element(run));
    }
    let at = at.min(content.children.len());
    content.children.splice(at..at, runs);
}
