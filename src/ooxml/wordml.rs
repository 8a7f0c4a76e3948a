//! WordprocessingML view of the element tree: blocks (`w:p`), fragments (`w:r`), their text
//! children, anchors and style keys.

use crate::markers::{BLOCK_SEPARATOR, LINE_BREAK, TAB};
use crate::style::{
    normalize_color, normalize_half_points, normalize_underline, Boundary, FragmentInfo, StyleKey,
    StylePolicy, VertAlign,
};

use super::xml::{Element, Node, NodePath};

pub const P: &str = "w:p";
pub const PPR: &str = "w:pPr";
pub const R: &str = "w:r";
pub const RPR: &str = "w:rPr";
pub const T: &str = "w:t";
pub const SDT: &str = "w:sdt";
pub const SDT_CONTENT: &str = "w:sdtContent";
pub const TXBX_CONTENT: &str = "w:txbxContent";
pub const HYPERLINK: &str = "w:hyperlink";
pub const FLD_SIMPLE: &str = "w:fldSimple";
pub const FLD_CHAR: &str = "w:fldChar";
pub const MC_FALLBACK: &str = "mc:Fallback";

/// Text children: the only children of a fragment that text clearing removes.
pub fn is_text_child(el: &Element) -> bool {
    match el.name.as_str() {
        "w:t" | "w:tab" | "w:ptab" | "w:cr" => true,
        "w:br" => matches!(el.attr("w:type"), None | Some("textWrapping")),
        _ => false,
    }
}

fn is_skipped_everywhere(name: &str) -> bool {
    matches!(
        name,
        "w:del" | "w:moveFrom" | MC_FALLBACK | PPR | RPR | "w:sdtPr" | "w:sdtEndPr"
    )
}

/// Whether a content control holds hyperlink or field members. Such a control is never
/// aggregated: its content is walked as part of the surrounding blocks.
pub fn holds_links_or_fields(sdt: &Element) -> bool {
    let Some(content) = sdt.child(SDT_CONTENT) else {
        return false;
    };
    let mut stack: Vec<&Element> = content.elements().collect();
    while let Some(el) = stack.pop() {
        match el.name.as_str() {
            HYPERLINK | FLD_SIMPLE | FLD_CHAR => return true,
            TXBX_CONTENT => {}
            _ => stack.extend(el.elements()),
        }
    }
    false
}

pub fn run_text(run: &Element) -> String {
    let mut out = String::new();
    for child in run.elements() {
        if !is_text_child(child) {
            continue;
        }
        match child.name.as_str() {
            "w:t" => out.push_str(&child.text()),
            "w:tab" | "w:ptab" => out.push(TAB),
            _ => out.push(LINE_BREAK),
        }
    }
    out
}

/// Whether the fragment holds anything besides properties and text: field characters, note and
/// comment references, drawings, page breaks and the like. Layout hints left by the last
/// rendering do not count.
pub fn has_anchor(run: &Element) -> bool {
    run.elements()
        .any(|c| c.name != RPR && c.name != "w:lastRenderedPageBreak" && !is_text_child(c))
}

/// Removes text children, keeping properties and anchors. Returns where new text belongs.
pub fn clear_run_text(run: &mut Element) -> usize {
    let mut insert_at: Option<usize> = None;
    let mut kept: Vec<Node> = Vec::with_capacity(run.children.len());
    for node in run.children.drain(..) {
        let drop = matches!(&node, Node::Element(e) if is_text_child(e));
        if drop {
            insert_at.get_or_insert(kept.len());
        } else {
            kept.push(node);
        }
    }
    run.children = kept;
    insert_at.unwrap_or(run.children.len())
}

/// Text nodes for `text`: line breaks and block separators become `w:br`, tabs `w:tab`.
pub fn build_text_nodes(text: &str) -> Vec<Node> {
    let mut nodes: Vec<Node> = Vec::new();
    let mut buf = String::new();
    let flush = |buf: &mut String, nodes: &mut Vec<Node>| {
        if buf.is_empty() {
            return;
        }
        let mut t = Element::new(T);
        if buf.starts_with(char::is_whitespace) || buf.ends_with(char::is_whitespace) {
            t.set_attr("xml:space", "preserve");
        }
        t.children.push(Node::Text(std::mem::take(buf)));
        nodes.push(Node::Element(t));
    };
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\t' => {
                flush(&mut buf, &mut nodes);
                nodes.push(Node::Element(Element::new("w:tab")));
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' | '\u{0B}' | '\u{2028}' | BLOCK_SEPARATOR => {
                flush(&mut buf, &mut nodes);
                nodes.push(Node::Element(Element::new("w:br")));
            }
            _ => buf.push(ch),
        }
    }
    flush(&mut buf, &mut nodes);
    nodes
}

/// Replaces the text of a fragment in place. Returns whether its child count changed.
pub fn set_run_text(run: &mut Element, text: &str) -> bool {
    let before = run.children.len();
    let at = clear_run_text(run);
    let nodes = build_text_nodes(text);
    run.children.splice(at..at, nodes);
    run.children.len() != before
}

pub fn new_run(rpr: Option<&Element>, text: &str) -> Element {
    let mut run = Element::new(R);
    if let Some(rpr) = rpr {
        run.children.push(Node::Element(rpr.clone()));
    }
    run.children.extend(build_text_nodes(text));
    run
}

pub fn new_paragraph(ppr: Option<&Element>, rpr: Option<&Element>, text: &str) -> Element {
    let mut p = Element::new(P);
    if let Some(ppr) = ppr {
        p.children.push(Node::Element(ppr.clone()));
    }
    if !text.is_empty() {
        p.children.push(Node::Element(new_run(rpr, text)));
    }
    p
}

fn on_off(el: &Element) -> bool {
    match el.attr("w:val") {
        Some(v) => {
            let s = v.trim().to_ascii_lowercase();
            !(s == "0" || s == "false" || s == "off" || s == "none")
        }
        None => true,
    }
}

pub fn style_key(
    rpr: Option<&Element>,
    policy: &StylePolicy,
    hyperlink: bool,
    field: bool,
) -> StyleKey {
    let mut key = StyleKey {
        hyperlink,
        field,
        ..StyleKey::default()
    };
    let Some(rpr) = rpr else {
        return key;
    };
    for prop in rpr.elements() {
        match prop.name.as_str() {
            "w:rFonts" => {
                key.font = ["w:ascii", "w:hAnsi", "w:eastAsia", "w:cs"]
                    .iter()
                    .find_map(|k| prop.attr(k))
                    .map(|v| v.to_string());
            }
            "w:sz" => key.size = normalize_half_points(prop.attr("w:val")),
            "w:b" => key.bold = on_off(prop),
            "w:i" => key.italic = on_off(prop),
            "w:strike" | "w:dstrike" => key.strike = key.strike || on_off(prop),
            "w:u" => key.underline = normalize_underline(prop.attr("w:val")),
            "w:color" => key.color = normalize_color(prop.attr("w:val"), policy),
            "w:vertAlign" => {
                key.vert_align = match prop.attr("w:val") {
                    Some("superscript") => Some(VertAlign::Superscript),
                    Some("subscript") => Some(VertAlign::Subscript),
                    _ => None,
                }
            }
            _ => {}
        }
    }
    key
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Walk {
    /// Own fragments of a block or a run-structured control: stops at nested aggregated controls.
    Inline,
    /// Every fragment of a floating container: walks through controls and grids.
    Flat,
}

#[derive(Clone, Debug)]
pub struct FragmentRef {
    /// Path relative to the element the walk started from.
    pub path: NodePath,
    pub info: FragmentInfo,
}

/// Enumerates fragments under `start` in document order with an explicit stack.
///
/// Never descends into a fragment, a nested floating container or a fallback branch.
pub fn fragments(start: &Element, walk: Walk, policy: &StylePolicy) -> Vec<FragmentRef> {
    struct Visit<'a> {
        el: &'a Element,
        path: NodePath,
        hyperlink: Option<usize>,
        simple_field: Option<usize>,
    }

    let mut out: Vec<FragmentRef> = Vec::new();
    let mut links = 0usize;
    let mut fields = 0usize;
    let mut depth = 0usize;
    let mut complex: Option<usize> = None;

    let mut stack: Vec<Visit<'_>> = start
        .indexed_elements()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .map(|(i, el)| Visit {
            el,
            path: vec![i],
            hyperlink: None,
            simple_field: None,
        })
        .collect();

    while let Some(v) = stack.pop() {
        let name = v.el.name.as_str();
        if is_skipped_everywhere(name) || name == TXBX_CONTENT {
            continue;
        }
        if name == SDT && walk == Walk::Inline && !holds_links_or_fields(v.el) {
            continue;
        }
        if name == R {
            let before = depth;
            let mut touched = false;
            for fc in v.el.elements().filter(|c| c.is(FLD_CHAR)) {
                touched = true;
                match fc.attr("w:fldCharType") {
                    Some("begin") => {
                        if depth == 0 {
                            complex = Some(fields);
                            fields += 1;
                        }
                        depth += 1;
                    }
                    Some("end") => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            let field = v
                .simple_field
                .or(if before > 0 || touched { complex } else { None });
            if depth == 0 {
                complex = None;
            }
            let info = FragmentInfo {
                style: style_key(
                    v.el.child(RPR),
                    policy,
                    v.hyperlink.is_some(),
                    field.is_some(),
                ),
                text: run_text(v.el),
                boundary: Boundary {
                    hyperlink: v.hyperlink,
                    field,
                    anchored: has_anchor(v.el),
                },
            };
            out.push(FragmentRef { path: v.path, info });
            continue;
        }

        let mut hyperlink = v.hyperlink;
        let mut simple_field = v.simple_field;
        if name == HYPERLINK {
            hyperlink = Some(links);
            links += 1;
        } else if name == FLD_SIMPLE && simple_field.is_none() {
            simple_field = Some(fields);
            fields += 1;
        }
        let children: Vec<(usize, &Element)> = v.el.indexed_elements().collect();
        for (i, child) in children.into_iter().rev() {
            let mut path = v.path.clone();
            path.push(i);
            stack.push(Visit {
                el: child,
                path,
                hyperlink,
                simple_field,
            });
        }
    }
    out
}

pub fn block_text(p: &Element, policy: &StylePolicy) -> String {
    fragments(p, Walk::Inline, policy)
        .into_iter()
        .map(|f| f.info.text)
        .collect()
}

/// Block-level properties and the first fragment's run-level properties of a block.
pub fn block_template(p: &Element, policy: &StylePolicy) -> (Option<Element>, Option<Element>) {
    let ppr = p.child(PPR).cloned();
    let rpr = fragments(p, Walk::Inline, policy)
        .first()
        .and_then(|f| p.at(&f.path))
        .and_then(|r| r.child(RPR))
        .cloned();
    (ppr, rpr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::xml::parse_xml_tree;

    fn para(xml: &str) -> Element {
        let doc = format!(
            r#"<w:p xmlns:w="urn:w" xmlns:mc="urn:mc">{xml}</w:p>"#
        );
        parse_xml_tree("p.xml", doc.as_bytes()).expect("parse").root
    }

    #[test]
    fn run_text_maps_controls() {
        let p = para(r#"<w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:br w:type="page"/><w:t>c</w:t></w:r>"#);
        let run = p.child(R).expect("run");
        assert_eq!(run_text(run), "a\tb\nc");
        assert!(has_anchor(run));
    }

    #[test]
    fn set_run_text_keeps_anchors_in_place() {
        let mut p = para(r#"<w:r><w:rPr><w:b/></w:rPr><w:t>old</w:t><w:footnoteReference w:id="2"/></w:r>"#);
        let run = p.child_mut(R).expect("run");
        set_run_text(run, " new\tline\nx");
        let names: Vec<&str> = run.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["w:rPr", "w:t", "w:tab", "w:t", "w:br", "w:t", "w:footnoteReference"]
        );
        assert_eq!(run.at(&[1]).and_then(|t| t.attr("xml:space")), Some("preserve"));
        assert_eq!(run_text(run), " new\tline\nx");
        assert_eq!(
            run.child("w:footnoteReference").and_then(|e| e.attr("w:id")),
            Some("2")
        );
    }

    #[test]
    fn inline_walk_tracks_links_fields_and_skips_nested() {
        let p = para(concat!(
            r#"<w:r><w:t>a</w:t></w:r>"#,
            r#"<w:hyperlink r:id="rId1"><w:r><w:t>b</w:t></w:r></w:hyperlink>"#,
            r#"<w:r><w:fldChar w:fldCharType="begin"/></w:r>"#,
            r#"<w:r><w:instrText> PAGE </w:instrText></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="separate"/></w:r>"#,
            r#"<w:r><w:t>7</w:t></w:r>"#,
            r#"<w:r><w:fldChar w:fldCharType="end"/></w:r>"#,
            r#"<w:sdt><w:sdtContent><w:r><w:t>ctl</w:t></w:r></w:sdtContent></w:sdt>"#,
            r#"<w:del><w:r><w:delText>gone</w:delText></w:r></w:del>"#,
            r#"<w:r><w:t>z</w:t></w:r>"#
        ));
        let frags = fragments(&p, Walk::Inline, &StylePolicy::default());
        let texts: Vec<&str> = frags.iter().map(|f| f.info.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "", "", "", "7", "", "z"]);
        assert_eq!(frags[1].info.boundary.hyperlink, Some(0));
        assert!(frags[1].info.style.hyperlink);
        assert_eq!(frags[5].info.boundary.field, Some(0));
        assert!(frags[5].info.style.field);
        assert!(frags[2].info.boundary.anchored);
        assert_eq!(frags[7].info.boundary.field, None);
        assert_eq!(frags[1].path, vec![1, 0]);
    }

    #[test]
    fn style_key_reads_run_properties() {
        let p = para(concat!(
            r#"<w:r><w:rPr><w:rFonts w:ascii="Arial"/><w:b/><w:i w:val="0"/><w:sz w:val="24"/>"#,
            r#"<w:u w:val="single"/><w:color w:val="ff0000"/><w:vertAlign w:val="superscript"/></w:rPr>"#,
            r#"<w:t>x</w:t></w:r>"#
        ));
        let key = style_key(
            p.child(R).and_then(|r| r.child(RPR)),
            &StylePolicy::default(),
            false,
            false,
        );
        assert_eq!(key.font.as_deref(), Some("Arial"));
        assert!(key.bold);
        assert!(!key.italic);
        assert_eq!(key.size, Some(24));
        assert_eq!(key.underline.as_deref(), Some("single"));
        assert_eq!(key.color.as_deref(), Some("FF0000"));
        assert_eq!(key.vert_align, Some(VertAlign::Superscript));
    }
}
