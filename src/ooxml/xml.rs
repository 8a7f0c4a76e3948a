use anyhow::{anyhow, Context};
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::Reader;

/// Child-index path from the root element.
pub type NodePath = Vec<usize>;

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
    PI(String),
    DocType(String),
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Element {
    pub name: String,
    /// Attribute values are kept raw (still escaped) so they round-trip byte-for-byte.
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Decl {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

#[derive(Clone, Debug)]
pub struct XmlTree {
    pub name: String,
    pub decl: Option<Decl>,
    pub prolog: Vec<Node>,
    pub root: Element,
    pub epilog: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        for (k, v) in self.attrs.iter_mut() {
            if k == key {
                *v = value.to_string();
                return;
            }
        }
        self.attrs.push((key.to_string(), value.to_string()));
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Child elements with their index in `children`.
    pub fn indexed_elements(&self) -> impl Iterator<Item = (usize, &Element)> {
        self.children.iter().enumerate().filter_map(|(i, n)| match n {
            Node::Element(e) => Some((i, e)),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Concatenated character data of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<&Node> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            match node {
                Node::Text(t) | Node::CData(t) => out.push_str(t),
                Node::Element(e) => stack.extend(e.children.iter().rev()),
                _ => {}
            }
        }
        out
    }

    pub fn set_text(&mut self, text: &str) {
        self.children.retain(|n| !matches!(n, Node::Text(_) | Node::CData(_)));
        if !text.is_empty() {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    pub fn at(&self, path: &[usize]) -> Option<&Element> {
        let mut cur = self;
        for &i in path {
            cur = match cur.children.get(i)? {
                Node::Element(e) => e,
                _ => return None,
            };
        }
        Some(cur)
    }

    pub fn at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut cur = self;
        for &i in path {
            cur = match cur.children.get_mut(i)? {
                Node::Element(e) => e,
                _ => return None,
            };
        }
        Some(cur)
    }
}

pub fn parse_xml_tree(name: &str, xml_bytes: &[u8]) -> anyhow::Result<XmlTree> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut decl: Option<Decl> = None;
    let mut prolog: Vec<Node> = Vec::new();
    let mut epilog: Vec<Node> = Vec::new();
    let mut root: Option<Element> = None;
    let mut stack: Vec<Element> = Vec::new();

    fn push_node(
        node: Node,
        stack: &mut [Element],
        root: &Option<Element>,
        prolog: &mut Vec<Node>,
        epilog: &mut Vec<Node>,
    ) {
        if let Some(top) = stack.last_mut() {
            top.children.push(node);
        } else if root.is_some() {
            epilog.push(node);
        } else {
            prolog.push(node);
        }
    }

    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).context("read xml event")?;
        match ev {
            Event::Eof => break,
            Event::Decl(d) => {
                let version = bytes_to_string(d.version().context("decl version")?);
                let encoding = d
                    .encoding()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                let standalone = d
                    .standalone()
                    .map(|r| r.map(bytes_to_string))
                    .transpose()
                    .unwrap_or(None);
                decl = Some(Decl {
                    version,
                    encoding,
                    standalone,
                });
            }
            Event::Start(s) => {
                stack.push(Element {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                    children: Vec::new(),
                });
            }
            Event::End(e) => {
                let tag = bytes_to_string(e.name().as_ref());
                let done = stack
                    .pop()
                    .ok_or_else(|| anyhow!("unbalanced end tag </{tag}> in {name}"))?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Element(done));
                } else if root.is_none() {
                    root = Some(done);
                } else {
                    return Err(anyhow!("multiple root elements"));
                }
            }
            Event::Empty(s) => {
                let el = Element {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(&s)?,
                    children: Vec::new(),
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Element(el));
                } else if root.is_none() {
                    root = Some(el);
                } else {
                    return Err(anyhow!("multiple root elements"));
                }
            }
            Event::Text(t) => {
                let txt = t.unescape().context("unescape text")?.into_owned();
                if stack.is_empty() && txt.trim().is_empty() {
                    continue;
                }
                push_node(Node::Text(txt), &mut stack, &root, &mut prolog, &mut epilog);
            }
            Event::CData(t) => {
                let txt = bytes_to_string(t.into_inner());
                push_node(Node::CData(txt), &mut stack, &root, &mut prolog, &mut epilog);
            }
            Event::Comment(t) => {
                let txt = bytes_to_string(t.into_inner());
                push_node(Node::Comment(txt), &mut stack, &root, &mut prolog, &mut epilog);
            }
            Event::PI(t) => {
                let target = bytes_to_string(t.target());
                let content = bytes_to_string(t.content());
                push_node(
                    Node::PI(format!("{target}{content}")),
                    &mut stack,
                    &root,
                    &mut prolog,
                    &mut epilog,
                );
            }
            Event::DocType(t) => {
                let txt = bytes_to_string(t.into_inner());
                push_node(Node::DocType(txt), &mut stack, &root, &mut prolog, &mut epilog);
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(anyhow!("unclosed element <{}> in {name}", open.name));
    }
    let root = root.with_context(|| format!("no root element in {name}"))?;
    Ok(XmlTree {
        name: name.to_string(),
        decl,
        prolog,
        root,
        epilog,
    })
}

fn collect_attrs(s: &BytesStart<'_>) -> anyhow::Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.context("attr")?;
        let key = bytes_to_string(a.key.as_ref());
        // Raw bytes: unescaping would turn character references such as `&#13;&#10;` into
        // literal newlines, which XML attribute normalization then rewrites to spaces.
        let val = bytes_to_string(a.value.as_ref());
        attrs.push((key, val));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn write_xml_tree(tree: &XmlTree) -> anyhow::Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    if let Some(d) = tree.decl.as_ref() {
        let decl = BytesDecl::new(d.version.as_str(), d.encoding.as_deref(), d.standalone.as_deref());
        let mut writer = quick_xml::Writer::new(Vec::new());
        writer.write_event(Event::Decl(decl)).context("write decl")?;
        out.extend_from_slice(&writer.into_inner());
        out.extend_from_slice(b"\r\n");
    }
    for node in &tree.prolog {
        write_node(&mut out, node);
    }
    write_element(&mut out, &tree.root);
    for node in &tree.epilog {
        write_node(&mut out, node);
    }
    Ok(out)
}

fn escape_text_into(out: &mut Vec<u8>, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '>' => out.extend_from_slice(b"&gt;"),
            _ => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
}

fn write_start_like(out: &mut Vec<u8>, name: &str, attrs: &[(String, String)], empty: bool) {
    out.extend_from_slice(b"<");
    out.extend_from_slice(name.as_bytes());
    for (k, v) in attrs {
        out.extend_from_slice(b" ");
        out.extend_from_slice(k.as_bytes());
        out.extend_from_slice(b"=\"");
        out.extend_from_slice(v.as_bytes());
        out.extend_from_slice(b"\"");
    }
    if empty {
        out.extend_from_slice(b"/>");
    } else {
        out.extend_from_slice(b">");
    }
}

enum WriteStep<'a> {
    Node(&'a Node),
    Close(&'a str),
}

fn write_element(out: &mut Vec<u8>, root: &Element) {
    write_start_like(out, &root.name, &root.attrs, root.children.is_empty());
    if root.children.is_empty() {
        return;
    }
    let mut stack: Vec<WriteStep<'_>> = vec![WriteStep::Close(&root.name)];
    stack.extend(root.children.iter().rev().map(WriteStep::Node));
    while let Some(step) = stack.pop() {
        match step {
            WriteStep::Close(name) => {
                out.extend_from_slice(b"</");
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b">");
            }
            WriteStep::Node(Node::Element(e)) => {
                write_start_like(out, &e.name, &e.attrs, e.children.is_empty());
                if !e.children.is_empty() {
                    stack.push(WriteStep::Close(&e.name));
                    stack.extend(e.children.iter().rev().map(WriteStep::Node));
                }
            }
            WriteStep::Node(other) => write_node(out, other),
        }
    }
}

fn write_node(out: &mut Vec<u8>, node: &Node) {
    match node {
        Node::Element(e) => write_element(out, e),
        Node::Text(text) => escape_text_into(out, text),
        Node::CData(text) => {
            out.extend_from_slice(b"<![CDATA[");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b"]]>");
        }
        Node::Comment(text) => {
            out.extend_from_slice(b"<!--");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b"-->");
        }
        Node::PI(content) => {
            out.extend_from_slice(b"<?");
            out.extend_from_slice(content.as_bytes());
            out.extend_from_slice(b"?>");
        }
        Node::DocType(text) => {
            out.extend_from_slice(b"<!DOCTYPE");
            out.extend_from_slice(text.as_bytes());
            out.extend_from_slice(b">");
        }
    }
}
