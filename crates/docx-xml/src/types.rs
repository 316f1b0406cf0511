//! Core types for mutable XML trees.

/// A parsed XML part.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// The `<?xml ...?>` declaration, if the source had one.
    pub declaration: Option<XmlDeclaration>,

    /// Comments and processing instructions that precede the root element.
    pub prolog: Vec<XmlNode>,

    /// The root element of the document.
    pub root: XmlElement,
}

/// The contents of an XML declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

/// An XML element.
///
/// Names are stored split into an optional namespace prefix and a local
/// name. Namespace URIs are not resolved: WordprocessingML parts use fixed
/// conventional prefixes (`w:`, `wp:`, `a:`, `r:`), and matching on the
/// qualified name is what the rest of the workspace does.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    /// The local name of the element (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any (e.g., "w" in `<w:p>`).
    pub prefix: Option<String>,

    /// Attributes of this element, in source order.
    pub attributes: Vec<XmlAttribute>,

    /// Child nodes, in document order.
    pub children: Vec<XmlNode>,
}

/// An XML attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// The local name of the attribute (without namespace prefix).
    pub name: String,

    /// Namespace prefix, if any (`xmlns` declarations keep `xmlns` here).
    pub prefix: Option<String>,

    /// The attribute value (after unescaping XML entities).
    pub value: String,
}

/// A single child node of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    /// A child element.
    Element(XmlElement),

    /// Text content (after unescaping XML entities).
    Text(String),

    /// A CDATA section.
    CData(String),

    /// A comment (raw content between `<!--` and `-->`).
    Comment(String),

    /// A processing instruction (raw content between `<?` and `?>`).
    ProcessingInstruction(String),
}

/// Split a qualified name into `(prefix, local)`.
pub(crate) fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

impl XmlDocument {
    /// Create a document with a standard UTF-8 standalone declaration.
    pub fn new(root: XmlElement) -> Self {
        Self {
            declaration: Some(XmlDeclaration {
                version: "1.0".to_string(),
                encoding: Some("UTF-8".to_string()),
                standalone: Some("yes".to_string()),
            }),
            prolog: Vec::new(),
            root,
        }
    }
}

impl XmlNode {
    /// Return the element if this node is one.
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Return the element mutably if this node is one.
    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlNode::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl From<XmlElement> for XmlNode {
    fn from(element: XmlElement) -> Self {
        XmlNode::Element(element)
    }
}

impl XmlElement {
    /// Create a new empty element from a qualified name such as `"w:p"`.
    pub fn new(qname: &str) -> Self {
        let (prefix, name) = split_qname(qname);
        Self {
            name: name.to_string(),
            prefix: prefix.map(str::to_string),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Copy the name and attributes without any children.
    pub fn clone_shallow(&self) -> Self {
        Self {
            name: self.name.clone(),
            prefix: self.prefix.clone(),
            attributes: self.attributes.clone(),
            children: Vec::new(),
        }
    }

    /// Check whether this element has the given qualified name.
    pub fn is(&self, qname: &str) -> bool {
        let (prefix, name) = split_qname(qname);
        self.name == name && self.prefix.as_deref() == prefix
    }

    /// The qualified name (`prefix:name`, or just `name`).
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }

    /// Get an attribute value by qualified name.
    pub fn attr(&self, qname: &str) -> Option<&str> {
        let (prefix, name) = split_qname(qname);
        self.attributes
            .iter()
            .find(|a| a.name == name && a.prefix.as_deref() == prefix)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attr(&mut self, qname: &str, value: impl Into<String>) {
        let (prefix, name) = split_qname(qname);
        let value = value.into();
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|a| a.name == name && a.prefix.as_deref() == prefix)
        {
            existing.value = value;
        } else {
            self.attributes.push(XmlAttribute {
                name: name.to_string(),
                prefix: prefix.map(str::to_string),
                value,
            });
        }
    }

    /// Remove an attribute. Returns `true` if it was present.
    pub fn remove_attr(&mut self, qname: &str) -> bool {
        let (prefix, name) = split_qname(qname);
        let before = self.attributes.len();
        self.attributes
            .retain(|a| !(a.name == name && a.prefix.as_deref() == prefix));
        before != self.attributes.len()
    }

    /// Builder form of [`XmlElement::set_attr`].
    pub fn with_attr(mut self, qname: &str, value: impl Into<String>) -> Self {
        self.set_attr(qname, value);
        self
    }

    /// Builder: append a child element.
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder: append a text node.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![XmlNode::Text(text.into())];
    }

    /// Iterate over child elements (ignoring text and other nodes).
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(XmlNode::as_element)
    }

    /// Iterate mutably over child elements.
    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(XmlNode::as_element_mut)
    }

    /// Find the first child element with the given qualified name.
    pub fn find_child(&self, qname: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.is(qname))
    }

    /// Find the first child element with the given qualified name, mutably.
    pub fn find_child_mut(&mut self, qname: &str) -> Option<&mut XmlElement> {
        self.child_elements_mut().find(|e| e.is(qname))
    }

    /// Index (into `children`) of the first child element with the given name.
    pub fn position_of_child(&self, qname: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|n| n.as_element().is_some_and(|e| e.is(qname)))
    }

    /// Get a descendant element by path. An empty path returns `self`.
    pub fn element_at(&self, path: &[usize]) -> Option<&XmlElement> {
        let mut current = self;
        for &index in path {
            current = current.children.get(index)?.as_element()?;
        }
        Some(current)
    }

    /// Get a descendant element by path, mutably.
    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut XmlElement> {
        let mut current = self;
        for &index in path {
            current = current.children.get_mut(index)?.as_element_mut()?;
        }
        Some(current)
    }

    /// Collect paths of all descendant elements matching `pred`, in document order.
    ///
    /// When `descend_into_matches` is false, the search does not look inside
    /// an element once it matched.
    pub fn find_paths(
        &self,
        pred: &dyn Fn(&XmlElement) -> bool,
        descend_into_matches: bool,
    ) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        collect_paths(self, pred, descend_into_matches, &mut prefix, &mut out);
        out
    }

    /// Concatenate all descendant text nodes.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        append_text(self, &mut out);
        out
    }

    /// Check whether this element has no children at all.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

fn collect_paths(
    element: &XmlElement,
    pred: &dyn Fn(&XmlElement) -> bool,
    descend_into_matches: bool,
    prefix: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    for (index, child) in element.children.iter().enumerate() {
        let XmlNode::Element(child) = child else {
            continue;
        };
        prefix.push(index);
        let matched = pred(child);
        if matched {
            out.push(prefix.clone());
        }
        if !matched || descend_into_matches {
            collect_paths(child, pred, descend_into_matches, prefix, out);
        }
        prefix.pop();
    }
}

fn append_text(element: &XmlElement, out: &mut String) {
    for child in &element.children {
        match child {
            XmlNode::Element(e) => append_text(e, out),
            XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
            XmlNode::Comment(_) | XmlNode::ProcessingInstruction(_) => {}
        }
    }
}
