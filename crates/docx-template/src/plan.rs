/*
 * plan.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Deferred structural edits addressed by element path.
//!
//! Passes that add or remove siblings collect their edits first and apply
//! them afterwards, last in document order first, so that applying one edit
//! never shifts the path of another.

use crate::error::{TemplateError, TemplateResult};
use docx_xml::{XmlElement, XmlNode};

/// A single structural change.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Replace `parent.children[start..end]` with `nodes`.
    ///
    /// `start == end` inserts without removing anything.
    ReplaceChildren {
        parent: Vec<usize>,
        start: usize,
        end: usize,
        nodes: Vec<XmlNode>,
    },
}

impl Edit {
    /// Insert `nodes` after child `index` of `parent`.
    pub fn insert_after(parent: Vec<usize>, index: usize, nodes: Vec<XmlNode>) -> Self {
        Edit::ReplaceChildren {
            parent,
            start: index + 1,
            end: index + 1,
            nodes,
        }
    }

    /// Path of the first affected child slot.
    fn position(&self) -> Vec<usize> {
        match self {
            Edit::ReplaceChildren { parent, start, .. } => {
                let mut key = parent.clone();
                key.push(*start);
                key
            }
        }
    }

    fn apply(self, root: &mut XmlElement) -> TemplateResult<()> {
        match self {
            Edit::ReplaceChildren {
                parent,
                start,
                end,
                nodes,
            } => {
                let Some(target) = root.element_at_mut(&parent) else {
                    return Err(TemplateError::InvalidEdit {
                        path: parent,
                        message: "parent element not found".to_string(),
                    });
                };
                if start > end || end > target.children.len() {
                    return Err(TemplateError::InvalidEdit {
                        message: format!(
                            "range {}..{} out of bounds for {} children",
                            start,
                            end,
                            target.children.len()
                        ),
                        path: parent,
                    });
                }
                target.children.splice(start..end, nodes);
                Ok(())
            }
        }
    }
}

/// An ordered collection of edits against one tree.
#[derive(Debug, Clone, Default)]
pub struct ExpansionPlan {
    edits: Vec<Edit>,
}

impl ExpansionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Apply every edit, deepest and latest first. Returns the number applied.
    ///
    /// Edits must not overlap.
    pub fn apply(mut self, root: &mut XmlElement) -> TemplateResult<usize> {
        self.edits
            .sort_by_cached_key(|edit| std::cmp::Reverse(edit.position()));
        let count = self.edits.len();
        for edit in self.edits {
            edit.apply(root)?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_xml::parse;
    use pretty_assertions::assert_eq;

    fn names(element: &XmlElement) -> Vec<String> {
        element.child_elements().map(|e| e.text_content()).collect()
    }

    fn p(text: &str) -> XmlNode {
        XmlNode::Element(XmlElement::new("w:p").with_text(text))
    }

    #[test]
    fn test_edits_apply_in_reverse_order() {
        let mut root = parse("<body><w:p>a</w:p><w:p>b</w:p><w:p>c</w:p></body>")
            .unwrap()
            .root;
        let mut plan = ExpansionPlan::new();
        // Pushed in document order; indices refer to the original tree
        plan.push(Edit::insert_after(vec![], 0, vec![p("a1"), p("a2")]));
        plan.push(Edit::ReplaceChildren {
            parent: vec![],
            start: 2,
            end: 3,
            nodes: vec![],
        });
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.apply(&mut root).unwrap(), 2);
        assert_eq!(names(&root), vec!["a", "a1", "a2", "b"]);
    }

    #[test]
    fn test_nested_edit_applies_before_parent_shift() {
        let mut root = parse("<body><x><w:p>in</w:p></x><w:p>out</w:p></body>")
            .unwrap()
            .root;
        let mut plan = ExpansionPlan::new();
        plan.push(Edit::insert_after(vec![], 0, vec![p("new")]));
        plan.push(Edit::insert_after(vec![0], 0, vec![p("in2")]));
        plan.apply(&mut root).unwrap();
        assert_eq!(root.element_at(&[0]).unwrap().text_content(), "inin2");
        assert_eq!(names(&root), vec!["inin2", "new", "out"]);
    }

    #[test]
    fn test_invalid_path_is_an_error() {
        let mut root = XmlElement::new("body");
        let mut plan = ExpansionPlan::new();
        plan.push(Edit::insert_after(vec![3], 0, vec![]));
        assert!(matches!(
            plan.apply(&mut root),
            Err(TemplateError::InvalidEdit { .. })
        ));
    }
}
