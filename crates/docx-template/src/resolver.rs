/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Resolving placeholder keys to values.
//!
//! The same paragraph substitution code runs in three scopes: the whole
//! document, one loop item, and one table row. Each scope is a
//! [`ValueResolver`]; a scope that does not own a key answers
//! [`Resolved::Deferred`] so the token survives for a later pass.

use crate::context::{Row, SpecialChar, TemplateContext};

/// The outcome of resolving one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Plain text (`\n` becomes a line break).
    Text(String),
    /// An HTML fragment to convert to styled runs.
    RichText(String),
    /// A character in a specific font.
    SpecialChar(SpecialChar),
    /// Nobody defines this key: substitute nothing and report it.
    Absent,
    /// Not this scope's key: leave the token for a later pass.
    Deferred,
}

/// Trait for resolving placeholder keys in one scope.
pub trait ValueResolver {
    /// Resolve a `{{key}}` placeholder.
    fn resolve(&self, key: &str) -> Resolved;

    /// Rewrite an image key through a per-item indirection.
    ///
    /// Inside a loop or table row, `{%item.Signature%}` names an item field
    /// whose value is the real image key. Returns `None` when the key is not
    /// an indirection in this scope.
    fn image_key(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Document-level resolver over the [`TemplateContext`] registries.
///
/// Dotted keys that are not scalars are assumed to be loop or row field
/// references and are deferred, unless `finalize` is set, in which case
/// every miss is absent.
#[derive(Debug, Clone, Copy)]
pub struct ContextResolver<'a> {
    data: &'a TemplateContext,
    finalize: bool,
}

impl<'a> ContextResolver<'a> {
    pub fn new(data: &'a TemplateContext) -> Self {
        Self {
            data,
            finalize: false,
        }
    }

    /// A resolver for the last sweep, after loops and tables ran.
    pub fn finalizing(data: &'a TemplateContext) -> Self {
        Self {
            data,
            finalize: true,
        }
    }
}

impl ValueResolver for ContextResolver<'_> {
    fn resolve(&self, key: &str) -> Resolved {
        if let Some(special) = self.data.special_char(key) {
            return Resolved::SpecialChar(special.clone());
        }
        if let Some(html) = self.data.rich_text(key) {
            return Resolved::RichText(html.to_string());
        }
        if let Some(value) = self.data.scalar(key) {
            return Resolved::Text(value.to_string());
        }
        if key.contains('.') && !self.finalize {
            Resolved::Deferred
        } else {
            Resolved::Absent
        }
    }
}

/// Resolver for one loop item: only `{{var.field}}` keys.
#[derive(Debug, Clone, Copy)]
pub struct LoopItemResolver<'a> {
    var: &'a str,
    item: &'a Row,
}

impl<'a> LoopItemResolver<'a> {
    pub fn new(var: &'a str, item: &'a Row) -> Self {
        Self { var, item }
    }

    fn field<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(self.var)?.strip_prefix('.')
    }
}

impl ValueResolver for LoopItemResolver<'_> {
    fn resolve(&self, key: &str) -> Resolved {
        match self.field(key) {
            Some(field) => match self.item.get(field) {
                Some(value) => Resolved::Text(value.clone()),
                None => Resolved::Absent,
            },
            None => Resolved::Deferred,
        }
    }

    fn image_key(&self, key: &str) -> Option<String> {
        let field = self.field(key)?;
        self.item.get(field).cloned()
    }
}

/// Resolver for one table row.
///
/// Both `{{field}}` and `{{item.field}}` read the row; anything the row does
/// not define falls back to the document context.
#[derive(Debug, Clone, Copy)]
pub struct RowResolver<'a> {
    row: &'a Row,
    fallback: ContextResolver<'a>,
}

impl<'a> RowResolver<'a> {
    pub fn new(row: &'a Row, data: &'a TemplateContext) -> Self {
        Self {
            row,
            fallback: ContextResolver::new(data),
        }
    }

    fn lookup(&self, key: &str) -> Option<&'a String> {
        if let Some(value) = self.row.get(key) {
            return Some(value);
        }
        let (_, field) = key.split_once('.')?;
        self.row.get(field)
    }
}

impl ValueResolver for RowResolver<'_> {
    fn resolve(&self, key: &str) -> Resolved {
        match self.lookup(key) {
            Some(value) => Resolved::Text(value.clone()),
            None => self.fallback.resolve(key),
        }
    }

    fn image_key(&self, key: &str) -> Option<String> {
        self.lookup(key).cloned()
    }
}
