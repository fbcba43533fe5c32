// ember-core-client/ember-xmpp
//
// Copyright: 2023, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use minidom::{Element, NSChoice, Node};

use crate::stanza::{ns, IqKind, MessageKind};
use crate::util::ParseError;
use crate::UserJid;

/// An XML element tree.
///
/// `clone()` shares the backing element and bumps its reference count. Every mutation goes
/// through copy-on-write, so a clone handed across a callback boundary can never change the
/// tree it was cloned from. Use `deep_copy()` to get a tree with its own backing right away.
#[derive(Debug, Clone, PartialEq)]
pub struct StanzaTree {
    element: Arc<Element>,
}

impl StanzaTree {
    /// Creates an element in the `jabber:client` namespace.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self::new_with_ns(name, ns::JABBER_CLIENT)
    }

    pub fn new_with_ns(name: impl AsRef<str>, namespace: impl Into<String>) -> Self {
        Element::builder(name.as_ref(), namespace).build().into()
    }

    /// The valid placeholder that is left behind by `take()`.
    pub fn empty() -> Self {
        Self::new("")
    }

    pub fn new_text_node(name: impl AsRef<str>, text: impl Into<String>) -> Self {
        Self::new(name).set_text(text)
    }

    pub fn new_presence() -> Self {
        Self::new("presence")
    }

    pub fn new_message(kind: MessageKind) -> Self {
        Self::new("message").set_kind(kind)
    }

    pub fn new_iq(kind: IqKind, id: impl Into<String>) -> Self {
        Self::new("iq").set_kind(kind).set_id(id.into())
    }

    /// Returns a tree with its own, independent backing element.
    pub fn deep_copy(&self) -> Self {
        StanzaTree {
            element: Arc::new(self.element.as_ref().clone()),
        }
    }

    /// Moves the backing element out and leaves an empty tree in its place.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::empty())
    }

    pub fn is_empty(&self) -> bool {
        self.element.name().is_empty()
            && self.element.attrs().next().is_none()
            && self.element.nodes().next().is_none()
    }

    /// Number of trees currently sharing this tree's backing element.
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.element)
    }

    pub fn shares_backing_with(&self, other: &StanzaTree) -> bool {
        Arc::ptr_eq(&self.element, &other.element)
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn into_element(self) -> Element {
        Arc::try_unwrap(self.element).unwrap_or_else(|shared| shared.as_ref().clone())
    }

    fn element_mut(&mut self) -> &mut Element {
        Arc::make_mut(&mut self.element)
    }

    fn rebuild(&mut self, name: &str, namespace: &str, text: Option<&str>) {
        let current = self.element.as_ref();
        let mut builder = Element::builder(name, namespace);
        for (key, value) in current.attrs() {
            builder = builder.attr(key, value);
        }

        let element = match text {
            Some(text) => {
                if !text.is_empty() {
                    builder = builder.append(Node::Text(text.to_string()));
                }
                builder.append_all(current.children().cloned()).build()
            }
            None => builder.append_all(current.nodes().cloned()).build(),
        };

        self.element = Arc::new(element);
    }
}

impl StanzaTree {
    pub fn name(&self) -> &str {
        self.element.name()
    }

    pub fn set_name(mut self, name: impl AsRef<str>) -> Self {
        let namespace = self.element.ns();
        self.rebuild(name.as_ref(), &namespace, None);
        self
    }

    pub fn namespace(&self) -> String {
        self.element.ns()
    }

    pub fn set_namespace(mut self, namespace: impl AsRef<str>) -> Self {
        let name = self.element.name().to_string();
        self.rebuild(&name, namespace.as_ref(), None);
        self
    }

    pub fn is(&self, name: impl AsRef<str>, namespace: impl AsRef<str>) -> bool {
        self.element.is(name.as_ref(), namespace.as_ref())
    }

    pub fn attribute(&self, name: impl AsRef<str>) -> Option<&str> {
        self.element.attr(name.as_ref())
    }

    pub fn attribute_req(&self, name: impl AsRef<str>) -> Result<&str, ParseError> {
        self.attribute(name.as_ref()).ok_or(ParseError::Generic {
            msg: format!(
                "Missing required attribute {} in element {}.",
                name.as_ref(),
                self.name()
            ),
        })
    }

    /// Sets the attribute when `value` is `Some`, leaves the tree untouched otherwise.
    pub fn set_attribute<T: Into<String>>(
        mut self,
        name: impl AsRef<str>,
        value: impl Into<Option<T>>,
    ) -> Self {
        if let Some(value) = value.into() {
            self.element_mut().set_attr(name.as_ref(), value.into());
        }
        self
    }

    pub fn remove_attribute(mut self, name: impl AsRef<str>) -> Self {
        if self.attribute(name.as_ref()).is_some() {
            self.element_mut().set_attr(name.as_ref(), None::<String>);
        }
        self
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.element.text()
    }

    /// Replaces all direct text children with `text`. Element children are kept.
    pub fn set_text(mut self, text: impl Into<String>) -> Self {
        let name = self.element.name().to_string();
        let namespace = self.element.ns();
        self.rebuild(&name, &namespace, Some(&text.into()));
        self
    }

    pub fn kind(&self) -> Option<&str> {
        self.attribute("type")
    }

    pub fn set_kind(self, kind: impl Display) -> Self {
        self.set_attribute("type", kind.to_string())
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    pub fn set_id(self, id: impl Into<String>) -> Self {
        self.set_attribute("id", id.into())
    }

    pub fn to(&self) -> Option<UserJid> {
        self.attribute("to").and_then(|jid| UserJid::parse(jid).ok())
    }

    pub fn set_to(self, to: impl Display) -> Self {
        self.set_attribute("to", to.to_string())
    }

    pub fn from(&self) -> Option<UserJid> {
        self.attribute("from").and_then(|jid| UserJid::parse(jid).ok())
    }

    pub fn set_from(self, from: impl Display) -> Self {
        self.set_attribute("from", from.to_string())
    }
}

impl StanzaTree {
    /// Appends `child`. The child's backing element moves into this tree.
    pub fn add_child(mut self, child: StanzaTree) -> Self {
        self.element_mut().append_child(child.into_element());
        self
    }

    pub fn add_children(mut self, children: impl IntoIterator<Item = StanzaTree>) -> Self {
        for child in children {
            self = self.add_child(child);
        }
        self
    }

    /// Returns a snapshot of the direct element children, in document order. Changes to the
    /// returned trees are not reflected in `self`.
    pub fn children(&self) -> Vec<StanzaTree> {
        self.element
            .children()
            .cloned()
            .map(Into::into)
            .collect()
    }

    pub fn child(&self, name: impl AsRef<str>, namespace: impl AsRef<str>) -> Option<StanzaTree> {
        self.element
            .get_child(name.as_ref(), namespace.as_ref())
            .cloned()
            .map(Into::into)
    }

    pub fn child_by_name(&self, name: impl AsRef<str>) -> Option<StanzaTree> {
        self.element
            .get_child(name.as_ref(), NSChoice::Any)
            .cloned()
            .map(Into::into)
    }

    pub fn has_child(&self, name: impl AsRef<str>, namespace: impl AsRef<str>) -> bool {
        self.element
            .get_child(name.as_ref(), namespace.as_ref())
            .is_some()
    }

    pub fn children_named(
        &self,
        name: impl AsRef<str>,
        namespace: impl AsRef<str>,
    ) -> Vec<StanzaTree> {
        self.element
            .children()
            .filter(|child| child.is(name.as_ref(), namespace.as_ref()))
            .cloned()
            .map(Into::into)
            .collect()
    }
}

impl StanzaTree {
    pub fn add_body_with_text(self, text: impl Into<String>) -> Self {
        let namespace = self.namespace();
        self.add_child(StanzaTree::new_with_ns("body", namespace).set_text(text))
    }

    pub fn body_text(&self) -> Option<String> {
        self.element
            .get_child("body", NSChoice::Any)
            .map(|body| body.text())
    }

    /// The defined condition of an error stanza, e.g. `item-not-found`.
    pub fn error_condition(&self) -> Option<String> {
        self.element
            .get_child("error", NSChoice::Any)?
            .children()
            .find(|child| child.ns() == ns::XMPP_STANZAS && child.name() != "text")
            .map(|child| child.name().to_string())
    }
}

impl From<Element> for StanzaTree {
    fn from(value: Element) -> Self {
        StanzaTree {
            element: Arc::new(value),
        }
    }
}

impl From<StanzaTree> for Element {
    fn from(value: StanzaTree) -> Self {
        value.into_element()
    }
}

impl fmt::Display for StanzaTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from(self.element.as_ref()))
    }
}

impl FromStr for StanzaTree {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<Element>()?.into())
    }
}
