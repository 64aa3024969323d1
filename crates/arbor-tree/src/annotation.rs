//! Annotation framework
//!
//! Independent concerns attach derived state to a [`Node`] without the
//! node type knowing about them. The set of kinds is closed
//! ([`AnnotationValue`]), each kind appears at most once per node, and
//! every kind renders itself into the node's outgoing [`WireNode`].
//!
//! Accessors are typed: `node.get::<Summary>()` resolves the kind at
//! compile time through the [`Annotation`] trait.

use crate::markup::{escape_html, html_component};
use crate::node::Node;
use crate::wire::WireNode;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Placeholder text for nodes whose summary could not be produced
pub const FAILED_SUMMARY: &str = "Failed to generate summary";

/// Tag of an annotation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Summary,
    RelatedFigures,
    SummaryFailure,
}

impl Display for AnnotationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Summary => "summary",
            Self::RelatedFigures => "related_figures",
            Self::SummaryFailure => "summary_failure",
        })
    }
}

pub(crate) mod private {
    pub trait Sealed {}
}

/// A typed annotation kind
///
/// Sealed: the closed set lives in [`AnnotationValue`].
pub trait Annotation: private::Sealed + Into<AnnotationValue> + Sized {
    /// Key under which this kind is stored
    const KIND: AnnotationKind;

    fn from_value(value: &AnnotationValue) -> Option<&Self>;

    fn from_value_mut(value: &mut AnnotationValue) -> Option<&mut Self>;

    fn from_owned(value: AnnotationValue) -> Option<Self>;

    /// Mutate the node's outgoing wire record
    fn render(&self, node: &Node, into: &mut WireNode);
}

/// Closed set of annotation kinds
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Summary(Summary),
    RelatedFigures(RelatedFigures),
    SummaryFailure(SummaryFailure),
}

impl AnnotationValue {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Self::Summary(_) => AnnotationKind::Summary,
            Self::RelatedFigures(_) => AnnotationKind::RelatedFigures,
            Self::SummaryFailure(_) => AnnotationKind::SummaryFailure,
        }
    }

    pub fn render(&self, node: &Node, into: &mut WireNode) {
        match self {
            Self::Summary(a) => a.render(node, into),
            Self::RelatedFigures(a) => a.render(node, into),
            Self::SummaryFailure(a) => a.render(node, into),
        }
    }
}

macro_rules! annotation_kind {
    ($ty:ident) => {
        impl private::Sealed for $ty {}

        impl From<$ty> for AnnotationValue {
            fn from(value: $ty) -> Self {
                AnnotationValue::$ty(value)
            }
        }

        impl Annotation for $ty {
            const KIND: AnnotationKind = AnnotationKind::$ty;

            fn from_value(value: &AnnotationValue) -> Option<&Self> {
                match value {
                    AnnotationValue::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_value_mut(value: &mut AnnotationValue) -> Option<&mut Self> {
                match value {
                    AnnotationValue::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_owned(value: AnnotationValue) -> Option<Self> {
                match value {
                    AnnotationValue::$ty(inner) => Some(inner),
                    _ => None,
                }
            }

            fn render(&self, node: &Node, into: &mut WireNode) {
                self.render_into(node, into);
            }
        }
    };
}

annotation_kind!(Summary);
annotation_kind!(RelatedFigures);
annotation_kind!(SummaryFailure);

/// Per-node side table keyed by kind, in attachment order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    entries: IndexMap<AnnotationKind, AnnotationValue>,
}

impl Annotations {
    /// Register under the annotation's own kind
    ///
    /// # Errors
    /// Returns the conflicting kind when one is already present.
    pub fn attach<A: Annotation>(&mut self, annotation: A) -> Result<(), AnnotationKind> {
        if self.entries.contains_key(&A::KIND) {
            return Err(A::KIND);
        }
        self.entries.insert(A::KIND, annotation.into());
        Ok(())
    }

    #[must_use]
    pub fn get<A: Annotation>(&self) -> Option<&A> {
        self.entries.get(&A::KIND).and_then(A::from_value)
    }

    pub fn get_mut<A: Annotation>(&mut self) -> Option<&mut A> {
        self.entries.get_mut(&A::KIND).and_then(A::from_value_mut)
    }

    #[inline]
    #[must_use]
    pub fn contains<A: Annotation>(&self) -> bool {
        self.entries.contains_key(&A::KIND)
    }

    /// Insert or replace; an existing entry keeps its attachment position
    pub fn update<A: Annotation>(&mut self, annotation: A) -> Option<A> {
        self.entries
            .insert(A::KIND, annotation.into())
            .and_then(A::from_owned)
    }

    pub fn remove<A: Annotation>(&mut self) -> Option<A> {
        self.entries.shift_remove(&A::KIND).and_then(A::from_owned)
    }

    /// Attached annotations in attachment order
    pub fn iter(&self) -> impl Iterator<Item = &AnnotationValue> {
        self.entries.values()
    }

    pub fn kinds(&self) -> impl Iterator<Item = AnnotationKind> + '_ {
        self.entries.keys().copied()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every render hook, in attachment order
    pub fn render(&self, node: &Node, into: &mut WireNode) {
        for value in self.entries.values() {
            value.render(node, into);
        }
    }
}

/// A key point, optionally backed by evidence from the source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl KeyPoint {
    #[must_use]
    pub fn new(point: impl Into<String>) -> Self {
        Self {
            point: point.into(),
            evidence: None,
        }
    }

    #[must_use]
    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// Derived summary of a node
///
/// `content == None` marks a node that was intentionally skipped
/// (figures, tables); it still counts as processed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Summary {
    /// Free-text summary
    pub content: Option<String>,
    /// Short caption, usable as a table-of-contents entry
    pub short_content: String,
    /// Key points, preferred over `content` for display when present
    pub points: Vec<KeyPoint>,
}

impl Summary {
    /// Summary made of free text only
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Summary made of key points and a caption
    #[must_use]
    pub fn with_points(points: Vec<KeyPoint>, short_content: impl Into<String>) -> Self {
        Self {
            content: Some(String::new()),
            short_content: short_content.into(),
            points,
        }
    }

    /// Processed, but intentionally without a summary
    #[must_use]
    pub fn skipped() -> Self {
        Self::default()
    }

    /// Degraded placeholder for a node whose summary failed
    #[must_use]
    pub fn failed() -> Self {
        Self::text(FAILED_SUMMARY)
    }

    #[inline]
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.content.is_none()
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.content.as_deref() == Some(FAILED_SUMMARY) && self.points.is_empty()
    }

    /// True when there is something worth showing or re-summarizing
    #[must_use]
    pub fn has_summary(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty()) || !self.points.is_empty()
    }

    /// Text fed to the parent's summary request
    #[must_use]
    pub fn resummary_text(&self) -> Option<String> {
        if !self.points.is_empty() {
            let lines: Vec<String> = self
                .points
                .iter()
                .map(|p| format!("- {}", escape_html(&p.point)))
                .collect();
            return Some(lines.join("\n"));
        }
        self.content.clone().filter(|c| !c.is_empty())
    }

    /// Text shown in the viewer's summary tab
    #[must_use]
    pub fn display_html(&self) -> Option<String> {
        if let Some(content) = self.content.as_deref().filter(|c| !c.is_empty()) {
            return Some(content.to_string());
        }
        if self.points.is_empty() {
            return None;
        }
        let mut html = String::from("<ul>");
        for point in &self.points {
            html.push_str("<li>");
            html.push_str(&point.point);
            html.push_str("</li>");
        }
        html.push_str("</ul>");
        Some(html)
    }

    fn render_into(&self, node: &Node, into: &mut WireNode) {
        if self.is_skipped() {
            return;
        }
        if node.content().is_empty() {
            if let Some(display) = self.display_html() {
                into.tabs.insert("summary".into(), display);
            }
        } else if self.points.is_empty() {
            into.tabs
                .insert("content".into(), html_component(node.content()));
        } else {
            if let Some(display) = self.display_html() {
                into.tabs.insert("summary".into(), display);
            }
            into.tool_mut(1)
                .insert("content".into(), html_component(node.content()));
        }
        if !self.short_content.is_empty() {
            into.data
                .insert("short_summary".into(), self.short_content.clone());
        }
    }
}

/// Figure payloads collected from a section and its subsections
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelatedFigures {
    pub figures: Vec<String>,
}

impl RelatedFigures {
    fn render_into(&self, _node: &Node, into: &mut WireNode) {
        if self.figures.is_empty() {
            return;
        }
        into.tool_mut(0)
            .insert("figures".into(), self.figures.join("<br/>"));
    }
}

/// Recorded failure of a node's summary computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryFailure {
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

impl SummaryFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            failed_at: Utc::now(),
        }
    }

    fn render_into(&self, _node: &Node, into: &mut WireNode) {
        into.tabs
            .entry("summary".into())
            .or_insert_with(|| FAILED_SUMMARY.to_string());
        into.data
            .insert("summary_error".into(), self.message.clone());
    }
}
