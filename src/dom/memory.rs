// In-memory document
//
// Good enough to drive components without a browser: elements are indexed by
// id out of region markup, values and disabled flags are tracked per element,
// and everything observable (errors shown, scripts run, navigations,
// replacements) is recorded for inspection.

use super::{Dom, ElementRef, NativeEventKind, NativeListener};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").expect("tag pattern is valid")
});

/// Elements that never have a closing tag
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)(?:\s*=\s*"([^"]*)")?"#)
        .expect("attribute pattern is valid")
});

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    region: String,
    /// Closest enclosing element with an id, within the same region
    parent: Option<String>,
    value: String,
    disabled: bool,
    attributes: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct Region {
    markup: String,
    parent: Option<String>,
}

/// Document held entirely in memory
#[derive(Default)]
pub struct MemoryDom {
    elements: HashMap<String, Element>,
    regions: HashMap<String, Region>,
    listeners: HashMap<(String, NativeEventKind), Vec<NativeListener>>,
    errors: Vec<String>,
    scripts: Vec<String>,
    navigations: Vec<String>,
    replacements: Vec<(String, String)>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document holding a single top-level region
    pub fn with_region(id: &str, markup: &str) -> Self {
        let mut dom = Self::new();
        dom.insert_region(None, id, markup);
        dom
    }

    /// Attach `markup` as region `id`, optionally nested in `parent`
    pub fn insert_region(&mut self, parent: Option<&str>, id: &str, markup: &str) {
        self.regions.insert(
            id.to_string(),
            Region {
                markup: markup.to_string(),
                parent: parent.map(str::to_string),
            },
        );
        self.index(id, markup);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    pub fn region_markup(&self, id: &str) -> Option<&str> {
        self.regions.get(id).map(|r| r.markup.as_str())
    }

    /// Error messages presented to the user, oldest first
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    /// `(region, markup)` pairs in the order they were applied
    pub fn replacements(&self) -> &[(String, String)] {
        &self.replacements
    }

    pub fn listener_count(&self, element: &ElementRef, kind: NativeEventKind) -> usize {
        self.listeners
            .get(&(element.id().to_string(), kind))
            .map_or(0, Vec::len)
    }

    fn index(&mut self, region: &str, markup: &str) {
        let mut open_select: Option<String> = None;
        let mut select_has_value = false;
        // Elements still open at this point of the markup, innermost last
        let mut open: Vec<(String, Option<String>)> = Vec::new();

        for tag in TAG.captures_iter(markup) {
            let name = tag[2].to_ascii_lowercase();
            if !tag[1].is_empty() {
                if let Some(depth) = open.iter().rposition(|(open_name, _)| *open_name == name) {
                    open.truncate(depth);
                }
                if name == "select" {
                    open_select = None;
                }
                continue;
            }

            let attributes: HashMap<String, String> = ATTRIBUTE
                .captures_iter(&tag[3])
                .map(|a| {
                    let value = a.get(2).map_or("", |v| v.as_str());
                    (a[1].to_ascii_lowercase(), value.to_string())
                })
                .collect();
            let id = attributes.get("id").cloned();
            let parent = open.iter().rev().find_map(|(_, open_id)| open_id.clone());
            if !tag[3].trim_end().ends_with('/') && !VOID_TAGS.contains(&name.as_str()) {
                open.push((name.clone(), id.clone()));
            }

            // A select takes the value of its selected option, else its first
            if name == "option" {
                if let Some(select) = open_select.as_ref().and_then(|id| self.elements.get_mut(id)) {
                    let option_value = attributes.get("value").cloned().unwrap_or_default();
                    if attributes.contains_key("selected") || !select_has_value {
                        select.value = option_value;
                        select_has_value = true;
                    }
                }
                continue;
            }

            let Some(id) = id else {
                continue;
            };
            if name == "select" {
                open_select = Some(id.clone());
                select_has_value = false;
            }

            self.elements.insert(
                id,
                Element {
                    tag: name,
                    region: region.to_string(),
                    parent,
                    value: attributes.get("value").cloned().unwrap_or_default(),
                    disabled: attributes.contains_key("disabled"),
                    attributes,
                },
            );
        }
    }

    /// `region` plus every region nested inside it
    fn subtree(&self, region: &str) -> HashSet<String> {
        let mut found: HashSet<String> = HashSet::from([region.to_string()]);
        loop {
            let before = found.len();
            for (id, r) in &self.regions {
                if r.parent.as_ref().is_some_and(|p| found.contains(p)) {
                    found.insert(id.clone());
                }
            }
            if found.len() == before {
                return found;
            }
        }
    }

    fn is_within<'a>(&'a self, mut region: &'a str, scope: &str) -> bool {
        loop {
            if region == scope {
                return true;
            }
            match self.regions.get(region).and_then(|r| r.parent.as_deref()) {
                Some(parent) => region = parent,
                None => return false,
            }
        }
    }

    /// Whether element `id` is `ancestor` or sits inside it in its region's markup
    fn descends_from<'a>(&'a self, id: &'a str, ancestor: &str) -> bool {
        let mut current = Some(id);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.elements.get(candidate).and_then(|e| e.parent.as_deref());
        }
        false
    }
}

impl Dom for MemoryDom {
    fn find(&self, scope: &ElementRef, id: &str) -> Option<ElementRef> {
        let element = self.elements.get(id)?;
        (self.descends_from(id, scope.id()) || self.is_within(&element.region, scope.id()))
            .then(|| ElementRef::new(id))
    }

    fn tag_name(&self, element: &ElementRef) -> Option<String> {
        self.elements.get(element.id()).map(|e| e.tag.clone())
    }

    fn value(&self, element: &ElementRef) -> Option<String> {
        self.elements.get(element.id()).map(|e| e.value.clone())
    }

    fn set_value(&mut self, element: &ElementRef, value: &str) {
        if let Some(e) = self.elements.get_mut(element.id()) {
            e.value = value.to_string();
        }
    }

    fn is_disabled(&self, element: &ElementRef) -> bool {
        self.elements.get(element.id()).is_some_and(|e| e.disabled)
    }

    fn set_disabled(&mut self, element: &ElementRef, disabled: bool) {
        if let Some(e) = self.elements.get_mut(element.id()) {
            e.disabled = disabled;
        }
    }

    fn attribute(&self, element: &ElementRef, name: &str) -> Option<String> {
        self.elements
            .get(element.id())
            .and_then(|e| e.attributes.get(name).cloned())
    }

    fn set_attribute(&mut self, element: &ElementRef, name: &str, value: &str) {
        if let Some(e) = self.elements.get_mut(element.id()) {
            e.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn replace_with(&mut self, target: &ElementRef, markup: &str) {
        let id = target.id();
        // A plain element becomes a region of its own where it stood
        let parent = match self.regions.get(id) {
            Some(region) => region.parent.clone(),
            None => self.elements.get(id).map(|e| e.region.clone()),
        };
        let doomed = self.subtree(id);

        // Detach first: elements, their listeners, nested regions
        let removed: Vec<String> = self
            .elements
            .iter()
            .filter(|(element_id, e)| doomed.contains(&e.region) || self.descends_from(element_id, id))
            .map(|(element_id, _)| element_id.clone())
            .collect();
        for element_id in &removed {
            self.elements.remove(element_id);
        }
        self.listeners
            .retain(|(element_id, _), _| !removed.contains(element_id) && element_id != id);
        self.regions.retain(|region_id, _| !doomed.contains(region_id));

        // Then attach
        self.regions.insert(
            id.to_string(),
            Region {
                markup: markup.to_string(),
                parent,
            },
        );
        self.index(id, markup);
        self.replacements.push((id.to_string(), markup.to_string()));

        tracing::debug!(region = %target, detached = removed.len(), "region replaced");
    }

    fn execute_script(&mut self, script: &str) {
        self.scripts.push(script.to_string());
    }

    fn present_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn navigate(&mut self, url: &str) {
        self.navigations.push(url.to_string());
    }

    fn listen(&mut self, element: &ElementRef, kind: NativeEventKind, listener: NativeListener) {
        if !self.elements.contains_key(element.id()) {
            tracing::debug!(element = %element, ?kind, "listen on unknown element ignored");
            return;
        }
        self.listeners
            .entry((element.id().to_string(), kind))
            .or_default()
            .push(listener);
    }

    fn listeners(&self, element: &ElementRef, kind: NativeEventKind) -> Vec<NativeListener> {
        self.listeners
            .get(&(element.id().to_string(), kind))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NativeEvent;
    use std::rc::Rc;

    const FORM: &str = r#"<form id="uploadForm">
        <select id="revisedFileId"><option value="0">New file</option><option value="12" selected>Chapter 1</option></select>
        <select id="genreId" disabled><option value="1">Article</option><option value="2">Image</option></select>
        <a id="cancel" class="cancel">Cancel</a>
    </form>"#;

    fn noop() -> NativeListener {
        Rc::new(|_: &ElementRef, _: &NativeEvent| false)
    }

    #[test]
    fn test_indexes_elements_from_markup() {
        let dom = MemoryDom::with_region("uploadForm", FORM);
        let scope = ElementRef::new("uploadForm");

        let revised = dom.find(&scope, "revisedFileId").unwrap();
        assert_eq!(dom.tag_name(&revised).as_deref(), Some("select"));
        assert_eq!(dom.value(&revised).as_deref(), Some("12"));

        let genre = dom.find(&scope, "genreId").unwrap();
        assert_eq!(dom.value(&genre).as_deref(), Some("1"));
        assert!(dom.is_disabled(&genre));

        let cancel = dom.find(&scope, "cancel").unwrap();
        assert_eq!(dom.attribute(&cancel, "class").as_deref(), Some("cancel"));
        assert!(dom.find(&scope, "missing").is_none());
    }

    #[test]
    fn test_find_respects_scope() {
        let mut dom = MemoryDom::with_region("page", r#"<div id="page"></div>"#);
        dom.insert_region(Some("page"), "inner", r#"<input id="a">"#);
        dom.insert_region(None, "other", r#"<input id="b">"#);

        let page = ElementRef::new("page");
        assert!(dom.find(&page, "a").is_some());
        assert!(dom.find(&page, "b").is_none());
        assert!(dom.find(&ElementRef::new("inner"), "a").is_some());
    }

    #[test]
    fn test_replace_detaches_old_subtree_and_listeners() {
        let mut dom = MemoryDom::with_region("uploadForm", FORM);
        dom.insert_region(Some("uploadForm"), "nested", r#"<input id="deep">"#);
        let cancel = ElementRef::new("cancel");
        dom.listen(&cancel, NativeEventKind::Click, noop());
        dom.listen(&ElementRef::new("deep"), NativeEventKind::Change, noop());

        dom.replace_with(
            &ElementRef::new("uploadForm"),
            r#"<form id="confirm"><a id="cancel">Cancel</a></form>"#,
        );

        assert!(!dom.contains("revisedFileId"));
        assert!(!dom.contains("deep"));
        assert!(dom.region_markup("nested").is_none());
        // Same id came back with the new markup, but without the old listener
        assert!(dom.contains("cancel"));
        assert_eq!(dom.listener_count(&cancel, NativeEventKind::Click), 0);
        assert!(dom.contains("confirm"));
        assert_eq!(dom.replacements().len(), 1);
        assert!(dom.region_markup("uploadForm").unwrap().contains("confirm"));
    }

    #[test]
    fn test_replace_plain_element_drops_its_children() {
        let mut dom = MemoryDom::with_region(
            "page",
            r#"<div id="page"><fieldset id="files"><input id="a"><input id="b"></fieldset><input id="c"></div>"#,
        );
        let files = ElementRef::new("files");
        assert!(dom.find(&files, "a").is_some());
        assert!(dom.find(&files, "c").is_none());
        dom.listen(&ElementRef::new("a"), NativeEventKind::Change, noop());

        dom.replace_with(&files, r#"<p id="done">Saved</p>"#);

        assert!(!dom.contains("a"));
        assert!(!dom.contains("b"));
        assert!(!dom.contains("files"));
        assert!(dom.listeners(&ElementRef::new("a"), NativeEventKind::Change).is_empty());
        // Siblings outside the replaced element survive
        assert!(dom.contains("c"));
        let page = ElementRef::new("page");
        assert!(dom.find(&page, "done").is_some());
        assert!(dom.find(&page, "c").is_some());
    }

    #[test]
    fn test_listen_on_unknown_element_is_ignored() {
        let mut dom = MemoryDom::new();
        let ghost = ElementRef::new("ghost");
        dom.listen(&ghost, NativeEventKind::Click, noop());
        assert!(dom.listeners(&ghost, NativeEventKind::Click).is_empty());
    }

    #[test]
    fn test_records_side_effects() {
        let mut dom = MemoryDom::new();
        dom.present_error("File too large");
        dom.execute_script("init()");
        dom.navigate("/dashboard");
        assert_eq!(dom.errors(), ["File too large"]);
        assert_eq!(dom.scripts(), ["init()"]);
        assert_eq!(dom.navigations(), ["/dashboard"]);
    }
}
