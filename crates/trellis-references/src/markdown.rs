//! Markdown scanning
//!
//! Finds what a markdown document points at:
//!
//! - entry links `[text](/entry/<id or friendly id>)`
//! - property links `[text](/prop/<id>)`
//! - inline lookups written as code spans: `` `{ this.ancestors() }` ``
//! - block lookups in fenced code blocks with the `lookup` info string
//!
//! Scanning is purely syntactic; nothing is resolved or evaluated here.

use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use trellis_lookup::ids::{is_entry_id, is_friendly_id};
use trellis_lookup::{EntryId, PropertyId};

const ENTRY_PREFIX: &str = "/entry/";
const PROPERTY_PREFIX: &str = "/prop/";
const LOOKUP_INFO: &str = "lookup";

/// References found in one markdown document, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownReferences {
    pub entry_ids: Vec<EntryId>,
    /// Link targets that still need resolving to an id.
    pub friendly_ids: Vec<String>,
    pub property_ids: Vec<PropertyId>,
    /// Lookup expression texts, trimmed.
    pub lookups: Vec<String>,
}

impl MarkdownReferences {
    pub fn is_empty(&self) -> bool {
        self.entry_ids.is_empty()
            && self.friendly_ids.is_empty()
            && self.property_ids.is_empty()
            && self.lookups.is_empty()
    }
}

/// Scans `markdown` for links and embedded lookups.
pub fn scan_markdown(markdown: &str) -> MarkdownReferences {
    let mut found = MarkdownReferences::default();
    let mut lookup_block: Option<String> = None;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Link { dest_url, .. }) => found.add_link(&dest_url),
            Event::Code(code) => {
                if let Some(expr) = inline_lookup(&code) {
                    found.lookups.push(expr.to_string());
                }
            }
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))
                if info.trim() == LOOKUP_INFO =>
            {
                lookup_block = Some(String::new());
            }
            Event::Text(text) => {
                if let Some(block) = lookup_block.as_mut() {
                    block.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = lookup_block.take() {
                    let expr = block.trim();
                    if !expr.is_empty() {
                        found.lookups.push(expr.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    found
}

impl MarkdownReferences {
    fn add_link(&mut self, dest: &str) {
        let path = dest.split(['#', '?']).next().unwrap_or_default();
        if let Some(key) = path.strip_prefix(ENTRY_PREFIX) {
            let key = key.trim_end_matches('/');
            if is_entry_id(key) {
                self.entry_ids.push(EntryId::new(key));
            } else if is_friendly_id(key) {
                self.friendly_ids.push(key.to_string());
            }
        } else if let Some(key) = path.strip_prefix(PROPERTY_PREFIX) {
            let key = key.trim_end_matches('/');
            if is_entry_id(key) {
                self.property_ids.push(PropertyId::new(key));
            }
        }
    }
}

/// `{ expr }` inside a code span.
fn inline_lookup(code: &str) -> Option<&str> {
    let expr = code.trim().strip_prefix('{')?.strip_suffix('}')?.trim();
    (!expr.is_empty()).then_some(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn finds_entry_and_property_links() {
        let found = scan_markdown(
            "A [pine](/entry/_pine) is a [conifer](/entry/conifer) with \
             [needles](/prop/_pNeedles). See [elsewhere](https://example.com/entry/_x).",
        );
        assert_eq!(found.entry_ids, vec![EntryId::new("_pine")]);
        assert_eq!(found.friendly_ids, vec!["conifer".to_string()]);
        assert_eq!(found.property_ids, vec![PropertyId::new("_pNeedles")]);
        assert!(found.lookups.is_empty());
    }

    #[test_case("[a](/entry/_a#history)", "_a" ; "fragment")]
    #[test_case("[a](/entry/_a?tab=refs)", "_a" ; "query string")]
    #[test_case("[a](/entry/_a/)", "_a" ; "trailing slash")]
    fn link_suffixes_are_ignored(markdown: &str, expected: &str) {
        assert_eq!(scan_markdown(markdown).entry_ids, vec![EntryId::new(expected)]);
    }

    #[test]
    fn finds_inline_and_block_lookups() {
        let found = scan_markdown(
            "Parents: `{ this.ancestors() }` and `plain code`.\n\n\
             ```lookup\nthis.descendants().count()\n```\n\n\
             ```rust\nlet x = 1;\n```\n",
        );
        assert_eq!(
            found.lookups,
            vec![
                "this.ancestors()".to_string(),
                "this.descendants().count()".to_string()
            ]
        );
    }

    #[test]
    fn empty_lookups_are_skipped() {
        let found = scan_markdown("`{}` and\n\n```lookup\n\n```\n");
        assert!(found.is_empty());
    }

    #[test]
    fn malformed_entry_keys_are_skipped() {
        let found = scan_markdown("[bad](/entry/Not_A_Slug) [empty](/entry/)");
        assert!(found.is_empty());
    }
}
