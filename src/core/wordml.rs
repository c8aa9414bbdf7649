//! WordprocessingML vocabulary on top of [`DocumentTree`](crate::core::tree::DocumentTree):
//! what counts as a paragraph and its visible text, and a node factory that
//! always produces correctly namespaced `w:` elements.

use crate::core::tree::{Attribute, Element, Node};

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Child order of `w:rPr` (CT_RPr). Word rejects run properties whose
/// children are out of sequence.
const RUN_PROPERTY_ORDER: &[&str] = &[
    "rStyle", "rFonts", "b", "bCs", "i", "iCs", "caps", "smallCaps", "strike", "dstrike",
    "outline", "shadow", "emboss", "imprint", "noProof", "snapToGrid", "vanish", "webHidden",
    "color", "spacing", "w", "kern", "position", "sz", "szCs", "highlight", "u", "effect", "bdr",
    "shd", "fitText", "vertAlign", "rtl", "cs", "em", "lang", "eastAsianLayout", "specVanish",
    "oMath", "rPrChange",
];

pub fn is_paragraph(element: &Element) -> bool {
    element.is(W_NS, "p")
}

/// Visible text of a paragraph: every `w:t` in document order, with a `w:tab`
/// inside a run read as `\t`. Deleted text and field instructions are not
/// visible and are skipped. Nested paragraphs (text boxes) are included.
pub fn paragraph_text(paragraph: &Element) -> String {
    let mut text = String::new();
    collect_text(paragraph, &mut text);
    text
}

fn collect_text(element: &Element, text: &mut String) {
    for child in element.child_elements() {
        if child.is(W_NS, "t") {
            text.push_str(&child.text());
        } else if child.is(W_NS, "tab") && element.is(W_NS, "r") {
            text.push('\t');
        } else {
            collect_text(child, text);
        }
    }
}

/// Rank of a run property in the schema sequence; foreign elements sort last.
fn run_property_rank(element: &Element) -> usize {
    if element.namespace.as_deref() != Some(W_NS) {
        return RUN_PROPERTY_ORDER.len();
    }
    RUN_PROPERTY_ORDER
        .iter()
        .position(|name| *name == element.local_name())
        .unwrap_or(RUN_PROPERTY_ORDER.len())
}

/// Put `property` into `run_properties`, replacing any existing child of the
/// same name and keeping the schema order of the sequence.
pub fn set_run_property(run_properties: &mut Element, property: Element) {
    let local = property.local_name().to_string();
    run_properties.remove_children(W_NS, &local);

    let rank = run_property_rank(&property);
    let position = run_properties
        .children
        .iter()
        .position(|node| matches!(node, Node::Element(child) if run_property_rank(child) > rank))
        .unwrap_or(run_properties.children.len());
    run_properties.insert(position, Node::Element(property));
}

/// Builds `w:` elements using the prefix bound to [`W_NS`] at the insertion
/// point, so new nodes need no namespace declarations of their own.
#[derive(Debug, Clone)]
pub struct WordFactory {
    prefix: String,
    declare: bool,
}

impl WordFactory {
    /// Factory for nodes that will become siblings of `anchor`. When the
    /// anchor uses WordprocessingML as its default namespace the attributes
    /// still need a prefix, so a `w` binding is declared on new paragraphs.
    pub fn for_element(anchor: &Element) -> Self {
        match anchor.prefix() {
            Some(prefix) => Self {
                prefix: prefix.to_string(),
                declare: false,
            },
            None => Self {
                prefix: "w".to_string(),
                declare: true,
            },
        }
    }

    pub fn qualify(&self, local_name: &str) -> String {
        format!("{}:{}", self.prefix, local_name)
    }

    pub fn element(&self, local_name: &str) -> Element {
        Element::new(self.qualify(local_name), Some(W_NS))
    }

    fn val(&self, value: &str) -> Attribute {
        Attribute::new(self.qualify("val"), Some(W_NS), value)
    }

    pub fn paragraph(&self) -> Element {
        let mut paragraph = self.element("p");
        if self.declare {
            paragraph.set_attribute(Attribute::new(format!("xmlns:{}", self.prefix), None, W_NS));
        }
        paragraph
    }

    pub fn run(&self) -> Element {
        self.element("r")
    }

    pub fn run_properties(&self) -> Element {
        self.element("rPr")
    }

    /// `w:t` with whitespace preservation flagged.
    pub fn text(&self, content: &str) -> Element {
        let mut text = self.element("t");
        text.set_attribute(Attribute::new("xml:space", Some(XML_NS), "preserve"));
        text.push(Node::text(content));
        text
    }

    /// `w:color` carrying only an RGB value; theme attributes would take
    /// precedence over `w:val` in Word.
    pub fn color(&self, hex: &str) -> Element {
        let mut color = self.element("color");
        color.set_attribute(self.val(hex));
        color
    }

    /// A toggle property (`w:b`, `w:bCs`, ...) explicitly switched off.
    pub fn toggle_off(&self, local_name: &str) -> Element {
        let mut toggle = self.element(local_name);
        toggle.set_attribute(self.val("0"));
        toggle
    }

    /// Re-prefix a subtree cloned from elsewhere in the document so its
    /// WordprocessingML names use this factory's prefix.
    pub fn adopt(&self, mut element: Element) -> Element {
        element.requalify(W_NS, &|local| self.qualify(local));
        element
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tree::DocumentTree;
    use pretty_assertions::assert_eq;

    fn parse_root(xml: &str) -> Element {
        DocumentTree::parse(xml).unwrap().root().unwrap().clone()
    }

    fn names(element: &Element) -> Vec<String> {
        element.child_elements().map(|e| e.local_name().to_string()).collect()
    }

    #[test]
    fn paragraph_text_joins_runs_and_reads_tabs() {
        let paragraph = parse_root(
            r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
                <w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>
                <w:r><w:t>Objective:</w:t></w:r>
                <w:r><w:tab/><w:t xml:space="preserve">understand </w:t></w:r>
                <w:hyperlink><w:r><w:t>X</w:t></w:r></w:hyperlink>
                <w:r><w:instrText> PAGE </w:instrText></w:r>
                <w:del><w:r><w:delText>gone</w:delText></w:r></w:del>
            </w:p>"#,
        );
        assert_eq!(paragraph_text(&paragraph), "Objective:\tunderstand X");
    }

    #[test]
    fn empty_paragraph_has_empty_text() {
        let paragraph = parse_root(
            r#"<w:p xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#,
        );
        assert!(is_paragraph(&paragraph));
        assert_eq!(paragraph_text(&paragraph), "");
    }

    #[test]
    fn run_properties_keep_schema_order() {
        let mut rpr = parse_root(
            r#"<w:rPr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:rFonts w:ascii="Arial"/><w:i/><w:sz w:val="24"/><w:lang w:val="vi-VN"/></w:rPr>"#,
        );
        let factory = WordFactory::for_element(&rpr);
        set_run_property(&mut rpr, factory.color("FF0000"));
        set_run_property(&mut rpr, factory.toggle_off("b"));
        set_run_property(&mut rpr, factory.toggle_off("bCs"));

        assert_eq!(names(&rpr), vec!["rFonts", "b", "bCs", "i", "color", "sz", "lang"]);
    }

    #[test]
    fn existing_color_is_replaced_not_duplicated() {
        let mut rpr = parse_root(
            r#"<w:rPr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:b/><w:color w:val="1F3864" w:themeColor="accent1" w:themeShade="80"/><w:sz w:val="26"/></w:rPr>"#,
        );
        let factory = WordFactory::for_element(&rpr);
        set_run_property(&mut rpr, factory.color("FF0000"));

        assert_eq!(names(&rpr), vec!["b", "color", "sz"]);
        let color = rpr.find_child(W_NS, "color").unwrap();
        assert_eq!(color.attributes.len(), 1);
        assert_eq!(color.attribute(Some(W_NS), "val").as_deref(), Some("FF0000"));
    }

    #[test]
    fn foreign_extension_elements_stay_after_new_properties() {
        let mut rpr = parse_root(
            r#"<w:rPr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml"><w:sz w:val="24"/><w14:ligatures w14:val="standard"/></w:rPr>"#,
        );
        let factory = WordFactory::for_element(&rpr);
        set_run_property(&mut rpr, factory.color("FF0000"));
        set_run_property(&mut rpr, factory.toggle_off("specVanish"));
        assert_eq!(names(&rpr), vec!["color", "sz", "specVanish", "ligatures"]);
    }

    #[test]
    fn factory_reuses_the_anchor_prefix() {
        let anchor = parse_root(
            r#"<ns0:p xmlns:ns0="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#,
        );
        let factory = WordFactory::for_element(&anchor);
        let text = factory.text("\tNLS1");

        assert_eq!(text.name, "ns0:t");
        assert!(text.is(W_NS, "t"));
        assert_eq!(text.attribute(Some(XML_NS), "space").as_deref(), Some("preserve"));
        assert_eq!(text.text(), "\tNLS1");
        assert!(factory.paragraph().attributes.is_empty());
    }

    #[test]
    fn factory_declares_prefix_under_default_namespace() {
        let anchor = parse_root(
            r#"<p xmlns="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><pPr><jc/></pPr></p>"#,
        );
        let factory = WordFactory::for_element(&anchor);
        let paragraph = factory.paragraph();
        assert_eq!(paragraph.name, "w:p");
        assert_eq!(paragraph.attributes[0].name, "xmlns:w");
        assert_eq!(paragraph.attributes[0].raw_value(), W_NS);

        let ppr = factory.adopt(anchor.find_child(W_NS, "pPr").unwrap().clone());
        assert_eq!(ppr.name, "w:pPr");
        assert_eq!(ppr.child_elements().next().unwrap().name, "w:jc");
    }
}
