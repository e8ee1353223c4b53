//! Small helpers over `scraper` selectors.
//!
//! `scraper::Html` is not `Send`; callers parse and extract synchronously and
//! never hold a document across an `.await`.

use scraper::{ElementRef, Html, Selector};

/// Compiles a selector known at compile time.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid CSS selector")
}

/// Collapsed text of the first element matching `sel`, if non-empty.
pub(crate) fn first_text(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel).next().and_then(element_text)
}

/// Value of `attr` on the first element matching `sel`, if non-empty.
pub(crate) fn first_attr(doc: &Html, sel: &Selector, attr: &str) -> Option<String> {
    doc.select(sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Raw text of the first element matching `sel`, for JSON held in `<script>` tags.
pub(crate) fn script_text(doc: &Html, sel: &Selector) -> Option<String> {
    let text: String = doc.select(sel).next()?.text().collect();
    (!text.trim().is_empty()).then_some(text)
}

/// Whitespace-collapsed text content of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> Option<String> {
    let text = el.text().collect::<Vec<_>>().join(" ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_text_collapses_whitespace() {
        let doc = Html::parse_document("<h1 class='t'>  Bicicleta \n  aro 29 </h1>");
        assert_eq!(
            first_text(&doc, &selector("h1.t")).as_deref(),
            Some("Bicicleta aro 29")
        );
    }

    #[test]
    fn first_attr_skips_blank_values() {
        let doc = Html::parse_document("<meta itemprop='price' content='  '>");
        assert_eq!(first_attr(&doc, &selector("meta[itemprop=price]"), "content"), None);
    }

    #[test]
    fn script_text_keeps_inner_whitespace() {
        let doc = Html::parse_document(r#"<script id="d">{"a": "x  y"}</script>"#);
        assert_eq!(
            script_text(&doc, &selector("script#d")).as_deref(),
            Some(r#"{"a": "x  y"}"#)
        );
    }

    #[test]
    fn missing_element_is_none() {
        let doc = Html::parse_document("<p>nothing</p>");
        assert_eq!(first_text(&doc, &selector("h1")), None);
    }
}
