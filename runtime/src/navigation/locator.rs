//! Label locators: ways of turning a section label into an element query.
//!
//! Locators are tried in order for every label variant; the first one whose
//! query produces a clickable element wins. Adding a strategy means adding a
//! [`LabelLocator`] to the list, the navigation loop stays the same.

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZÁÉÍÓÚÜÑ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyzáéíóúüñ";

/// Elements that behave like navigation controls on a report page.
const CONTROL: &str = "self::button or self::a or @role='button' or @role='tab' \
     or @role='link' or @role='menuitem' or @role='option' or @tabindex";

/// Builds an XPath query that finds the control for a label.
pub trait LabelLocator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;
    fn xpath(&self, label: &str) -> String;
}

/// An element whose own text is exactly the label, ignoring surrounding whitespace.
pub struct ExactText;

impl LabelLocator for ExactText {
    fn name(&self) -> &'static str {
        "exact-text"
    }

    fn xpath(&self, label: &str) -> String {
        format!("//*[text()[normalize-space(.)={}]]", literal(label))
    }
}

/// The innermost interactive control whose text contains the label, case-insensitively.
pub struct ControlContainingText;

impl LabelLocator for ControlContainingText {
    fn name(&self) -> &'static str {
        "control-contains"
    }

    fn xpath(&self, label: &str) -> String {
        let needle = literal(&label.to_lowercase());
        let matches = format!(
            "({CONTROL}) and contains({}, {needle})",
            lower("normalize-space(.)")
        );
        format!("//*[{matches}][not(.//*[{matches}])]")
    }
}

/// Any element whose `aria-label` contains the label, case-insensitively.
pub struct AriaLabel;

impl LabelLocator for AriaLabel {
    fn name(&self) -> &'static str {
        "aria-label"
    }

    fn xpath(&self, label: &str) -> String {
        format!(
            "//*[@aria-label and contains({}, {})]",
            lower("@aria-label"),
            literal(&label.to_lowercase())
        )
    }
}

/// The default strategy order: strictest first.
pub fn default_locators() -> Vec<Box<dyn LabelLocator>> {
    vec![
        Box::new(ExactText),
        Box::new(ControlContainingText),
        Box::new(AriaLabel),
    ]
}

fn lower(expr: &str) -> String {
    format!("translate({expr}, '{UPPER}', '{LOWER}')")
}

/// Quote `text` as an XPath 1.0 string literal.
///
/// XPath 1.0 has no escape sequences, so text holding both quote kinds is
/// assembled with `concat()`.
pub fn literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    let parts: Vec<String> = text.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}
