use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};

use crate::dom::normalize_text;
use crate::error::{ExportError, Result};

static BUTTON_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"button, [role="button"]"#).expect("valid selector"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    Ja,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::Ja, Locale::En];
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::En => write!(f, "en"),
            Self::Ja => write!(f, "ja"),
        }
    }
}

impl FromStr for Locale {
    type Err = ExportError;

    fn from_str(input: &str) -> Result<Self> {
        match input {
            "en" => Ok(Self::En),
            "ja" => Ok(Self::Ja),
            _ => Err(ExportError::InvalidConfig(format!("unknown locale: {input}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerVocabulary {
    user: Vec<String>,
    assistant: Vec<String>,
    chrome: Vec<String>,
    headings: Vec<String>,
}

impl MarkerVocabulary {
    pub fn new(
        user: Vec<String>,
        assistant: Vec<String>,
        chrome: Vec<String>,
        headings: Vec<String>,
    ) -> Self {
        Self {
            user,
            assistant,
            chrome,
            headings,
        }
    }

    pub fn for_locale(locale: Locale) -> Self {
        Self::for_locales(&[locale])
    }

    pub fn for_locales(locales: &[Locale]) -> Self {
        let mut vocabulary = Self::new(Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for locale in locales {
            let (user, assistant, chrome, headings) = builtin_labels(*locale);
            extend_unique(&mut vocabulary.user, user);
            extend_unique(&mut vocabulary.assistant, assistant);
            extend_unique(&mut vocabulary.chrome, chrome);
            extend_unique(&mut vocabulary.headings, headings);
        }
        vocabulary
    }

    pub fn labels(&self, role: MarkerRole) -> &[String] {
        match role {
            MarkerRole::User => &self.user,
            MarkerRole::Assistant => &self.assistant,
        }
    }

    pub fn chrome(&self) -> &[String] {
        &self.chrome
    }

    pub fn headings(&self) -> &[String] {
        &self.headings
    }

    pub fn ui_labels(&self) -> Vec<&str> {
        self.user
            .iter()
            .chain(&self.assistant)
            .chain(&self.chrome)
            .map(String::as_str)
            .collect()
    }

    pub fn is_marker(&self, element: ElementRef<'_>, role: MarkerRole) -> bool {
        control_matches(element, self.labels(role))
    }

    pub fn is_chrome_control(&self, element: ElementRef<'_>) -> bool {
        control_matches(element, &self.chrome)
    }

    /// Button-like descendants of `element` labeled with a marker of `role`.
    pub fn marker_buttons<'a>(
        &self,
        element: ElementRef<'a>,
        role: MarkerRole,
    ) -> Vec<ElementRef<'a>> {
        element
            .select(&BUTTON_SELECTOR)
            .filter(|button| self.is_marker(*button, role))
            .collect()
    }

    pub fn all_marker_buttons<'a>(&self, element: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        element
            .select(&BUTTON_SELECTOR)
            .filter(|button| {
                self.is_marker(*button, MarkerRole::User)
                    || self.is_marker(*button, MarkerRole::Assistant)
            })
            .collect()
    }

    pub fn has_marker(&self, element: ElementRef<'_>, role: MarkerRole) -> bool {
        element
            .select(&BUTTON_SELECTOR)
            .any(|button| self.is_marker(button, role))
    }

    pub fn chrome_buttons<'a>(&self, element: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        element
            .select(&BUTTON_SELECTOR)
            .filter(|button| self.is_chrome_control(*button))
            .collect()
    }
}

impl Default for MarkerVocabulary {
    fn default() -> Self {
        Self::for_locales(&Locale::ALL)
    }
}

fn builtin_labels(
    locale: Locale,
) -> (
    &'static [&'static str],
    &'static [&'static str],
    &'static [&'static str],
    &'static [&'static str],
) {
    match locale {
        Locale::Ja => (
            &["プロンプトをコピー"],
            &["思考プロセスを表示", "良い回答", "悪い回答"],
            &["コードをコピー"],
            &["Gemini との会話"],
        ),
        Locale::En => (
            &["Copy prompt"],
            &["Show thinking", "Good response", "Bad response"],
            &["Copy code"],
            &["Conversation with Gemini"],
        ),
    }
}

fn extend_unique(target: &mut Vec<String>, labels: &[&str]) {
    for label in labels {
        if !target.iter().any(|existing| existing == label) {
            target.push((*label).to_string());
        }
    }
}

fn control_matches(element: ElementRef<'_>, labels: &[String]) -> bool {
    if let Some(aria_label) = element.value().attr("aria-label") {
        let aria_label = normalize_text(aria_label);
        if labels.iter().any(|label| *label == aria_label) {
            return true;
        }
    }

    let text = normalize_text(&element.text().collect::<String>());
    !text.is_empty() && labels.iter().any(|label| *label == text)
}
