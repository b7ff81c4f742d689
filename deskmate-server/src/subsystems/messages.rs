//! Fixed user-facing strings, per locale.
//!
//! Only Hebrew and English are carried. Any other locale falls back to English.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    He,
}

impl Locale {
    pub fn parse(tag: &str) -> Self {
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        if primary.eq_ignore_ascii_case("he") || primary.eq_ignore_ascii_case("iw") {
            Locale::He
        } else {
            Locale::En
        }
    }
}

pub fn no_match(locale: Locale) -> &'static str {
    match locale {
        Locale::En => {
            "I couldn't find relevant information for your question. Please try rephrasing it or contact a manager."
        }
        Locale::He => "לא מצאתי מידע רלוונטי לשאלה שלך. אפשר לנסח אותה מחדש או לפנות למנהל/ת.",
    }
}

/// Knowledge-base excerpt wrapped in the "from the knowledge base" template.
pub fn from_knowledge_base(locale: Locale, title: &str, excerpt: &str) -> String {
    match locale {
        Locale::En => format!("From the knowledge base ({title}):\n\n{excerpt}"),
        Locale::He => format!("מתוך מאגר הידע ({title}):\n\n{excerpt}"),
    }
}
