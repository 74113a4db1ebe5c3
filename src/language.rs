//! Keyword-based detection of the reply register.
//!
//! Plain substring matching over lowercased text, no tokenization. A keyword
//! buried inside a longer word still counts; that false positive is a known
//! limitation of the heuristic, not a bug.

use tracing::debug;

/// Which register the reply should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Russian, the default.
    Default,
    /// A regional Turkic language was detected.
    Regional,
}

/// Ordered (language tag, keywords) pairs. Each row carries greeting,
/// farewell, thanks, help and question tokens for one language; adding a
/// language means adding a row, not touching `classify`.
const REGIONAL_VOCABULARIES: &[(&str, &[&str])] = &[
    (
        "kk",
        &[
            "сәлем", "салем", "сәлеметсіз", "сау бол", "қош", "рахмет", "рақмет",
            "көмек", "көмектес", "кім", "қалай", "қайда", "неге",
        ],
    ),
    (
        "ky",
        &[
            "саламатсызбы", "салам", "кош бол", "рахмат", "жардам", "кандай",
            "кайда", "эмне",
        ],
    ),
    (
        "uz",
        &[
            "assalomu", "salom", "xayr", "rahmat", "yordam", "qanday",
            "qayerda", "nega",
        ],
    ),
    (
        "tt",
        &[
            "исәнмесез", "сәлам", "сау бул", "рәхмәт", "ярдәм", "ничек", "кайда",
            "ни өчен",
        ],
    ),
];

/// Classify the reply register for one inbound text.
pub fn classify(text: &str) -> Register {
    let lowered = text.to_lowercase();
    for (tag, keywords) in REGIONAL_VOCABULARIES {
        if let Some(hit) = keywords.iter().copied().find(|kw| lowered.contains(kw)) {
            debug!("Regional keyword '{hit}' ({tag}) detected");
            return Register::Regional;
        }
    }
    Register::Default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_russian_is_default() {
        assert_eq!(classify("Объясни квантовую физику простыми словами"), Register::Default);
        assert_eq!(classify("Привет, помоги решить задачу"), Register::Default);
    }

    #[test]
    fn test_kazakh_greeting_and_thanks() {
        assert_eq!(classify("Салем, рахмет!"), Register::Regional);
        assert_eq!(classify("Сәлеметсіз бе"), Register::Regional);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("РАХМЕТ"), Register::Regional);
        assert_eq!(classify("SALOM"), Register::Regional);
    }

    #[test]
    fn test_other_regional_languages() {
        assert_eq!(classify("саламатсызбы, жардам керекпи"), Register::Regional);
        assert_eq!(classify("assalomu alaykum"), Register::Regional);
        assert_eq!(classify("исәнмесез, ярдәм кирәк"), Register::Regional);
    }

    #[test]
    fn test_substring_match_is_accepted() {
        // "рахмет" inside a surname still flips the register; documented
        // limitation of substring matching.
        assert_eq!(classify("Расскажи про Рахметова"), Register::Regional);
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(classify(""), Register::Default);
    }
}
