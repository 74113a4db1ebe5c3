//! Decides the reply text for one inbound message.
//!
//! Creator-identity questions are answered from fixed strings without
//! touching the network. Everything else is wrapped in a language-appropriate
//! instruction template and sent to the generative API.

use tracing::{info, warn};

use crate::gemini::{Error as GeminiError, Generation, TextModel};
use crate::language::{classify, Register};

/// Reply when the API returns no candidates.
pub const EMPTY_FALLBACK: &str =
    "Не удалось получить ответ от AI. Попробуйте переформулировать вопрос.";

/// Reply for any transport failure, timeouts included.
pub const FAILURE_FALLBACK: &str = "Техническая ошибка. Попробуйте позже.";

/// Creator-identity answers, chosen by register.
const CREATOR_ANSWER_DEFAULT: &str =
    "Меня создал Azamatstln. Он занимается разработкой ботов и создал меня.";
const CREATOR_ANSWER_REGIONAL: &str =
    "Мені Azamatstln жасаған. Ол боттарды әзірлеумен айналысады және мені жасады.";

/// Phrases that short-circuit to the creator answer, matched as lowercase
/// substrings.
const CREATOR_PHRASES: &[&str] = &[
    "кто тебя создал",
    "кто тебя сделал",
    "кто твой создатель",
    "кто твой автор",
    "кем ты создан",
    "сені кім жасады",
    "сені кім жасаған",
    "who created you",
    "who made you",
];

/// Outcome of resolving one message, consumed explicitly by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Hardcoded creator-identity answer; no API call was made.
    Override(String),
    /// Text generated by the API.
    Answer(String),
    /// The API responded without candidates.
    Empty,
    /// Transport, timeout or parse failure; detail already logged.
    Failed(String),
}

impl Resolution {
    /// The user-facing text for this outcome.
    pub fn reply_text(&self) -> &str {
        match self {
            Resolution::Override(text) | Resolution::Answer(text) => text,
            Resolution::Empty => EMPTY_FALLBACK,
            Resolution::Failed(_) => FAILURE_FALLBACK,
        }
    }
}

pub struct Resolver<M> {
    model: M,
}

impl<M: TextModel> Resolver<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Decide the reply for one inbound text. Never fails: every API fault
    /// collapses into a fallback variant.
    pub async fn resolve(&self, text: &str) -> Resolution {
        let register = classify(text);

        let lowered = text.to_lowercase();
        if CREATOR_PHRASES.iter().any(|p| lowered.contains(p)) {
            info!("Creator-identity question, answering without API call");
            let answer = match register {
                Register::Regional => CREATOR_ANSWER_REGIONAL,
                Register::Default => CREATOR_ANSWER_DEFAULT,
            };
            return Resolution::Override(answer.to_string());
        }

        let prompt = match register {
            Register::Regional => regional_prompt(text),
            Register::Default => default_prompt(text),
        };

        match self.model.generate(&prompt).await {
            Ok(Generation::Answer(answer)) => Resolution::Answer(answer),
            Ok(Generation::Empty) => {
                warn!("Gemini returned no candidates");
                Resolution::Empty
            }
            Err(e) => {
                warn!("Gemini request failed: {e}");
                Resolution::Failed(e.to_string())
            }
        }
    }
}

fn default_prompt(user_text: &str) -> String {
    format!(
        r#"Ты - умный человек, который дает четкие, структурированные ответы на русском языке.

Требования к ответу:
1. Будь конкретным и по делу
2. Избегай лишних эмоций и смайликов
3. Структурируй ответ, если тема сложная
4. Используй простой и понятный язык
5. Не добавляй вступление вроде "Привет! Я рад помочь"
6. Давай информацию сразу по существу
7. Если вопрос простой - отвечай кратко
8. Если сложный - разбивай на логические части

Запрос пользователя: {user_text}

Ответ:"#
    )
}

fn regional_prompt(user_text: &str) -> String {
    format!(
        r#"Сен қазақ тілінде нақты, құрылымды жауап беретін ақылды көмекшісің.

Жауапқа қойылатын талаптар:
1. Нақты әрі тақырып бойынша жауап бер
2. Артық эмоция мен смайликтерден аулақ бол
3. Тақырып күрделі болса, жауапты құрылымда
4. Қарапайым әрі түсінікті тіл қолдан
5. "Сәлем! Көмектесуге қуаныштымын" сияқты кіріспе қоспа
6. Ақпаратты бірден мәні бойынша бер
7. Сұрақ қарапайым болса - қысқа жауап бер
8. Күрделі болса - логикалық бөліктерге бөл

Пайдаланушының сұрағы: {user_text}

Жауап:"#
    )
}
