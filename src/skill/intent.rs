//! Keyword and regex intent matching
use std::collections::HashMap;

use regex::Regex;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub name: String,
    pub requires: Vec<String>,
    pub optional: Vec<String>,
}

pub struct IntentBuilder {
    intent: Intent,
}

impl IntentBuilder {
    pub fn new(name: &str) -> IntentBuilder {
        IntentBuilder {
            intent: Intent {
                name: name.to_string(),
                requires: vec![],
                optional: vec![],
            },
        }
    }

    pub fn require(mut self, entity: &str) -> Self {
        self.intent.requires.push(entity.to_string());
        self
    }

    pub fn optionally(mut self, entity: &str) -> Self {
        self.intent.optional.push(entity.to_string());
        self
    }

    pub fn build(self) -> Intent {
        self.intent
    }
}

/// A parsed utterance routed to an intent
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub intent_type: String,
    pub utterance: String,
    pub data: HashMap<String, String>,
}

/// Phrases from a `.voc` file: one per line, `|` separates alternatives
pub fn load_vocabulary(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split('|'))
        .map(|phrase| phrase.trim().to_lowercase())
        .filter(|phrase| !phrase.is_empty())
        .collect()
}

#[derive(Default)]
pub struct IntentParser {
    vocabulary: Vec<(String, Regex)>,
    regexes: Vec<Regex>,
    intents: Vec<Intent>,
}

impl IntentParser {
    pub fn new() -> IntentParser {
        IntentParser::default()
    }

    pub fn register_vocabulary(&mut self, entity: &str, phrase: &str) -> Result<()> {
        let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
        let pattern = format!(r"(?i)\b{}\b", words.join(r"\s+"));
        self.vocabulary.push((entity.to_string(), Regex::new(&pattern)?));
        Ok(())
    }

    /// Named capture groups become entities holding the captured text
    pub fn register_regex(&mut self, pattern: &str) -> Result<()> {
        self.regexes.push(Regex::new(&format!("(?i){}", pattern))?);
        Ok(())
    }

    pub fn register_intent(&mut self, intent: Intent) {
        self.intents.push(intent);
    }

    fn entities(&self, utterance: &str) -> HashMap<String, String> {
        let mut found = HashMap::new();

        for (entity, re) in &self.vocabulary {
            if let Some(m) = re.find(utterance) {
                found
                    .entry(entity.clone())
                    .or_insert_with(|| m.as_str().to_string());
            }
        }

        for re in &self.regexes {
            if let Some(caps) = re.captures(utterance) {
                for name in re.capture_names().flatten() {
                    let value = caps.name(name).map(|m| m.as_str().trim()).unwrap_or("");
                    if !value.is_empty() {
                        found
                            .entry(name.to_string())
                            .or_insert_with(|| value.to_string());
                    }
                }
            }
        }

        found
    }

    /// Best intent for `utterance`: all required entities present, most entities
    /// matched, earliest registered on ties
    pub fn parse(&self, utterance: &str) -> Option<Message> {
        let utterance = utterance.trim().to_lowercase();
        let entities = self.entities(&utterance);

        let mut best: Option<(&Intent, usize)> = None;
        for intent in &self.intents {
            if !intent.requires.iter().all(|e| entities.contains_key(e)) {
                continue;
            }
            let score = intent.requires.len()
                + intent.optional.iter().filter(|e| entities.contains_key(*e)).count();
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((intent, score));
            }
        }

        best.map(|(intent, _)| Message {
            intent_type: intent.name.clone(),
            data: intent
                .requires
                .iter()
                .chain(intent.optional.iter())
                .filter_map(|e| entities.get(e).map(|v| (e.clone(), v.clone())))
                .collect(),
            utterance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> IntentParser {
        let mut parser = IntentParser::new();
        for phrase in load_vocabulary("toggle|tockle\n# comment\n\ntaco\n") {
            parser.register_vocabulary("SwitchKeyword", &phrase).unwrap();
        }
        parser.register_vocabulary("ListKeyword", "list wemo").unwrap();
        parser.register_vocabulary("Please", "please").unwrap();
        parser.register_regex("toggle (?P<ToggleWords>.*)").unwrap();
        parser.register_regex("list wemo (?P<ListWords>.*)").unwrap();
        parser.register_intent(
            IntentBuilder::new("SwitchIntent")
                .require("SwitchKeyword")
                .require("ToggleWords")
                .build(),
        );
        parser.register_intent(
            IntentBuilder::new("ListIntent")
                .require("ListKeyword")
                .require("ListWords")
                .build(),
        );
        parser.register_intent(
            IntentBuilder::new("PoliteListIntent")
                .require("ListKeyword")
                .require("ListWords")
                .optionally("Please")
                .build(),
        );
        parser
    }

    #[test]
    fn test_load_vocabulary() {
        assert_eq!(
            vec!["toggle", "tockle", "taco"],
            load_vocabulary("Toggle | tockle\n# comment\n\ntaco\n")
        );
    }

    #[test]
    fn test_parse_extracts_slot() {
        let message = parser().parse("Toggle the Living Room Lamp").unwrap();

        assert_eq!("SwitchIntent", message.intent_type);
        assert_eq!(
            Some(&String::from("the living room lamp")),
            message.data.get("ToggleWords")
        );
        assert_eq!(Some(&String::from("toggle")), message.data.get("SwitchKeyword"));
    }

    #[test]
    fn test_parse_requires_every_entity() {
        // keyword without anything to toggle
        assert!(parser().parse("toggle").is_none());
        assert!(parser().parse("what time is it").is_none());
    }

    #[test]
    fn test_keywords_match_whole_words() {
        let mut parser = IntentParser::new();
        parser.register_vocabulary("Keyword", "taco").unwrap();
        parser.register_intent(IntentBuilder::new("Taco").require("Keyword").build());

        assert!(parser.parse("tacos for dinner").is_none());
        assert!(parser.parse("a taco for dinner").is_some());
    }

    #[test]
    fn test_parse_prefers_most_entities() {
        let parser = parser();

        assert_eq!("ListIntent", parser.parse("list wemo switches").unwrap().intent_type);
        let polite = parser.parse("please list wemo switches").unwrap();
        assert_eq!("PoliteListIntent", polite.intent_type);
        assert_eq!(Some(&String::from("switches")), polite.data.get("ListWords"));
    }
}
