//! Minimal host for voice assistant skills
//!
//! A [`Skill`] registers vocabulary, regexes and intents with its
//! [`SkillContext`] when initialized. [`SkillRuntime`] then parses each
//! utterance and calls the matching handler, one utterance at a time.
use std::collections::HashMap;

use crate::error::Result;

pub mod intent;

pub use self::intent::{load_vocabulary, Intent, IntentBuilder, IntentParser, Message};

/// Voice output
pub trait Speaker: Send + Sync {
    fn speak(&self, text: &str);
}

/// Prints each utterance on its own line
pub struct ConsoleSpeaker;

impl Speaker for ConsoleSpeaker {
    fn speak(&self, text: &str) {
        println!("{}", text);
    }
}

pub type Handler<S> = fn(&mut S, &Message);

pub struct SkillContext<S> {
    parser: IntentParser,
    handlers: HashMap<String, Handler<S>>,
}

impl<S> SkillContext<S> {
    pub fn new() -> SkillContext<S> {
        SkillContext {
            parser: IntentParser::new(),
            handlers: HashMap::new(),
        }
    }

    /// Register every phrase of a `.voc` document under `entity`
    pub fn register_vocabulary(&mut self, entity: &str, voc: &str) -> Result<()> {
        for phrase in load_vocabulary(voc) {
            self.parser.register_vocabulary(entity, &phrase)?;
        }
        Ok(())
    }

    pub fn register_regex(&mut self, pattern: &str) -> Result<()> {
        self.parser.register_regex(pattern)
    }

    pub fn register_intent(&mut self, intent: Intent, handler: Handler<S>) {
        self.handlers.insert(intent.name.clone(), handler);
        self.parser.register_intent(intent);
    }

    pub fn parse(&self, utterance: &str) -> Option<Message> {
        self.parser.parse(utterance)
    }
}

impl<S> Default for SkillContext<S> {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Skill: Sized {
    fn name(&self) -> &str;

    /// Register intents and prepare any resources
    fn initialize(&mut self, context: &mut SkillContext<Self>) -> Result<()>;

    fn stop(&mut self) {}
}

pub struct SkillRuntime<S: Skill> {
    skill: S,
    context: SkillContext<S>,
}

impl<S: Skill> SkillRuntime<S> {
    pub fn load(mut skill: S) -> Result<SkillRuntime<S>> {
        let mut context = SkillContext::new();
        skill.initialize(&mut context)?;
        log::debug!("Loaded skill {}", skill.name());
        Ok(SkillRuntime { skill, context })
    }

    /// Route an utterance to its handler, returning the intent that handled it
    pub fn dispatch(&mut self, utterance: &str) -> Option<String> {
        let message = match self.context.parse(utterance) {
            Some(message) => message,
            None => {
                log::debug!("No intent for {:?}", utterance);
                return None;
            }
        };
        if self.handle(&message) {
            Some(message.intent_type)
        } else {
            None
        }
    }

    pub fn handle(&mut self, message: &Message) -> bool {
        match self.context.handlers.get(&message.intent_type) {
            Some(handler) => {
                log::debug!("{} handling {}", self.skill.name(), message.intent_type);
                handler(&mut self.skill, message);
                true
            }
            None => false,
        }
    }

    pub fn stop(&mut self) {
        self.skill.stop();
    }

    pub fn skill(&self) -> &S {
        &self.skill
    }
}
