//! Voice skill mapping spoken intents onto a WeMo [`Environment`]
use std::sync::Arc;

use crate::{
    capabilities::{DeviceActions, MotionSensor, Switch},
    config::SkillConfig,
    environment::{Environment, EnvironmentConfig, MotionCallback, SwitchCallback},
    error::{Error, Result},
    skill::{IntentBuilder, Message, Skill, SkillContext, Speaker},
};

const TOGGLE_PREFIXES: [&str; 3] = ["toggle", "tockle", "taco"];
const LIST_PREFIXES: [&str; 3] = ["list wemo", "identify wemo", "get wemo"];

const SWITCH_VOCAB: &str = include_str!("../vocab/en-us/WemoSwitchKeyword.voc");
const LIST_VOCAB: &str = include_str!("../vocab/en-us/WemoListKeyword.voc");
const DISCOVER_VOCAB: &str = include_str!("../vocab/en-us/WemoDiscoverKeyword.voc");

const LIST_FAILED: &str = "uh. ah.";
const DISCOVER_FAILED: &str = "ahr. ah.";

/// What the skill needs from a discovery environment
pub trait DeviceEnvironment: Send {
    fn start(&mut self) -> Result<()>;
    fn discover(&mut self, seconds: u64) -> Result<()>;
    fn get_switch(&self, name: &str) -> Result<&dyn Switch>;
    fn list_switches(&self) -> Result<Vec<String>>;
}

impl DeviceEnvironment for Environment {
    fn start(&mut self) -> Result<()> {
        Environment::start(self)
    }

    fn discover(&mut self, seconds: u64) -> Result<()> {
        Environment::discover(self, seconds)
    }

    fn get_switch(&self, name: &str) -> Result<&dyn Switch> {
        Environment::get_switch(self, name)
    }

    fn list_switches(&self) -> Result<Vec<String>> {
        Ok(Environment::list_switches(self))
    }
}

pub trait EnvironmentFactory: Send {
    fn create(&self, on_switch: SwitchCallback, on_motion: MotionCallback)
        -> Box<dyn DeviceEnvironment>;
}

/// Builds real environments that scan the local network
pub struct WemoFactory {
    config: EnvironmentConfig,
}

impl WemoFactory {
    pub fn new(config: EnvironmentConfig) -> WemoFactory {
        WemoFactory { config }
    }
}

impl EnvironmentFactory for WemoFactory {
    fn create(
        &self,
        on_switch: SwitchCallback,
        on_motion: MotionCallback,
    ) -> Box<dyn DeviceEnvironment> {
        Box::new(Environment::with_config(on_switch, on_motion, self.config.clone()))
    }
}

pub fn on_switch(speaker: &dyn Speaker, switch: &dyn Switch) {
    log::debug!("Switch detected: {}", switch.name());
    speaker.speak(&format!("Discovered a switch named {}", switch.name()));
}

pub fn on_motion(motion: &dyn MotionSensor) {
    log::debug!("Motion detected on {}", motion.name());
}

/// Drop filler around a spoken device name: "the lamp switch" -> "lamp"
pub fn device_words(words: &str) -> String {
    let mut parts: Vec<String> = words.split_whitespace().map(str::to_lowercase).collect();
    if parts.len() > 1 && (parts[0] == "the" || parts[0] == "my") {
        parts.remove(0);
    }
    let last = parts.last().map(String::as_str);
    if parts.len() > 1 && matches!(last, Some("switch") | Some("plug") | Some("socket") | Some("outlet")) {
        parts.pop();
    }
    parts.join(" ")
}

pub struct WemoSkill {
    speaker: Arc<dyn Speaker>,
    config: SkillConfig,
    factory: Box<dyn EnvironmentFactory>,
    env: Option<Box<dyn DeviceEnvironment>>,
}

/// Build the skill against the local network
pub fn create_skill(speaker: Arc<dyn Speaker>, config: SkillConfig) -> WemoSkill {
    let factory = Box::new(WemoFactory::new(config.environment()));
    WemoSkill::with_factory(speaker, config, factory)
}

impl WemoSkill {
    pub fn with_factory(
        speaker: Arc<dyn Speaker>,
        config: SkillConfig,
        factory: Box<dyn EnvironmentFactory>,
    ) -> WemoSkill {
        WemoSkill {
            speaker,
            config,
            factory,
            env: None,
        }
    }

    fn speak(&self, text: &str) {
        self.speaker.speak(text);
    }

    fn new_environment(&self) -> Box<dyn DeviceEnvironment> {
        let speaker = self.speaker.clone();
        self.factory.create(
            Box::new(move |switch: &dyn Switch| on_switch(speaker.as_ref(), switch)),
            Box::new(on_motion),
        )
    }

    /// Replace the environment with a fresh one and scan the network
    fn rediscover(&mut self) -> Result<()> {
        let mut env = self.new_environment();
        let result = env
            .start()
            .and_then(|_| env.discover(self.config.discover_seconds));
        self.env = Some(env);
        result
    }

    fn env_mut(&mut self) -> Result<&mut Box<dyn DeviceEnvironment>> {
        self.env
            .as_mut()
            .ok_or_else(|| Error::Other(String::from("WeMo environment is not initialized")))
    }

    fn toggle(&self, name: &str) -> Result<(String, bool)> {
        let env = self
            .env
            .as_ref()
            .ok_or_else(|| Error::Other(String::from("WeMo environment is not initialized")))?;
        let switch = env.get_switch(name)?;
        let on = switch.toggle()?;
        Ok((switch.name().to_string(), on))
    }

    fn list(&mut self) -> Result<Vec<String>> {
        let env = self.env_mut()?;
        env.start()?;
        env.list_switches()
    }

    pub fn handle_wemo_switch_intent(&mut self, message: &Message) {
        let togglewords = message
            .data
            .get("ToggleWords")
            .map(String::as_str)
            .unwrap_or("");

        match self.toggle(&device_words(togglewords)) {
            Ok((name, on)) => {
                log::debug!("Toggled {} {}", name, if on { "on" } else { "off" });
                self.speak(&format!("{} is now {}", name, if on { "on" } else { "off" }));
            }
            Err(err) => {
                log::debug!("Unknown WeMo device: {} ({})", togglewords, err);
                self.speak(&format!("I don't know a device called {}", togglewords));
            }
        }
    }

    pub fn handle_wemo_list_intent(&mut self, message: &Message) {
        // the kind of thing to list, as in "list wemo switches"
        let listwords = message.data.get("ListWords").map(String::as_str).unwrap_or("");
        log::debug!("Wemo list {}", listwords);

        match self.list() {
            Ok(switches) => {
                log::debug!("Wemo switches: {:?}", switches);
                if switches.is_empty() {
                    self.speak("I didn't find any wemo switches");
                } else {
                    self.speak(&format!("I found {} wemo switches.", switches.len()));
                }
                for switch in &switches {
                    self.speak(switch);
                }
            }
            Err(err) => {
                log::debug!("Error occurred listing Wemo switches: {}", err);
                self.speak(LIST_FAILED);
            }
        }
    }

    pub fn handle_wemo_discover_intent(&mut self, _message: &Message) {
        if let Err(err) = self.rediscover() {
            log::debug!("Error occurred discovering Wemo devices: {}", err);
            self.speak(DISCOVER_FAILED);
        }
    }

    fn register_prefixed_regex(
        context: &mut SkillContext<Self>,
        prefixes: &[&str],
        suffix_regex: &str,
    ) -> Result<()> {
        for prefix in prefixes {
            context.register_regex(&format!("{} {}", prefix, suffix_regex))?;
        }
        Ok(())
    }
}

impl Skill for WemoSkill {
    fn name(&self) -> &str {
        "WemoSkill"
    }

    fn initialize(&mut self, context: &mut SkillContext<Self>) -> Result<()> {
        log::debug!("Initializing WeMo Environment");
        if let Err(err) = self.rediscover() {
            log::warn!("Initial WeMo discovery failed: {}", err);
            self.speak(DISCOVER_FAILED);
        }

        context.register_vocabulary("WemoSwitchKeyword", SWITCH_VOCAB)?;
        context.register_vocabulary("WemoListKeyword", LIST_VOCAB)?;
        context.register_vocabulary("WemoDiscoverKeyword", DISCOVER_VOCAB)?;

        Self::register_prefixed_regex(context, &TOGGLE_PREFIXES, "(?P<ToggleWords>.*)")?;
        Self::register_prefixed_regex(context, &LIST_PREFIXES, "(?P<ListWords>.*)")?;

        context.register_intent(
            IntentBuilder::new("WemoSwitchIntent")
                .require("WemoSwitchKeyword")
                .require("ToggleWords")
                .build(),
            WemoSkill::handle_wemo_switch_intent,
        );
        context.register_intent(
            IntentBuilder::new("WemoDiscoverIntent")
                .require("WemoDiscoverKeyword")
                .build(),
            WemoSkill::handle_wemo_discover_intent,
        );
        context.register_intent(
            IntentBuilder::new("WemoListIntent")
                .require("WemoListKeyword")
                .require("ListWords")
                .build(),
            WemoSkill::handle_wemo_list_intent,
        );
        Ok(())
    }
}
