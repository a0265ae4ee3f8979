use std::{
    io::{self, BufRead},
    process,
    sync::Arc,
};

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

use wemo_skill::{
    capabilities::{DeviceActions, Switch},
    config::SkillConfig,
    create_skill,
    devices::Device,
    error::Result,
    skill::{ConsoleSpeaker, SkillRuntime},
    Environment,
};

fn command_discover(config: &SkillConfig, json: bool) -> Result<()> {
    let env = scan(config)?;
    for device in env.devices() {
        if json {
            discover_print_json(device)?;
        } else {
            discover_print_human(device);
        }
    }
    Ok(())
}

fn discover_print_human(device: &Device) {
    let info = device.info();
    println!(
        "{}\t{}\t{}\t{}",
        pad(&info.friendly_name, 24),
        pad(info.model_name.as_deref().unwrap_or("-"), 12),
        pad(&info.udn, 40),
        state(device),
    );
}

fn discover_print_json(device: &Device) -> Result<()> {
    let mut value = serde_json::to_value(device.info())?;
    value["kind"] = serde_json::to_value(device.info().kind())?;
    if let Some(switch) = device.as_switch() {
        value["is_on"] = serde_json::to_value(switch.is_on().ok())?;
    }
    println!("{}", value);
    Ok(())
}

fn state(device: &Device) -> String {
    match device.as_switch().map(|switch| switch.is_on()) {
        Some(Ok(true)) => String::from("on"),
        Some(Ok(false)) => String::from("off"),
        Some(Err(err)) => format!("unreachable ({})", err),
        None => String::from("not switchable"),
    }
}

fn pad(value: &str, padding: usize) -> String {
    let pad = " ".repeat(padding.saturating_sub(value.len()));
    format!("{}{}", value, pad)
}

fn scan(config: &SkillConfig) -> Result<Environment> {
    let mut env = Environment::with_config(|_: &dyn Switch| {}, |_| {}, config.environment());
    env.start()?;
    env.discover(config.discover_seconds)?;
    Ok(env)
}

fn command_list(config: &SkillConfig, json: bool) -> Result<()> {
    let switches = scan(config)?.list_switches();
    if json {
        println!("{}", serde_json::to_string(&switches)?);
    } else {
        switches.iter().for_each(|name| println!("{}", name));
    }
    Ok(())
}

fn command_switch(config: &SkillConfig, action: &str, name: &str) -> Result<()> {
    let env = scan(config)?;
    let switch = env.get_switch(name)?;
    let on = match action {
        "on" => switch.switch_on().map(|_| true)?,
        "off" => switch.switch_off().map(|_| false)?,
        _ => switch.toggle()?,
    };
    println!("{} is now {}", switch.name(), if on { "on" } else { "off" });
    Ok(())
}

fn command_say(config: &SkillConfig, utterances: Vec<String>) -> Result<()> {
    let skill = create_skill(Arc::new(ConsoleSpeaker), config.clone());
    let mut runtime = SkillRuntime::load(skill)?;
    for utterance in utterances {
        if runtime.dispatch(&utterance).is_none() {
            eprintln!("No intent matched {:?}", utterance);
        }
    }
    runtime.stop();
    Ok(())
}

fn load_config(matches: &ArgMatches) -> Result<SkillConfig> {
    let mut config = match matches.value_of("config") {
        Some(path) => SkillConfig::load(path)?,
        None => SkillConfig::default(),
    };
    if let Some(seconds) = matches.value_of("seconds") {
        config.discover_seconds = seconds
            .parse()
            .map_err(|_| format!("Invalid number of seconds: {}", seconds))?;
    }
    Ok(config)
}

fn run(matches: ArgMatches) -> Result<()> {
    let config = load_config(&matches)?;
    let json = matches.is_present("json");

    match matches.subcommand() {
        ("discover", _) => command_discover(&config, json),
        ("list", _) => command_list(&config, json),
        (action @ "toggle", Some(sub)) | (action @ "on", Some(sub)) | (action @ "off", Some(sub)) => {
            command_switch(&config, action, sub.value_of("name").unwrap_or_default())
        }
        ("say", Some(sub)) => {
            let words: Vec<&str> = sub.values_of("utterance").map(|v| v.collect()).unwrap_or_default();
            command_say(&config, vec![words.join(" ")])
        }
        ("listen", _) => {
            let lines = io::stdin()
                .lock()
                .lines()
                .collect::<io::Result<Vec<String>>>()?;
            command_say(&config, lines.into_iter().filter(|l| !l.trim().is_empty()).collect())
        }
        _ => Ok(()),
    }
}

fn main() {
    env_logger::init();

    let name_arg = || Arg::with_name("name").required(true).help("Device name, matched loosely");
    let matches = App::new("WeMo voice skill")
        .version("0.1")
        .about("Discover and control WeMo smart plugs on the local network.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(Arg::with_name("json")
            .long("json")
            .takes_value(false)
            .help("Respond with JSON.")
        )
        .arg(Arg::with_name("config")
            .long("config")
            .takes_value(true)
            .value_name("FILE")
            .help("JSON settings file.")
        )
        .arg(Arg::with_name("seconds")
            .long("seconds")
            .takes_value(true)
            .value_name("N")
            .help("How long to scan the network.")
        )
        .subcommand(SubCommand::with_name("discover")
            .about("Discover devices on the local network")
        )
        .subcommand(SubCommand::with_name("list")
            .about("List the names of discovered switches")
        )
        .subcommand(SubCommand::with_name("toggle").about("Toggle a switch").arg(name_arg()))
        .subcommand(SubCommand::with_name("on").about("Switch on").arg(name_arg()))
        .subcommand(SubCommand::with_name("off").about("Switch off").arg(name_arg()))
        .subcommand(SubCommand::with_name("say")
            .about("Handle one spoken command, e.g. `say toggle desk lamp`")
            .arg(Arg::with_name("utterance").required(true).multiple(true))
        )
        .subcommand(SubCommand::with_name("listen")
            .about("Handle one spoken command per line of standard input")
        )
        .get_matches();

    if let Err(err) = run(matches) {
        eprintln!("{}", err);
        process::exit(1);
    }
}
