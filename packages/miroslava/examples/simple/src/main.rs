#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Simple Miroslava application
//!
//! Shows the basics:
//! - A plain route
//! - Several URLs stacked on one view
//! - Dynamic routes, with defaults for a variable-less URL
//! - Aborting a request with an HTTP error

use std::path::PathBuf;

use chrono::Timelike as _;
use clap::Parser;
use miroslava::{Error, Miroslava, RouteOptions, RunOptions, ViewArgs, abort};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long)]
    debug: bool,

    /// TOML file merged into the app config
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn time_of_day() -> &'static str {
    match chrono::Local::now().hour() {
        0..12 => "morning",
        12..16 => "day",
        _ => "evening",
    }
}

async fn index(_: ViewArgs) -> Result<String, Error> {
    Ok(format!("<h1>Hello hello, good {}!!</h1>", time_of_day()))
}

async fn greet(_: ViewArgs) -> Result<&'static str, Error> {
    Ok("<p>I can't speak other languages, I'll greet in English</p>")
}

async fn birthday(args: ViewArgs) -> Result<String, Error> {
    let to = args.get_str("to").unwrap_or("to you");
    Ok(format!(
        "<h1>Good {}!</h1><h2>Happy birthday {to}!! 🥳</h2>",
        time_of_day()
    ))
}

async fn beverages(args: ViewArgs) -> Result<String, Error> {
    let drink = args.get_str("drink").unwrap_or_default();
    if drink == "coffee" {
        return Err(abort(418));
    }
    Ok(format!("<h2>Let's have some {drink}! ☕️</h2>"))
}

fn app(args: &Args) -> Result<Miroslava, Error> {
    let mut app = Miroslava::new("__main__");

    if let Some(config) = &args.config {
        app.config_mut().merge_toml_file(config)?;
    }

    app.route("/", index)?;
    app.routes(
        ["/hi", "/hello", "/hola", "/bonjour"],
        RouteOptions::new(),
        greet,
    )?;
    app.route_with(
        "/wish",
        RouteOptions::new()
            .endpoint("birthday")
            .default_value("to", "to you"),
        birthday,
    )?
    .add_url_rule("/wish/<to>", RouteOptions::new().endpoint("birthday"), None)?;
    app.route("/brew/<drink>", beverages)?;

    Ok(app)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    miroslava_logging::init()?;

    let args = Args::parse();
    log::debug!("args={args:?}");

    let app = app(&args)?;

    let mut options = RunOptions::new().debug(args.debug || app.debug());
    options.host = args.host;
    options.port = args.port;

    app.run(options).await?;

    Ok(())
}
