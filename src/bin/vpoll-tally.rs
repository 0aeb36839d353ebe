//! Print the results of a VPOLL.
//!
//! The poll is read from a file, fetched from a URL, or read from stdin when no source (or `-`) is given.

use std::io::Read;

use chrono_tz::Tz;
use clap::Parser;
use url::Url;

use jcal_poll::principal::Principal;
use jcal_poll::traits::ResourceStore;
use jcal_poll::utils::print_poll;
use jcal_poll::{CalendarObject, HttpStore, PollError, Session};

/// Print the choices, votes and overall results of a VPOLL
#[derive(Parser, Debug)]
#[command(name = "vpoll-tally")]
#[command(version, long_about = None)]
struct Args {
    /// A jCal file, an http(s) URL, or `-` for stdin
    source: Option<String>,
    /// User name sent when fetching a URL
    #[arg(long, env = "VPOLL_USERNAME")]
    username: Option<String>,
    /// Password sent when fetching a URL
    #[arg(long, env = "VPOLL_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Calendar user address of the person running the tool, e.g. mailto:ann@example.com
    #[arg(long, env = "VPOLL_USER")]
    user: Option<String>,
    /// Timezone used to print times
    #[arg(long, env = "TZ")]
    tz: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = run(args).await {
        log::error!("{}", err);
        eprintln!("vpoll-tally: {}", err);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), PollError> {
    let text = match args.source.as_deref() {
        None | Some("-") => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)
                .map_err(|err| PollError::Serialization(format!("unable to read stdin: {}", err)))?;
            text
        },
        Some(source) if source.starts_with("http://") || source.starts_with("https://") => {
            let url = Url::parse(source)?;
            let store = match (&args.username, &args.password) {
                (Some(username), Some(password)) => HttpStore::with_credentials(username.clone(), password.clone()),
                _ => HttpStore::new(),
            };
            let stored = store.fetch(&url).await?;
            let data = stored.data.ok_or_else(|| PollError::Serialization(format!("{} returned no calendar data", url)))?;
            data.to_string()
        },
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| PollError::Serialization(format!("unable to read {}: {}", path, err)))?,
    };

    let mut object: CalendarObject = text.parse()?;
    print_poll(&session(&args)?, &mut object)
}

fn session(args: &Args) -> Result<Session, PollError> {
    let tz = match args.tz.as_deref() {
        Some(tz) if !tz.is_empty() => jcal_poll::temporal::resolve_tzid(tz)?,
        _ => Tz::UTC,
    };
    let addresses = args.user.iter().cloned().collect();
    let principal = Principal::new("", None, addresses);
    Ok(Session::new(principal, tz))
}
