use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use safety_report::{
    controller::{CandidateState, ReportForm},
    device::{Accuracy, FixedPosition},
    launch::LaunchParams,
    protocol::{Location, SearchCandidate},
    server::{NominatimGeocoder, ReviewEndpoint},
    Config,
};

#[derive(Parser)]
struct CliParser {
    /// Review collection endpoint.
    #[arg(long, env = "SAFETY_REPORT_SUBMIT_URL", default_value = Config::SUBMIT_URL)]
    submit_url: String,

    /// Nominatim-compatible search endpoint.
    #[arg(long, env = "SAFETY_REPORT_GEOCODER_URL", default_value = Config::GEOCODER_URL)]
    geocoder_url: String,

    /// Comma-separated ISO country codes to restrict searches to.
    #[arg(long, env = "SAFETY_REPORT_COUNTRY_CODES", default_value = "in")]
    country_codes: String,

    /// Quiet period, in milliseconds, before a query is looked up.
    #[arg(long, env = "SAFETY_REPORT_DEBOUNCE_MS", default_value_t = 300)]
    debounce_ms: u64,

    /// Keep the selected location after a successful submission.
    #[arg(long)]
    keep_location: bool,

    /// Ask the device for a quick, low-precision fix instead of the best one.
    #[arg(long)]
    coarse_position: bool,

    /// Command to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look up places matching a query.
    Search {
        /// Free-text query; at least three characters.
        query: String,
    },
    /// Rate one place and submit the review.
    Submit {
        /// Report page URL carrying `userID` and optionally `lat`/`lng`.
        #[arg(long)]
        url: Option<String>,
        /// Reporting user; overrides the one in `--url`.
        #[arg(long)]
        user_id: Option<String>,
        /// What the place is like.
        #[arg(long)]
        description: String,
        /// Stars, 1 to 5.
        #[arg(long)]
        rating: u8,
        /// Pick the first search match for this query.
        #[arg(long, conflicts_with_all = ["lat", "lng"])]
        query: Option<String>,
        /// Latitude of a point picked on the map.
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Longitude of a point picked on the map.
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,
        /// Device position as `<lat>,<lng>`, used when nothing else picks a place.
        #[arg(long, allow_hyphen_values = true)]
        position: Option<Location>,
    },
    /// Drive the report page from stdin, one event per line.
    Session {
        /// Report page URL carrying `userID` and optionally `lat`/`lng`.
        #[arg(long)]
        url: Option<String>,
        /// Device position as `<lat>,<lng>`.
        #[arg(long, allow_hyphen_values = true)]
        position: Option<Location>,
    },
}

type Form = ReportForm<NominatimGeocoder, ReviewEndpoint>;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli_args = CliParser::parse();
    let config = Config {
        submit_url: cli_args.submit_url,
        geocoder_url: cli_args.geocoder_url,
        country_codes: cli_args.country_codes,
        debounce: Duration::from_millis(cli_args.debounce_ms),
        clear_location_on_success: !cli_args.keep_location,
        geolocation_accuracy: if cli_args.coarse_position {
            Accuracy::Coarse
        } else {
            Accuracy::High
        },
        ..Config::default()
    };

    match cli_args.command {
        Command::Search { query } => {
            let mut form = open_form(&config, LaunchParams::default())?;
            let selection = form.selection_mut();

            selection.on_search_query_changed(query);
            selection.wait_for_search().await;

            print_candidates(&selection.candidates());
        }
        Command::Submit {
            url,
            user_id,
            description,
            rating,
            query,
            lat,
            lng,
            position,
        } => {
            let mut params = launch_params(url.as_deref())?;
            if let Some(user_id) = user_id {
                params.user_id = user_id;
            }

            let mut form = open_form(&config, params)?;
            form.selection().locate_device(FixedPosition(position)).await?;

            if let Some(query) = query {
                let selection = form.selection_mut();
                selection.on_search_query_changed(query.as_str());
                selection.wait_for_search().await;
                if selection.on_submit_search_form().is_none() {
                    bail!("no place matches {query:?}");
                }
            }
            if let (Some(lat), Some(lng)) = (lat, lng) {
                let location = Location::new(lat, lng);
                if !location.is_valid() {
                    bail!("no such place on the map: {lat}, {lng}");
                }
                form.selection_mut().on_map_clicked(location);
            }

            form.set_description(description);
            form.set_rating(rating)?;

            if let Some(location) = form.selection().current_location() {
                println!("Selected: {location}");
            }

            let outcome = form.submit().await;
            let message = outcome.message().unwrap_or_default();
            if !outcome.is_success() {
                bail!("{message}");
            }
            println!("{message}");
        }
        Command::Session { url, position } => {
            let mut form = open_form(&config, launch_params(url.as_deref())?)?;
            form.selection().locate_device(FixedPosition(position)).await?;

            println!("Reporting as: {}", form.user_id());
            if let Some(home) = form.selection().home_location() {
                println!("From URL Query: {home}");
            }

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                match handle_line(&mut form, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => println!("error: {e:#}"),
                }
            }
        }
    }

    Ok(())
}

fn open_form(config: &Config, params: LaunchParams) -> Result<Form> {
    let geocoder = NominatimGeocoder::new(config)?;
    let endpoint = ReviewEndpoint::new(config)?;

    Ok(ReportForm::new(params, geocoder, endpoint, config))
}

fn launch_params(url: Option<&str>) -> Result<LaunchParams> {
    url.map(LaunchParams::from_url)
        .transpose()
        .map(Option::unwrap_or_default)
}

fn print_candidates(candidates: &[SearchCandidate]) {
    if candidates.is_empty() {
        println!("no matches");
    }
    for (idx, candidate) in candidates.iter().enumerate() {
        println!(
            "[{idx}] {} ({}, {})",
            candidate.display_name, candidate.lat, candidate.lon
        );
    }
}

const SESSION_HELP: &str = "\
search <text>       look up places
pick <n>            choose candidate n
enter               choose the first candidate
click <lat> <lng>   choose a point on the map
home                go back to the location from the URL
describe <text>     set the description
rate <n>            set the rating (1-5, 0 clears)
show                print the current form
submit              submit the report
quit                leave";

/// Apply one session command; `Ok(false)` ends the session.
async fn handle_line(form: &mut Form, line: &str) -> Result<bool> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "" => {}
        "search" => {
            let selection = form.selection_mut();
            selection.on_search_query_changed(rest);
            selection.wait_for_search().await;
            match selection.candidate_state() {
                CandidateState::Populated(candidates) => print_candidates(&candidates),
                _ => println!("no matches"),
            }
        }
        "pick" => {
            let idx: usize = rest.parse().context("pick needs a candidate number")?;
            let selection = form.selection_mut();
            let candidate = selection
                .candidates()
                .into_iter()
                .nth(idx)
                .with_context(|| format!("no candidate {idx}"))?;
            let location = selection.on_candidate_selected(&candidate)?;
            println!("Selected: {location}");
        }
        "enter" => match form.selection_mut().on_submit_search_form() {
            Some(location) => println!("Selected: {location}"),
            None => println!("nothing to pick"),
        },
        "click" => {
            let parts: Vec<_> = rest
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .collect();
            let location: Location = parts.join(",").parse()?;
            form.selection_mut().on_map_clicked(location);
            println!("Selected: {location}");
        }
        "home" => match form.selection_mut().set_home_location() {
            Some(location) => println!("Selected: {location}"),
            None => println!("no location in the URL"),
        },
        "describe" => form.set_description(rest),
        "rate" => form.set_rating(rest.parse().context("rate needs a number")?)?,
        "show" => {
            let draft = form.draft();
            println!("user:        {}", draft.user_id);
            println!("query:       {}", form.selection().query());
            match draft.location {
                Some(location) => println!("location:    {location}"),
                None => println!("location:    (map at {})", form.selection().map_center()),
            }
            println!("rating:      {}", draft.rating);
            println!("description: {}", draft.description);
        }
        "submit" => {
            println!("Submitting...");
            let outcome = form.submit().await;
            println!("{}", outcome.message().unwrap_or_default());
        }
        "help" => println!("{SESSION_HELP}"),
        "quit" | "exit" => return Ok(false),
        other => bail!("unknown command `{other}`, try `help`"),
    }

    Ok(true)
}
